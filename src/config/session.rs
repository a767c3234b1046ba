use serde::{Deserialize, Serialize};

/// Session storage key names.
///
/// These are the caller-visible session artifacts cleared in one call when
/// an admin-impersonation handoff is detected. The surrounding application
/// owns the storage medium; this service only names what must go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Keys removed on invalidation.
    #[serde(default = "default_session_keys")]
    pub keys: Vec<String>,
}

impl SessionConfig {
    pub(crate) fn validate(&self) -> Result<(), super::ConfigError> {
        if self.keys.is_empty() {
            return Err(super::ConfigError::Validation(
                "session.keys must name at least one key to clear".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keys: default_session_keys(),
        }
    }
}

fn default_session_keys() -> Vec<String> {
    vec![
        "sessionId".to_string(),
        "authToken".to_string(),
        "userContext".to_string(),
    ]
}

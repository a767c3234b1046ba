//! Auth-key-to-identity resolution pipeline.
//!
//! Turning an opaque auth key into a verified user identity takes four
//! steps, sequenced by the orchestrator:
//!
//! - **Metadata resolution**: exchange the key for tenant/site metadata
//! - **Parameter parsing**: decode the metadata's opaque key-value blob
//! - **Session invalidation**: clear a stale session on an
//!   admin-impersonation handoff
//! - **Identity verification**: confirm the identity upstream and build the
//!   canonical [`UserContext`]
//!
//! Any step failure aborts the remaining steps and surfaces with its error
//! kind preserved. Parameter-parse anomalies are the sole exception: they
//! degrade to a partial mapping and never abort the pipeline.

mod error;
mod orchestrator;
pub mod params;
mod session;
mod site;
mod verify;

pub use error::AuthError;
pub use orchestrator::{AuthOrchestrator, AuthOutcome, normalize_auth_key};
pub use params::{ADMIN_USER_ID, parse_site_params};
pub use session::{MemorySessionStore, SessionError, SessionInvalidator, SessionStore};
pub use site::{SiteMetadata, SiteMetadataResolver, UNKNOWN_ID};
pub use verify::{IdentityVerifier, UserContext};

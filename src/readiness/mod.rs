//! Dependent-service readiness gate.
//!
//! After a user context exists, an external dependent service must come up
//! before some application features unlock. The gate probes that service's
//! health endpoint through a bounded-retry state machine:
//!
//! ```text
//! uninitialized → connecting → { connected | failed }
//! ```
//!
//! Probing is bounded (at most `max_attempts` probes per cycle) and
//! caller-driven after the first automatic cycle: a failed cycle settles in
//! `failed` until the caller retries or bypasses. The dependent service is
//! a quality-of-life feature, not an authentication requirement, so the
//! bypass affordance lets callers proceed without a `connected` state.

mod probe;

use std::{
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub use probe::HttpReadinessProbe;

use crate::config::ReadinessConfig;

/// Connection state of the dependent service, as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    Uninitialized,
    Connecting,
    Connected,
    Failed,
}

/// A single probe's failure.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe transport error: {0}")]
    Transport(String),

    #[error("dependent service not ready: {0}")]
    NotReady(String),
}

/// One probe of the dependent service's health endpoint.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn probe(&self) -> Result<(), ProbeError>;
}

/// Time source for the inter-probe delay, injectable so tests advance
/// virtual time instead of sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

struct GateStatus {
    state: ReadinessState,
    diagnostic: Option<String>,
}

/// Bounded-retry readiness gate over an injected probe.
///
/// Only one probe cycle is in flight at a time; retry requests received
/// while a cycle runs are coalesced (ignored, not queued). Mutual exclusion
/// is structural, a `try_lock` on the cycle mutex rather than a blocking
/// lock acquisition.
pub struct ReadinessGate {
    probe: Arc<dyn ReadinessProbe>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    retry_delay: Duration,
    status: RwLock<GateStatus>,
    bypassed: AtomicBool,
    in_flight: Mutex<()>,
}

impl ReadinessGate {
    /// Create a gate with the production tokio clock.
    pub fn new(config: &ReadinessConfig, probe: Arc<dyn ReadinessProbe>) -> Self {
        Self::with_clock(config, probe, Arc::new(TokioClock))
    }

    /// Create a gate with an injected clock.
    pub fn with_clock(
        config: &ReadinessConfig,
        probe: Arc<dyn ReadinessProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            probe,
            clock,
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
            status: RwLock::new(GateStatus {
                state: ReadinessState::Uninitialized,
                diagnostic: None,
            }),
            bypassed: AtomicBool::new(false),
            in_flight: Mutex::new(()),
        }
    }

    /// Current state, as last recorded by the gate.
    pub fn state(&self) -> ReadinessState {
        self.status.read().unwrap().state
    }

    /// Human-readable diagnostic from the last failed cycle.
    pub fn diagnostic(&self) -> Option<String> {
        self.status.read().unwrap().diagnostic.clone()
    }

    /// Whether the caller may proceed into the application surface.
    ///
    /// True when connected or bypassed. Bypass is a caller-side override,
    /// not a state transition: `state()` is unaffected by it.
    pub fn can_proceed(&self) -> bool {
        self.bypassed.load(Ordering::Acquire) || self.state() == ReadinessState::Connected
    }

    /// Force progress into the application without a connected state.
    pub fn bypass(&self) {
        tracing::info!("Readiness gate bypassed by caller");
        self.bypassed.store(true, Ordering::Release);
    }

    /// Automatic trigger, invoked once a user context exists.
    ///
    /// A connected gate is terminal for the context's lifetime: this is a
    /// no-op returning true once connected. Use [`retry`](Self::retry) to
    /// force a fresh cycle.
    pub async fn connect(&self) -> bool {
        if self.state() == ReadinessState::Connected {
            return true;
        }
        self.run_cycle().await
    }

    /// Explicit caller-triggered retry.
    ///
    /// Runs one fresh bounded probe cycle and returns whether it ended
    /// connected. A retry received while a cycle is already in flight is
    /// coalesced and returns false; callers observe `state()` afterwards.
    pub async fn retry(&self) -> bool {
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> bool {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("Readiness probe already in flight, coalescing");
            return false;
        };

        self.set_status(ReadinessState::Connecting, None);

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match self.probe.probe().await {
                Ok(()) => {
                    tracing::info!(attempt, "Dependent service ready");
                    self.set_status(ReadinessState::Connected, None);
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Readiness probe failed"
                    );
                    last_error = e.to_string();
                    if attempt < self.max_attempts {
                        self.clock.sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let diagnostic = format!(
            "dependent service not ready after {} attempts: {}",
            self.max_attempts, last_error
        );
        self.set_status(ReadinessState::Failed, Some(diagnostic));
        false
    }

    fn set_status(&self, state: ReadinessState, diagnostic: Option<String>) {
        let mut status = self.status.write().unwrap();
        status.state = state;
        status.diagnostic = diagnostic;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use tokio::sync::Semaphore;

    use super::*;

    /// Probe that plays back a fixed script of results, counting calls.
    struct ScriptedProbe {
        script: std::sync::Mutex<Vec<Result<(), String>>>,
        calls: AtomicU32,
    }

    impl ScriptedProbe {
        fn new(script: Vec<Result<(), String>>) -> Arc<Self> {
            Arc::new(Self {
                script: std::sync::Mutex::new(script),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReadinessProbe for ScriptedProbe {
        async fn probe(&self) -> Result<(), ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(ProbeError::Transport("script exhausted".into()));
            }
            script.remove(0).map_err(ProbeError::Transport)
        }
    }

    /// Probe that blocks until released, for exercising coalescing.
    struct BlockingProbe {
        started: Semaphore,
        release: Semaphore,
        calls: AtomicU32,
    }

    impl BlockingProbe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                started: Semaphore::new(0),
                release: Semaphore::new(0),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ReadinessProbe for BlockingProbe {
        async fn probe(&self) -> Result<(), ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.add_permits(1);
            self.release.acquire().await.unwrap().forget();
            Ok(())
        }
    }

    /// Clock that returns immediately, counting requested sleeps.
    struct InstantClock {
        sleeps: AtomicU32,
    }

    impl InstantClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sleeps: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Clock for InstantClock {
        async fn sleep(&self, _duration: Duration) {
            self.sleeps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_config(max_attempts: u32) -> ReadinessConfig {
        ReadinessConfig {
            max_attempts,
            retry_delay_ms: 100,
            ..ReadinessConfig::default()
        }
    }

    #[tokio::test]
    async fn test_first_probe_success_connects() {
        let probe = ScriptedProbe::new(vec![Ok(())]);
        let gate = ReadinessGate::with_clock(&test_config(5), probe.clone(), InstantClock::new());

        assert_eq!(gate.state(), ReadinessState::Uninitialized);
        assert!(gate.connect().await);
        assert_eq!(gate.state(), ReadinessState::Connected);
        assert!(gate.can_proceed());
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_cycle_is_bounded_and_settles_failed() {
        let probe = ScriptedProbe::new(vec![]);
        let clock = InstantClock::new();
        let gate = ReadinessGate::with_clock(&test_config(3), probe.clone(), clock.clone());

        assert!(!gate.connect().await);
        assert_eq!(gate.state(), ReadinessState::Failed);
        assert_eq!(probe.calls(), 3);
        // no trailing delay after the final attempt
        assert_eq!(clock.sleeps.load(Ordering::SeqCst), 2);
        let diagnostic = gate.diagnostic().expect("failed state carries a diagnostic");
        assert!(diagnostic.contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_failure_does_not_schedule_another_cycle() {
        let probe = ScriptedProbe::new(vec![Err("down".into())]);
        let gate = ReadinessGate::with_clock(&test_config(1), probe.clone(), InstantClock::new());

        assert!(!gate.connect().await);
        assert_eq!(probe.calls(), 1);
        // the gate stays failed until an explicit retry
        assert_eq!(gate.state(), ReadinessState::Failed);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_failure_can_connect() {
        let probe = ScriptedProbe::new(vec![Err("down".into()), Ok(())]);
        let gate = ReadinessGate::with_clock(&test_config(1), probe.clone(), InstantClock::new());

        assert!(!gate.connect().await);
        assert_eq!(gate.state(), ReadinessState::Failed);

        assert!(gate.retry().await);
        assert_eq!(gate.state(), ReadinessState::Connected);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_connected_is_terminal_for_connect() {
        let probe = ScriptedProbe::new(vec![Ok(())]);
        let gate = ReadinessGate::with_clock(&test_config(5), probe.clone(), InstantClock::new());

        assert!(gate.connect().await);
        assert!(gate.connect().await);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_forces_fresh_probe_when_connected() {
        let probe = ScriptedProbe::new(vec![Ok(()), Ok(())]);
        let gate = ReadinessGate::with_clock(&test_config(5), probe.clone(), InstantClock::new());

        assert!(gate.connect().await);
        assert!(gate.retry().await);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_retries_coalesce_to_one_probe() {
        let probe = BlockingProbe::new();
        let gate = Arc::new(ReadinessGate::with_clock(
            &test_config(5),
            probe.clone(),
            InstantClock::new(),
        ));

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.retry().await })
        };

        // wait until the first cycle's probe is in flight
        probe.started.acquire().await.unwrap().forget();
        assert_eq!(gate.state(), ReadinessState::Connecting);

        // both of these arrive while connecting: coalesced, no second probe
        assert!(!gate.retry().await);
        assert!(!gate.retry().await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        probe.release.add_permits(1);
        assert!(first.await.unwrap());
        assert_eq!(gate.state(), ReadinessState::Connected);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bypass_leaves_state_untouched() {
        let probe = ScriptedProbe::new(vec![]);
        let gate = ReadinessGate::with_clock(&test_config(1), probe, InstantClock::new());

        assert!(!gate.can_proceed());
        gate.bypass();
        assert_eq!(gate.state(), ReadinessState::Uninitialized);
        assert!(gate.can_proceed());
    }

    #[tokio::test]
    async fn test_bypass_after_failure_allows_progress() {
        let probe = ScriptedProbe::new(vec![]);
        let gate = ReadinessGate::with_clock(&test_config(2), probe, InstantClock::new());

        assert!(!gate.connect().await);
        assert_eq!(gate.state(), ReadinessState::Failed);
        assert!(!gate.can_proceed());

        gate.bypass();
        assert_eq!(gate.state(), ReadinessState::Failed);
        assert!(gate.can_proceed());
    }
}

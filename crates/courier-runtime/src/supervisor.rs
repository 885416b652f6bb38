//! Failure accounting and restart decisions for the poll loop.
//!
//! The supervisor never touches the upstream itself. It watches cycle
//! outcomes and decides when the accumulated failures warrant tearing
//! the session down and logging in fresh, and when the process should
//! stop entirely. Timeouts get a much longer leash than hard errors
//! because a slow provider usually recovers on its own.

use std::time::Duration;

/// How one poll cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The scan succeeded, whether or not any records came back.
    Progress,
    /// The upstream did not answer in time.
    Timeout,
    /// A network, format, or captcha failure.
    HardError,
    /// Credentials were rejected; retrying cannot help.
    Fatal,
}

/// What the loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    Continue,
    /// Tear the session down and log in again.
    Restart,
    /// Stop the process; operator intervention is required.
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Polling,
    Restarting,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Consecutive hard errors tolerated before a restart.
    pub hard_error_threshold: u32,
    /// Consecutive timeouts tolerated before a restart.
    pub timeout_threshold: u32,
    /// Pause after a failed restart attempt before polling resumes.
    pub restart_backoff: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            hard_error_threshold: 5,
            timeout_threshold: 20,
            restart_backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct RecoverySupervisor {
    config: SupervisorConfig,
    state: SupervisorState,
    consecutive_hard_errors: u32,
    consecutive_timeouts: u32,
    restarts: u64,
}

impl RecoverySupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            state: SupervisorState::Polling,
            consecutive_hard_errors: 0,
            consecutive_timeouts: 0,
            restarts: 0,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn restart_backoff(&self) -> Duration {
        self.config.restart_backoff
    }

    /// Feeds one cycle outcome in and returns the next action.
    pub fn observe(&mut self, outcome: CycleOutcome) -> SupervisorAction {
        match outcome {
            CycleOutcome::Progress => {
                self.consecutive_hard_errors = 0;
                self.consecutive_timeouts = 0;
                SupervisorAction::Continue
            }
            CycleOutcome::Timeout => {
                self.consecutive_timeouts += 1;
                if self.consecutive_timeouts >= self.config.timeout_threshold {
                    self.begin_restart("timeout threshold reached")
                } else {
                    SupervisorAction::Continue
                }
            }
            CycleOutcome::HardError => {
                self.consecutive_hard_errors += 1;
                if self.consecutive_hard_errors >= self.config.hard_error_threshold {
                    self.begin_restart("hard error threshold reached")
                } else {
                    SupervisorAction::Continue
                }
            }
            CycleOutcome::Fatal => {
                tracing::error!("fatal upstream failure, halting");
                SupervisorAction::Halt
            }
        }
    }

    fn begin_restart(&mut self, reason: &str) -> SupervisorAction {
        tracing::warn!(
            hard_errors = self.consecutive_hard_errors,
            timeouts = self.consecutive_timeouts,
            reason,
            "restarting upstream session"
        );
        self.state = SupervisorState::Restarting;
        SupervisorAction::Restart
    }

    /// A fresh login worked; failure counters start over.
    pub fn on_restart_succeeded(&mut self) {
        self.restarts += 1;
        self.consecutive_hard_errors = 0;
        self.consecutive_timeouts = 0;
        self.state = SupervisorState::Polling;
        tracing::info!(restarts = self.restarts, "upstream session restarted");
    }

    /// The fresh login failed too. Counters reset so the next polling
    /// round earns a full threshold before the next restart, instead of
    /// restarting on every single cycle.
    pub fn on_restart_failed(&mut self) {
        self.consecutive_hard_errors = 0;
        self.consecutive_timeouts = 0;
        self.state = SupervisorState::Polling;
    }
}

impl Default for RecoverySupervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

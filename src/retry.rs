use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info};

use crate::config::CheckConfig;
use crate::error::Error;
use crate::evaluate::{AttemptFailure, AttemptResult, evaluate};
use crate::transport::Transport;
use crate::verdict::{CheckReport, Verdict};

/// Added to the request timeout to form the run deadline when no
/// `wait-for-max` is configured.
pub const DEADLINE_GRACE: Duration = Duration::from_secs(3);

const GIVE_UP_MESSAGE: &str = "Give up waiting for success";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryMode {
    /// Any failure ends the run with that failure.
    Consecutive,
    /// Failures are retried after `interval` until the deadline.
    WaitFor { interval: Duration },
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    mode: RetryMode,
    required_successes: u32,
    interim: Duration,
    deadline: Duration,
    verbose: bool,
}

impl RetryPolicy {
    pub fn consecutive(required_successes: u32) -> Self {
        Self {
            mode: RetryMode::Consecutive,
            required_successes,
            interim: Duration::from_secs(1),
            deadline: Duration::from_secs(10) + DEADLINE_GRACE,
            verbose: false,
        }
    }

    pub fn wait_for(interval: Duration, max_wait: Duration) -> Self {
        Self {
            mode: RetryMode::WaitFor { interval },
            required_successes: 1,
            interim: Duration::from_secs(1),
            deadline: max_wait,
            verbose: false,
        }
    }

    pub fn from_config(config: &CheckConfig) -> Self {
        let mode = if config.wait_for() {
            RetryMode::WaitFor {
                interval: config.wait_for_interval(),
            }
        } else {
            RetryMode::Consecutive
        };
        Self {
            mode,
            required_successes: config.consecutive(),
            interim: config.interim(),
            deadline: config
                .wait_for_max()
                .unwrap_or(config.timeout() + DEADLINE_GRACE),
            verbose: config.verbose(),
        }
    }

    pub fn required_successes(mut self, required_successes: u32) -> Self {
        self.required_successes = required_successes;
        self
    }

    pub fn interim(mut self, interim: Duration) -> Self {
        self.interim = interim;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn mode(&self) -> RetryMode {
        self.mode
    }

    pub fn deadline_duration(&self) -> Duration {
        self.deadline
    }

    fn deadline_report(&self, confirmed: u32, required: u32) -> CheckReport {
        match self.mode {
            RetryMode::WaitFor { .. } => CheckReport::new(Verdict::Unknown, GIVE_UP_MESSAGE),
            RetryMode::Consecutive => CheckReport::new(
                Verdict::Unknown,
                format!(
                    "HTTP UNKNOWN - Gave up after {confirmed} of {required} consecutive successful requests"
                ),
            ),
        }
    }
}

/// One attempt source for the orchestrator.
pub trait Probe {
    fn probe(&self) -> impl Future<Output = AttemptResult>;
}

pub struct HttpProbe<'a> {
    config: &'a CheckConfig,
    transport: &'a Transport,
}

impl<'a> HttpProbe<'a> {
    pub fn new(config: &'a CheckConfig, transport: &'a Transport) -> Self {
        Self { config, transport }
    }
}

impl Probe for HttpProbe<'_> {
    async fn probe(&self) -> AttemptResult {
        evaluate(self.config, self.transport).await
    }
}

enum RetryState {
    Attempting,
    Waiting(Duration),
    Done(CheckReport),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Elapsed,
    DeadlineReached,
}

/// Sleeps for `delay` unless `deadline` comes first.
pub(crate) async fn wait_within_deadline(delay: Duration, deadline: Instant) -> WaitOutcome {
    match timeout_at(deadline, sleep(delay)).await {
        Ok(()) => WaitOutcome::Elapsed,
        Err(_) => WaitOutcome::DeadlineReached,
    }
}

/// Drives `probe` under `policy` and reduces all attempts to one report.
pub async fn run_with_probe<P: Probe>(policy: &RetryPolicy, probe: &P) -> CheckReport {
    let deadline = Instant::now() + policy.deadline;
    let required = policy.required_successes.max(1);
    let mut pending = required - 1;
    let mut attempt = 0_u32;
    let mut state = RetryState::Attempting;

    loop {
        state = match state {
            RetryState::Attempting if Instant::now() >= deadline => {
                RetryState::Done(policy.deadline_report(required - 1 - pending, required))
            }
            RetryState::Attempting => {
                attempt += 1;
                let attempt_started_at = Instant::now();
                let result = match timeout_at(deadline, probe.probe()).await {
                    Ok(result) => result,
                    Err(_) => Err(AttemptFailure::request(&Error::DeadlineExceeded {
                        timeout_ms: policy.deadline.as_millis(),
                    })),
                };
                let message = match &result {
                    Ok(success) => success.message(),
                    Err(failure) => failure.message(),
                };
                debug!(
                    attempt,
                    success = result.is_ok(),
                    elapsed_ms = attempt_started_at.elapsed().as_millis() as u64,
                    "attempt finished"
                );
                if policy.verbose {
                    info!("request[{attempt}]: {message}");
                }

                match (result, policy.mode) {
                    (Ok(success), _) if pending == 0 => {
                        RetryState::Done(CheckReport::new(Verdict::Ok, success.message()))
                    }
                    (Ok(_), _) => {
                        pending -= 1;
                        RetryState::Waiting(policy.interim)
                    }
                    (Err(failure), RetryMode::Consecutive) => RetryState::Done(
                        CheckReport::new(failure.verdict(), failure.message()),
                    ),
                    (Err(_), RetryMode::WaitFor { interval }) => {
                        pending = required - 1;
                        RetryState::Waiting(interval)
                    }
                }
            }
            RetryState::Waiting(delay) => match wait_within_deadline(delay, deadline).await {
                WaitOutcome::Elapsed => RetryState::Attempting,
                WaitOutcome::DeadlineReached => {
                    RetryState::Done(policy.deadline_report(required - 1 - pending, required))
                }
            },
            RetryState::Done(report) => {
                debug!(verdict = %report.verdict(), attempts = attempt, "check finished");
                return report;
            }
        };
    }
}

/// Runs a complete check: builds the transport once, then repeats attempts
/// per the configured retry mode.
pub async fn check(config: &CheckConfig) -> CheckReport {
    let transport = match Transport::new(config) {
        Ok(transport) => transport,
        Err(error) => {
            return CheckReport::new(
                Verdict::Unknown,
                format!("Error in http configuration: {error}"),
            );
        }
    };
    let probe = HttpProbe::new(config, &transport);
    run_with_probe(&RetryPolicy::from_config(config), &probe).await
}

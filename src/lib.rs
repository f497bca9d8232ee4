//! `check_http` probes one HTTP(S) endpoint the way Nagios/Icinga plugins do and
//! reduces the outcome to a single line plus an OK/WARNING/CRITICAL/UNKNOWN
//! verdict.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use check_http::prelude::{CheckConfig, check};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), check_http::Error> {
//!     let config = CheckConfig::builder()
//!         .hostname("www.example.com")
//!         .ip_address("192.0.2.10")
//!         .tls(true)
//!         .sni(true)
//!         .expect("200,301")
//!         .timeout(Duration::from_secs(5))
//!         .try_build()?;
//!
//!     let report = check(&config).await;
//!     println!("{}", report.message());
//!     std::process::exit(i32::from(report.verdict().code()));
//! }
//! ```
//!
//! # Retry Modes
//!
//! - Consecutive (default): `consecutive(n)` successes in a row are required;
//!   the first failure ends the run with that failure's verdict.
//! - Wait-for: failures are retried every `wait_for_interval` until success or
//!   until `wait_for_max` elapses, which ends the run UNKNOWN.

mod body;
pub mod cli;
mod config;
mod connect;
mod error;
mod evaluate;
mod proxy;
mod request;
mod response;
mod retry;
mod tls;
mod transport;
mod util;
mod verdict;

pub use crate::body::CappedSink;
pub use crate::config::{
    AddressFamily, BasicCredentials, CheckConfig, CheckConfigBuilder, TlsVersion,
};
pub use crate::error::{Error, ErrorCode, TimeoutPhase, TransportErrorKind};
pub use crate::evaluate::{
    AttemptFailure, AttemptResult, AttemptSuccess, classify, evaluate, match_expected_status,
};
pub use crate::request::build_request;
pub use crate::response::ResponseHead;
pub use crate::retry::{
    DEADLINE_GRACE, HttpProbe, Probe, RetryMode, RetryPolicy, check, run_with_probe,
};
pub use crate::tls::TlsBackend;
pub use crate::transport::Transport;
pub use crate::verdict::{CheckReport, Verdict};

pub type CheckResult<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        AttemptFailure, AttemptResult, AttemptSuccess, CheckConfig, CheckConfigBuilder,
        CheckReport, CheckResult, Error, Probe, RetryMode, RetryPolicy, Verdict, check,
        run_with_probe,
    };
}

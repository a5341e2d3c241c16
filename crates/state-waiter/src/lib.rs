//! State-change waiter
//!
//! Polls a remote resource until its status reaches one of a set of target
//! states. The waiter knows nothing about the resource itself: the caller
//! supplies a refresh closure that reports a snapshot and a status label.
//!
//! # Example
//!
//! ```no_run
//! use state_waiter::{Observed, StateWaiter};
//! use std::time::Duration;
//!
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("transport")]
//! # struct Transport;
//! # async fn fetch_status() -> Result<String, Transport> { Ok("ready".into()) }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let waiter = StateWaiter::new("gateway 42")
//!     .pending(["provisioning"])
//!     .target(["ready"])
//!     .timeout(Duration::from_secs(600))
//!     .poll_interval(Duration::from_secs(5));
//!
//! let status = waiter
//!     .wait(|| async {
//!         let status = fetch_status().await?;
//!         Ok::<_, Transport>(Some(Observed::new(status.clone(), status)))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod waiter;

pub use error::WaitError;
pub use waiter::{Observed, StateWaiter};

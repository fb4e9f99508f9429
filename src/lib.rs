//! # event-waiter - wait for the next matching event, with a timeout
//!
//! An event source pushes every event it sees through [`EventWaiter::dispatch`].
//! Callers register "wait for the next event of type `E` where `condition`
//! holds" and get back a [`WaitHandle`] that resolves exactly once: with the
//! output of the caller's transform when an event matches, or with
//! [`WaitOutcome::TimedOut`] when the timeout passes first.
//!
//! ## Core Concepts
//!
//! - **Event kind**: the Rust type of an event; waits are bucketed by [`EventKind`]
//! - **Wait task**: condition + transform + deadline, settled exactly once
//! - **Expiry worker**: a pooled thread holding a heap of deadlines; it never blocks on one wait
//! - **Drain**: [`EventWaiter::shutdown`] rejects new waits and lets existing ones finish
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use event_waiter::{EventWaiter, WaitOutcome};
//!
//! struct Message { text: String }
//!
//! let waiter = EventWaiter::named("bot")?;
//! let handle = waiter.wait_for(
//!     |m: &Message| m.text == "ping",
//!     |_: &Message| "pong",
//!     Duration::from_secs(2),
//! )?;
//!
//! waiter.dispatch(&Message { text: "ping".to_string() });
//! assert_eq!(handle.wait()?, WaitOutcome::Matched("pong"));
//!
//! assert!(waiter.shutdown(Duration::from_secs(1)));
//! # Ok::<(), event_waiter::WaitError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod kind;
pub mod waiter;

// Re-export primary types at crate root for convenience
pub use config::EventWaiterConfig;
pub use error::{CallbackStage, ExecutionError, ValidationError, WaitError, WaitResult};
pub use kind::{EventKind, WaitId};
pub use waiter::{EventWaiter, WaitHandle, WaitOutcome, WaiterState};

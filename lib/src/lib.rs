//! # Reboot job agent
//!
//! This crate implements the device side of a remotely tracked `reboot`
//! job: it launches the system reboot and reports progress, success or
//! failure back through the job object supplied by the dispatcher.

// See https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![forbid(unused_must_use)]
#![deny(unsafe_code)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]

pub mod cli;
pub mod config;
pub mod handler;
pub mod job;
pub mod jsonl;
pub mod reboot;
pub mod report;
mod task;

pub use handler::{Handled, RebootJobHandler};
pub use job::{Job, JobDocument, JobExecutionStatus, JobStatus, StatusDetails, Step};
pub use report::{ErrorCode, JobError, Report, OPERATION};

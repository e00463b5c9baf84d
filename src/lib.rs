//! benchtrend - Lineage-aware benchmark history with regression detection
//!
//! Benchmark results are stored per time series (case, context, hardware,
//! repository) and judged against a rolling distribution of earlier results
//! on the same commit lineage. A feature branch is compared against its own
//! commits plus the default-branch history up to its fork point.
//!
//! The flow of one recorded result:
//!
//! 1. [`ancestry`] places the result's commit on a lineage
//! 2. [`regression`] computes the rolling baseline and a z-score
//! 3. [`cache`] refreshes the distribution snapshot for that commit
//!
//! [`recorder::ResultRecorder`] ties these together over a [`store::Store`].

pub mod ancestry;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod recorder;
pub mod regression;
pub mod series;
pub mod stats;
pub mod store;

pub use error::{Result, TrendError};

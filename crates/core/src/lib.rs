//! Unloader core logic.
//!
//! This crate sells an ERC-20 holding for the native currency in steps:
//! - Geometric decay sizing from the current balance down to a floor
//! - Router allowance gating with a one-time unlimited approval
//! - Gas estimation as an admission check before any broadcast
//! - Swap execution with escalating priority fees
//! - A per-cycle journal of every attempt
//!
//! The chain itself sits behind [`unloader_chain::ChainGateway`].

mod admission;
mod allowance;
pub mod config;
mod context;
mod error;
mod executor;
mod journal;
mod runner;
mod sizer;
pub mod u256_math;

#[cfg(test)]
mod testing;

pub use admission::{Admission, GasAdmission, GasPlan};
pub use allowance::{AllowanceGuard, AllowanceStatus};
pub use config::{load_settings, Settings, UnloaderConfig};
pub use context::{unix_now, Explorer, SellContext, SwapTemplate, TokenInfo};
pub use error::{ConfigError, CycleError};
pub use executor::{SubmissionOutcome, SwapExecutor};
pub use journal::{AttemptRecord, CycleEnd, CycleReport, Journal, WalletSnapshot};
pub use runner::{RunState, RunSummary, Runner, RunnerConfig};
pub use sizer::{DecaySchedule, RemainderPolicy, TradeCandidate, TradeSizer};

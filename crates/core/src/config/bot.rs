//! Configuration management with profile support.
//!
//! Provides centralized configuration for all sell parameters with
//! support for different profiles (default, aggressive, cautious).

use super::chain::{ChainConfig, GasConfig, GasPricingModel};
use crate::error::ConfigError;
use crate::sizer::RemainderPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use unloader_chain::SwapEntryPoint;

/// Main configuration structure containing all parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnloaderConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Build and estimate transactions but never broadcast them
    #[serde(default)]
    pub dry_run: bool,

    /// Append one JSON line per cycle report to this file
    #[serde(default)]
    pub journal_path: Option<PathBuf>,

    /// Endpoint and contract addresses
    #[serde(default)]
    pub chain: ChainConfig,

    /// Trade sizing
    #[serde(default)]
    pub sizing: SizingConfig,

    /// Gas pricing
    #[serde(default)]
    pub gas: GasConfig,

    /// Loop timing
    #[serde(default)]
    pub timing: TimingConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Trade sizing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Smallest amount worth selling, in whole tokens (e.g. "1" or "0.5")
    #[serde(default = "default_floor")]
    pub floor: String,

    /// What to do with a balance below the floor
    #[serde(default)]
    pub remainder_policy: RemainderPolicy,

    /// amountOutMin passed to the router, in wei
    #[serde(default = "default_min_amount_out")]
    pub min_amount_out: String,

    /// Router function used for the sell
    #[serde(default)]
    pub entry_point: SwapEntryPoint,

    /// Swap deadline relative to submission (seconds)
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,

    /// Pause between candidates within one cycle (milliseconds)
    #[serde(default = "default_candidate_pause")]
    pub candidate_pause_ms: u64,
}

fn default_floor() -> String {
    "1".to_string()
}
fn default_min_amount_out() -> String {
    "1".to_string()
}
fn default_deadline() -> u64 {
    60
}
fn default_candidate_pause() -> u64 {
    100
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            floor: default_floor(),
            remainder_policy: RemainderPolicy::default(),
            min_amount_out: default_min_amount_out(),
            entry_point: SwapEntryPoint::default(),
            deadline_secs: default_deadline(),
            candidate_pause_ms: default_candidate_pause(),
        }
    }
}

impl SizingConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
    pub fn candidate_pause(&self) -> Duration {
        Duration::from_millis(self.candidate_pause_ms)
    }
}

/// Loop timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay between cycles (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long to wait for a receipt (seconds)
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Timeout for each query and gas estimate (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Consecutive failed cycles tolerated before logging escalates to warn
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,

    /// Upper bound on the backoff delay (seconds)
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_poll_interval() -> u64 {
    2_000
}
fn default_confirmation_timeout() -> u64 {
    180
}
fn default_request_timeout() -> u64 {
    15
}
fn default_max_transient_retries() -> u32 {
    5
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_transient_retries: default_max_transient_retries(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Default for UnloaderConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            dry_run: false,
            journal_path: None,
            chain: ChainConfig::default(),
            sizing: SizingConfig::default(),
            gas: GasConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl UnloaderConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Outbid aggressively and poll fast.
    pub fn aggressive() -> Self {
        Self {
            profile: "aggressive".to_string(),
            sizing: SizingConfig {
                candidate_pause_ms: 0,
                ..Default::default()
            },
            gas: GasConfig {
                priority_escalation: 3.0,
                min_priority_fee_gwei: 5.0,
                base_fee_multiplier: 3.0,
                max_fee_gwei: 1_000.0,
                limit_multiplier: 1.3,
                ..Default::default()
            },
            timing: TimingConfig {
                poll_interval_ms: 500,
                max_backoff_secs: 10,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Pay close to the network suggestion and poll slowly.
    pub fn cautious() -> Self {
        Self {
            profile: "cautious".to_string(),
            sizing: SizingConfig {
                candidate_pause_ms: 500,
                ..Default::default()
            },
            gas: GasConfig {
                priority_escalation: 1.1,
                min_priority_fee_gwei: 1.0,
                base_fee_multiplier: 1.5,
                max_fee_gwei: 100.0,
                ..Default::default()
            },
            timing: TimingConfig {
                poll_interval_ms: 12_000,
                max_backoff_secs: 300,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Get profile from environment variable UNLOADER_PROFILE, or default.
    /// Supported values: default, aggressive, cautious
    pub fn from_env() -> Self {
        let profile = std::env::var("UNLOADER_PROFILE").unwrap_or_else(|_| "default".to_string());
        Self::from_profile(&profile)
    }

    pub fn from_profile(profile: &str) -> Self {
        match profile.to_lowercase().as_str() {
            "aggressive" | "aggro" => Self::aggressive(),
            "cautious" | "safe" => Self::cautious(),
            _ => Self::default(),
        }
    }

    /// Reject settings that would make the loop misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, message: &str| ConfigError::Invalid {
            field,
            message: message.to_string(),
        };

        if !(self.gas.priority_escalation.is_finite() && self.gas.priority_escalation > 1.0) {
            return Err(invalid("gas.priority_escalation", "must be > 1.0"));
        }
        if !(self.gas.limit_multiplier.is_finite() && self.gas.limit_multiplier >= 1.0) {
            return Err(invalid("gas.limit_multiplier", "must be >= 1.0"));
        }
        if !(self.gas.base_fee_multiplier.is_finite() && self.gas.base_fee_multiplier >= 1.0) {
            return Err(invalid("gas.base_fee_multiplier", "must be >= 1.0"));
        }
        if !(self.gas.max_fee_gwei > 0.0) || self.gas.min_priority_fee_gwei < 0.0 {
            return Err(invalid("gas.max_fee_gwei", "fee bounds must be positive"));
        }
        if self.gas.min_priority_fee_gwei > self.gas.max_fee_gwei {
            return Err(invalid(
                "gas.min_priority_fee_gwei",
                "priority fee floor exceeds max fee",
            ));
        }
        if self.gas.approval_gas_limit == 0 {
            return Err(invalid("gas.approval_gas_limit", "must be > 0"));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(invalid("timing.poll_interval_ms", "must be > 0"));
        }
        if self.timing.confirmation_timeout_secs == 0 || self.timing.request_timeout_secs == 0 {
            return Err(invalid("timing", "timeouts must be > 0"));
        }
        if self.sizing.deadline_secs == 0 {
            return Err(invalid("sizing.deadline_secs", "must be > 0"));
        }
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(
            profile = %self.profile,
            dry_run = self.dry_run,
            journal = ?self.journal_path,
            "Unloader configuration loaded"
        );
        tracing::info!(
            floor = %self.sizing.floor,
            remainder_policy = ?self.sizing.remainder_policy,
            min_amount_out = %self.sizing.min_amount_out,
            entry_point = self.sizing.entry_point.name(),
            deadline_secs = self.sizing.deadline_secs,
            candidate_pause_ms = self.sizing.candidate_pause_ms,
            "Sizing parameters"
        );
        tracing::info!(
            pricing = self.gas.pricing.as_str(),
            escalation = self.gas.priority_escalation,
            min_priority_gwei = self.gas.min_priority_fee_gwei,
            max_fee_gwei = self.gas.max_fee_gwei,
            limit_multiplier = self.gas.limit_multiplier,
            reset_allowance_first = self.gas.reset_allowance_first,
            "Gas parameters"
        );
        tracing::info!(
            poll_ms = self.timing.poll_interval_ms,
            confirm_timeout_secs = self.timing.confirmation_timeout_secs,
            request_timeout_secs = self.timing.request_timeout_secs,
            max_backoff_secs = self.timing.max_backoff_secs,
            "Timing parameters"
        );
    }

    pub fn is_legacy_pricing(&self) -> bool {
        self.gas.pricing == GasPricingModel::Legacy
    }
}

//! Per-cycle event journal.
//!
//! Every cycle produces one [`CycleReport`]. Reports are emitted as structured
//! events on the `journal` tracing target, kept in a bounded in-memory
//! history and optionally appended as JSON lines to a file.

use crate::executor::SubmissionOutcome;
use alloy::primitives::{B256, U256};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Reports kept in memory.
const HISTORY_CAPACITY: usize = 256;

/// Raw token amounts as decimal strings, so consumers don't need U256 parsing.
fn decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleEnd {
    /// A candidate was confirmed.
    Sold {
        #[serde(serialize_with = "decimal")]
        amount_in: U256,
    },
    /// Every candidate was rejected or reverted.
    Unsellable,
    /// Token balance is zero.
    Exhausted,
    /// Balance is positive but below the floor.
    DustRemaining {
        #[serde(serialize_with = "decimal")]
        balance: U256,
    },
    /// Gas for the swap exceeds the native balance.
    Unaffordable {
        #[serde(serialize_with = "decimal")]
        required: U256,
        #[serde(serialize_with = "decimal")]
        available: U256,
    },
    /// A query, estimate or submission failed.
    GatewayError { message: String },
    /// The approval could not be mined.
    ApprovalFailed { message: String },
    /// An earlier approval is still waiting to be mined.
    ApprovalPending { tx_hash: B256 },
    /// An admitted candidate was built but not broadcast.
    DryRun {
        #[serde(serialize_with = "decimal")]
        amount_in: U256,
    },
    /// Stopped by cancellation before finishing.
    Cancelled,
}

impl CycleEnd {
    /// Whether the holding is fully sold (nothing left worth selling).
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleEnd::Exhausted | CycleEnd::DustRemaining { .. })
    }

    /// Whether the cycle failed for reasons outside our control.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CycleEnd::GatewayError { .. } | CycleEnd::ApprovalFailed { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            CycleEnd::Sold { .. } => "sold",
            CycleEnd::Unsellable => "unsellable",
            CycleEnd::Exhausted => "exhausted",
            CycleEnd::DustRemaining { .. } => "dust_remaining",
            CycleEnd::Unaffordable { .. } => "unaffordable",
            CycleEnd::GatewayError { .. } => "gateway_error",
            CycleEnd::ApprovalFailed { .. } => "approval_failed",
            CycleEnd::ApprovalPending { .. } => "approval_pending",
            CycleEnd::DryRun { .. } => "dry_run",
            CycleEnd::Cancelled => "cancelled",
        }
    }
}

/// One candidate tried within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    #[serde(serialize_with = "decimal")]
    pub amount_in: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_gas: Option<u64>,
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
}

/// Wallet snapshot taken at the start of a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalletSnapshot {
    #[serde(serialize_with = "decimal")]
    pub token_balance: U256,
    #[serde(serialize_with = "decimal")]
    pub native_balance: U256,
    #[serde(serialize_with = "decimal")]
    pub allowance: U256,
}

/// Everything that happened in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// `None` when the wallet could not be read
    pub wallet: Option<WalletSnapshot>,
    pub attempts: Vec<AttemptRecord>,
    pub end: CycleEnd,
}

impl CycleReport {
    pub fn submissions(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| {
                !matches!(
                    a.outcome,
                    SubmissionOutcome::NotAdmitted { .. } | SubmissionOutcome::DryRun { .. }
                )
            })
            .count()
    }
}

#[derive(Debug)]
pub struct Journal {
    path: Option<PathBuf>,
    history: Mutex<VecDeque<CycleReport>>,
}

impl Journal {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    /// In-memory only.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Emit, persist and remember `report`.
    pub fn record(&self, report: CycleReport) {
        let line = match serde_json::to_string(&report) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, cycle = report.cycle, "Failed to serialize cycle report");
                String::new()
            }
        };

        info!(
            target: "journal",
            cycle = report.cycle,
            end = report.end.label(),
            attempts = report.attempts.len(),
            submissions = report.submissions(),
            duration_ms = report.duration_ms,
            report = %line,
            "Cycle complete"
        );

        if let (Some(path), false) = (&self.path, line.is_empty()) {
            if let Err(e) = append_line(path, &line) {
                warn!(path = %path.display(), error = %e, "Failed to append journal line");
            }
        }

        let mut history = self.history.lock();
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(report);
    }

    /// Most recent reports, oldest first.
    pub fn recent(&self) -> Vec<CycleReport> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<CycleReport> {
        self.history.lock().back().cloned()
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

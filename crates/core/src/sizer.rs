//! Trade sizing by geometric decay.
//!
//! Starting from the full balance, each candidate is half the previous one
//! (integer division) until it drops below the floor. The first candidate the
//! gas admission check accepts is the one sold.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// What to do when the balance is positive but below the floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Leave the dust and treat the holding as sold.
    #[default]
    Skip,
    /// Try to sell the dust as a single candidate.
    Sweep,
}

/// One amount to try, with its output guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeCandidate {
    /// Smallest-unit amount of token to sell. Always > 0.
    pub amount_in: U256,
    /// amountOutMin for the router.
    pub min_amount_out: U256,
}

/// Produces candidate schedules for a balance.
#[derive(Debug, Clone, Copy)]
pub struct TradeSizer {
    floor: U256,
    policy: RemainderPolicy,
}

impl TradeSizer {
    /// A floor of zero is treated as one.
    pub fn new(floor: U256, policy: RemainderPolicy) -> Self {
        Self {
            floor: floor.max(U256::from(1)),
            policy,
        }
    }

    pub fn floor(&self) -> U256 {
        self.floor
    }

    pub fn policy(&self) -> RemainderPolicy {
        self.policy
    }

    /// True when `balance` is positive but too small to schedule under `Skip`.
    pub fn is_dust(&self, balance: U256) -> bool {
        !balance.is_zero() && balance < self.floor && self.policy == RemainderPolicy::Skip
    }

    /// Candidate amounts for `start`, largest first.
    pub fn schedule(&self, start: U256) -> DecaySchedule {
        let sweep = !start.is_zero() && start < self.floor && self.policy == RemainderPolicy::Sweep;
        DecaySchedule {
            start,
            floor: if sweep { start } else { self.floor },
            next: Some(start),
        }
    }
}

/// Lazy `start, start/2, start/4, ...` sequence, bounded below by the floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecaySchedule {
    start: U256,
    floor: U256,
    next: Option<U256>,
}

impl DecaySchedule {
    /// First (largest) amount of the schedule, regardless of progress.
    pub fn start(&self) -> U256 {
        self.start
    }

    /// Rewind to the first amount.
    pub fn restart(&mut self) {
        self.next = Some(self.start);
    }

    /// Total number of amounts in a fresh schedule.
    pub fn total_len(&self) -> usize {
        if self.start.is_zero() || self.start < self.floor {
            return 0;
        }
        let ratio = self.start / self.floor;
        // ratio >= 1 here, so bit_len >= 1
        ratio.bit_len()
    }
}

impl Iterator for DecaySchedule {
    type Item = U256;

    fn next(&mut self) -> Option<U256> {
        let current = self.next?;
        if current.is_zero() || current < self.floor {
            self.next = None;
            return None;
        }
        self.next = Some(current >> 1);
        Some(current)
    }
}

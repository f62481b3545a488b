//! Turn/budget controller.
//!
//! Tracks the monotonic budget counters of a session — turns used, cost
//! accrued, structured-output retries — and classifies limit violations.
//! Counters are never decremented and are never reset by resume.
//!
//! The cost check runs *before* the next model call: a turn already in
//! flight is allowed to finish and its cost is charged when it completes.

use serde::{Deserialize, Serialize};

/// Configured limits for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct BudgetLimits {
    /// Maximum turns across the session's lifetime.
    pub max_turns: u32,
    /// Cost ceiling in USD. `None` = unlimited.
    pub max_budget_usd: Option<f64>,
    /// Structured-output validation failures tolerated before the query
    /// fails. The Nth failure is terminal.
    pub max_structured_output_retries: u32,
}

/// Which limit a pre-call check tripped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStop {
    /// Turn limit reached.
    MaxTurns,
    /// Cost budget exceeded.
    MaxBudget,
}

/// Monotonic budget state plus the limits it is checked against.
#[derive(Clone, Debug)]
pub struct BudgetController {
    limits: BudgetLimits,
    turns_used: u32,
    cost_accrued: f64,
    structured_retries: u32,
}

impl BudgetController {
    /// Create a controller with fresh counters.
    #[must_use]
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            turns_used: 0,
            cost_accrued: 0.0,
            structured_retries: 0,
        }
    }

    /// Create a controller resuming persisted counters.
    #[must_use]
    pub fn with_counters(limits: BudgetLimits, turns_used: u32, cost_accrued: f64) -> Self {
        Self {
            limits,
            turns_used,
            cost_accrued,
            structured_retries: 0,
        }
    }

    /// Check limits before the next model call.
    ///
    /// Returns `Some(stop)` when the next call must not start. An in-flight
    /// turn is never aborted by this check.
    #[must_use]
    pub fn check_before_model_call(&self) -> Option<BudgetStop> {
        if self.turns_used >= self.limits.max_turns {
            return Some(BudgetStop::MaxTurns);
        }
        if let Some(max) = self.limits.max_budget_usd {
            if self.cost_accrued > max {
                return Some(BudgetStop::MaxBudget);
            }
        }
        None
    }

    /// Record a completed turn and its cost.
    pub fn record_turn(&mut self, cost_usd: f64) {
        self.turns_used += 1;
        self.cost_accrued += cost_usd;
    }

    /// Charge additional cost without consuming a turn (nested sessions).
    pub fn add_cost(&mut self, cost_usd: f64) {
        self.cost_accrued += cost_usd;
    }

    /// Record a structured-output validation failure.
    ///
    /// Returns `true` when the configured limit is reached — the failure
    /// that trips the limit is terminal, any earlier one re-prompts.
    pub fn record_structured_failure(&mut self) -> bool {
        self.structured_retries += 1;
        self.structured_retries >= self.limits.max_structured_output_retries
    }

    /// Turns used so far.
    #[must_use]
    pub fn turns_used(&self) -> u32 {
        self.turns_used
    }

    /// Cost accrued so far, in USD.
    #[must_use]
    pub fn cost_accrued(&self) -> f64 {
        self.cost_accrued
    }

    /// Structured-output failures recorded so far.
    #[must_use]
    pub fn structured_retries(&self) -> u32 {
        self.structured_retries
    }

    /// The configured limits.
    #[must_use]
    pub fn limits(&self) -> &BudgetLimits {
        &self.limits
    }

    /// Limits for a nested session inheriting this controller's remainder.
    ///
    /// Used when an agent profile sets no budget of its own.
    #[must_use]
    pub fn remaining_limits(&self) -> BudgetLimits {
        BudgetLimits {
            max_turns: self.limits.max_turns.saturating_sub(self.turns_used),
            max_budget_usd: self
                .limits
                .max_budget_usd
                .map(|max| (max - self.cost_accrued).max(0.0)),
            max_structured_output_retries: self.limits.max_structured_output_retries,
        }
    }
}

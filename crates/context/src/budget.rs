//! Splitting the context window into regions.

use ragpilot_config::ContextConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the context window is divided for one request.
///
/// After allocation `reserved_for_response + allocated_fixed +
/// allocated_history + allocated_retrieval == total`; rebalancing moves
/// tokens between the last two and keeps the sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub total: usize,
    pub reserved_for_response: usize,
    /// System prompt plus the current query, and the separator between them.
    pub allocated_fixed: usize,
    pub allocated_history: usize,
    pub allocated_retrieval: usize,
}

impl TokenBudget {
    /// Tokens the assembled prompt may occupy.
    pub fn available(&self) -> usize {
        self.total - self.reserved_for_response
    }

    /// One deterministic second pass: if a region's demand is below its
    /// allocation and the other region wants more than it got, the unused
    /// slack moves over. Demand is the summed cost of a region's inputs.
    pub fn rebalanced(&self, history_demand: usize, retrieval_demand: usize) -> TokenBudget {
        let mut next = *self;
        let history_slack = self.allocated_history.saturating_sub(history_demand);
        let retrieval_slack = self.allocated_retrieval.saturating_sub(retrieval_demand);

        if history_slack > 0 && retrieval_demand > self.allocated_retrieval {
            next.allocated_history -= history_slack;
            next.allocated_retrieval += history_slack;
        } else if retrieval_slack > 0 && history_demand > self.allocated_history {
            next.allocated_retrieval -= retrieval_slack;
            next.allocated_history += retrieval_slack;
        }

        if next != *self {
            debug!(
                history = next.allocated_history,
                retrieval = next.allocated_retrieval,
                "Rebalanced context budget"
            );
        }
        next
    }
}

/// Configuration-fatal budget problems, raised before any pruning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BudgetError {
    #[error("total_context_window must be greater than zero")]
    ZeroWindow,

    #[error(
        "reserved_response_tokens ({reserved}) must be less than total_context_window ({total})"
    )]
    ReservedExceedsWindow { reserved: usize, total: usize },

    #[error("system prompt and query ({fixed} tokens) leave no room in the {capacity}-token prompt capacity")]
    FixedExceedsCapacity { fixed: usize, capacity: usize },

    #[error("history_ratio must be in (0, 1), got {0}")]
    InvalidRatio(f32),
}

/// Splits `total − reserved − fixed` between history and retrieval.
#[derive(Debug, Clone, Copy)]
pub struct BudgetAllocator {
    total: usize,
    reserved: usize,
    history_ratio: f32,
}

impl BudgetAllocator {
    pub fn new(total: usize, reserved: usize, history_ratio: f32) -> Result<Self, BudgetError> {
        if total == 0 {
            return Err(BudgetError::ZeroWindow);
        }
        if reserved >= total {
            return Err(BudgetError::ReservedExceedsWindow { reserved, total });
        }
        if !(history_ratio > 0.0 && history_ratio < 1.0) {
            return Err(BudgetError::InvalidRatio(history_ratio));
        }
        Ok(Self {
            total,
            reserved,
            history_ratio,
        })
    }

    pub fn from_config(config: &ContextConfig) -> Result<Self, BudgetError> {
        Self::new(
            config.total_context_window,
            config.reserved_response_tokens,
            config.effective_history_ratio(),
        )
    }

    /// Allocate the regions for a request whose fixed part costs `fixed_cost`.
    pub fn allocate(&self, fixed_cost: usize) -> Result<TokenBudget, BudgetError> {
        let capacity = self.total - self.reserved;
        if fixed_cost >= capacity {
            return Err(BudgetError::FixedExceedsCapacity {
                fixed: fixed_cost,
                capacity,
            });
        }

        let remaining = capacity - fixed_cost;
        let history = ((remaining as f64) * f64::from(self.history_ratio)).floor() as usize;
        let history = history.min(remaining);

        let budget = TokenBudget {
            total: self.total,
            reserved_for_response: self.reserved,
            allocated_fixed: fixed_cost,
            allocated_history: history,
            allocated_retrieval: remaining - history,
        };
        debug!(
            total = budget.total,
            reserved = budget.reserved_for_response,
            fixed = budget.allocated_fixed,
            history = budget.allocated_history,
            retrieval = budget.allocated_retrieval,
            "Allocated context budget"
        );
        Ok(budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(b: &TokenBudget) -> usize {
        b.reserved_for_response + b.allocated_fixed + b.allocated_history + b.allocated_retrieval
    }

    #[test]
    fn even_split() {
        let budget = BudgetAllocator::new(1000, 200, 0.5)
            .unwrap()
            .allocate(0)
            .unwrap();
        assert_eq!(budget.allocated_history, 400);
        assert_eq!(budget.allocated_retrieval, 400);
        assert_eq!(budget.available(), 800);
        assert_eq!(sum(&budget), 1000);
    }

    #[test]
    fn history_takes_the_floor() {
        let budget = BudgetAllocator::new(1000, 0, 0.3333)
            .unwrap()
            .allocate(1)
            .unwrap();
        assert_eq!(budget.allocated_history, 332);
        assert_eq!(budget.allocated_retrieval, 667);
        assert_eq!(sum(&budget), 1000);
    }

    #[test]
    fn reserved_at_or_above_window_is_rejected() {
        assert_eq!(
            BudgetAllocator::new(1000, 1000, 0.5).unwrap_err(),
            BudgetError::ReservedExceedsWindow {
                reserved: 1000,
                total: 1000
            }
        );
        assert!(BudgetAllocator::new(1000, 5000, 0.5).is_err());
    }

    #[test]
    fn fixed_cost_consuming_capacity_is_rejected() {
        let allocator = BudgetAllocator::new(1000, 0, 0.5).unwrap();
        assert_eq!(
            allocator.allocate(1100).unwrap_err(),
            BudgetError::FixedExceedsCapacity {
                fixed: 1100,
                capacity: 1000
            }
        );
        assert!(allocator.allocate(1000).is_err());
        assert!(allocator.allocate(999).is_ok());
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert_eq!(
            BudgetAllocator::new(0, 0, 0.5).unwrap_err(),
            BudgetError::ZeroWindow
        );
        for ratio in [0.0, 1.0, f32::NAN, -1.0] {
            assert!(BudgetAllocator::new(100, 0, ratio).is_err());
        }
    }

    #[test]
    fn slack_moves_to_the_hungry_region() {
        let budget = BudgetAllocator::new(1000, 200, 0.5)
            .unwrap()
            .allocate(0)
            .unwrap();

        let more_retrieval = budget.rebalanced(100, 450);
        assert_eq!(more_retrieval.allocated_history, 100);
        assert_eq!(more_retrieval.allocated_retrieval, 700);

        let more_history = budget.rebalanced(900, 50);
        assert_eq!(more_history.allocated_history, 750);
        assert_eq!(more_history.allocated_retrieval, 50);
        assert_eq!(sum(&more_history), 1000);
    }

    #[test]
    fn no_rebalance_when_nobody_wants_more() {
        let budget = BudgetAllocator::new(1000, 200, 0.5)
            .unwrap()
            .allocate(0)
            .unwrap();
        assert_eq!(budget.rebalanced(10, 10), budget);
        assert_eq!(budget.rebalanced(500, 500), budget);
    }
}

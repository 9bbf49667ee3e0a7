//! Retry budget for whole-sequence restarts.

use serde::Serialize;

/// Counts retries actually taken against a fixed maximum.
///
/// The first pass through the phase sequence is free; every restart consumes one
/// retry. The counter never exceeds `max_retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryBudget {
    retries_taken: u32,
    max_retries: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32) -> Self {
        Self {
            retries_taken: 0,
            max_retries,
        }
    }

    /// Consume one retry if any remain.
    pub fn try_take(&mut self) -> bool {
        if self.retries_taken >= self.max_retries {
            return false;
        }
        self.retries_taken += 1;
        true
    }

    pub fn retries_taken(&self) -> u32 {
        self.retries_taken
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// 1-indexed number of the attempt currently running.
    pub fn attempt(&self) -> u32 {
        self.retries_taken + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_stops_at_max() {
        let mut budget = RetryBudget::new(2);
        assert_eq!(budget.attempt(), 1);
        assert!(budget.try_take());
        assert!(budget.try_take());
        assert!(!budget.try_take());
        assert_eq!(budget.retries_taken(), 2);
        assert_eq!(budget.attempt(), 3);
    }

    #[test]
    fn zero_budget_never_retries() {
        let mut budget = RetryBudget::new(0);
        assert!(!budget.try_take());
        assert_eq!(budget.attempt(), 1);
    }
}

//! Reuse of binning results across requests with the same parameters and data.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::TableResult;

use super::{BinBag, BinSpec};

/// A computed bin bag together with the data it was computed from.
#[derive(Debug)]
pub struct HistoPlan {
    bag: BinBag,
    source: String,
}

impl HistoPlan {
    pub fn new(bag: BinBag, source: impl Into<String>) -> Self {
        Self {
            bag,
            source: source.into(),
        }
    }

    pub fn bag(&self) -> &BinBag {
        &self.bag
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True if this plan answers a request for `spec` over `source`.
    pub fn matches(&self, spec: &BinSpec, source: &str) -> bool {
        self.source == source && self.bag.matches(spec.log, spec.width, spec.phase, spec.combiner)
    }
}

/// Plans kept by [`PlanCache::new`].
pub const DEFAULT_PLAN_CAPACITY: usize = 16;

/// Thread-safe store of [`HistoPlan`]s, keyed by bin parameters and source identity.
///
/// Holds at most `capacity` plans; storing one more evicts the oldest. Lookup is a linear scan,
/// so the capacity is meant to stay small. Plans computed from data that has since changed stay
/// until [`invalidate`](Self::invalidate) drops them.
#[derive(Debug)]
pub struct PlanCache {
    plans: Mutex<VecDeque<Arc<HistoPlan>>>,
    capacity: usize,
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PLAN_CAPACITY)
    }
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` plans (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            plans: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The cached plan for `spec` over `source`, or a new one built by `build`.
    ///
    /// The lock is not held while building, so two callers racing on the same key may both
    /// build; the first to finish wins and both get its plan.
    pub fn plan_for<F>(&self, spec: &BinSpec, source: &str, build: F) -> TableResult<Arc<HistoPlan>>
    where
        F: FnOnce() -> TableResult<BinBag>,
    {
        if let Some(plan) = self.find(spec, source) {
            debug!(source, "bin plan cache hit");
            return Ok(plan);
        }

        let plan = Arc::new(HistoPlan::new(build()?, source));
        let mut plans = self.plans.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = plans.iter().find(|p| p.matches(spec, source)) {
            return Ok(Arc::clone(existing));
        }
        if plans.len() == self.capacity {
            if let Some(evicted) = plans.pop_front() {
                debug!(source = evicted.source(), "bin plan evicted");
            }
        }
        plans.push_back(Arc::clone(&plan));
        debug!(source, plans = plans.len(), "bin plan cached");
        Ok(plan)
    }

    fn find(&self, spec: &BinSpec, source: &str) -> Option<Arc<HistoPlan>> {
        let plans = self.plans.lock().unwrap_or_else(PoisonError::into_inner);
        plans.iter().find(|p| p.matches(spec, source)).cloned()
    }

    /// Drop every plan computed from `source`.
    pub fn invalidate(&self, source: &str) {
        let mut plans = self.plans.lock().unwrap_or_else(PoisonError::into_inner);
        plans.retain(|p| p.source != source);
    }

    pub fn len(&self) -> usize {
        self.plans.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.plans.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

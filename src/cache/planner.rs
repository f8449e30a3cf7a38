//! Consumption plan generation.
//!
//! Turns a drained batch of cache events into the ordered steps the registry
//! executes.

use std::collections::HashSet;
use std::fmt;

use super::events::{CacheEvent, EventKind};

/// Ordered registry work derived from one drained batch.
#[derive(Debug, Default, PartialEq)]
pub struct ConsumptionPlan {
    pub steps: Vec<EventKind>,
    /// Events dropped because a later step makes them redundant.
    pub superseded: usize,
}

impl fmt::Display for ConsumptionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConsumptionPlan {{ steps: {}, full_resyncs: {}, superseded: {} }}",
            self.steps.len(),
            self.steps
                .iter()
                .filter(|step| step.forces_full_resync())
                .count(),
            self.superseded,
        )
    }
}

impl ConsumptionPlan {
    /// Merge events into a plan.
    ///
    /// - Deduplicates by event ID
    /// - Drops everything queued before the last event that rebuilds every view
    /// - Keeps a single engagement step, since it resyncs the same views
    ///   whichever post changed
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let total = events.len();
        let mut seen_ids = HashSet::new();
        let mut events: Vec<CacheEvent> = events
            .into_iter()
            .filter(|event| seen_ids.insert(event.id))
            .collect();
        events.sort_by_key(|event| event.epoch);

        let start = events
            .iter()
            .rposition(|event| event.kind.forces_full_resync())
            .unwrap_or(0);

        let mut steps = Vec::with_capacity(events.len() - start);
        let mut engagement_planned = false;
        for event in events.into_iter().skip(start) {
            if matches!(event.kind, EventKind::EngagementChanged { .. }) {
                if engagement_planned {
                    continue;
                }
                engagement_planned = true;
            }
            steps.push(event.kind);
        }

        Self {
            superseded: total - steps.len(),
            steps,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

//! Mutable state threaded through one orchestrator run.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::eligibility::ExclusiveHolders;
use crate::models::{Schedule, Unavailability};
use crate::roster::Roster;

/// A slot no eligible, available person could take.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnfilledSlot {
    pub date: NaiveDate,
    pub duty: String,
    pub block: String,
}

/// Schedule, exclusive holders and cursors while blocks run in priority order.
#[derive(Clone, Debug, Default)]
pub struct RunState {
    pub schedule: Schedule,
    pub holders: ExclusiveHolders,
    pub cursors: BTreeMap<String, f64>,
    pub unfilled: Vec<UnfilledSlot>,
}

impl RunState {
    /// Start from the persisted cursors; missing keys start at 0.
    pub fn new(cursors: BTreeMap<String, f64>) -> Self {
        Self {
            cursors,
            ..Self::default()
        }
    }

    pub fn cursor(&self, key: &str) -> f64 {
        self.cursors.get(key).copied().unwrap_or(0.0)
    }

    pub fn set_cursor(&mut self, key: &str, value: f64) {
        self.cursors.insert(key.to_string(), value);
    }

    /// Exclusive holders as person ids, for persisting as exemptions.
    pub fn exemptions(&self, roster: &Roster) -> Unavailability {
        let mut out = Unavailability::new();
        for (date, people) in self.holders.sorted() {
            for idx in people {
                out.mark(date, roster.get(idx).id.clone());
            }
        }
        out
    }
}

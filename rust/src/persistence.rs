//! Cursor and exemption state carried between runs.

use std::collections::BTreeMap;

use crate::models::Unavailability;
use crate::scheduler::{RunOutcome, RunScope};

/// What a run reads at start and the caller writes back after it.
///
/// Runs sharing one `RotaState` must be serialized by the caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RotaState {
    pub cursors: BTreeMap<String, f64>,
    /// Exclusive holders from earlier runs, treated as unavailability.
    pub exemptions: Unavailability,
}

impl RotaState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vacations plus the exemptions accumulated by earlier runs.
    pub fn effective_unavailability(&self, vacations: &Unavailability) -> Unavailability {
        vacations.union(&self.exemptions)
    }

    /// Fold a completed run into the state.
    ///
    /// A full run replaces the cursors and clears the exemptions, since every
    /// block it covers will run again in the next full run. A partial run only
    /// touches the cursors of the blocks it ran and merges its exemptions.
    pub fn commit(&mut self, scope: &RunScope, outcome: &RunOutcome) {
        match scope {
            RunScope::Full => {
                self.cursors = outcome.cursors.clone();
                self.exemptions = Unavailability::new();
            }
            RunScope::Partial(_) => {
                for (key, value) in &outcome.cursors {
                    self.cursors.insert(key.clone(), *value);
                }
                self.exemptions.merge(&outcome.exemptions);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulingConfig;
    use crate::models::{Block, DutyFamily, DutyType, Person, PoolFlag};
    use crate::roster::Roster;
    use crate::scheduler::BlockOrchestrator;
    use chrono::NaiveDate;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn setup() -> (Roster, Vec<DutyType>, Vec<Block>) {
        let roster = Roster::new(
            (0..3)
                .map(|i| Person::new(format!("P{}", i), i).in_pool(PoolFlag::General))
                .collect(),
        )
        .unwrap();
        let duties = vec![
            DutyType::new("Gen", 1.0, 8.0, DutyFamily::General),
            DutyType::new("Breast", 1.0, 8.0, DutyFamily::Subspecialty),
        ];
        let blocks = vec![
            Block::new("gen", 1, PoolFlag::General, &["Gen"]),
            Block::new("breast", 2, PoolFlag::General, &["Breast"]),
        ];
        (roster, duties, blocks)
    }

    #[test]
    fn test_partial_runs_merge_and_exempt() {
        let (roster, duties, blocks) = setup();
        let config = SchedulingConfig::default();
        let orchestrator = BlockOrchestrator::new(&roster, &duties, &blocks, &config).unwrap();
        let vacations = Unavailability::new();
        let mut state = RotaState::new();

        let scope = RunScope::Partial(vec!["gen".to_string()]);
        let first = orchestrator
            .run(
                d(2026, 3, 2),
                d(2026, 3, 2),
                &state.cursors,
                &state.effective_unavailability(&vacations),
                &scope,
            )
            .unwrap();
        state.commit(&scope, &first);
        assert!(state.exemptions.contains(d(2026, 3, 2), "P0"));

        // The second group sees the first group's holder as unavailable
        let scope = RunScope::Partial(vec!["breast".to_string()]);
        let second = orchestrator
            .run(
                d(2026, 3, 2),
                d(2026, 3, 2),
                &state.cursors,
                &state.effective_unavailability(&vacations),
                &scope,
            )
            .unwrap();
        assert_eq!(second.schedule.slots(d(2026, 3, 2))[0].person.as_deref(), Some("P1"));
        state.commit(&scope, &second);

        assert_eq!(state.cursors["gen"], 1.0);
        assert_eq!(state.cursors["breast"], 1.0);
        assert!(state.exemptions.contains(d(2026, 3, 2), "P0"));
        assert!(state.exemptions.contains(d(2026, 3, 2), "P1"));
    }

    #[test]
    fn test_replanning_after_full_commit_fills_every_slot() {
        let (roster, duties, blocks) = setup();
        let config = SchedulingConfig::default();
        let orchestrator = BlockOrchestrator::new(&roster, &duties, &blocks, &config).unwrap();
        let vacations = Unavailability::new();
        let mut state = RotaState::new();

        let first = orchestrator
            .run(
                d(2026, 3, 2),
                d(2026, 3, 6),
                &BTreeMap::new(),
                &state.effective_unavailability(&vacations),
                &RunScope::Full,
            )
            .unwrap();
        assert!(first.unfilled.is_empty());
        state.commit(&RunScope::Full, &first);

        let replan = orchestrator
            .run(
                d(2026, 3, 2),
                d(2026, 3, 6),
                &BTreeMap::new(),
                &state.effective_unavailability(&vacations),
                &RunScope::Full,
            )
            .unwrap();
        assert!(replan.unfilled.is_empty());
        assert_eq!(replan.schedule, first.schedule);
    }

    #[test]
    fn test_full_run_replaces_state() {
        let (roster, duties, blocks) = setup();
        let config = SchedulingConfig::default();
        let orchestrator = BlockOrchestrator::new(&roster, &duties, &blocks, &config).unwrap();

        let mut state = RotaState::new();
        state.cursors.insert("retired".to_string(), 4.0);
        state.exemptions.mark(d(2026, 2, 1), "P2");

        let outcome = orchestrator
            .run(
                d(2026, 3, 2),
                d(2026, 3, 3),
                &state.cursors,
                &Unavailability::new(),
                &RunScope::Full,
            )
            .unwrap();
        state.commit(&RunScope::Full, &outcome);

        assert_eq!(state.cursors, outcome.cursors);
        assert!(!state.exemptions.contains(d(2026, 2, 1), "P2"));
        assert!(state.exemptions.is_empty());
        assert!(!outcome.exemptions.is_empty());
    }

    #[test]
    fn test_failed_run_leaves_state_untouched() {
        let (roster, duties, blocks) = setup();
        let config = SchedulingConfig::default();
        let orchestrator = BlockOrchestrator::new(&roster, &duties, &blocks, &config).unwrap();
        let mut state = RotaState::new();
        state.cursors.insert("gen".to_string(), 2.0);
        let before = state.clone();

        let result = orchestrator.run(
            d(2026, 3, 5),
            d(2026, 3, 2),
            &state.cursors,
            &Unavailability::new(),
            &RunScope::Full,
        );
        if let Ok(outcome) = &result {
            state.commit(&RunScope::Full, outcome);
        }
        assert!(result.is_err());
        assert_eq!(state, before);
    }
}

//! Block orchestrator: runs duty blocks in priority order over a date range.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::SchedulingConfig;
use crate::eligibility::{EligibilityPipeline, SlotRequest};
use crate::interner::PersonIdx;
use crate::models::{Block, DutyType, ModelError, Schedule, Slot, Unavailability};
use crate::roster::{Roster, RosterError};
use crate::rotation;
use crate::{log_changes, log_checks, log_debug};

use super::dates::{block_turns, Turn};
use super::state::{RunState, UnfilledSlot};

/// Structural problems found before any block runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Duplicate duty code: {0}")]
    DuplicateDuty(String),
    #[error("Duplicate block id: {0}")]
    DuplicateBlock(String),
    #[error("Block {0} has no duties")]
    EmptyBlock(String),
    #[error("Block {block} references undefined duty {duty}")]
    UnknownDuty { block: String, duty: String },
    #[error("Unknown block in run scope: {0}")]
    UnknownBlock(String),
    #[error("Invalid cursor for {key}: {value}")]
    InvalidCursor { key: String, value: f64 },
    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

/// Which blocks a run covers.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum RunScope {
    #[default]
    Full,
    /// Only the named blocks, still in priority order.
    Partial(Vec<String>),
}

impl RunScope {
    pub fn includes(&self, block: &Block) -> bool {
        match self {
            RunScope::Full => true,
            RunScope::Partial(ids) => ids.iter().any(|id| *id == block.id),
        }
    }
}

/// Everything a run hands back to the caller.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub schedule: Schedule,
    /// Updated cursor for every block (keyed by cursor key).
    pub cursors: BTreeMap<String, f64>,
    pub unfilled: Vec<UnfilledSlot>,
    /// Exclusive holders per date, for carrying into later partial runs.
    pub exemptions: Unavailability,
}

/// Composes many duty blocks into one schedule.
///
/// Lifecycle per run: validate → build date lists → run blocks by priority → finalize.
pub struct BlockOrchestrator<'a> {
    roster: &'a Roster,
    duties: FxHashMap<String, DutyType>,
    /// Sorted by priority; ties keep their configured order.
    blocks: Vec<Block>,
    config: &'a SchedulingConfig,
}

impl<'a> BlockOrchestrator<'a> {
    /// Validate the static tables against the roster.
    pub fn new(
        roster: &'a Roster,
        duties: &[DutyType],
        blocks: &[Block],
        config: &'a SchedulingConfig,
    ) -> Result<Self, ConfigError> {
        let mut duty_map: FxHashMap<String, DutyType> = FxHashMap::default();
        for duty in duties {
            duty.validate()?;
            if duty_map.insert(duty.code.clone(), duty.clone()).is_some() {
                return Err(ConfigError::DuplicateDuty(duty.code.clone()));
            }
        }

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for block in blocks {
            if !seen.insert(block.id.as_str()) {
                return Err(ConfigError::DuplicateBlock(block.id.clone()));
            }
            if block.duties.is_empty() {
                return Err(ConfigError::EmptyBlock(block.id.clone()));
            }
            if let Some(code) = block.duties.iter().find(|c| !duty_map.contains_key(*c)) {
                return Err(ConfigError::UnknownDuty {
                    block: block.id.clone(),
                    duty: code.clone(),
                });
            }
        }

        let mut blocks = blocks.to_vec();
        blocks.sort_by_key(|b| b.priority);

        Ok(Self {
            roster,
            duties: duty_map,
            blocks,
            config,
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn duty(&self, code: &str) -> Option<&DutyType> {
        self.duties.get(code)
    }

    /// Schedule `[start, end]` for the blocks in `scope`.
    ///
    /// Returns `Err` only for configuration problems, before anything is
    /// scheduled. Unfilled slots are reported in the outcome.
    pub fn run(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cursors: &BTreeMap<String, f64>,
        unavailable: &Unavailability,
        scope: &RunScope,
    ) -> Result<RunOutcome, ConfigError> {
        if start > end {
            return Err(ConfigError::InvertedRange { start, end });
        }
        if let RunScope::Partial(ids) = scope {
            if let Some(id) = ids.iter().find(|id| !self.blocks.iter().any(|b| b.id == **id)) {
                return Err(ConfigError::UnknownBlock(id.clone()));
            }
        }
        for (key, &value) in cursors {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidCursor {
                    key: key.clone(),
                    value,
                });
            }
        }

        let verbosity = self.config.verbosity;
        let pipeline = EligibilityPipeline::new(self.roster, unavailable, verbosity);
        let mut state = RunState::new(cursors.clone());

        for block in &self.blocks {
            if !state.cursors.contains_key(block.cursor_key()) {
                state.set_cursor(block.cursor_key(), 0.0);
            }
            if !scope.includes(block) {
                continue;
            }
            let turns = block_turns(block, start, end);
            self.run_block(block, &turns, &pipeline, &mut state);
        }

        log_changes!(
            verbosity,
            "Run complete: {} slots, {} unfilled",
            state.schedule.slot_count(),
            state.unfilled.len()
        );

        let exemptions = state.exemptions(self.roster);
        Ok(RunOutcome {
            schedule: state.schedule,
            cursors: state.cursors,
            unfilled: state.unfilled,
            exemptions,
        })
    }

    /// Fill every turn of one block, advancing its cursor.
    fn run_block(
        &self,
        block: &Block,
        turns: &[Turn],
        pipeline: &EligibilityPipeline<'_>,
        state: &mut RunState,
    ) {
        let verbosity = self.config.verbosity;
        let pool = pipeline.rotation_pool(block);
        let key = block.cursor_key();
        let mut cursor = state.cursor(key);

        log_changes!(
            verbosity,
            "Block {} (priority {}): {} turns, pool {}, cursor {:.2}",
            block.id,
            block.priority,
            turns.len(),
            pool.len(),
            cursor
        );

        let mut previous: Vec<PersonIdx> = Vec::new();
        for turn in turns {
            let mut taken: Vec<PersonIdx> = Vec::with_capacity(block.duties.len());

            for code in &block.duties {
                let Some(duty) = self.duties.get(code) else {
                    continue;
                };
                if !duty.weekdays.contains_date(turn.date) {
                    log_checks!(verbosity, "  {} not offered on {}", code, turn.date);
                    continue;
                }

                let exclusive = duty.exclusive;
                let avoid: &[PersonIdx] = if block.avoid_previous { &previous } else { &[] };
                let request = SlotRequest {
                    duty,
                    dates: &turn.dates,
                    exclusive,
                    taken: &taken,
                    avoid,
                };

                let mut eligible = pipeline.eligible(&pool, &request, &state.holders);
                if eligible.is_empty() && !avoid.is_empty() {
                    log_checks!(
                        verbosity,
                        "  {} {}: no one left outside the previous turn, relaxing back-to-back",
                        turn.date,
                        code
                    );
                    let relaxed = SlotRequest {
                        avoid: &[],
                        ..request
                    };
                    eligible = pipeline.eligible(&pool, &relaxed, &state.holders);
                }

                let selection = rotation::select(&pool, &eligible, cursor, duty.weight);
                log_debug!(
                    verbosity,
                    "    probe {} from {:.2}: {} eligible, {} steps",
                    code,
                    cursor,
                    eligible.len(),
                    selection.probes
                );

                match selection.person {
                    Some(idx) => {
                        cursor = selection.cursor;
                        taken.push(idx);
                        let id = &self.roster.get(idx).id;
                        for &date in &turn.dates {
                            state.schedule.push(date, Slot::filled(code, id, &block.id));
                            if exclusive {
                                state.holders.record(date, idx);
                            }
                        }
                        log_changes!(
                            verbosity,
                            "  {} {} -> {} (cursor {:.2})",
                            turn.date,
                            code,
                            id,
                            cursor
                        );
                    }
                    None => {
                        for &date in &turn.dates {
                            state.schedule.push(date, Slot::unfilled(code, &block.id));
                            state.unfilled.push(UnfilledSlot {
                                date,
                                duty: code.clone(),
                                block: block.id.clone(),
                            });
                        }
                        log_changes!(verbosity, "  {} {} -> UNFILLED", turn.date, code);
                    }
                }
            }

            previous = taken;
        }

        state.set_cursor(key, cursor);
    }
}

//! Rust implementation of the rota engine.
//!
//! Assigns people to recurring duty slots with a cursor-based weighted
//! rotation, checks the result against hard and soft rules, and reports
//! workload fairness.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::prelude::*;
use std::collections::{BTreeMap, HashMap};

pub mod catalogue;
mod config;
pub mod constraints;
pub mod eligibility;
pub mod fairness;
pub mod interner;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod roster;
pub mod rotation;
pub mod scheduler;

pub use config::SchedulingConfig;
pub use constraints::{ConstraintChecker, Rule, Severity, Violation};
pub use fairness::{FairnessReport, LoadStats, PersonLoad};
pub use models::{
    Block, CapabilityTag, CycleRule, DutyFamily, DutyType, ModelError, Person, PoolFlag, Schedule,
    Slot, Unavailability, WeekdaySet,
};
pub use persistence::RotaState;
pub use roster::{Roster, RosterError};
pub use scheduler::{BlockOrchestrator, ConfigError, RunOutcome, RunScope};

/// Everything one planning run produces.
#[pyclass]
#[derive(Clone, Debug)]
pub struct RunResult {
    #[pyo3(get)]
    pub schedule: BTreeMap<NaiveDate, Vec<Slot>>,
    #[pyo3(get)]
    pub cursors: BTreeMap<String, f64>,
    #[pyo3(get)]
    pub hard_violations: Vec<Violation>,
    #[pyo3(get)]
    pub soft_violations: Vec<Violation>,
    #[pyo3(get)]
    pub fairness: FairnessReport,
    #[pyo3(get)]
    pub unfilled: usize,
    /// Roster warnings found before the run.
    #[pyo3(get)]
    pub warnings: Vec<String>,
}

#[pymethods]
impl RunResult {
    fn __repr__(&self) -> String {
        format!(
            "RunResult(days={}, hard={}, soft={}, unfilled={})",
            self.schedule.len(),
            self.hard_violations.len(),
            self.soft_violations.len(),
            self.unfilled
        )
    }
}

/// Run the given duty and block tables, then check and score the schedule.
///
/// Fails only on configuration errors; nothing is scheduled in that case.
#[allow(clippy::too_many_arguments)]
pub fn plan(
    roster: &Roster,
    duties: &[DutyType],
    blocks: &[Block],
    start: NaiveDate,
    end: NaiveDate,
    cursors: &BTreeMap<String, f64>,
    unavailable: &Unavailability,
    scope: &RunScope,
    config: &SchedulingConfig,
) -> Result<RunResult, ConfigError> {
    let warnings = roster.warnings(duties);
    for warning in &warnings {
        crate::log_changes!(config.verbosity, "Warning: {}", warning);
    }

    let orchestrator = BlockOrchestrator::new(roster, duties, blocks, config)?;
    let outcome = orchestrator.run(start, end, cursors, unavailable, scope)?;

    let checker = ConstraintChecker::new(roster, unavailable, duties, config);
    let (hard_violations, soft_violations) = checker.check_all(&outcome.schedule);
    let fairness = fairness::compute(&outcome.schedule, roster, duties);

    Ok(RunResult {
        unfilled: outcome.unfilled.len(),
        schedule: outcome.schedule.into_days(),
        cursors: outcome.cursors,
        hard_violations,
        soft_violations,
        fairness,
        warnings,
    })
}

fn value_error(e: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(e.to_string())
}

/// Run the built-in catalogue over `[start, end]` without persisting anything.
///
/// # Arguments
/// * `people` - roster entries; indices must be contiguous from 0
/// * `cursors` - block cursor key to cursor value (missing keys start at 0)
/// * `unavailable` - date to the ids unavailable that date
/// * `blocks` - block ids to run; all blocks when omitted
///
/// # Raises
/// * ValueError on a malformed roster or configuration
#[pyfunction]
#[pyo3(signature = (people, start, end, cursors=None, unavailable=None, config=None, blocks=None))]
fn dry_run(
    people: Vec<Person>,
    start: NaiveDate,
    end: NaiveDate,
    cursors: Option<HashMap<String, f64>>,
    unavailable: Option<HashMap<NaiveDate, Vec<String>>>,
    config: Option<SchedulingConfig>,
    blocks: Option<Vec<String>>,
) -> PyResult<RunResult> {
    let config = config.unwrap_or_default();
    let roster = Roster::new(people).map_err(value_error)?;
    let cursors: BTreeMap<String, f64> = cursors.unwrap_or_default().into_iter().collect();
    let unavailable: Unavailability = unavailable
        .unwrap_or_default()
        .into_iter()
        .flat_map(|(date, ids)| ids.into_iter().map(move |id| (date, id)))
        .collect();
    let scope = blocks.map_or(RunScope::Full, RunScope::Partial);
    let (duties, block_list) = catalogue::standard(&config);

    plan(
        &roster,
        &duties,
        &block_list,
        start,
        end,
        &cursors,
        &unavailable,
        &scope,
        &config,
    )
    .map_err(value_error)
}

/// Normalize a free-form capability tag to its canonical name.
///
/// # Raises
/// * ValueError if the tag is not in the vocabulary
#[pyfunction]
fn normalize_tag(raw: &str) -> PyResult<String> {
    CapabilityTag::parse(raw)
        .map(|tag| tag.as_str().to_string())
        .map_err(value_error)
}

/// The rota.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Data types
    m.add_class::<Person>()?;
    m.add_class::<Slot>()?;
    m.add_class::<Violation>()?;
    m.add_class::<PersonLoad>()?;
    m.add_class::<LoadStats>()?;
    m.add_class::<FairnessReport>()?;
    m.add_class::<RunResult>()?;

    // Config types
    m.add_class::<SchedulingConfig>()?;

    // Entry points
    m.add_function(wrap_pyfunction!(dry_run, m)?)?;
    m.add_function(wrap_pyfunction!(normalize_tag, m)?)?;

    Ok(())
}

//! Configuration types for the rota engine.

use chrono::NaiveDate;
use pyo3::prelude::*;

use crate::models::DutyFamily;

/// Run-wide settings shared by the orchestrator, checker and Python surface.
#[pyclass]
#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
    /// Coefficient-of-variation ceiling (percent) above which a soft violation is raised.
    #[pyo3(get, set)]
    pub cv_target_pct: f64,
    /// Anchor week for two-week cycle blocks in the built-in catalogue.
    #[pyo3(get, set)]
    pub cycle_anchor: Option<NaiveDate>,
    /// Duty families a single person may not hold on the same date.
    pub conflicting_families: (DutyFamily, DutyFamily),
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            cv_target_pct: 10.0,
            cycle_anchor: NaiveDate::from_ymd_opt(2026, 3, 2),
            conflicting_families: (DutyFamily::Interventional, DutyFamily::General),
        }
    }
}

#[pymethods]
impl SchedulingConfig {
    #[new]
    #[pyo3(signature = (verbosity=None, cv_target_pct=None, cycle_anchor=None))]
    fn new(
        verbosity: Option<u8>,
        cv_target_pct: Option<f64>,
        cycle_anchor: Option<NaiveDate>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            verbosity: verbosity.unwrap_or(defaults.verbosity),
            cv_target_pct: cv_target_pct.unwrap_or(defaults.cv_target_pct),
            cycle_anchor: cycle_anchor.or(defaults.cycle_anchor),
            conflicting_families: defaults.conflicting_families,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SchedulingConfig(verbosity={}, cv_target_pct={}, cycle_anchor={:?})",
            self.verbosity, self.cv_target_pct, self.cycle_anchor
        )
    }
}

//! Fairness calculator: load statistics derived purely from a finished schedule.

use pyo3::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::models::{DutyType, Schedule};
use crate::roster::Roster;

/// One person's accumulated load.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct PersonLoad {
    #[pyo3(get)]
    pub id: String,
    #[pyo3(get)]
    pub raw: usize,
    /// Sum of assigned duty weights.
    #[pyo3(get)]
    pub weighted: f64,
    #[pyo3(get)]
    pub hours: f64,
    /// `weighted / fte`; zero when FTE is not positive.
    #[pyo3(get)]
    pub fte_normalized: f64,
}

/// Mean, population standard deviation and CV (percent) of one series.
#[pyclass]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoadStats {
    #[pyo3(get)]
    pub mean: f64,
    #[pyo3(get)]
    pub std: f64,
    #[pyo3(get)]
    pub cv: f64,
    #[pyo3(get)]
    pub min: f64,
    #[pyo3(get)]
    pub max: f64,
}

impl LoadStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let cv = if mean > 0.0 { std / mean * 100.0 } else { 0.0 };
        Self {
            mean,
            std,
            cv,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[pymethods]
impl LoadStats {
    fn __repr__(&self) -> String {
        format!(
            "LoadStats(mean={:.3}, std={:.3}, cv={:.2}%)",
            self.mean, self.std, self.cv
        )
    }
}

#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct FairnessReport {
    /// In roster order.
    #[pyo3(get)]
    pub people: Vec<PersonLoad>,
    #[pyo3(get)]
    pub raw: LoadStats,
    #[pyo3(get)]
    pub weighted: LoadStats,
    #[pyo3(get)]
    pub hours: LoadStats,
    #[pyo3(get)]
    pub fte_normalized: LoadStats,
    /// Raw counts per duty code over the people qualified for that duty.
    #[pyo3(get)]
    pub per_duty: BTreeMap<String, LoadStats>,
    #[pyo3(get)]
    pub unfilled: usize,
}

#[pymethods]
impl FairnessReport {
    fn __repr__(&self) -> String {
        format!(
            "FairnessReport(people={}, weighted_cv={:.2}%, hours_cv={:.2}%, unfilled={})",
            self.people.len(),
            self.weighted.cv,
            self.hours.cv,
            self.unfilled
        )
    }
}

impl FairnessReport {
    pub fn person(&self, id: &str) -> Option<&PersonLoad> {
        self.people.iter().find(|p| p.id == id)
    }
}

fn series(people: &[PersonLoad], f: impl Fn(&PersonLoad) -> f64) -> Vec<f64> {
    people.iter().map(f).collect()
}

/// Compute the report for `schedule`.
///
/// Assignments to people outside the roster are ignored. Duty codes missing
/// from `duties` count toward raw totals with zero weight and hours.
pub fn compute(schedule: &Schedule, roster: &Roster, duties: &[DutyType]) -> FairnessReport {
    let table: FxHashMap<&str, &DutyType> = duties.iter().map(|d| (d.code.as_str(), d)).collect();

    let mut people: Vec<PersonLoad> = roster
        .people()
        .iter()
        .map(|p| PersonLoad {
            id: p.id.clone(),
            raw: 0,
            weighted: 0.0,
            hours: 0.0,
            fte_normalized: 0.0,
        })
        .collect();
    // duty code -> per-person raw counts
    let mut per_duty_counts: FxHashMap<&str, Vec<usize>> = FxHashMap::default();

    for (_, code, person) in schedule.assignments() {
        let Some(idx) = roster.index_of(person) else {
            continue;
        };
        let load = &mut people[idx];
        load.raw += 1;
        if let Some(duty) = table.get(code) {
            load.weighted += duty.weight;
            load.hours += duty.hours;
            per_duty_counts
                .entry(duty.code.as_str())
                .or_insert_with(|| vec![0; roster.len()])[idx] += 1;
        }
    }

    for (load, person) in people.iter_mut().zip(roster.people()) {
        if person.fte > 0.0 {
            load.fte_normalized = load.weighted / person.fte;
        }
    }

    let raw = LoadStats::from_values(&series(&people, |p| p.raw as f64));
    let weighted = LoadStats::from_values(&series(&people, |p| p.weighted));
    let hours = LoadStats::from_values(&series(&people, |p| p.hours));
    let fte_normalized = LoadStats::from_values(&series(&people, |p| p.fte_normalized));

    let mut per_duty = BTreeMap::new();
    for duty in duties {
        let counts = per_duty_counts.get(duty.code.as_str());
        let values: Vec<f64> = roster
            .people()
            .iter()
            .filter(|p| p.passes_duty_gate(duty))
            .filter(|p| duty.required_tag.map_or(true, |tag| p.has_tag(tag)))
            .map(|p| counts.map_or(0.0, |c| c[p.index] as f64))
            .collect();
        if !values.is_empty() {
            per_duty.insert(duty.code.clone(), LoadStats::from_values(&values));
        }
    }

    FairnessReport {
        people,
        raw,
        weighted,
        hours,
        fte_normalized,
        per_duty,
        unfilled: schedule.unfilled_count(),
    }
}

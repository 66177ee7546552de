//! Post-hoc constraint checker.
//!
//! Validates a finished schedule against a fixed rule taxonomy. It never
//! mutates the schedule and does not care how the schedule was produced.

use chrono::{Datelike, NaiveDate, Weekday};
use pyo3::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::SchedulingConfig;
use crate::fairness;
use crate::models::{DutyFamily, DutyType, Schedule, Unavailability};
use crate::roster::Roster;
use crate::scheduler::weekend_key;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Hard,
    Soft,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Hard => "hard",
            Severity::Soft => "soft",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    Unavailable,
    DoubleBooking,
    OverCoverage,
    WeekdayNotAllowed,
    FamilyConflict,
    SameFamilyOverlap,
    PoolGate,
    Qualification,
    UnknownAssignment,
    BackToBackWeekend,
    FairnessTarget,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Unavailable => "unavailable",
            Rule::DoubleBooking => "double_booking",
            Rule::OverCoverage => "over_coverage",
            Rule::WeekdayNotAllowed => "weekday_not_allowed",
            Rule::FamilyConflict => "family_conflict",
            Rule::SameFamilyOverlap => "same_family_overlap",
            Rule::PoolGate => "pool_gate",
            Rule::Qualification => "qualification",
            Rule::UnknownAssignment => "unknown_assignment",
            Rule::BackToBackWeekend => "back_to_back_weekend",
            Rule::FairnessTarget => "fairness_target",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Rule::BackToBackWeekend | Rule::FairnessTarget => Severity::Soft,
            _ => Severity::Hard,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One broken rule and the (date, duty, person) it concerns.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub severity: Severity,
    pub rule: Rule,
    #[pyo3(get)]
    pub description: String,
    #[pyo3(get)]
    pub date: Option<NaiveDate>,
    #[pyo3(get)]
    pub duty: Option<String>,
    #[pyo3(get)]
    pub person: Option<String>,
}

impl Violation {
    fn new(rule: Rule, description: String) -> Self {
        Self {
            severity: rule.severity(),
            rule,
            description,
            date: None,
            duty: None,
            person: None,
        }
    }

    fn at(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    fn duty(mut self, code: &str) -> Self {
        self.duty = Some(code.to_string());
        self
    }

    fn person(mut self, id: &str) -> Self {
        self.person = Some(id.to_string());
        self
    }
}

#[pymethods]
impl Violation {
    #[getter(severity)]
    fn py_severity(&self) -> &'static str {
        self.severity.as_str()
    }

    #[getter(rule)]
    fn py_rule(&self) -> &'static str {
        self.rule.as_str()
    }

    fn __repr__(&self) -> String {
        format!(
            "Violation({}, {}, {:?})",
            self.severity.as_str(),
            self.rule,
            self.description
        )
    }
}

/// A person's filled slots on one date, with their duty definitions.
type DayLoad<'s, 'a> = Vec<(&'s str, Option<&'a DutyType>)>;

pub struct ConstraintChecker<'a> {
    roster: &'a Roster,
    unavailable: &'a Unavailability,
    duties: FxHashMap<&'a str, &'a DutyType>,
    duty_list: &'a [DutyType],
    config: &'a SchedulingConfig,
}

impl<'a> ConstraintChecker<'a> {
    pub fn new(
        roster: &'a Roster,
        unavailable: &'a Unavailability,
        duties: &'a [DutyType],
        config: &'a SchedulingConfig,
    ) -> Self {
        Self {
            roster,
            unavailable,
            duties: duties.iter().map(|d| (d.code.as_str(), d)).collect(),
            duty_list: duties,
            config,
        }
    }

    /// Run every rule. Returns `(hard, soft)`.
    pub fn check_all(&self, schedule: &Schedule) -> (Vec<Violation>, Vec<Violation>) {
        let mut all = Vec::new();
        all.extend(self.check_assignments(schedule));
        all.extend(self.check_coverage(schedule));
        all.extend(self.check_person_days(schedule));
        all.extend(self.check_back_to_back_weekend(schedule));
        all.extend(self.check_fairness(schedule));

        all.into_iter()
            .partition(|v: &Violation| v.severity == Severity::Hard)
    }

    /// Per-slot rules: unknown ids, unavailability, weekday set, pool gate, qualification.
    pub fn check_assignments(&self, schedule: &Schedule) -> Vec<Violation> {
        let mut out = Vec::new();
        for (date, code, id) in schedule.assignments() {
            let person = self.roster.by_id(id);
            let duty = self.duties.get(code).copied();
            let (Some(person), Some(duty)) = (person, duty) else {
                let what = if person.is_none() { "person" } else { "duty" };
                out.push(
                    Violation::new(
                        Rule::UnknownAssignment,
                        format!("{} assigned {} is an unknown {}", id, code, what),
                    )
                    .at(date)
                    .duty(code)
                    .person(id),
                );
                continue;
            };

            if self.unavailable.contains(date, id) {
                out.push(
                    Violation::new(Rule::Unavailable, format!("{} assigned on an unavailable date", id))
                        .at(date)
                        .duty(code)
                        .person(id),
                );
            }
            if !duty.weekdays.contains_date(date) {
                out.push(
                    Violation::new(
                        Rule::WeekdayNotAllowed,
                        format!("{} is not offered on {:?}", code, date.weekday()),
                    )
                    .at(date)
                    .duty(code)
                    .person(id),
                );
            }
            if !person.passes_duty_gate(duty) {
                out.push(
                    Violation::new(Rule::PoolGate, format!("{} is outside the pool for {}", id, code))
                    .at(date)
                    .duty(code)
                    .person(id),
                );
            }
            if let Some(tag) = duty.required_tag {
                if !person.has_tag(tag) {
                    out.push(
                        Violation::new(
                            Rule::Qualification,
                            format!("{} lacks required tag {} for {}", id, tag, code),
                        )
                        .at(date)
                        .duty(code)
                        .person(id),
                    );
                }
            }
        }
        out
    }

    /// At most `max_per_date` people per (date, duty).
    pub fn check_coverage(&self, schedule: &Schedule) -> Vec<Violation> {
        let mut out = Vec::new();
        for (date, slots) in schedule.iter() {
            let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
            for slot in slots.iter().filter(|s| s.person.is_some()) {
                *counts.entry(slot.duty.as_str()).or_default() += 1;
            }
            for (code, count) in counts {
                let limit = self.duties.get(code).map_or(1, |d| d.max_per_date);
                if count > limit {
                    out.push(
                        Violation::new(
                            Rule::OverCoverage,
                            format!("{} covered by {} people (limit {})", code, count, limit),
                        )
                        .at(date)
                        .duty(code),
                    );
                }
            }
        }
        out
    }

    /// Rules over everything one person holds on one date.
    pub fn check_person_days(&self, schedule: &Schedule) -> Vec<Violation> {
        let mut out = Vec::new();
        for (date, slots) in schedule.iter() {
            let mut by_person: BTreeMap<&str, DayLoad<'_, 'a>> = BTreeMap::new();
            for slot in slots {
                if let Some(id) = slot.person.as_deref() {
                    by_person
                        .entry(id)
                        .or_default()
                        .push((slot.duty.as_str(), self.duties.get(slot.duty.as_str()).copied()));
                }
            }
            for (id, load) in by_person {
                out.extend(self.check_day(date, id, &load));
            }
        }
        out
    }

    fn check_day(&self, date: NaiveDate, id: &str, load: &DayLoad<'_, 'a>) -> Vec<Violation> {
        let mut out = Vec::new();
        let known: Vec<&DutyType> = load.iter().filter_map(|(_, d)| *d).collect();

        let exclusive: Vec<&str> = known
            .iter()
            .filter(|d| d.exclusive)
            .map(|d| d.code.as_str())
            .collect();
        if exclusive.len() > 1 {
            out.push(
                Violation::new(
                    Rule::DoubleBooking,
                    format!("{} holds exclusive duties {}", id, exclusive.join(", ")),
                )
                .at(date)
                .person(id),
            );
        }

        let (first, second) = self.config.conflicting_families;
        let find = |family: DutyFamily| known.iter().find(|d| d.family == family);
        if let (Some(a), Some(b)) = (find(first), find(second)) {
            out.push(
                Violation::new(
                    Rule::FamilyConflict,
                    format!("{} holds both {} and {}", id, a.code, b.code),
                )
                .at(date)
                .person(id),
            );
        }

        let mut scoped: BTreeMap<DutyFamily, BTreeSet<&str>> = BTreeMap::new();
        for duty in known
            .iter()
            .filter(|d| d.exclusive && d.weekdays.is_weekday_scoped())
        {
            scoped.entry(duty.family).or_default().insert(duty.code.as_str());
        }
        for (family, codes) in scoped {
            if codes.len() > 1 {
                let codes: Vec<&str> = codes.into_iter().collect();
                out.push(
                    Violation::new(
                        Rule::SameFamilyOverlap,
                        format!("{} holds {:?} duties {}", id, family, codes.join(", ")),
                    )
                    .at(date)
                    .person(id),
                );
            }
        }
        out
    }

    /// Soft: the same person on weekend-family duty two weekends running.
    pub fn check_back_to_back_weekend(&self, schedule: &Schedule) -> Vec<Violation> {
        let mut weekends: BTreeMap<&str, BTreeSet<NaiveDate>> = BTreeMap::new();
        for (date, code, id) in schedule.assignments() {
            let on_weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
            let weekend_duty = self
                .duties
                .get(code)
                .is_some_and(|d| d.family == DutyFamily::Weekend);
            if on_weekend && weekend_duty {
                weekends.entry(id).or_default().insert(weekend_key(date));
            }
        }

        let mut out = Vec::new();
        for (id, saturdays) in weekends {
            let saturdays: Vec<NaiveDate> = saturdays.into_iter().collect();
            for pair in saturdays.windows(2) {
                if (pair[1] - pair[0]).num_days() == 7 {
                    out.push(
                        Violation::new(
                            Rule::BackToBackWeekend,
                            format!("{} works weekends of {} and {}", id, pair[0], pair[1]),
                        )
                        .at(pair[1])
                        .person(id),
                    );
                }
            }
        }
        out
    }

    /// Soft: global weighted CV or any per-duty CV above the configured target.
    pub fn check_fairness(&self, schedule: &Schedule) -> Vec<Violation> {
        let target = self.config.cv_target_pct;
        let report = fairness::compute(schedule, self.roster, self.duty_list);
        let mut out = Vec::new();
        if report.weighted.cv > target {
            out.push(Violation::new(
                Rule::FairnessTarget,
                format!("Weighted CV {:.2}% exceeds {:.2}%", report.weighted.cv, target),
            ));
        }
        for (code, stats) in &report.per_duty {
            if stats.cv > target {
                out.push(
                    Violation::new(
                        Rule::FairnessTarget,
                        format!("{} CV {:.2}% exceeds {:.2}%", code, stats.cv, target),
                    )
                    .duty(code),
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapabilityTag, Person, PoolFlag, Slot, WeekdaySet};

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn roster() -> Roster {
        Roster::new(vec![
            Person::new("mercy", 0).in_pool(PoolFlag::Inpatient),
            Person::new("ir", 1)
                .in_pool(PoolFlag::Interventional)
                .in_pool(PoolFlag::General)
                .tagged(CapabilityTag::Interventional),
            Person::new("gen", 2)
                .in_pool(PoolFlag::General)
                .in_pool(PoolFlag::Weekend)
                .tagged(CapabilityTag::Mri),
        ])
        .unwrap()
    }

    fn duties() -> Vec<DutyType> {
        vec![
            DutyType::new("M1", 1.0, 8.0, DutyFamily::Inpatient).on(WeekdaySet::WEEKDAYS),
            DutyType::new("M2", 1.0, 8.0, DutyFamily::Inpatient).on(WeekdaySet::WEEKDAYS),
            DutyType::new("M0", 0.25, 2.0, DutyFamily::Inpatient).concurrent(),
            DutyType::new("IR-1", 1.0, 8.0, DutyFamily::Interventional)
                .requires(CapabilityTag::Interventional),
            DutyType::new("Gen", 1.0, 8.0, DutyFamily::General),
            DutyType::new("MRI", 1.0, 8.0, DutyFamily::Subspecialty).requires(CapabilityTag::Mri),
            DutyType::new("EP", 0.81, 6.5, DutyFamily::Weekend).on(WeekdaySet::WEEKEND),
            DutyType::new("H", 0.25, 2.0, DutyFamily::Fixed).concurrent().max_per_date(2),
        ]
    }

    fn rules(violations: &[Violation]) -> Vec<Rule> {
        violations.iter().map(|v| v.rule).collect()
    }

    fn check(schedule: &Schedule, unavailable: &Unavailability) -> (Vec<Violation>, Vec<Violation>) {
        let roster = roster();
        let duties = duties();
        let config = SchedulingConfig::default();
        ConstraintChecker::new(&roster, unavailable, &duties, &config).check_all(schedule)
    }

    #[test]
    fn test_clean_schedule() {
        let mut s = Schedule::new();
        s.push(d(2026, 3, 2), Slot::filled("M1", "mercy", "m1"));
        s.push(d(2026, 3, 2), Slot::filled("M0", "mercy", "m0"));
        s.push(d(2026, 3, 2), Slot::filled("IR-1", "ir", "ir"));
        s.push(d(2026, 3, 2), Slot::filled("MRI", "gen", "mri"));
        let (hard, _) = check(&s, &Unavailability::new());
        assert!(hard.is_empty(), "{:?}", hard);
    }

    #[test]
    fn test_unavailable() {
        let mut s = Schedule::new();
        s.push(d(2026, 3, 2), Slot::filled("M1", "mercy", "m1"));
        let unavailable: Unavailability = [(d(2026, 3, 2), "mercy")].into_iter().collect();
        let (hard, _) = check(&s, &unavailable);
        assert_eq!(rules(&hard), vec![Rule::Unavailable]);
        assert_eq!(hard[0].person.as_deref(), Some("mercy"));
        assert_eq!(hard[0].date, Some(d(2026, 3, 2)));
    }

    #[test]
    fn test_double_booking_and_same_family_overlap() {
        let mut s = Schedule::new();
        s.push(d(2026, 3, 2), Slot::filled("M1", "mercy", "m1"));
        s.push(d(2026, 3, 2), Slot::filled("M2", "mercy", "m1"));
        let (hard, _) = check(&s, &Unavailability::new());
        assert_eq!(rules(&hard), vec![Rule::DoubleBooking, Rule::SameFamilyOverlap]);
    }

    #[test]
    fn test_concurrent_duty_is_not_double_booking() {
        let mut s = Schedule::new();
        s.push(d(2026, 3, 2), Slot::filled("H", "mercy", "h"));
        s.push(d(2026, 3, 2), Slot::filled("H", "gen", "h"));
        s.push(d(2026, 3, 2), Slot::filled("M1", "mercy", "m1"));
        let (hard, _) = check(&s, &Unavailability::new());
        assert!(hard.is_empty(), "{:?}", hard);
    }

    #[test]
    fn test_over_coverage() {
        let mut s = Schedule::new();
        s.push(d(2026, 3, 2), Slot::filled("Gen", "ir", "gen"));
        s.push(d(2026, 3, 2), Slot::filled("Gen", "gen", "gen"));
        let (hard, _) = check(&s, &Unavailability::new());
        assert!(rules(&hard).contains(&Rule::OverCoverage));

        let mut s = Schedule::new();
        for id in ["mercy", "ir", "gen"] {
            s.push(d(2026, 3, 2), Slot::filled("H", id, "h"));
        }
        let (hard, _) = check(&s, &Unavailability::new());
        assert_eq!(rules(&hard), vec![Rule::OverCoverage]);
    }

    #[test]
    fn test_weekday_not_allowed() {
        let mut s = Schedule::new();
        // Saturday
        s.push(d(2026, 3, 7), Slot::filled("M1", "mercy", "m1"));
        let (hard, _) = check(&s, &Unavailability::new());
        assert_eq!(rules(&hard), vec![Rule::WeekdayNotAllowed]);
    }

    #[test]
    fn test_family_conflict() {
        let mut s = Schedule::new();
        s.push(d(2026, 3, 2), Slot::filled("IR-1", "ir", "ir"));
        s.push(d(2026, 3, 2), Slot::filled("Gen", "ir", "gen"));
        let (hard, _) = check(&s, &Unavailability::new());
        assert!(rules(&hard).contains(&Rule::FamilyConflict));
    }

    #[test]
    fn test_pool_gate_and_qualification() {
        let mut s = Schedule::new();
        // Interventional staff are barred from inpatient duty
        s.push(d(2026, 3, 2), Slot::filled("M1", "ir", "m1"));
        s.push(d(2026, 3, 3), Slot::filled("MRI", "mercy", "mri"));
        let (hard, _) = check(&s, &Unavailability::new());
        assert_eq!(rules(&hard), vec![Rule::PoolGate, Rule::Qualification]);
    }

    #[test]
    fn test_duty_pool_gate() {
        let duties = crate::catalogue::duties();
        let config = SchedulingConfig::default();
        let mut s = Schedule::new();
        s.push(d(2026, 3, 3), Slot::filled("O'Toole", "mg", "otoole"));

        let outside = Roster::new(vec![Person::new("mg", 0)
            .in_pool(PoolFlag::General)
            .tagged(CapabilityTag::Mammography)])
        .unwrap();
        let none = Unavailability::new();
        let (hard, _) = ConstraintChecker::new(&outside, &none, &duties, &config).check_all(&s);
        assert_eq!(rules(&hard), vec![Rule::PoolGate]);
        assert_eq!(hard[0].duty.as_deref(), Some("O'Toole"));

        let inside = Roster::new(vec![Person::new("mg", 0)
            .in_pool(PoolFlag::General)
            .in_pool(PoolFlag::Breast)
            .tagged(CapabilityTag::Mammography)])
        .unwrap();
        let (hard, _) = ConstraintChecker::new(&inside, &none, &duties, &config).check_all(&s);
        assert!(hard.is_empty(), "{:?}", hard);
    }

    #[test]
    fn test_unknown_assignment() {
        let mut s = Schedule::new();
        s.push(d(2026, 3, 2), Slot::filled("M1", "nobody", "m1"));
        s.push(d(2026, 3, 2), Slot::filled("M9", "mercy", "m9"));
        s.push(d(2026, 3, 2), Slot::unfilled("M2", "m2"));
        let (hard, _) = check(&s, &Unavailability::new());
        assert_eq!(rules(&hard), vec![Rule::UnknownAssignment, Rule::UnknownAssignment]);
    }

    #[test]
    fn test_back_to_back_weekend_is_soft() {
        let mut s = Schedule::new();
        for day in [7, 8, 14, 15] {
            s.push(d(2026, 3, day), Slot::filled("EP", "gen", "wknd"));
        }
        let (hard, soft) = check(&s, &Unavailability::new());
        assert!(hard.is_empty());
        let b2b: Vec<&Violation> = soft
            .iter()
            .filter(|v| v.rule == Rule::BackToBackWeekend)
            .collect();
        assert_eq!(b2b.len(), 1);
        assert_eq!(b2b[0].date, Some(d(2026, 3, 14)));

        let mut s = Schedule::new();
        s.push(d(2026, 3, 7), Slot::filled("EP", "gen", "wknd"));
        s.push(d(2026, 3, 21), Slot::filled("EP", "gen", "wknd"));
        let (_, soft) = check(&s, &Unavailability::new());
        assert!(!rules(&soft).contains(&Rule::BackToBackWeekend));
    }

    #[test]
    fn test_fairness_target_is_soft() {
        let mut s = Schedule::new();
        s.push(d(2026, 3, 2), Slot::filled("M1", "mercy", "m1"));
        let (hard, soft) = check(&s, &Unavailability::new());
        assert!(hard.is_empty());
        // One of three people carries all the load
        assert!(soft
            .iter()
            .any(|v| v.rule == Rule::FairnessTarget && v.duty.is_none()));
        assert!(soft.iter().all(|v| v.severity == Severity::Soft));
    }

    #[test]
    fn test_per_duty_fairness_target() {
        let mut s = Schedule::new();
        s.push(d(2026, 3, 2), Slot::filled("M1", "mercy", "m1"));
        s.push(d(2026, 3, 2), Slot::filled("IR-1", "ir", "ir"));
        s.push(d(2026, 3, 2), Slot::filled("MRI", "gen", "mri"));
        s.push(d(2026, 3, 3), Slot::filled("M1", "mercy", "m1"));
        s.push(d(2026, 3, 3), Slot::filled("IR-1", "ir", "ir"));
        s.push(d(2026, 3, 3), Slot::filled("Gen", "gen", "gen"));
        let (hard, soft) = check(&s, &Unavailability::new());
        assert!(hard.is_empty(), "{:?}", hard);

        // Everyone carries 2.0, but only one of three Gen candidates took Gen
        let fairness: Vec<&Violation> = soft
            .iter()
            .filter(|v| v.rule == Rule::FairnessTarget)
            .collect();
        assert_eq!(fairness.len(), 1);
        assert_eq!(fairness[0].duty.as_deref(), Some("Gen"));
    }
}

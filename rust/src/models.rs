//! Core data types for the rota engine.

use chrono::{Datelike, NaiveDate, Weekday};
use pyo3::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Errors raised while building model values from loose input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown capability tag: {0:?}")]
    UnknownCapability(String),
    #[error("Unknown pool flag: {0:?}")]
    UnknownPool(String),
    #[error("Unknown duty family: {0:?}")]
    UnknownFamily(String),
    #[error("Invalid weekday number {0} (expected 0=Mon..6=Sun)")]
    InvalidWeekday(u32),
    #[error("Duty {code} has invalid weight {weight}")]
    InvalidWeight { code: String, weight: f64 },
    #[error("Duty {code} has invalid hours {hours}")]
    InvalidHours { code: String, hours: f64 },
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Boolean pool-membership flags, one per major duty family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolFlag {
    Inpatient,
    Interventional,
    Weekend,
    General,
    Breast,
}

impl PoolFlag {
    pub const ALL: [PoolFlag; 5] = [
        PoolFlag::Inpatient,
        PoolFlag::Interventional,
        PoolFlag::Weekend,
        PoolFlag::General,
        PoolFlag::Breast,
    ];

    /// Parse a pool flag, accepting an optional `participates_` prefix.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let key = normalize_key(raw);
        let key = key.strip_prefix("participates_").unwrap_or(&key);
        match key {
            "mercy" | "inpatient" => Ok(PoolFlag::Inpatient),
            "ir" | "interventional" => Ok(PoolFlag::Interventional),
            "weekend" => Ok(PoolFlag::Weekend),
            "gen" | "general" => Ok(PoolFlag::General),
            "mg" | "breast" => Ok(PoolFlag::Breast),
            _ => Err(ModelError::UnknownPool(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolFlag::Inpatient => "inpatient",
            PoolFlag::Interventional => "interventional",
            PoolFlag::Weekend => "weekend",
            PoolFlag::General => "general",
            PoolFlag::Breast => "breast",
        }
    }
}

/// Closed vocabulary of capability tags.
///
/// Roster exports carry free-form subspecialty strings; they are folded into
/// this set once, at load time, so eligibility never compares raw strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityTag {
    Interventional,
    Neuro,
    Mammography,
    Mri,
    Pet,
    General,
    Cardiac,
    NuclearMedicine,
    BreastProcedures,
    NorthGeneral,
    SouthGeneral,
}

impl CapabilityTag {
    /// Normalize a free-form tag (case, whitespace, known aliases).
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        match normalize_key(raw).as_str() {
            "ir" | "interventional" => Ok(CapabilityTag::Interventional),
            "neuro" | "skull_base" => Ok(CapabilityTag::Neuro),
            "mg" | "mammography" | "breast" => Ok(CapabilityTag::Mammography),
            "mri" => Ok(CapabilityTag::Mri),
            "pet" => Ok(CapabilityTag::Pet),
            "gen" | "general" => Ok(CapabilityTag::General),
            "cardiac" => Ok(CapabilityTag::Cardiac),
            "nm" | "nuclear_medicine" => Ok(CapabilityTag::NuclearMedicine),
            "breast_proc" => Ok(CapabilityTag::BreastProcedures),
            "north_gen+cont" | "north_gen" => Ok(CapabilityTag::NorthGeneral),
            "south_gen+cont" | "south_gen" => Ok(CapabilityTag::SouthGeneral),
            _ => Err(ModelError::UnknownCapability(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityTag::Interventional => "ir",
            CapabilityTag::Neuro => "neuro",
            CapabilityTag::Mammography => "mg",
            CapabilityTag::Mri => "mri",
            CapabilityTag::Pet => "pet",
            CapabilityTag::General => "gen",
            CapabilityTag::Cardiac => "cardiac",
            CapabilityTag::NuclearMedicine => "nm",
            CapabilityTag::BreastProcedures => "breast_proc",
            CapabilityTag::NorthGeneral => "north_gen",
            CapabilityTag::SouthGeneral => "south_gen",
        }
    }
}

/// Duty families used by the pool-gate and family-conflict checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DutyFamily {
    Inpatient,
    Interventional,
    Weekend,
    General,
    Subspecialty,
    Fixed,
}

impl DutyFamily {
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        match normalize_key(raw).as_str() {
            "inpatient" | "mercy" => Ok(DutyFamily::Inpatient),
            "interventional" | "ir" => Ok(DutyFamily::Interventional),
            "weekend" => Ok(DutyFamily::Weekend),
            "general" | "gen" => Ok(DutyFamily::General),
            "subspecialty" => Ok(DutyFamily::Subspecialty),
            "fixed" => Ok(DutyFamily::Fixed),
            _ => Err(ModelError::UnknownFamily(raw.to_string())),
        }
    }

    /// Pool a person must belong to before holding any duty of this family.
    pub fn gated_pool(&self) -> Option<PoolFlag> {
        match self {
            DutyFamily::Inpatient => Some(PoolFlag::Inpatient),
            DutyFamily::Interventional => Some(PoolFlag::Interventional),
            DutyFamily::Weekend => Some(PoolFlag::Weekend),
            _ => None,
        }
    }

    /// Whether members of the interventional pool are barred from this family.
    pub fn bars_interventional(&self) -> bool {
        matches!(self, DutyFamily::Inpatient | DutyFamily::Weekend)
    }
}

/// A set of weekdays stored as a bitmask (bit 0 = Monday).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const ALL: WeekdaySet = WeekdaySet(0b111_1111);
    pub const WEEKDAYS: WeekdaySet = WeekdaySet(0b001_1111);
    pub const WEEKEND: WeekdaySet = WeekdaySet(0b110_0000);
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    pub fn from_days(days: &[Weekday]) -> Self {
        WeekdaySet(
            days.iter()
                .fold(0u8, |acc, d| acc | (1 << d.num_days_from_monday())),
        )
    }

    /// Build from day numbers where 0 is Monday.
    pub fn from_numbers(days: &[u32]) -> Result<Self, ModelError> {
        let mut bits = 0u8;
        for &n in days {
            if n > 6 {
                return Err(ModelError::InvalidWeekday(n));
            }
            bits |= 1 << n;
        }
        Ok(WeekdaySet(bits))
    }

    #[inline]
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    #[inline]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.contains(date.weekday())
    }

    pub fn intersect(&self, other: WeekdaySet) -> WeekdaySet {
        WeekdaySet(self.0 & other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Restricted to some subset of Monday..Friday.
    pub fn is_weekday_scoped(&self) -> bool {
        !self.is_empty() && self.0 & Self::WEEKEND.0 == 0
    }
}

impl Default for WeekdaySet {
    fn default() -> Self {
        WeekdaySet::ALL
    }
}

/// One staff member.
#[pyclass]
#[derive(Clone, Debug)]
pub struct Person {
    #[pyo3(get)]
    pub id: String,
    #[pyo3(get)]
    pub name: String,
    /// Position in the rotation order (0..N-1, contiguous).
    #[pyo3(get)]
    pub index: usize,
    /// Relative scheduling weight.
    #[pyo3(get)]
    pub fte: f64,
    pub pools: BTreeSet<PoolFlag>,
    pub tags: BTreeSet<CapabilityTag>,
}

impl Person {
    pub fn new(id: impl Into<String>, index: usize) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            index,
            fte: 1.0,
            pools: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_fte(mut self, fte: f64) -> Self {
        self.fte = fte;
        self
    }

    pub fn in_pool(mut self, flag: PoolFlag) -> Self {
        self.pools.insert(flag);
        self
    }

    pub fn tagged(mut self, tag: CapabilityTag) -> Self {
        self.tags.insert(tag);
        self
    }

    #[inline]
    pub fn has_pool(&self, flag: PoolFlag) -> bool {
        self.pools.contains(&flag)
    }

    #[inline]
    pub fn has_tag(&self, tag: CapabilityTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Whether this person passes the family's static pool gate.
    pub fn passes_family_gate(&self, family: DutyFamily) -> bool {
        if let Some(flag) = family.gated_pool() {
            if !self.has_pool(flag) {
                return false;
            }
        }
        !(family.bars_interventional() && self.has_pool(PoolFlag::Interventional))
    }

    /// Family gate plus the duty's own pool, if it names one.
    pub fn passes_duty_gate(&self, duty: &DutyType) -> bool {
        self.passes_family_gate(duty.family) && duty.pool.map_or(true, |flag| self.has_pool(flag))
    }
}

#[pymethods]
impl Person {
    #[new]
    #[pyo3(signature = (id, index, name=None, fte=1.0, pools=Vec::new(), tags=Vec::new()))]
    fn py_new(
        id: String,
        index: usize,
        name: Option<String>,
        fte: f64,
        pools: Vec<String>,
        tags: Vec<String>,
    ) -> PyResult<Self> {
        let to_py = |e: ModelError| pyo3::exceptions::PyValueError::new_err(e.to_string());
        let mut person = Person::new(id, index).with_fte(fte);
        if let Some(name) = name {
            person.name = name;
        }
        for raw in &pools {
            person.pools.insert(PoolFlag::parse(raw).map_err(to_py)?);
        }
        for raw in &tags {
            person.tags.insert(CapabilityTag::parse(raw).map_err(to_py)?);
        }
        Ok(person)
    }

    #[getter(pools)]
    fn py_pools(&self) -> Vec<String> {
        self.pools.iter().map(|p| p.as_str().to_string()).collect()
    }

    #[getter(tags)]
    fn py_tags(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.as_str().to_string()).collect()
    }

    fn __repr__(&self) -> String {
        format!(
            "Person(id={:?}, index={}, pools={}, tags={})",
            self.id,
            self.index,
            self.pools.len(),
            self.tags.len()
        )
    }
}

/// A typed unit of work.
#[derive(Clone, Debug, PartialEq)]
pub struct DutyType {
    pub code: String,
    /// Cursor displacement per assignment; also the weighted-load unit.
    pub weight: f64,
    pub hours: f64,
    /// At most one exclusive duty per person per date.
    pub exclusive: bool,
    pub family: DutyFamily,
    pub weekdays: WeekdaySet,
    pub required_tag: Option<CapabilityTag>,
    pub preferred_tag: Option<CapabilityTag>,
    /// People allowed on this code on one date (normally 1).
    pub max_per_date: u32,
    /// Pool a holder must belong to, on top of the family gate.
    pub pool: Option<PoolFlag>,
}

impl DutyType {
    pub fn new(code: impl Into<String>, weight: f64, hours: f64, family: DutyFamily) -> Self {
        Self {
            code: code.into(),
            weight,
            hours,
            exclusive: true,
            family,
            weekdays: WeekdaySet::ALL,
            required_tag: None,
            preferred_tag: None,
            max_per_date: 1,
            pool: None,
        }
    }

    pub fn concurrent(mut self) -> Self {
        self.exclusive = false;
        self
    }

    pub fn on(mut self, weekdays: WeekdaySet) -> Self {
        self.weekdays = weekdays;
        self
    }

    pub fn requires(mut self, tag: CapabilityTag) -> Self {
        self.required_tag = Some(tag);
        self
    }

    pub fn prefers(mut self, tag: CapabilityTag) -> Self {
        self.preferred_tag = Some(tag);
        self
    }

    pub fn max_per_date(mut self, n: u32) -> Self {
        self.max_per_date = n;
        self
    }

    pub fn drawn_from(mut self, flag: PoolFlag) -> Self {
        self.pool = Some(flag);
        self
    }

    /// Reject weights and hours that would break cursor arithmetic or load sums.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(ModelError::InvalidWeight {
                code: self.code.clone(),
                weight: self.weight,
            });
        }
        if !self.hours.is_finite() || self.hours < 0.0 {
            return Err(ModelError::InvalidHours {
                code: self.code.clone(),
                hours: self.hours,
            });
        }
        Ok(())
    }
}

/// Two-week cycle restriction: a different weekday subset on even and odd weeks.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleRule {
    pub anchor: NaiveDate,
    pub even_weeks: WeekdaySet,
    pub odd_weeks: WeekdaySet,
}

impl CycleRule {
    /// Week parity relative to the anchor; dates before the anchor keep alternating.
    pub fn parity(&self, date: NaiveDate) -> i64 {
        (date - self.anchor).num_days().div_euclid(7).rem_euclid(2)
    }

    pub fn allows(&self, date: NaiveDate) -> bool {
        if self.parity(date) == 0 {
            self.even_weeks.contains_date(date)
        } else {
            self.odd_weeks.contains_date(date)
        }
    }
}

/// One scheduling unit: a duty family's priority, pool and cursor identity.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: String,
    /// Cursor shared with other blocks; `None` means the block's own id.
    pub cursor_key: Option<String>,
    pub label: String,
    /// Execution order (lower runs first).
    pub priority: u32,
    /// Duty codes filled per turn, in order; a code may repeat.
    pub duties: Vec<String>,
    pub pool: PoolFlag,
    /// Sub-pool removed from the base pool (e.g. interventional staff).
    pub exclude_pool: Option<PoolFlag>,
    pub weekdays: WeekdaySet,
    pub cycle: Option<CycleRule>,
    /// Run on Saturdays and copy each turn to the following Sunday.
    pub mirror_weekend: bool,
    /// Prefer not to reuse the previous turn's assignees.
    pub avoid_previous: bool,
}

impl Block {
    pub fn new(id: impl Into<String>, priority: u32, pool: PoolFlag, duties: &[&str]) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            cursor_key: None,
            priority,
            duties: duties.iter().map(|d| d.to_string()).collect(),
            pool,
            exclude_pool: None,
            weekdays: WeekdaySet::WEEKDAYS,
            cycle: None,
            mirror_weekend: false,
            avoid_previous: false,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn shares_cursor(mut self, key: impl Into<String>) -> Self {
        self.cursor_key = Some(key.into());
        self
    }

    pub fn cursor_key(&self) -> &str {
        self.cursor_key.as_deref().unwrap_or(&self.id)
    }

    pub fn excluding(mut self, flag: PoolFlag) -> Self {
        self.exclude_pool = Some(flag);
        self
    }

    pub fn on(mut self, weekdays: WeekdaySet) -> Self {
        self.weekdays = weekdays;
        self
    }

    pub fn cycle(mut self, rule: CycleRule) -> Self {
        self.cycle = Some(rule);
        self
    }

    /// Weekend pair block (Saturday turn mirrored onto Sunday).
    pub fn weekend_pair(mut self) -> Self {
        self.mirror_weekend = true;
        self.weekdays = WeekdaySet::WEEKEND;
        self
    }

    pub fn avoid_previous(mut self) -> Self {
        self.avoid_previous = true;
        self
    }
}

/// One entry of the schedule; `person` is `None` for an unfilled slot.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Slot {
    #[pyo3(get)]
    pub duty: String,
    #[pyo3(get)]
    pub person: Option<String>,
    #[pyo3(get)]
    pub block: String,
}

#[pymethods]
impl Slot {
    fn __repr__(&self) -> String {
        format!(
            "Slot(duty={:?}, person={:?}, block={:?})",
            self.duty, self.person, self.block
        )
    }
}

impl Slot {
    pub fn filled(
        duty: impl Into<String>,
        person: impl Into<String>,
        block: impl Into<String>,
    ) -> Self {
        Self {
            duty: duty.into(),
            person: Some(person.into()),
            block: block.into(),
        }
    }

    pub fn unfilled(duty: impl Into<String>, block: impl Into<String>) -> Self {
        Self {
            duty: duty.into(),
            person: None,
            block: block.into(),
        }
    }
}

/// Date → ordered slots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schedule {
    days: BTreeMap<NaiveDate, Vec<Slot>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, date: NaiveDate, slot: Slot) {
        self.days.entry(date).or_default().push(slot);
    }

    pub fn slots(&self, date: NaiveDate) -> &[Slot] {
        self.days.get(&date).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Days in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[Slot])> {
        self.days.iter().map(|(d, s)| (*d, s.as_slice()))
    }

    /// Filled slots as (date, duty, person).
    pub fn assignments(&self) -> impl Iterator<Item = (NaiveDate, &str, &str)> {
        self.days.iter().flat_map(|(date, slots)| {
            slots.iter().filter_map(move |s| {
                s.person
                    .as_deref()
                    .map(|person| (*date, s.duty.as_str(), person))
            })
        })
    }

    pub fn unfilled_count(&self) -> usize {
        self.days
            .values()
            .flatten()
            .filter(|s| s.person.is_none())
            .count()
    }

    pub fn slot_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn into_days(self) -> BTreeMap<NaiveDate, Vec<Slot>> {
        self.days
    }
}

/// Date → people unavailable that date (vacations plus derived exemptions).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Unavailability {
    days: BTreeMap<NaiveDate, BTreeSet<String>>,
}

impl Unavailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, date: NaiveDate, person: impl Into<String>) {
        self.days.entry(date).or_default().insert(person.into());
    }

    #[inline]
    pub fn contains(&self, date: NaiveDate, person: &str) -> bool {
        self.days
            .get(&date)
            .map(|people| people.contains(person))
            .unwrap_or(false)
    }

    pub fn on(&self, date: NaiveDate) -> impl Iterator<Item = &str> {
        self.days
            .get(&date)
            .into_iter()
            .flat_map(|people| people.iter().map(String::as_str))
    }

    /// Union another map into this one.
    pub fn merge(&mut self, other: &Unavailability) {
        for (date, people) in &other.days {
            self.days
                .entry(*date)
                .or_default()
                .extend(people.iter().cloned());
        }
    }

    pub fn union(&self, other: &Unavailability) -> Unavailability {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.days.values().all(BTreeSet::is_empty)
    }

    pub fn len(&self) -> usize {
        self.days.values().map(BTreeSet::len).sum()
    }
}

impl<S: Into<String>> FromIterator<(NaiveDate, S)> for Unavailability {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, S)>>(iter: I) -> Self {
        let mut map = Unavailability::new();
        for (date, person) in iter {
            map.mark(date, person);
        }
        map
    }
}

impl fmt::Display for PoolFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

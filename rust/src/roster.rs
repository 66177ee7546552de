//! Validated, rotation-ordered roster.

use thiserror::Error;

use crate::interner::{PersonIdx, PersonInterner};
use crate::models::{DutyType, Person, PoolFlag};

/// Structural roster problems; any of these halts a run before scheduling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("Roster is empty")]
    Empty,
    #[error("Roster indices must be contiguous 0..{}; found {found:?}", .expected - 1)]
    NonContiguous { expected: usize, found: Vec<usize> },
    #[error("Duplicate person id: {0}")]
    DuplicateId(String),
}

/// People in rotation order. Position `i` holds the person with index `i`.
#[derive(Clone, Debug)]
pub struct Roster {
    people: Vec<Person>,
    ids: PersonInterner,
}

impl Roster {
    /// Validate and order a roster.
    ///
    /// Input order does not matter; rotation order is the `index` field.
    pub fn new(mut people: Vec<Person>) -> Result<Self, RosterError> {
        if people.is_empty() {
            return Err(RosterError::Empty);
        }

        people.sort_by_key(|p| p.index);
        if people.iter().enumerate().any(|(i, p)| p.index != i) {
            return Err(RosterError::NonContiguous {
                expected: people.len(),
                found: people.iter().map(|p| p.index).collect(),
            });
        }

        let mut ids = PersonInterner::with_capacity(people.len());
        for person in &people {
            ids.insert_new(&person.id)
                .map_err(|_| RosterError::DuplicateId(person.id.clone()))?;
        }

        Ok(Self { people, ids })
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    #[inline]
    pub fn get(&self, idx: PersonIdx) -> &Person {
        &self.people[idx]
    }

    #[inline]
    pub fn index_of(&self, id: &str) -> Option<PersonIdx> {
        self.ids.get(id)
    }

    pub fn by_id(&self, id: &str) -> Option<&Person> {
        self.index_of(id).map(|idx| &self.people[idx])
    }

    /// Base rotation pool: members of `flag`, minus members of `exclude`, in roster order.
    pub fn pool(&self, flag: PoolFlag, exclude: Option<PoolFlag>) -> Vec<PersonIdx> {
        self.people
            .iter()
            .filter(|p| p.has_pool(flag))
            .filter(|p| exclude.map_or(true, |ex| !p.has_pool(ex)))
            .map(|p| p.index)
            .collect()
    }

    /// Non-fatal configuration smells worth surfacing before a run.
    pub fn warnings(&self, duties: &[DutyType]) -> Vec<String> {
        let mut warnings = Vec::new();

        for person in &self.people {
            if person.fte.is_nan() || person.fte <= 0.0 {
                warnings.push(format!("{} has non-positive FTE {}", person.id, person.fte));
            }
        }

        for flag in PoolFlag::ALL {
            if !self.people.iter().any(|p| p.has_pool(flag)) {
                warnings.push(format!("No one participates in the {} pool", flag));
            }
        }

        for duty in duties {
            if let Some(tag) = duty.required_tag {
                if !self.people.iter().any(|p| p.has_tag(tag)) {
                    warnings.push(format!(
                        "Duty {} requires tag {} which no one carries",
                        duty.code, tag
                    ));
                }
            }
        }

        warnings
    }
}

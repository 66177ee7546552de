//! Eligibility pipeline: narrows a block's pool to the people who may take one slot.
//!
//! Stages run in a fixed order, each a pure filter over the previous output:
//! 1. pool filter, 2. exclusion gate (together: the block's rotation pool),
//! 3. hard capability gate, 4. availability gate, 5. soft preference sort.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::interner::PersonIdx;
use crate::log_checks;
use crate::models::{Block, CapabilityTag, DutyType, PoolFlag, Unavailability};
use crate::roster::Roster;

/// People already holding an exclusive duty, per date.
///
/// Threaded through every block of a run in priority order; later exclusive
/// blocks consult what earlier ones recorded.
#[derive(Clone, Debug, Default)]
pub struct ExclusiveHolders {
    by_date: FxHashMap<NaiveDate, FxHashSet<PersonIdx>>,
}

impl ExclusiveHolders {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn holds(&self, date: NaiveDate, person: PersonIdx) -> bool {
        self.by_date
            .get(&date)
            .map(|people| people.contains(&person))
            .unwrap_or(false)
    }

    pub fn record(&mut self, date: NaiveDate, person: PersonIdx) {
        self.by_date.entry(date).or_default().insert(person);
    }

    /// Holders per date in ascending date and index order.
    pub fn sorted(&self) -> Vec<(NaiveDate, Vec<PersonIdx>)> {
        let mut out: Vec<(NaiveDate, Vec<PersonIdx>)> = self
            .by_date
            .iter()
            .map(|(date, people)| {
                let mut people: Vec<PersonIdx> = people.iter().copied().collect();
                people.sort_unstable();
                (*date, people)
            })
            .collect();
        out.sort_by_key(|(date, _)| *date);
        out
    }
}

/// Everything that varies per slot.
#[derive(Clone, Copy, Debug)]
pub struct SlotRequest<'a> {
    pub duty: &'a DutyType,
    /// Dates the turn covers: one day, or Saturday and Sunday for a weekend pair.
    pub dates: &'a [NaiveDate],
    /// Whether the slot consults and feeds the exclusive-holders set.
    pub exclusive: bool,
    /// Already assigned in this turn of the same block.
    pub taken: &'a [PersonIdx],
    /// Assigned in the block's previous turn (back-to-back avoidance).
    pub avoid: &'a [PersonIdx],
}

/// Ordered eligible people; the first `preferred` carry the duty's preferred tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EligibleList {
    pub members: Vec<PersonIdx>,
    pub preferred: usize,
}

impl EligibleList {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn preferred_members(&self) -> &[PersonIdx] {
        &self.members[..self.preferred]
    }
}

impl From<Vec<PersonIdx>> for EligibleList {
    fn from(members: Vec<PersonIdx>) -> Self {
        Self {
            members,
            preferred: 0,
        }
    }
}

/// Stage 1: keep members of the block's pool flag.
pub fn pool_stage(roster: &Roster, flag: PoolFlag) -> Vec<PersonIdx> {
    roster.pool(flag, None)
}

/// Stage 2: drop members of the excluded sub-pool.
pub fn exclusion_stage(
    roster: &Roster,
    people: Vec<PersonIdx>,
    exclude: Option<PoolFlag>,
) -> Vec<PersonIdx> {
    match exclude {
        Some(flag) => people
            .into_iter()
            .filter(|&idx| !roster.get(idx).has_pool(flag))
            .collect(),
        None => people,
    }
}

/// Stage 3: drop people lacking the duty's required capability.
pub fn capability_stage(
    roster: &Roster,
    people: &[PersonIdx],
    required: Option<CapabilityTag>,
) -> Vec<PersonIdx> {
    match required {
        Some(tag) => people
            .iter()
            .copied()
            .filter(|&idx| roster.get(idx).has_tag(tag))
            .collect(),
        None => people.to_vec(),
    }
}

/// Stage 5: stable-partition people carrying `preferred` to the front.
pub fn preference_stage(
    roster: &Roster,
    people: Vec<PersonIdx>,
    preferred: Option<CapabilityTag>,
) -> EligibleList {
    let Some(tag) = preferred else {
        return EligibleList::from(people);
    };
    let (mut first, rest): (Vec<PersonIdx>, Vec<PersonIdx>) = people
        .into_iter()
        .partition(|&idx| roster.get(idx).has_tag(tag));
    let preferred = first.len();
    first.extend(rest);
    EligibleList {
        members: first,
        preferred,
    }
}

/// Runs the pipeline against one run's roster and unavailability.
pub struct EligibilityPipeline<'a> {
    roster: &'a Roster,
    unavailable: &'a Unavailability,
    verbosity: u8,
}

impl<'a> EligibilityPipeline<'a> {
    pub fn new(roster: &'a Roster, unavailable: &'a Unavailability, verbosity: u8) -> Self {
        Self {
            roster,
            unavailable,
            verbosity,
        }
    }

    /// Stages 1 and 2: the block's date-independent rotation pool.
    pub fn rotation_pool(&self, block: &Block) -> Vec<PersonIdx> {
        let pooled = pool_stage(self.roster, block.pool);
        exclusion_stage(self.roster, pooled, block.exclude_pool)
    }

    /// Stage 4: drop unavailable people, exclusive holders, and this turn's assignees.
    pub fn availability_stage(
        &self,
        people: &[PersonIdx],
        request: &SlotRequest<'_>,
        holders: &ExclusiveHolders,
    ) -> Vec<PersonIdx> {
        people
            .iter()
            .copied()
            .filter(|&idx| {
                let person = self.roster.get(idx);
                let reason = if request.taken.contains(&idx) {
                    Some("already assigned this turn")
                } else if request.avoid.contains(&idx) {
                    Some("assigned previous turn")
                } else if request
                    .dates
                    .iter()
                    .any(|&date| self.unavailable.contains(date, &person.id))
                {
                    Some("unavailable")
                } else if request.exclusive
                    && request.dates.iter().any(|&date| holders.holds(date, idx))
                {
                    Some("holds another exclusive duty")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    log_checks!(
                        self.verbosity,
                        "    skip {} for {}: {}",
                        person.id,
                        request.duty.code,
                        reason
                    );
                }
                reason.is_none()
            })
            .collect()
    }

    /// Stages 3 to 5 over an already-computed rotation pool.
    pub fn eligible(
        &self,
        pool: &[PersonIdx],
        request: &SlotRequest<'_>,
        holders: &ExclusiveHolders,
    ) -> EligibleList {
        let capable = capability_stage(self.roster, pool, request.duty.required_tag);
        let available = self.availability_stage(&capable, request, holders);
        preference_stage(self.roster, available, request.duty.preferred_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DutyFamily, Person};

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn roster() -> Roster {
        Roster::new(vec![
            Person::new("p0", 0)
                .in_pool(PoolFlag::General)
                .tagged(CapabilityTag::Mri),
            Person::new("p1", 1)
                .in_pool(PoolFlag::General)
                .in_pool(PoolFlag::Interventional)
                .tagged(CapabilityTag::Mri)
                .tagged(CapabilityTag::NorthGeneral),
            Person::new("p2", 2)
                .in_pool(PoolFlag::General)
                .tagged(CapabilityTag::NorthGeneral),
            Person::new("p3", 3)
                .in_pool(PoolFlag::General)
                .tagged(CapabilityTag::Mri),
            Person::new("p4", 4).in_pool(PoolFlag::Inpatient),
        ])
        .unwrap()
    }

    fn request<'a>(duty: &'a DutyType, dates: &'a [NaiveDate]) -> SlotRequest<'a> {
        SlotRequest {
            duty,
            dates,
            exclusive: duty.exclusive,
            taken: &[],
            avoid: &[],
        }
    }

    #[test]
    fn test_rotation_pool_applies_exclusion_gate() {
        let roster = roster();
        let unavailable = Unavailability::new();
        let pipeline = EligibilityPipeline::new(&roster, &unavailable, 0);

        let block = Block::new("gen", 1, PoolFlag::General, &["Gen"]);
        assert_eq!(pipeline.rotation_pool(&block), vec![0, 1, 2, 3]);

        let block = block.excluding(PoolFlag::Interventional);
        assert_eq!(pipeline.rotation_pool(&block), vec![0, 2, 3]);
    }

    #[test]
    fn test_capability_gate() {
        let roster = roster();
        let unavailable = Unavailability::new();
        let pipeline = EligibilityPipeline::new(&roster, &unavailable, 0);
        let duty = DutyType::new("MRI", 1.0, 8.0, DutyFamily::Subspecialty)
            .requires(CapabilityTag::Mri);
        let dates = [d(2026, 3, 2)];

        let eligible = pipeline.eligible(
            &[0, 1, 2, 3],
            &request(&duty, &dates),
            &ExclusiveHolders::new(),
        );
        assert_eq!(eligible.members, vec![0, 1, 3]);
    }

    #[test]
    fn test_availability_gate() {
        let roster = roster();
        let date = d(2026, 3, 2);
        let unavailable: Unavailability = [(date, "p1")].into_iter().collect();
        let pipeline = EligibilityPipeline::new(&roster, &unavailable, 0);
        let duty = DutyType::new("Gen", 1.0, 8.0, DutyFamily::General);
        let dates = [date];

        let mut holders = ExclusiveHolders::new();
        holders.record(date, 2);

        let eligible = pipeline.eligible(&[0, 1, 2, 3], &request(&duty, &dates), &holders);
        assert_eq!(eligible.members, vec![0, 3]);

        // Concurrent duties ignore exclusive holders
        let duty = duty.concurrent();
        let eligible = pipeline.eligible(&[0, 1, 2, 3], &request(&duty, &dates), &holders);
        assert_eq!(eligible.members, vec![0, 2, 3]);
    }

    #[test]
    fn test_weekend_pair_checks_both_days() {
        let roster = roster();
        let sat = d(2026, 3, 7);
        let sun = d(2026, 3, 8);
        let unavailable: Unavailability = [(sun, "p0")].into_iter().collect();
        let pipeline = EligibilityPipeline::new(&roster, &unavailable, 0);
        let duty = DutyType::new("Wknd", 1.0, 8.0, DutyFamily::Subspecialty);
        let dates = [sat, sun];

        let eligible = pipeline.eligible(&[0, 2], &request(&duty, &dates), &ExclusiveHolders::new());
        assert_eq!(eligible.members, vec![2]);
    }

    #[test]
    fn test_taken_and_avoid() {
        let roster = roster();
        let unavailable = Unavailability::new();
        let pipeline = EligibilityPipeline::new(&roster, &unavailable, 0);
        let duty = DutyType::new("Gen", 1.0, 8.0, DutyFamily::General).concurrent();
        let dates = [d(2026, 3, 2)];
        let req = SlotRequest {
            taken: &[0],
            avoid: &[3],
            ..request(&duty, &dates)
        };

        let eligible = pipeline.eligible(&[0, 1, 2, 3], &req, &ExclusiveHolders::new());
        assert_eq!(eligible.members, vec![1, 2]);
    }

    #[test]
    fn test_preference_sort_is_stable_and_keeps_everyone() {
        let roster = roster();
        let unavailable = Unavailability::new();
        let pipeline = EligibilityPipeline::new(&roster, &unavailable, 0);
        let duty = DutyType::new("Enc-Gen", 1.0, 8.0, DutyFamily::General)
            .prefers(CapabilityTag::NorthGeneral);
        let dates = [d(2026, 3, 2)];

        let eligible = pipeline.eligible(&[0, 1, 2, 3], &request(&duty, &dates), &ExclusiveHolders::new());
        assert_eq!(eligible.members, vec![1, 2, 0, 3]);
        assert_eq!(eligible.preferred, 2);
        assert_eq!(eligible.preferred_members(), &[1, 2]);
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let roster = roster();
        let date = d(2026, 3, 2);
        let unavailable: Unavailability = [(date, "p4")].into_iter().collect();
        let pipeline = EligibilityPipeline::new(&roster, &unavailable, 0);
        let block = Block::new("m", 1, PoolFlag::Inpatient, &["M1"]);
        let duty = DutyType::new("M1", 1.0, 8.0, DutyFamily::Inpatient);
        let dates = [date];

        let pool = pipeline.rotation_pool(&block);
        let eligible = pipeline.eligible(&pool, &request(&duty, &dates), &ExclusiveHolders::new());
        assert!(eligible.is_empty());
    }

    #[test]
    fn test_holders_sorted() {
        let mut holders = ExclusiveHolders::new();
        holders.record(d(2026, 3, 3), 2);
        holders.record(d(2026, 3, 2), 4);
        holders.record(d(2026, 3, 2), 1);
        assert_eq!(
            holders.sorted(),
            vec![(d(2026, 3, 2), vec![1, 4]), (d(2026, 3, 3), vec![2])]
        );
    }
}

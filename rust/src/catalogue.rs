//! Built-in duty table and block list for the radiology group deployment.

use chrono::Weekday;

use crate::config::SchedulingConfig;
use crate::models::{Block, CapabilityTag, CycleRule, DutyFamily, DutyType, PoolFlag, WeekdaySet};

fn full_day(code: &str, family: DutyFamily) -> DutyType {
    DutyType::new(code, 1.0, 8.0, family).on(WeekdaySet::WEEKDAYS)
}

fn outpatient(code: &str, tag: CapabilityTag) -> DutyType {
    full_day(code, DutyFamily::Subspecialty)
        .requires(tag)
        .drawn_from(PoolFlag::General)
}

fn weekend(code: &str, weight: f64, hours: f64) -> DutyType {
    DutyType::new(code, weight, hours, DutyFamily::Weekend).on(WeekdaySet::WEEKEND)
}

/// Every duty the standard blocks reference.
pub fn duties() -> Vec<DutyType> {
    use CapabilityTag::*;

    vec![
        // Inpatient (non-interventional staff)
        DutyType::new("M0", 0.25, 2.0, DutyFamily::Inpatient)
            .on(WeekdaySet::WEEKDAYS)
            .concurrent(),
        full_day("M1", DutyFamily::Inpatient),
        full_day("M2", DutyFamily::Inpatient),
        DutyType::new("M3", 0.75, 6.0, DutyFamily::Inpatient).on(WeekdaySet::WEEKDAYS),
        // Interventional
        full_day("IR-1", DutyFamily::Interventional).requires(Interventional),
        full_day("IR-2", DutyFamily::Interventional).requires(Interventional),
        full_day("IR-CALL", DutyFamily::Interventional).requires(Interventional),
        // Weekend inpatient
        weekend("M0_WEEKEND", 0.25, 2.0).concurrent(),
        weekend("EP", 0.81, 6.5),
        weekend("Dx-CALL", 1.0, 8.0),
        // General; one slot from each gen block
        full_day("Remote-Gen", DutyFamily::General)
            .requires(General)
            .max_per_date(2),
        full_day("Enc-Gen", DutyFamily::General).requires(General),
        full_day("Poway-Gen", DutyFamily::General).requires(General),
        full_day("NC-Gen", DutyFamily::General).requires(General),
        // Remote and site outpatient
        outpatient("Remote-MRI", Mri),
        outpatient("Remote-Breast", Mammography),
        outpatient("Remote-PET", Pet),
        outpatient("Wash-MRI", Mri),
        outpatient("Enc-MRI", Mri),
        outpatient("Poway-MRI", Mri),
        outpatient("Wash-Breast", Mammography),
        outpatient("Enc-Breast", Mammography),
        outpatient("Poway-PET", Pet),
        outpatient("O'Toole", Mammography)
            .drawn_from(PoolFlag::Breast)
            .on(WeekdaySet::from_days(&[Weekday::Tue, Weekday::Wed, Weekday::Fri])),
        // Weekend outpatient
        DutyType::new("Wknd-MRI", 1.0, 8.0, DutyFamily::Subspecialty)
            .on(WeekdaySet::WEEKEND)
            .requires(Mri)
            .drawn_from(PoolFlag::General),
        DutyType::new("Wknd-PET", 1.0, 8.0, DutyFamily::Subspecialty)
            .on(WeekdaySet::WEEKEND)
            .requires(Pet)
            .drawn_from(PoolFlag::General),
    ]
}

/// The standard blocks in priority order.
///
/// National City Gen alternates Mon/Wed/Fri and Tue/Thu weeks when
/// `config.cycle_anchor` is set, and runs every weekday otherwise.
pub fn blocks(config: &SchedulingConfig) -> Vec<Block> {
    use PoolFlag::*;

    let non_ir = |id: &str, priority: u32, pool: PoolFlag, duties: &[&str]| {
        Block::new(id, priority, pool, duties).excluding(Interventional)
    };

    let mut nc_gen = Block::new("nc_gen", 19, General, &["NC-Gen"])
        .labelled("NC Gen")
        .shares_cursor("site_gen");
    if let Some(anchor) = config.cycle_anchor {
        nc_gen = nc_gen.cycle(CycleRule {
            anchor,
            even_weeks: WeekdaySet::from_days(&[Weekday::Mon, Weekday::Wed, Weekday::Fri]),
            odd_weeks: WeekdaySet::from_days(&[Weekday::Tue, Weekday::Thu]),
        });
    }

    vec![
        Block::new("ir_weekday", 1, Interventional, &["IR-1", "IR-2"]).labelled("IR-1 / IR-2"),
        Block::new("ir_call", 2, Interventional, &["IR-CALL"]).labelled("IR-CALL"),
        non_ir("m3_weekday", 3, Inpatient, &["M3"]).labelled("M3 Evening"),
        non_ir("m0_weekday", 4, Inpatient, &["M0"]).labelled("M0 Helper"),
        non_ir("m1m2_weekday", 5, Inpatient, &["M1", "M2"]).labelled("M1 + M2"),
        non_ir("gen_nonir", 6, General, &["Remote-Gen"]).labelled("Remote Gen (non-IR)"),
        Block::new("gen_ir", 7, Interventional, &["Remote-Gen"]).labelled("Remote Gen (IR staff)"),
        non_ir("remote_mri", 8, General, &["Remote-MRI"]).labelled("Remote MRI"),
        Block::new("remote_breast", 9, General, &["Remote-Breast"]).labelled("Remote Breast"),
        non_ir("remote_pet", 10, General, &["Remote-PET"]).labelled("Remote PET"),
        non_ir("wash_mri", 11, General, &["Wash-MRI"])
            .labelled("Washington MRI")
            .shares_cursor("site_mri"),
        non_ir("enc_mri", 12, General, &["Enc-MRI"])
            .labelled("Encinitas MRI")
            .shares_cursor("site_mri"),
        non_ir("poway_mri", 13, General, &["Poway-MRI"])
            .labelled("Poway MRI")
            .shares_cursor("site_mri"),
        Block::new("wash_breast", 14, General, &["Wash-Breast"])
            .labelled("Washington Breast")
            .shares_cursor("site_breast"),
        non_ir("enc_breast", 15, General, &["Enc-Breast"])
            .labelled("Encinitas Breast")
            .shares_cursor("site_breast"),
        non_ir("poway_pet", 16, General, &["Poway-PET"])
            .labelled("Poway PET")
            .shares_cursor("site_pet"),
        Block::new("enc_gen", 17, General, &["Enc-Gen"])
            .labelled("Encinitas Gen")
            .shares_cursor("site_gen"),
        Block::new("poway_gen", 18, General, &["Poway-Gen"])
            .labelled("Poway Gen")
            .shares_cursor("site_gen"),
        nc_gen,
        Block::new("otoole", 20, Breast, &["O'Toole"])
            .labelled("O'Toole")
            .on(WeekdaySet::from_days(&[Weekday::Tue, Weekday::Wed, Weekday::Fri])),
        non_ir("inpatient_weekend", 21, Weekend, &["M0_WEEKEND", "EP", "Dx-CALL"])
            .labelled("Weekend Inpatient (M0/EP/Dx-CALL)")
            .weekend_pair()
            .avoid_previous(),
        non_ir("wknd_mri", 22, General, &["Wknd-MRI"])
            .labelled("Weekend MRI")
            .weekend_pair(),
        non_ir("wknd_pet", 23, General, &["Wknd-PET"])
            .labelled("Weekend PET")
            .weekend_pair(),
    ]
}

/// Duties and blocks together.
pub fn standard(config: &SchedulingConfig) -> (Vec<DutyType>, Vec<Block>) {
    (duties(), blocks(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintChecker;
    use crate::models::{Person, Unavailability};
    use crate::roster::Roster;
    use crate::scheduler::{BlockOrchestrator, RunScope};
    use chrono::{Datelike, NaiveDate};
    use std::collections::{BTreeMap, BTreeSet};

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn group() -> Roster {
        let mut people = Vec::new();
        for i in 0..3 {
            people.push(
                Person::new(format!("ir{}", i), i)
                    .in_pool(PoolFlag::Interventional)
                    .in_pool(PoolFlag::General)
                    .tagged(CapabilityTag::Interventional)
                    .tagged(CapabilityTag::General),
            );
        }
        for i in 3..15 {
            let mut p = Person::new(format!("dx{}", i), i)
                .in_pool(PoolFlag::Inpatient)
                .in_pool(PoolFlag::Weekend)
                .in_pool(PoolFlag::General)
                .tagged(CapabilityTag::General);
            p = match i % 3 {
                0 => p.tagged(CapabilityTag::Mri),
                1 => p.tagged(CapabilityTag::Pet),
                _ => p.tagged(CapabilityTag::Mammography).in_pool(PoolFlag::Breast),
            };
            people.push(p);
        }
        Roster::new(people).unwrap()
    }

    #[test]
    fn test_catalogue_is_well_formed() {
        let config = SchedulingConfig::default();
        let (duties, blocks) = standard(&config);
        let roster = group();
        let orchestrator = BlockOrchestrator::new(&roster, &duties, &blocks, &config).unwrap();

        let priorities: Vec<u32> = orchestrator.blocks().iter().map(|b| b.priority).collect();
        assert_eq!(priorities, (1..=23).collect::<Vec<u32>>());
        assert!(duties.iter().all(|d| d.validate().is_ok()));
    }

    #[test]
    fn test_cursor_keys() {
        let blocks = blocks(&SchedulingConfig::default());
        let keys: BTreeSet<&str> = blocks.iter().map(|b| b.cursor_key()).collect();
        assert!(keys.contains("site_mri"));
        assert!(keys.contains("site_gen"));
        assert!(!keys.contains("wash_mri"));
        assert_eq!(keys.len(), 18);
    }

    #[test]
    fn test_nc_gen_cycle_follows_anchor() {
        let with = blocks(&SchedulingConfig::default());
        let nc = with.iter().find(|b| b.id == "nc_gen").unwrap();
        // Anchor week: Mon/Wed/Fri
        let rule = nc.cycle.as_ref().unwrap();
        assert!(rule.allows(d(2026, 3, 2)));
        assert!(!rule.allows(d(2026, 3, 3)));
        assert!(rule.allows(d(2026, 3, 10)));

        let mut config = SchedulingConfig::default();
        config.cycle_anchor = None;
        let without = blocks(&config);
        assert!(without.iter().find(|b| b.id == "nc_gen").unwrap().cycle.is_none());
    }

    #[test]
    fn test_standard_run_has_no_hard_violations() {
        let config = SchedulingConfig::default();
        let (duties, blocks) = standard(&config);
        let roster = group();
        let unavailable: Unavailability = [
            (d(2026, 3, 3), "dx4"),
            (d(2026, 3, 4), "dx4"),
            (d(2026, 3, 7), "dx6"),
            (d(2026, 3, 10), "ir1"),
        ]
        .into_iter()
        .collect();

        let orchestrator = BlockOrchestrator::new(&roster, &duties, &blocks, &config).unwrap();
        let outcome = orchestrator
            .run(
                d(2026, 3, 2),
                d(2026, 3, 15),
                &BTreeMap::new(),
                &unavailable,
                &RunScope::Full,
            )
            .unwrap();

        let checker = ConstraintChecker::new(&roster, &unavailable, &duties, &config);
        let (hard, _) = checker.check_all(&outcome.schedule);
        assert!(hard.is_empty(), "{:?}", hard);

        // O'Toole only on Tue/Wed/Fri
        for (date, code, _) in outcome.schedule.assignments() {
            if code == "O'Toole" {
                assert!(matches!(date.weekday(), Weekday::Tue | Weekday::Wed | Weekday::Fri));
            }
        }
    }
}

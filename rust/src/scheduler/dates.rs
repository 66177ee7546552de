//! Candidate date lists per block.
//!
//! A block's turns are the dates in the requested range that pass its weekday
//! set and its optional two-week cycle. Weekend-pair blocks take one turn per
//! Saturday that writes both Saturday and Sunday.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::models::Block;

/// One rotation turn: the date eligibility is evaluated for, and every date it fills.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub date: NaiveDate,
    /// `dates[0] == date`; a mirrored weekend turn also carries the Sunday.
    pub dates: Vec<NaiveDate>,
}

impl Turn {
    fn single(date: NaiveDate) -> Self {
        Self {
            date,
            dates: vec![date],
        }
    }
}

/// Inclusive date range; empty when `start > end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Dates the block is restricted to, before weekend pairing.
fn block_allows(block: &Block, date: NaiveDate) -> bool {
    block.weekdays.contains_date(date)
        && block.cycle.as_ref().map_or(true, |rule| rule.allows(date))
}

/// The block's turns within `[start, end]`, in date order.
///
/// For a mirrored block, a Sunday whose Saturday lies before `start` is its
/// own turn, and a Saturday whose Sunday lies after `end` fills only itself.
pub fn block_turns(block: &Block, start: NaiveDate, end: NaiveDate) -> Vec<Turn> {
    let mut turns = Vec::new();
    for date in date_range(start, end) {
        if !block_allows(block, date) {
            continue;
        }
        if !block.mirror_weekend {
            turns.push(Turn::single(date));
            continue;
        }
        match date.weekday() {
            Weekday::Sat => {
                let mut turn = Turn::single(date);
                if let Some(sunday) = date.checked_add_days(Days::new(1)) {
                    if sunday <= end && block.weekdays.contains_date(sunday) {
                        turn.dates.push(sunday);
                    }
                }
                turns.push(turn);
            }
            Weekday::Sun if date == start => turns.push(Turn::single(date)),
            Weekday::Sun => {
                // Covered by Saturday's turn unless Saturday was filtered out
                let saturday = date.checked_sub_days(Days::new(1));
                if saturday.map_or(true, |sat| !block_allows(block, sat)) {
                    turns.push(Turn::single(date));
                }
            }
            _ => turns.push(Turn::single(date)),
        }
    }
    turns
}

/// Saturday of the weekend containing `date` (identity for non-weekend dates).
pub fn weekend_key(date: NaiveDate) -> NaiveDate {
    if date.weekday() == Weekday::Sun {
        date.checked_sub_days(Days::new(1)).unwrap_or(date)
    } else {
        date
    }
}

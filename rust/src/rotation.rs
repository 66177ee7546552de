//! Weighted rotation engine.
//!
//! A block's cursor is a fractional position in the infinite, circular stream
//! formed by repeating its rotation pool. Selection walks the *full* pool from
//! `floor(cursor) mod N` and accepts the first eligible person, so people
//! skipped for unavailability keep their place in the stream. The cursor then
//! advances by the assigned duty's weight, never by a fixed unit: four 0.25
//! assignments displace the stream exactly as far as one 1.0 assignment.

use rustc_hash::FxHashSet;

use crate::eligibility::EligibleList;
use crate::interner::PersonIdx;

/// The probe walks at most this many laps of the pool per call.
pub const PROBE_LAPS: usize = 2;

/// Outcome of one `select` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    /// `None` is an unfilled slot.
    pub person: Option<PersonIdx>,
    /// Cursor after the call (unchanged when `person` is `None`).
    pub cursor: f64,
    /// Pool positions inspected.
    pub probes: usize,
}

/// Stream position the probe starts from.
#[inline]
pub fn start_position(cursor: f64, pool_len: usize) -> usize {
    debug_assert!(pool_len > 0);
    (cursor.floor() as u64 % pool_len as u64) as usize
}

/// Pick the next assignee for one slot.
///
/// * `pool` - the block's rotation pool in roster order (defines N)
/// * `eligible` - output of the eligibility pipeline for this slot
/// * `cursor` - the block's current cursor
/// * `weight` - weight of the duty being filled
///
/// Preferred members win over anyone else reachable; the first eligible
/// member seen is the fallback. Both tiers share one walk of at most
/// `PROBE_LAPS * N` positions.
pub fn select(pool: &[PersonIdx], eligible: &EligibleList, cursor: f64, weight: f64) -> Selection {
    if pool.is_empty() || eligible.is_empty() {
        return Selection {
            person: None,
            cursor,
            probes: 0,
        };
    }

    let n = pool.len();
    let start = start_position(cursor, n);
    let tiered = eligible.preferred > 0 && eligible.preferred < eligible.len();
    let first: FxHashSet<PersonIdx> = if tiered {
        eligible.preferred_members().iter().copied().collect()
    } else {
        eligible.members.iter().copied().collect()
    };
    let rest: FxHashSet<PersonIdx> = if tiered {
        eligible.members.iter().copied().collect()
    } else {
        FxHashSet::default()
    };

    let mut fallback = None;
    let mut probes = 0;
    for step in 0..PROBE_LAPS * n {
        probes = step + 1;
        let candidate = pool[(start + step) % n];
        if first.contains(&candidate) {
            return Selection {
                person: Some(candidate),
                cursor: cursor + weight,
                probes,
            };
        }
        if fallback.is_none() && rest.contains(&candidate) {
            fallback = Some(candidate);
        }
        // A full lap has seen every position
        if fallback.is_some() && probes >= n {
            break;
        }
    }

    Selection {
        person: fallback,
        cursor: if fallback.is_some() { cursor + weight } else { cursor },
        probes,
    }
}

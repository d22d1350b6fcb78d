//! Contest date arithmetic on the weekly siege slot

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::stronghold::SiegeSlot;

/// Move `date` forward (0 to 6 days) onto the slot weekday at the slot time
pub fn snap_to_slot(date: DateTime<Utc>, slot: SiegeSlot) -> DateTime<Utc> {
    let day = date.date_naive();
    let offset = (i64::from(slot.day.num_days_from_monday())
        - i64::from(day.weekday().num_days_from_monday()))
    .rem_euclid(7);
    (day + Duration::days(offset)).and_time(slot.time).and_utc()
}

/// Advance `date` by whole cycles until it lies strictly after `now`
///
/// Every step snaps back onto the slot first, so a date that drifted off
/// the stronghold's weekday or hour is repaired on the way.
pub fn roll_forward(
    date: DateTime<Utc>,
    now: DateTime<Utc>,
    slot: SiegeSlot,
    cycle: Duration,
) -> DateTime<Utc> {
    let mut date = date;
    if cycle <= Duration::zero() {
        return date.max(now);
    }
    // Skip the bulk of a long outage in one step
    let gap = now - date;
    if gap > cycle {
        let cycles = gap.num_seconds() / cycle.num_seconds() - 1;
        if cycles > 0 {
            date += Duration::seconds(cycle.num_seconds() * cycles);
        }
    }
    while date <= now {
        date = snap_to_slot(date, slot) + cycle;
    }
    date
}

/// Contest date to resume from after a restart
///
/// A stronghold that was never scheduled gets its first date one full cycle
/// after the next slot occurrence.
pub fn initial_date(
    stored: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    slot: SiegeSlot,
    cycle: Duration,
) -> DateTime<Utc> {
    match stored {
        Some(date) => date,
        None => roll_forward(now, now, slot, cycle),
    }
}

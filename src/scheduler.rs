//! SM-2 review scheduling.
//!
//! Quality grades 0-2 are lapses: the repetition streak is discarded and the
//! item comes back the next day. Grades 3-5 grow the interval 1 → 6 → the
//! previous interval times the previous easiness factor. The easiness factor
//! is adjusted on every grade and never drops below 1.3.
//!
//! Interval products are rounded half away from zero (`f64::round`), so
//! `5 * 2.5 = 12.5` schedules 13 days out.

use chrono::{Days, NaiveDate};

use crate::models::{Quality, ReviewItem, MIN_EASINESS};

/// Longest interval the scheduler will hand out, in days.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Latest date a review can be scheduled for. Dates are persisted as ISO-8601
/// text, which only sorts chronologically for four-digit years.
pub fn last_schedulable_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Easiness delta for a grade: `0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)`.
pub fn easiness_delta(quality: Quality) -> f64 {
    let miss = 5.0 - quality.as_u8() as f64;
    0.1 - miss * (0.08 + miss * 0.02)
}

/// Apply one grading event to `state`, as of `today`.
pub fn advance(state: &ReviewItem, quality: Quality, today: NaiveDate) -> ReviewItem {
    let (repetitions, interval) = if quality.is_success() {
        let interval = match state.repetitions {
            0 => 1,
            1 => 6,
            _ => grow_interval(state.interval, state.easiness_factor),
        };
        (state.repetitions.saturating_add(1), interval)
    } else {
        (0, 1)
    };

    let easiness_factor = (state.easiness_factor + easiness_delta(quality)).max(MIN_EASINESS);

    // Keep the derived date representable.
    let max_for_today = max_interval_from(today);

    ReviewItem {
        easiness_factor,
        repetitions,
        interval: interval.min(max_for_today).max(1),
        last_review_date: Some(today),
    }
}

fn grow_interval(previous: u32, easiness: f64) -> u32 {
    let grown = (previous as f64 * easiness).round();
    if grown >= MAX_INTERVAL_DAYS as f64 {
        MAX_INTERVAL_DAYS
    } else {
        (grown as u32).max(1)
    }
}

fn max_interval_from(today: NaiveDate) -> u32 {
    match today.checked_add_days(Days::new(MAX_INTERVAL_DAYS as u64)) {
        Some(d) if d <= last_schedulable_date() => return MAX_INTERVAL_DAYS,
        _ => {}
    }
    (last_schedulable_date() - today)
        .num_days()
        .clamp(1, MAX_INTERVAL_DAYS as i64) as u32
}

/// Replay a sequence of grading events from the seed state.
pub fn replay<I>(events: I) -> ReviewItem
where
    I: IntoIterator<Item = (Quality, NaiveDate)>,
{
    events
        .into_iter()
        .fold(ReviewItem::default(), |state, (quality, day)| {
            advance(&state, quality, day)
        })
}

/// Interval each grade would produce from `state`, indexed by quality.
pub fn preview(state: &ReviewItem, today: NaiveDate) -> [(Quality, u32); 6] {
    Quality::ALL.map(|q| (q, advance(state, q, today).interval))
}

/// Format an interval in days to a short human-readable string.
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{}d", days),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}

pub mod dashboard;
pub mod item_detail;
pub mod queue;
pub mod schedule;

use chrono::NaiveDate;
use ratatui::style::Color;

pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Easiness as a five-cell bar, 1.3 empty and 2.5 or higher full.
pub(crate) fn easiness_bar(ef: f64) -> String {
    let filled = (((ef - 1.3) / 1.2) * 5.0).round().clamp(0.0, 5.0) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(5 - filled))
}

pub(crate) fn due_color(next: NaiveDate, today: NaiveDate) -> Color {
    if next < today {
        Color::Red
    } else if next == today {
        Color::Yellow
    } else {
        Color::White
    }
}

pub(crate) fn format_due(next: NaiveDate, today: NaiveDate) -> String {
    let days = (next - today).num_days();
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        d if d < 0 => format!("{} ({}d late)", next.format("%b %d"), -d),
        _ => next.format("%b %d").to_string(),
    }
}

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use super::{due_color, format_due, truncate};
use crate::tui::App;
use cadence::scheduler::format_interval;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .schedule
        .items
        .iter()
        .map(|s| {
            let last = s
                .item
                .last_review_date
                .map(|d| d.format("%b %d").to_string())
                .unwrap_or_else(|| "-".to_string());

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<30}", truncate(&s.concept_name, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<18}", format_due(s.next_review_date, app.today)),
                    Style::default().fg(due_color(s.next_review_date, app.today)),
                ),
                Span::styled(
                    format!("{:<12}", format_interval(s.item.interval)),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(last, Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Schedule ({} items) ", app.schedule.items.len()))
        .title_style(Style::default().fg(Color::Cyan));

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.schedule.selected);

    f.render_stateful_widget(list, area, &mut state);
}

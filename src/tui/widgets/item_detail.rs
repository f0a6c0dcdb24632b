use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{due_color, easiness_bar, format_due};
use crate::tui::App;
use cadence::models::DueItem;
use cadence::scheduler::format_interval;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(due) = &app.detail else {
        let block = Block::default().borders(Borders::ALL).title(" Item ");
        let paragraph = Paragraph::new("No item selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // State
            Constraint::Length(8), // Grade preview
            Constraint::Min(0),    // History
        ])
        .split(area);

    draw_state(f, app, due, chunks[0]);
    draw_preview(f, app, chunks[1]);
    draw_history(f, app, chunks[2]);
}

fn draw_state(f: &mut Frame, app: &App, due: &DueItem, area: Rect) {
    let label = Style::default().fg(Color::Gray);
    let item = &due.item;
    let last = item
        .last_review_date
        .map(|d| d.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Never".to_string());

    let text = vec![
        Line::from(vec![
            Span::styled("Easiness: ", label),
            Span::styled(
                easiness_bar(item.easiness_factor),
                Style::default().fg(Color::Green),
            ),
            Span::styled(
                format!(" {:.2}", item.easiness_factor),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("  "),
            Span::styled("Streak: ", label),
            Span::styled(
                format!("{}", item.repetitions),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(vec![
            Span::styled("Interval: ", label),
            Span::styled(format_interval(item.interval), Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled("Last: ", label),
            Span::styled(last, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Next: ", label),
            Span::styled(
                format_due(due.next_review_date, app.today),
                Style::default().fg(due_color(due.next_review_date, app.today)),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", due.concept_name))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_preview(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .detail_preview
        .iter()
        .map(|(quality, days)| {
            let color = if quality.is_success() {
                Color::Green
            } else {
                Color::Red
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", quality.as_u8()), Style::default().fg(Color::Cyan)),
                Span::styled(format!("{:<12}", quality.label()), Style::default().fg(color)),
                Span::styled(format_interval(*days), Style::default().fg(Color::White)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" If graded on {} ", app.today))
        .title_style(Style::default().fg(Color::Cyan));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn draw_history(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .detail_history
        .iter()
        .rev()
        .map(|entry| {
            let color = if entry.quality.is_success() {
                Color::Green
            } else {
                Color::Red
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<12}", entry.reviewed_on.format("%b %d, %Y").to_string()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{} {:<12}", entry.quality.as_u8(), entry.quality.label()),
                    Style::default().fg(color),
                ),
                Span::styled(
                    format!("{:<12}", format_interval(entry.interval)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:.2}", entry.easiness_factor),
                    Style::default().fg(Color::Yellow),
                ),
            ]))
        })
        .collect();

    let title = if items.is_empty() {
        " History (none) ".to_string()
    } else {
        format!(" History ({}) ", items.len())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Magenta));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

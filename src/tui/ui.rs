use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{dashboard, item_detail, queue, schedule};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status line
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_status(f, app, chunks[2]);
    draw_help_bar(f, app, chunks[3]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let tab_titles = vec![
        "Dashboard".to_string(),
        format!("Queue ({})", app.queue.items.len()),
        "Schedule".to_string(),
    ];
    let selected = match app.view {
        View::Dashboard => 0,
        View::Queue => 1,
        View::Schedule => 2,
        View::ItemDetail => match app.detail_return {
            View::Schedule => 2,
            _ => 1,
        },
    };

    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Cadence: {} ({}) ", app.user.name, app.today)),
        )
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Dashboard => dashboard::draw(f, app, area),
        View::Queue => queue::draw(f, app, area),
        View::Schedule => schedule::draw(f, app, area),
        View::ItemDetail => item_detail::draw(f, app, area),
    }
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let line = match &app.status {
        Some(msg) => Line::from(Span::styled(msg.as_str(), Style::default().fg(Color::Green))),
        None => Line::from(""),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let key = Style::default().fg(Color::Cyan);

    let mut spans = vec![Span::styled("h/l", key), Span::raw(" Views  ")];

    match app.view {
        View::Dashboard => {
            spans.extend(vec![Span::styled("^r", key), Span::raw(" Refresh  ")]);
        }
        View::Queue => {
            spans.extend(vec![
                Span::styled("j/k", key),
                Span::raw(" Nav  "),
                Span::styled("0-5", key),
                Span::raw(" Grade  "),
                Span::styled("<CR>", key),
                Span::raw(" Open  "),
            ]);
        }
        View::Schedule => {
            spans.extend(vec![
                Span::styled("j/k", key),
                Span::raw(" Nav  "),
                Span::styled("g/G", key),
                Span::raw(" Top/Bot  "),
                Span::styled("l/<CR>", key),
                Span::raw(" Open  "),
            ]);
        }
        View::ItemDetail => {
            spans.extend(vec![Span::styled("h/<Esc>", key), Span::raw(" Back  ")]);
        }
    }

    spans.extend(vec![Span::styled("q", key), Span::raw(" Quit")]);

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}

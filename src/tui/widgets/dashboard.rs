use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{due_color, easiness_bar, format_due, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9), // Stats + due row
            Constraint::Min(0),    // Upcoming
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    draw_stats(f, app, top_chunks[0]);
    draw_due(f, app, top_chunks[1]);
    draw_upcoming(f, app, chunks[1]);
}

fn draw_stats(f: &mut Frame, app: &App, area: Rect) {
    let label = Style::default().fg(Color::Gray);
    let due_now = app.queue.items.len();

    let mut text = match &app.performance {
        Some(p) => vec![
            Line::from(vec![
                Span::styled("Sessions: ", label),
                Span::styled(
                    format!("{}", p.quizzes_completed),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Answered: ", label),
                Span::styled(
                    format!(
                        "{} ({} correct)",
                        p.total_questions_answered, p.total_correct_answers
                    ),
                    Style::default().fg(Color::White),
                ),
            ]),
            Line::from(vec![
                Span::styled("Avg Score: ", label),
                Span::styled(
                    format!("{:.2}", p.average_score),
                    Style::default().fg(Color::Cyan),
                ),
            ]),
            Line::from(vec![
                Span::styled("Accuracy: ", label),
                Span::styled(
                    format!("{:.1}%", p.overall_accuracy),
                    Style::default().fg(if p.overall_accuracy >= 70.0 {
                        Color::Green
                    } else if p.overall_accuracy >= 50.0 {
                        Color::Yellow
                    } else {
                        Color::Red
                    }),
                ),
            ]),
        ],
        None => vec![Line::from(Span::styled(
            "No graded attempts yet",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    text.push(Line::from(vec![
        Span::styled("Due: ", label),
        Span::styled(
            format!("{}", due_now),
            Style::default().fg(if due_now > 0 {
                Color::Yellow
            } else {
                Color::White
            }),
        ),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Performance ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_due(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .queue
        .items
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, due)| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    truncate(&due.concept_name, 20),
                    Style::default().fg(due_color(due.next_review_date, app.today)),
                ),
                Span::raw(" "),
                Span::styled(
                    easiness_bar(due.item.easiness_factor),
                    Style::default().fg(Color::Green),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Due Now ")
        .title_style(Style::default().fg(Color::Yellow));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn draw_upcoming(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .schedule
        .items
        .iter()
        .filter(|s| s.next_review_date > app.today)
        .take(area.height.saturating_sub(2) as usize)
        .map(|s| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<12}", format_due(s.next_review_date, app.today)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<30}", truncate(&s.concept_name, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("streak {}", s.item.repetitions),
                    Style::default().fg(Color::Cyan),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Upcoming ")
        .title_style(Style::default().fg(Color::Magenta));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

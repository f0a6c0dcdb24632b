use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{due_color, easiness_bar, format_due, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Review Queue (as of {}) ", app.today))
        .title_style(Style::default().fg(Color::Yellow));

    if app.queue.items.is_empty() {
        let paragraph = Paragraph::new("Nothing due. Come back tomorrow.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .queue
        .items
        .iter()
        .map(|due| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<30}", truncate(&due.concept_name, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    easiness_bar(due.item.easiness_factor),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!(" {:.2} ", due.item.easiness_factor),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(
                    format!("{:<8}", due.item.repetitions),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format_due(due.next_review_date, app.today),
                    Style::default().fg(due_color(due.next_review_date, app.today)),
                ),
            ]))
        })
        .collect();

    let header_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(format!("{:<30}", "Concept"), header_style),
        Span::styled("Easiness    ", header_style),
        Span::styled(format!("{:<8}", "Streak"), header_style),
        Span::styled("Due", header_style),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.queue.selected);

    let header_area = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };

    f.render_stateful_widget(list, list_area, &mut state);
}

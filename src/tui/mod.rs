mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use cadence::db::Database;
use cadence::error::{Entity, SchedError};
use cadence::models::{Attempt, DueItem, Quality, ReviewLogEntry, User, UserPerformance};
use cadence::scheduler;
use cadence::SchedulingService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Queue,
    Schedule,
    ItemDetail,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Queue,
            View::Queue => View::Schedule,
            View::Schedule => View::Dashboard,
            View::ItemDetail => View::Schedule,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Schedule,
            View::Queue => View::Dashboard,
            View::Schedule => View::Queue,
            View::ItemDetail => View::Queue,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    /// Swap in fresh items, keeping the cursor at the same position when possible.
    fn replace(&mut self, items: Vec<T>) {
        self.selected = match (self.selected, items.len()) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        };
        self.items = items;
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i >= self.items.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i == 0 {
                    self.items.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

pub struct App {
    service: SchedulingService<Database>,
    pub user: User,
    pub today: NaiveDate,
    pub view: View,
    pub performance: Option<UserPerformance>,
    pub queue: StatefulList<DueItem>,
    pub schedule: StatefulList<DueItem>,
    pub detail: Option<DueItem>,
    pub detail_history: Vec<ReviewLogEntry>,
    pub detail_preview: Vec<(Quality, u32)>,
    detail_return: View,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        service: SchedulingService<Database>,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let user = service
            .store()
            .get_user(user_id)?
            .ok_or_else(|| SchedError::not_found(Entity::User, user_id))?;
        let performance = service.performance(user_id)?;
        let queue = service.list_due_items(user_id, today)?;
        let schedule = service.schedule(user_id)?;

        Ok(Self {
            service,
            user,
            today,
            view: View::Dashboard,
            performance,
            queue: StatefulList::with_items(queue),
            schedule: StatefulList::with_items(schedule),
            detail: None,
            detail_history: Vec::new(),
            detail_preview: Vec::new(),
            detail_return: View::Queue,
            status: None,
            should_quit: false,
        })
    }

    pub fn refresh_data(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let user_id = self.user.id;
        self.performance = self.service.performance(user_id)?;
        self.queue
            .replace(self.service.list_due_items(user_id, self.today)?);
        self.schedule.replace(self.service.schedule(user_id)?);
        Ok(())
    }

    fn open_detail(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let selected = match self.view {
            View::Queue => self.queue.selected_item(),
            View::Schedule => self.schedule.selected_item(),
            _ => None,
        };
        if let Some(item) = selected.cloned() {
            self.detail_history = self
                .service
                .review_history(self.user.id, item.concept_id)?;
            self.detail_preview = scheduler::preview(&item.item, self.today).to_vec();
            self.detail = Some(item);
            self.detail_return = self.view;
            self.view = View::ItemDetail;
        }
        Ok(())
    }

    fn close_detail(&mut self) {
        self.view = self.detail_return;
        self.detail = None;
        self.detail_history.clear();
        self.detail_preview.clear();
    }

    /// Grade the selected queue item. Rejected grades end up in the status line.
    fn grade_selected(&mut self, quality: Quality) -> Result<(), Box<dyn std::error::Error>> {
        let Some(item) = self.queue.selected_item() else {
            return Ok(());
        };
        let concept_id = item.concept_id;
        let name = item.concept_name.clone();

        match self.service.record_review(
            self.user.id,
            concept_id,
            quality,
            &Attempt::single(quality),
            self.today,
        ) {
            Ok(result) => {
                self.status = Some(format!(
                    "{}: {}, next review {} (in {})",
                    name,
                    quality.label(),
                    result.next_review_date,
                    scheduler::format_interval(result.item.interval)
                ));
            }
            Err(e @ (SchedError::InvalidInput(_) | SchedError::ConcurrencyConflict(_))) => {
                self.status = Some(format!("Not graded: {}", e));
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        self.refresh_data()
    }

    fn handle_key(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
                self.status = Some("Refreshed".to_string());
            }

            // Grades 0-5 apply to the highlighted queue item
            KeyCode::Char(c @ '0'..='5') if self.view == View::Queue => {
                let quality = Quality::from_u8(c as u8 - b'0')?;
                self.grade_selected(quality)?;
            }

            KeyCode::Esc if self.view == View::ItemDetail => self.close_detail(),

            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::ItemDetail => self.close_detail(),
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Queue | View::Schedule => self.open_detail()?,
                View::ItemDetail => {}
                _ => self.view = self.view.next(),
            },

            KeyCode::Tab | KeyCode::BackTab if self.view == View::ItemDetail => {
                self.close_detail();
            }
            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }
            KeyCode::BackTab => {
                self.view = self.view.prev();
            }

            KeyCode::Char('j') | KeyCode::Down => match self.view {
                View::Queue => self.queue.next(),
                View::Schedule => self.schedule.next(),
                _ => {}
            },
            KeyCode::Char('k') | KeyCode::Up => match self.view {
                View::Queue => self.queue.previous(),
                View::Schedule => self.schedule.previous(),
                _ => {}
            },

            KeyCode::Char('g') => match self.view {
                View::Queue => self.queue.first(),
                View::Schedule => self.schedule.first(),
                _ => {}
            },
            KeyCode::Char('G') => match self.view {
                View::Queue => self.queue.last(),
                View::Schedule => self.schedule.last(),
                _ => {}
            },

            KeyCode::Enter => match self.view {
                View::Queue | View::Schedule => self.open_detail()?,
                _ => {}
            },

            _ => {}
        }
        Ok(())
    }
}

pub fn run(
    service: SchedulingService<Database>,
    user_id: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    // Resolve the user before touching the terminal
    let mut app = App::new(service, user_id, Local::now().date_naive())?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn press(app: &mut App, c: char) {
        app.handle_key(KeyCode::Char(c), KeyModifiers::NONE).unwrap();
    }

    /// Two concepts reviewed on 2024-03-01, both due on 2024-03-02.
    fn setup() -> App {
        let db = Database::open(":memory:").unwrap();
        db.init().unwrap();
        let user = db.add_user("ada").unwrap();
        let a = db.add_concept("Borrowing", None).unwrap();
        let b = db.add_concept("Lifetimes", None).unwrap();

        let mut svc = SchedulingService::new(db);
        for concept in [a, b] {
            svc.record_review(user, concept, Quality::Good, &Attempt::single(Quality::Good), date(2024, 3, 1))
                .unwrap();
        }
        App::new(svc, user, date(2024, 3, 2)).unwrap()
    }

    mod stateful_list_tests {
        use super::*;

        #[test]
        fn wraps_in_both_directions() {
            let mut list = StatefulList::with_items(vec![1, 2, 3]);
            list.previous();
            assert_eq!(list.selected, Some(2));
            list.next();
            assert_eq!(list.selected, Some(0));
        }

        #[test]
        fn empty_list_has_no_selection() {
            let mut list: StatefulList<i32> = StatefulList::with_items(vec![]);
            list.next();
            list.last();
            assert_eq!(list.selected, None);
        }

        #[test]
        fn replace_clamps_selection() {
            let mut list = StatefulList::with_items(vec![1, 2, 3]);
            list.last();
            list.replace(vec![1]);
            assert_eq!(list.selected, Some(0));
            list.replace(vec![]);
            assert_eq!(list.selected, None);
        }
    }

    mod app_tests {
        use super::*;

        #[test]
        fn unknown_user_is_rejected() {
            let db = Database::open(":memory:").unwrap();
            db.init().unwrap();
            assert!(App::new(SchedulingService::new(db), 99, date(2024, 3, 2)).is_err());
        }

        #[test]
        fn starts_on_dashboard_with_due_queue() {
            let app = setup();
            assert_eq!(app.view, View::Dashboard);
            assert_eq!(app.queue.items.len(), 2);
            assert_eq!(app.schedule.items.len(), 2);
            assert_eq!(app.performance.as_ref().unwrap().quizzes_completed, 2);
        }

        #[test]
        fn grading_removes_item_from_queue() {
            let mut app = setup();
            press(&mut app, 'l');
            assert_eq!(app.view, View::Queue);

            press(&mut app, '5');
            assert_eq!(app.queue.items.len(), 1);
            assert_eq!(app.queue.items[0].concept_name, "Lifetimes");
            assert_eq!(app.performance.as_ref().unwrap().quizzes_completed, 3);
            assert!(app.status.as_deref().unwrap().starts_with("Borrowing"));
        }

        #[test]
        fn digits_outside_queue_do_nothing() {
            let mut app = setup();
            press(&mut app, '5');
            assert_eq!(app.queue.items.len(), 2);
            assert!(app.status.is_none());
        }

        #[test]
        fn detail_opens_and_returns() {
            let mut app = setup();
            app.view = View::Schedule;
            press(&mut app, 'j');
            app.handle_key(KeyCode::Enter, KeyModifiers::NONE).unwrap();

            assert_eq!(app.view, View::ItemDetail);
            assert_eq!(app.detail.as_ref().unwrap().concept_name, "Lifetimes");
            assert_eq!(app.detail_history.len(), 1);
            assert_eq!(app.detail_preview.len(), 6);

            app.handle_key(KeyCode::Esc, KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Schedule);
            assert!(app.detail.is_none());
        }

        #[test]
        fn tab_out_of_detail_clears_it() {
            let mut app = setup();
            app.view = View::Queue;
            app.handle_key(KeyCode::Enter, KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::ItemDetail);

            app.handle_key(KeyCode::Tab, KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Queue);
            assert!(app.detail.is_none());
            assert!(app.detail_history.is_empty());
            assert!(app.detail_preview.is_empty());

            app.handle_key(KeyCode::Enter, KeyModifiers::NONE).unwrap();
            app.handle_key(KeyCode::BackTab, KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Queue);
            assert!(app.detail.is_none());
        }

        #[test]
        fn view_cycle() {
            let mut app = setup();
            app.handle_key(KeyCode::Tab, KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Queue);
            app.handle_key(KeyCode::Tab, KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Schedule);
            app.handle_key(KeyCode::BackTab, KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Queue);
            press(&mut app, 'q');
            assert!(app.should_quit);
        }
    }
}

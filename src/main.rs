mod tui;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cadence::config::Config;
use cadence::db::Database;
use cadence::models::{Attempt, DueCursor, DueItem, JsonOutput, Quality};
use cadence::scheduler;
use cadence::SchedulingService;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Spaced-repetition scheduling and learner performance tracking")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Database path (overrides CADENCE_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage learners
    #[command(subcommand)]
    User(UserCommands),

    /// Manage reviewable concepts
    #[command(subcommand)]
    Concept(ConceptCommands),

    /// Grade a concept for a learner and reschedule it
    Review {
        /// User ID
        user: i64,

        /// Concept ID
        concept: i64,

        /// Recall quality: 0-5 or blackout/incorrect/recognized/hard/good/perfect
        #[arg(long, short)]
        quality: String,

        /// Session score (requires --questions and --correct)
        #[arg(long)]
        score: Option<f64>,

        /// Questions answered in the session
        #[arg(long)]
        questions: Option<u32>,

        /// Questions answered correctly
        #[arg(long)]
        correct: Option<u32>,

        /// Review date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record a quiz attempt that is not tied to one concept
    Attempt {
        /// User ID
        user: i64,

        #[arg(long)]
        score: f64,

        #[arg(long)]
        questions: u32,

        #[arg(long)]
        correct: u32,

        /// Attempt date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List items due for review
    Due {
        /// User ID
        user: i64,

        /// Cut-off date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        as_of: Option<String>,

        /// Maximum number of items to return
        #[arg(long, short)]
        limit: Option<u32>,

        /// Resume after this due date (use with --after-concept)
        #[arg(long, requires = "after_concept")]
        after_date: Option<String>,

        /// Resume after this concept ID (use with --after-date)
        #[arg(long, requires = "after_date")]
        after_concept: Option<i64>,
    },

    /// Show the scheduling state of one item
    Show {
        /// User ID
        user: i64,

        /// Concept ID
        concept: i64,
    },

    /// Show the review log of one item
    History {
        /// User ID
        user: i64,

        /// Concept ID
        concept: i64,
    },

    /// Show what each grade would schedule for an item
    Preview {
        /// User ID
        user: i64,

        /// Concept ID
        concept: i64,

        /// Review date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show a learner's performance statistics
    Stats {
        /// User ID
        user: i64,
    },

    /// Recompute a learner's statistics from attempt history
    RebuildStats {
        /// User ID
        user: i64,
    },

    /// Launch interactive terminal UI
    Tui {
        /// User ID
        #[arg(long, short)]
        user: i64,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add a learner
    Add {
        /// Learner name
        name: String,
    },

    /// List learners
    List,
}

#[derive(Subcommand)]
enum ConceptCommands {
    /// Add a concept
    Add {
        /// Concept name
        name: String,

        /// Concept description
        #[arg(long, short)]
        description: Option<String>,
    },

    /// List concepts
    List,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;

    if let Err(e) = run(cli) {
        if json {
            let out = JsonOutput::<()>::err(e.to_string());
            if let Ok(line) = serde_json::to_string(&out) {
                println!("{}", line);
            }
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cadence={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?.with_db_path(cli.db.clone());
    config.ensure_db_dir()?;
    debug!(db = %config.db_path.display(), "opening database");

    let db = Database::open_with_timeout(&config.db_path, config.busy_timeout)?;
    let mut svc = SchedulingService::new(db).with_max_retries(config.max_retries);

    match cli.command {
        Commands::Init => {
            svc.store().init()?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", config.db_path.display());
            }
        }

        Commands::User(user_cmd) => match user_cmd {
            UserCommands::Add { name } => {
                let id = svc.store().add_user(&name)?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "name": name
                        })))?
                    );
                } else {
                    println!("Added user '{}' with ID: {}", name, id);
                }
            }

            UserCommands::List => {
                let users = svc.store().list_users()?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&users))?);
                } else if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!("{:<5} {:<30} CREATED", "ID", "NAME");
                    println!("{}", "-".repeat(60));
                    for user in users {
                        println!("{:<5} {:<30} {}", user.id, truncate(&user.name, 28), user.created_at);
                    }
                }
            }
        },

        Commands::Concept(concept_cmd) => match concept_cmd {
            ConceptCommands::Add { name, description } => {
                let id = svc.store().add_concept(&name, description.as_deref())?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "name": name
                        })))?
                    );
                } else {
                    println!("Added concept '{}' with ID: {}", name, id);
                }
            }

            ConceptCommands::List => {
                let concepts = svc.store().list_concepts()?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&concepts))?);
                } else if concepts.is_empty() {
                    println!("No concepts found.");
                } else {
                    println!("{:<5} {:<30} DESCRIPTION", "ID", "NAME");
                    println!("{}", "-".repeat(70));
                    for concept in concepts {
                        println!(
                            "{:<5} {:<30} {}",
                            concept.id,
                            truncate(&concept.name, 28),
                            concept.description.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
        },

        Commands::Review {
            user,
            concept,
            quality,
            score,
            questions,
            correct,
            date,
        } => {
            let quality = Quality::from_str(&quality)?;
            let attempt = build_attempt(quality, score, questions, correct)?;
            let today = parse_date_or_today(date.as_deref())?;

            let result = svc.record_review(user, concept, quality, &attempt, today)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&result))?);
            } else {
                println!(
                    "Review recorded for concept {} ({}).",
                    concept,
                    quality.label()
                );
                println!(
                    "Next review: {} (in {})",
                    result.next_review_date,
                    scheduler::format_interval(result.item.interval)
                );
                println!(
                    "Easiness: {:.2}, streak: {}",
                    result.item.easiness_factor, result.item.repetitions
                );
                println!(
                    "Average score: {:.2}, accuracy: {:.1}%",
                    result.performance.average_score, result.performance.overall_accuracy
                );
            }
        }

        Commands::Attempt {
            user,
            score,
            questions,
            correct,
            date,
        } => {
            let today = parse_date_or_today(date.as_deref())?;
            let performance =
                svc.record_attempt(user, &Attempt::new(score, questions, correct), today)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&performance))?);
            } else {
                println!("Attempt recorded for user {}.", user);
                println!(
                    "Sessions: {}, average score: {:.2}, accuracy: {:.1}%",
                    performance.quizzes_completed,
                    performance.average_score,
                    performance.overall_accuracy
                );
            }
        }

        Commands::Due {
            user,
            as_of,
            limit,
            after_date,
            after_concept,
        } => {
            let as_of = parse_date_or_today(as_of.as_deref())?;
            let after = match (after_date, after_concept) {
                (Some(d), Some(concept_id)) => Some(DueCursor {
                    next_review_date: parse_date(&d)?,
                    concept_id,
                }),
                _ => None,
            };
            let due = match limit {
                Some(limit) => svc.list_due_page(user, as_of, after, limit)?,
                None if after.is_some() => svc.list_due_page(user, as_of, after, u32::MAX)?,
                None => svc.list_due_items(user, as_of)?,
            };

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&due))?);
            } else if due.is_empty() {
                println!("Nothing due on or before {}.", as_of);
            } else {
                print_due_table(&due, as_of);
                if let (Some(limit), Some(last)) = (limit, due.last()) {
                    if due.len() as u32 == limit {
                        let next = last.cursor();
                        println!();
                        println!(
                            "More may follow: --after-date {} --after-concept {}",
                            next.next_review_date, next.concept_id
                        );
                    }
                }
            }
        }

        Commands::Show { user, concept } => {
            let item = svc.review_item(user, concept)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&item))?);
            } else if let Some(item) = item {
                let name = svc
                    .store()
                    .get_concept(concept)?
                    .map(|c| c.name)
                    .unwrap_or_else(|| format!("concept {}", concept));
                println!("{} (user {})", name, user);
                println!("Easiness: {:.2}", item.easiness_factor);
                println!("Streak: {}", item.repetitions);
                println!("Interval: {} days", item.interval);
                if let Some(last) = item.last_review_date {
                    println!("Last reviewed: {}", last);
                }
                if let Some(next) = item.next_review_date() {
                    let due_note = if item.is_due(Local::now().date_naive()) {
                        " (due now)"
                    } else {
                        ""
                    };
                    println!("Next review: {}{}", next, due_note);
                }
            } else {
                println!("Concept {} has not been reviewed by user {}.", concept, user);
            }
        }

        Commands::History { user, concept } => {
            let log = svc.review_history(user, concept)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&log))?);
            } else if log.is_empty() {
                println!("No reviews recorded.");
            } else {
                println!("{:<12} {:<12} {:<10} EASINESS", "DATE", "QUALITY", "INTERVAL");
                println!("{}", "-".repeat(46));
                for entry in log {
                    println!(
                        "{:<12} {:<12} {:<10} {:.2}",
                        entry.reviewed_on.to_string(),
                        format!("{} ({})", entry.quality.as_u8(), entry.quality.label()),
                        scheduler::format_interval(entry.interval),
                        entry.easiness_factor
                    );
                }
            }
        }

        Commands::Preview {
            user,
            concept,
            date,
        } => {
            let today = parse_date_or_today(date.as_deref())?;
            let state = svc.review_item(user, concept)?.unwrap_or_default();
            let preview = scheduler::preview(&state, today);

            if cli.json {
                let rows: Vec<_> = preview
                    .iter()
                    .map(|(q, days)| serde_json::json!({ "quality": q, "interval": days }))
                    .collect();
                println!("{}", serde_json::to_string(&JsonOutput::ok(rows))?);
            } else {
                for (q, days) in preview {
                    println!(
                        "{} {:<12} {}",
                        q.as_u8(),
                        q.label(),
                        scheduler::format_interval(days)
                    );
                }
            }
        }

        Commands::Stats { user } => {
            let performance = svc.performance(user)?;
            let due_now = svc.list_due_items(user, Local::now().date_naive())?.len();
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "performance": performance,
                        "due_now": due_now
                    })))?
                );
            } else {
                println!("=== Learning Statistics ===");
                match performance {
                    Some(p) => {
                        println!("Sessions completed: {}", p.quizzes_completed);
                        println!("Total score: {}", p.total_score);
                        println!(
                            "Questions answered: {} ({} correct)",
                            p.total_questions_answered, p.total_correct_answers
                        );
                        println!("Average score: {:.2}", p.average_score);
                        println!("Accuracy: {:.1}%", p.overall_accuracy);
                    }
                    None => println!("No graded attempts yet."),
                }
                println!("Due for review: {}", due_now);
            }
        }

        Commands::RebuildStats { user } => {
            let rebuilt = svc.rebuild_performance(user)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&rebuilt))?);
            } else if let Some(p) = rebuilt {
                println!(
                    "Rebuilt from {} sessions: average score {:.2}, accuracy {:.1}%",
                    p.quizzes_completed, p.average_score, p.overall_accuracy
                );
            } else {
                println!("No attempt history for user {}.", user);
            }
        }

        Commands::Tui { user } => {
            tui::run(svc, user)?;
        }
    }

    Ok(())
}

fn build_attempt(
    quality: Quality,
    score: Option<f64>,
    questions: Option<u32>,
    correct: Option<u32>,
) -> Result<Attempt, String> {
    match (score, questions, correct) {
        (None, None, None) => Ok(Attempt::single(quality)),
        (Some(score), Some(questions), Some(correct)) => {
            Ok(Attempt::new(score, questions, correct))
        }
        _ => Err("--score, --questions and --correct must be given together".to_string()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

fn parse_date_or_today(s: Option<&str>) -> Result<NaiveDate, String> {
    match s {
        Some(s) => parse_date(s),
        None => Ok(Local::now().date_naive()),
    }
}

fn print_due_table(due: &[DueItem], as_of: NaiveDate) {
    println!("{:<5} {:<30} {:<12} {:<8} STREAK", "ID", "CONCEPT", "DUE", "OVERDUE");
    println!("{}", "-".repeat(66));
    for d in due {
        println!(
            "{:<5} {:<30} {:<12} {:<8} {}",
            d.concept_id,
            truncate(&d.concept_name, 28),
            d.next_review_date.to_string(),
            format!("{}d", d.days_overdue(as_of)),
            d.item.repetitions
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use levelup_core::{
    Attribute, Category, NewTask, Session, StartOutcome, parse_local_deadline_to_utc,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

mod config;
mod llm;
mod report;
mod state;
mod watch;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "levelup", version, about = "LevelUp List: a task tracker that fights back")]
struct Cli {
    /// Debug logging to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Level, stats and active quests
    Status,

    /// Create a quest
    Add {
        title: String,

        /// XP reward (required unless --suggest finds one)
        #[arg(long)]
        xp: Option<i64>,

        #[arg(long, default_value = "main")]
        category: Category,

        /// str | int | skills | academics
        #[arg(long, default_value = "skills")]
        attribute: Attribute,

        /// Local time in the configured zone: "YYYY-MM-DD HH:MM" or "YYYY-MM-DD"
        #[arg(long)]
        deadline: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Ask the advisor for an XP value when --xp is omitted
        #[arg(long)]
        suggest: bool,
    },

    /// Arm the countdown on a quest with a deadline
    Start { id: String },

    /// Complete a quest (late completion costs the reward)
    Complete { id: String },

    /// Delete a quest without XP effect (once per day)
    Delete { id: String },

    /// Tick or untick a checklist item
    Subtask {
        task_id: String,
        subtask_id: String,

        #[arg(long)]
        undo: bool,
    },

    /// Completed quest log, most recent first
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Run one overdue sweep and Reaper check
    Tick,

    /// Run the sweep and Reaper check on an interval until Ctrl-C
    Watch,

    /// Reusable quest templates
    Template {
        #[command(subcommand)]
        command: TemplateCommand,
    },

    /// Ask the advisor how much XP a task is worth
    Suggest { description: String },

    /// Ask the advisor to split a task into a checklist
    Breakdown {
        title: String,

        #[arg(long, default_value = "main")]
        category: Category,

        #[arg(long, default_value = "skills")]
        attribute: Attribute,

        /// Create the quest instead of only printing the tree
        #[arg(long)]
        yes: bool,
    },

    /// Manage ~/.levelup/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    Add {
        title: String,

        #[arg(long)]
        xp: i64,

        #[arg(long, default_value = "skills")]
        attribute: Attribute,
    },
    List,
    Remove { id: String },
    /// Create a quest from a template
    Use {
        id: String,

        #[arg(long, default_value = "daily")]
        category: Category,

        #[arg(long)]
        deadline: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    Show,
}

/// Filter used when `RUST_LOG` is unset. `levelup` also matches `levelup_core`.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "levelup=debug,warn"
    } else {
        "levelup=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Accept a full id or any unique prefix of one.
fn resolve_id<'a>(ids: impl Iterator<Item = &'a str>, prefix: &str, kind: &str) -> Result<String> {
    let matches: Vec<&str> = ids.filter(|id| id.starts_with(prefix)).collect();
    match matches.as_slice() {
        [one] => Ok((*one).to_string()),
        [] => bail!("no {kind} matches '{prefix}'"),
        many => {
            if let Some(exact) = many.iter().find(|id| **id == prefix) {
                return Ok((*exact).to_string());
            }
            bail!("'{prefix}' is ambiguous ({} {kind}s match)", many.len())
        }
    }
}

/// Active quests first; a resolved id is passed through so the engine reports it as such.
fn resolve_task(session: &Session, prefix: &str) -> Result<String> {
    let active = session.state().tasks.iter().map(|t| t.id.as_str());
    resolve_id(active, prefix, "quest").or_else(|err| {
        let resolved = session.history().iter().map(|t| t.id.as_str());
        resolve_id(resolved, prefix, "quest").map_err(|_| err)
    })
}

fn resolve_template(session: &Session, prefix: &str) -> Result<String> {
    resolve_id(session.templates().iter().map(|t| t.id.as_str()), prefix, "template")
}

fn parse_deadline(cfg: &Config, local: Option<&str>) -> Result<Option<chrono::DateTime<Utc>>> {
    local
        .map(|s| {
            parse_local_deadline_to_utc(s, &cfg.engine.timezone)
                .with_context(|| format!("bad --deadline '{s}'"))
        })
        .transpose()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config()?;
    let now = Utc::now();

    match cli.command {
        Command::Status => {
            let (mut session, mut gateway) = state::open_session(&cfg, now)?;
            session.flush(&mut gateway);
            report::print_status(&session);
        }

        Command::Add {
            title,
            xp,
            category,
            attribute,
            deadline,
            description,
            suggest,
        } => {
            let xp = match (xp, suggest) {
                (Some(xp), _) => xp,
                (None, true) => {
                    let advisor = llm::Advisor::from_config(&cfg.advisor)?;
                    let prompt = description.as_deref().unwrap_or(&title);
                    let s = llm::suggest_xp(advisor.as_ref(), prompt).await;
                    println!("Advisor: {}", s.reasoning);
                    s.xp().context("no usable XP suggestion; pass --xp")?
                }
                (None, false) => bail!("--xp is required (or pass --suggest)"),
            };

            let mut new = NewTask::new(title, xp)
                .with_category(category)
                .with_attribute(attribute);
            if let Some(d) = parse_deadline(&cfg, deadline.as_deref())? {
                new = new.with_deadline(d);
            }
            if let Some(desc) = description {
                new = new.with_description(desc);
            }

            let (mut session, mut gateway) = state::open_session(&cfg, now)?;
            let task = session.create(new)?;
            session.flush(&mut gateway);
            println!("Added {} quest:", task.category);
            report::print_task_line(&task);
        }

        Command::Start { id } => {
            let (mut session, mut gateway) = state::open_session(&cfg, now)?;
            let id = resolve_task(&session, &id)?;
            match session.start(&id, now)? {
                StartOutcome::Started(_) => println!("Countdown started."),
                StartOutcome::AlreadyStarted(at) => {
                    println!("Already started at {}.", at.format("%Y-%m-%d %H:%M UTC"))
                }
            }
            session.flush(&mut gateway);
        }

        Command::Complete { id } => {
            let (mut session, mut gateway) = state::open_session(&cfg, now)?;
            let id = resolve_task(&session, &id)?;
            let resolution = session.complete(&id, now)?;
            session.flush(&mut gateway);
            report::print_resolution(&resolution);
        }

        Command::Delete { id } => {
            let (mut session, mut gateway) = state::open_session(&cfg, now)?;
            let id = resolve_task(&session, &id)?;
            let task = session.delete(&id, now)?;
            session.flush(&mut gateway);
            println!("Deleted: {}", task.title);
        }

        Command::Subtask {
            task_id,
            subtask_id,
            undo,
        } => {
            let (mut session, mut gateway) = state::open_session(&cfg, now)?;
            let task_id = resolve_task(&session, &task_id)?;
            session.set_subtask_completed(&task_id, &subtask_id, !undo)?;
            session.flush(&mut gateway);
            if let Some(task) = session.task(&task_id) {
                report::print_task_line(task);
            }
        }

        Command::History { limit } => {
            let (mut session, mut gateway) = state::open_session(&cfg, now)?;
            session.flush(&mut gateway);
            report::print_history(&session, limit);
        }

        Command::Tick => {
            let mut rng = StdRng::from_entropy();
            watch::tick_once(&cfg, &mut rng)?;
        }

        Command::Watch => {
            watch::run(&cfg).await?;
        }

        Command::Template { command } => {
            let (mut session, mut gateway) = state::open_session(&cfg, now)?;
            match command {
                TemplateCommand::Add {
                    title,
                    xp,
                    attribute,
                } => {
                    let t = session.add_template(&title, xp, attribute)?;
                    println!("Template [{}] {} ({} XP, {})", report::short_id(&t.id), t.title, t.xp, t.attribute);
                }
                TemplateCommand::List => {
                    if session.templates().is_empty() {
                        println!("No templates.");
                    }
                    for t in session.templates() {
                        println!("  [{}] {} ({} XP, {})", report::short_id(&t.id), t.title, t.xp, t.attribute);
                    }
                }
                TemplateCommand::Remove { id } => {
                    let id = resolve_template(&session, &id)?;
                    let t = session.remove_template(&id)?;
                    println!("Removed template: {}", t.title);
                }
                TemplateCommand::Use {
                    id,
                    category,
                    deadline,
                } => {
                    let id = resolve_template(&session, &id)?;
                    let deadline = parse_deadline(&cfg, deadline.as_deref())?;
                    let task = session.create_from_template(&id, category, deadline)?;
                    println!("Added {} quest:", task.category);
                    report::print_task_line(&task);
                }
            }
            session.flush(&mut gateway);
        }

        Command::Suggest { description } => {
            let advisor = llm::Advisor::from_config(&cfg.advisor)?;
            let s = llm::suggest_xp(advisor.as_ref(), &description).await;
            match s.xp() {
                Some(xp) => println!("{xp} XP: {}", s.reasoning),
                None => println!("{}", s.reasoning),
            }
        }

        Command::Breakdown {
            title,
            category,
            attribute,
            yes,
        } => {
            let advisor = llm::Advisor::from_config(&cfg.advisor)?;
            let tree = llm::breakdown(advisor.as_ref(), &title)
                .await
                .context("breakdown unavailable")?;
            let new = tree.into_new_task(category, attribute)?;

            if !yes {
                println!("{}", serde_json::to_string_pretty(&new.sub_tasks)?);
                println!("\nRe-run with --yes to create this quest.");
                return Ok(());
            }

            let (mut session, mut gateway) = state::open_session(&cfg, now)?;
            let task = session.create(new)?;
            session.flush(&mut gateway);
            println!("Added {} quest:", task.category);
            report::print_task_line(&task);
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
    }

    Ok(())
}

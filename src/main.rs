//! project-board CLI
//!
//! Thin wrapper over `BoardStore`: every subcommand performs one board
//! operation and prints the result on stdout. Failures print an error report
//! on stderr and exit non-zero.

use anyhow::Result;
use clap::Parser;
use project_board::BoardStore;
use project_board::cli::{Cli, Command};
use project_board::config::{Config, ConfigLoader};
use project_board::error::BoardError;
use project_board::format::{self, OutputFormat};
use project_board::types::TaskFilter;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("failed to initialise logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<BoardError>() {
                Some(board_err) => match serde_json::to_string(&board_err.report()) {
                    Ok(report) => eprintln!("{}", report),
                    Err(_) => eprintln!("error: {}", board_err),
                },
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` when set, otherwise `info` (or `debug` with `--verbose`).
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

fn init_logging(cli: &Cli) -> Result<()> {
    match cli.log.as_str() {
        "0" | "off" => {}
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter(cli.verbose))
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter(cli.verbose))
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter(cli.verbose))
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => {
            let loader = ConfigLoader::load()?;
            for (tier, path) in loader.sources() {
                debug!(tier = %tier, path = %path.display(), "Using config");
            }
            loader.into_config()
        }
    };

    if let Some(ref dir) = cli.board_dir {
        config.board.dir = PathBuf::from(dir);
    }
    if let Some(ref schema) = cli.schema {
        config.board.schema_path = Some(PathBuf::from(schema));
    }
    if let Some(timeout) = cli.lock_timeout {
        config.board.lock_timeout_secs = timeout;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let base = std::env::current_dir()?;
    let store = BoardStore::open(&config.board, &base)?;
    debug!(store = ?store, "Opened board store");

    let fmt = cli.format;
    let output = match cli.command {
        Command::List(args) => {
            let filter = TaskFilter {
                status: args.status,
                agent: args.agent,
            };
            let tasks = store.list_tasks(args.board, &filter)?;
            match fmt {
                OutputFormat::Json => format::to_json(&tasks)?,
                OutputFormat::Markdown => format::format_tasks_markdown(args.board, &tasks),
            }
        }
        Command::Get(args) => {
            let found = store.get_task(&args.task_id, args.board)?;
            match fmt {
                OutputFormat::Json => format::to_json(&found)?,
                OutputFormat::Markdown => {
                    format::format_task_markdown(&found.task, Some(found.board))
                }
            }
        }
        Command::Add(args) => {
            let task = store.add_task_to_backlog(args.fields(), &args.actor)?;
            render_task(fmt, &task)?
        }
        Command::Update(args) => {
            let task = store.update_task(args.board, &args.task_id, args.patch)?;
            render_task(fmt, &task)?
        }
        Command::Delete(args) => {
            let deleted = store.delete_task(args.board, &args.task_id, &args.actor)?;
            match fmt {
                OutputFormat::Json => format::to_json(&serde_json::json!({
                    "task_id": args.task_id,
                    "board": args.board,
                    "deleted": deleted,
                }))?,
                OutputFormat::Markdown if deleted => {
                    format!("Deleted `{}` from {}.\n", args.task_id, args.board)
                }
                OutputFormat::Markdown => {
                    format!("`{}` was not on {}.\n", args.task_id, args.board)
                }
            }
        }
        Command::Promote(args) => {
            let task = store.promote_task_to_ready(&args.task_id, &args.agent)?;
            render_task(fmt, &task)?
        }
        Command::Claim(args) => {
            let task = store.claim_ready_task(&args.task_id, &args.agent)?;
            render_task(fmt, &task)?
        }
        Command::Complete(args) => {
            let task = store.move_task_to_completed(&args.task_id, &args.agent, args.updates())?;
            render_task(fmt, &task)?
        }
        Command::Reconcile(args) => {
            let report = store.reconcile(args.repair)?;
            match fmt {
                OutputFormat::Json => format::to_json(&report)?,
                OutputFormat::Markdown => format::format_reconcile_markdown(&report),
            }
        }
        Command::Summary => {
            let summary = store.summary()?;
            match fmt {
                OutputFormat::Json => format::to_json(&summary)?,
                OutputFormat::Markdown => format::format_summary_markdown(&summary),
            }
        }
    };

    print!("{}", output);
    if fmt == OutputFormat::Json {
        println!();
    }
    Ok(())
}

fn render_task(fmt: OutputFormat, task: &project_board::Task) -> Result<String> {
    Ok(match fmt {
        OutputFormat::Json => format::to_json(task)?,
        OutputFormat::Markdown => format::format_task_markdown(task, None),
    })
}

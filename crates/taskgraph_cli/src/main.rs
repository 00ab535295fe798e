//! Operator CLI over the task graph core.
//!
//! # Responsibility
//! - Run maintenance sweeps and read-only reports against one database.
//! - Print machine-readable JSON for tree and report output.

use clap::{Args, Parser, Subcommand};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use taskgraph_core::{
    generate_page_numbers, init_from_config, open_db, CoreConfig, LogSink, PageWindow, ProjectId,
    TaskService,
};

#[derive(Debug, Parser)]
#[command(name = "taskgraph", version, about = "Task hierarchy maintenance tool")]
struct Cli {
    /// SQLite database path (overrides TASKGRAPH_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core linkage and version.
    Ping,
    /// Repair orphans in every project, then check the whole hierarchy.
    Validate,
    /// Move one project's orphaned User Stories under its "No Epic" bucket.
    Repair(ProjectArg),
    /// Story-point completion percentage of one project.
    Completion(ProjectArg),
    /// Print one project's task tree as JSON.
    Tree(ProjectArg),
    /// Print a compressed page-number bar.
    Pages {
        #[arg(long)]
        current: usize,
        #[arg(long)]
        total: usize,
    },
}

#[derive(Debug, Args)]
struct ProjectArg {
    #[arg(long)]
    project: ProjectId,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_exit module=cli status=error message={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    init_from_config(&config)?;

    match cli.command {
        Command::Ping => {
            println!("taskgraph_core ping={}", taskgraph_core::ping());
            println!("taskgraph_core version={}", taskgraph_core::core_version());
            Ok(())
        }
        Command::Pages { current, total } => {
            let bar = generate_page_numbers(current, total, PageWindow::default())
                .into_iter()
                .map(|page| page.map_or_else(|| "…".to_string(), |page| page.to_string()))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{bar}");
            Ok(())
        }
        command => with_service(&config, command),
    }
}

fn with_service(config: &CoreConfig, command: Command) -> Result<(), String> {
    let conn = open_db(&config.database_path).map_err(|err| err.to_string())?;
    let service = TaskService::with_config(&conn, Arc::new(LogSink), config.service);

    match command {
        Command::Validate => {
            let report = service
                .validate_all_relationships()
                .map_err(|err| err.user_message())?;
            println!(
                "checked projects={} tasks={} repaired={:?}",
                report.projects_checked, report.tasks_checked, report.repaired
            );
        }
        Command::Repair(ProjectArg { project }) => {
            let repaired = service
                .repair_orphans(project)
                .map_err(|err| err.user_message())?;
            println!("repaired={repaired:?}");
        }
        Command::Completion(ProjectArg { project }) => {
            let percent = service
                .completion_percentage(project)
                .map_err(|err| err.user_message())?;
            println!("{percent:.2}");
        }
        Command::Tree(ProjectArg { project }) => {
            let forest = service
                .task_hierarchy(project)
                .map_err(|err| err.user_message())?;
            let json = serde_json::to_string_pretty(&forest).map_err(|err| err.to_string())?;
            println!("{json}");
        }
        Command::Ping | Command::Pages { .. } => {}
    }
    Ok(())
}

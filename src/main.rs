//! Foreman - dependency-aware build loop
//!
//! Command-line front end: runs the build loop against a project and
//! inspects the progress it leaves behind.

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use foreman::config::ConfigLoader;
use foreman::engine::{BuildLoop, BuildLoopConfig, Collaborators, IterationSummary, TestStatus};
use foreman::progress::{ProgressStore, ProjectStatus, StatusSummary, METADATA_DIR};
use foreman::{
    select_next, CompletionTracker, ForemanConfig, ForemanError, SelectionReason, TaskGraph,
};

#[derive(Parser)]
#[command(name = "foreman")]
#[command(version)]
#[command(about = "Dependency-aware build loop for multi-step project construction", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the build loop until the plan is complete or a limit is hit
    Run {
        /// Plan file (defaults to .foreman/plan.json)
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Architecture document handed to the executor
        #[arg(long)]
        architecture: Option<PathBuf>,

        /// Maximum iterations for this run
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Skip running tests after each task
        #[arg(long)]
        no_test: bool,

        /// Do not ask the repairer for fixes when tests fail
        #[arg(long)]
        no_fix: bool,

        /// Continue from the last progress record
        #[arg(long)]
        resume: bool,
    },

    /// Show project progress
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the task the scheduler would pick next
    Next {
        /// Plan file (defaults to .foreman/plan.json)
        #[arg(long)]
        plan: Option<PathBuf>,
    },

    /// Check a plan for defects
    Validate {
        /// Plan file (defaults to .foreman/plan.json)
        #[arg(long)]
        plan: Option<PathBuf>,
    },

    /// List projects under a workspace directory
    List {
        /// Workspace directory (defaults to the project directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the progress record
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show or validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the resolved configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration files
    Validate,

    /// Show configuration file paths
    Paths,
}

/// Workspace search depth for `list`.
const LIST_MAX_DEPTH: usize = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "foreman=debug,info"
    } else {
        "foreman=info,warn"
    };

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        std::process::exit(1);
    }

    if let Err(e) = dispatch(cli.command, &project_path, cli.verbose).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        let code = e
            .downcast_ref::<ForemanError>()
            .map_or(1, ForemanError::exit_code);
        std::process::exit(code);
    }

    Ok(())
}

async fn dispatch(command: Commands, project_path: &Path, verbose: bool) -> anyhow::Result<()> {
    let project_path = project_path.to_path_buf();
    let store = ProgressStore::new(&project_path);

    match command {
        Commands::Run {
            plan,
            architecture,
            max_iterations,
            no_test,
            no_fix,
            resume,
        } => {
            let config = ConfigLoader::new().load(&project_path)?;
            config.ensure_valid()?;

            let plan_path = plan.unwrap_or_else(|| store.plan_path());
            let graph = TaskGraph::load(&plan_path)?;

            let architecture = match architecture {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)?;
                    serde_json::from_str(&content)?
                }
                None => store.load_architecture()?.unwrap_or_default(),
            };

            let mut loop_config = BuildLoopConfig::new(&project_path)
                .with_settings(&config.loop_settings)
                .with_architecture(architecture);
            if let Some(max) = max_iterations {
                loop_config = loop_config.with_max_iterations(max);
            }
            if no_test {
                loop_config = loop_config.with_auto_test(false);
            }
            if no_fix {
                loop_config = loop_config.with_auto_fix(false);
            }

            let collaborators = Collaborators::from_settings(&config.collaborators)?;

            let total = graph.components().len() as u64;
            let bar = progress_bar(total, verbose);
            let observer_bar = bar.clone();

            let mut build = BuildLoop::new(graph, loop_config, collaborators)
                .with_store(store.clone())
                .with_observer(move |summary: &IterationSummary| {
                    observer_bar.set_position(summary.completed_components as u64);
                    observer_bar.set_message(describe_iteration(summary));
                });

            if resume {
                match store.load()? {
                    Some(record) => {
                        let restored = build.resume_from(&record);
                        bar.set_position(build.tracker().completed_count() as u64);
                        println!(
                            "{} Resuming after iteration {} ({} components restored)",
                            "Info:".blue(),
                            record.iteration,
                            restored
                        );
                    }
                    None => println!(
                        "{} No progress record found, starting fresh",
                        "Info:".blue()
                    ),
                }
            } else if store.exists() {
                println!(
                    "{} Existing progress will be replaced (use --resume to continue it)",
                    "Warning:".yellow()
                );
            }

            let stop = build.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop.stop();
                }
            });

            let result = build.run().await;
            bar.finish_and_clear();

            match result {
                Ok(report) => {
                    println!("\n{} Build Loop", "Run:".cyan().bold());
                    println!("{}", "─".repeat(40));
                    println!("   Status: {}", report.status.to_string().bold());
                    println!("   Iterations: {}", report.iterations_run);
                    println!(
                        "   Components: {}/{}",
                        report.completed_components, report.total_components
                    );
                    println!("   Run ID: {}", report.run_id);
                }
                Err(e) => {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                    if store.exists() {
                        eprintln!(
                            "   Last saved progress: {} (resume with --resume)",
                            store.record_path().display()
                        );
                    }
                    std::process::exit(e.exit_code());
                }
            }
        }

        Commands::Status { json } => {
            let summary = store.status_summary()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_status(&project_path, &summary);
            }
        }

        Commands::Next { plan } => {
            let graph = TaskGraph::load(&plan.unwrap_or_else(|| store.plan_path()))?;
            let mut tracker = CompletionTracker::for_graph(&graph);
            if let Some(record) = store.load()? {
                tracker.restore_from(&record.completion_status, &graph);
            }

            match select_next(&graph, &tracker) {
                Some(selection) => {
                    let task = selection.task;
                    println!("\n{} {}", "Next:".cyan().bold(), task.id.bold());
                    println!("{}", "─".repeat(40));
                    println!("   Component: {}", task.component_id);
                    println!("   Description: {}", task.description);
                    println!("   Type: {}", task.task_type);
                    println!("   Priority: {}", task.priority);
                    println!("   Complexity: {}", task.estimated_complexity);
                    match selection.reason {
                        SelectionReason::Ready => {
                            println!("   Selected: {}", "prerequisites met".green());
                        }
                        SelectionReason::PriorityFallback => {
                            println!("   Selected: {}", "priority fallback".yellow());
                        }
                    }
                }
                None => println!("{} No incomplete tasks remain", "OK".green().bold()),
            }
        }

        Commands::Validate { plan } => {
            let plan_path = plan.unwrap_or_else(|| store.plan_path());
            let graph = TaskGraph::load(&plan_path)?;
            let defects = graph.defects();

            println!(
                "{} {} components, {} tasks",
                "Plan:".cyan().bold(),
                graph.components().len(),
                graph.tasks().len()
            );

            if defects.is_empty() {
                println!("{} No planning defects", "OK".green());
            } else {
                for defect in &defects {
                    println!("{} {}", "Warning:".yellow(), defect);
                }
                std::process::exit(1);
            }
        }

        Commands::List { workspace, json } => {
            let workspace = workspace.unwrap_or_else(|| project_path.clone());
            let projects = discover_projects(&workspace);

            let mut rows = Vec::new();
            for dir in projects {
                let summary = match ProgressStore::new(&dir).status_summary() {
                    Ok(summary) => summary,
                    Err(e) => {
                        eprintln!("{} {}: {}", "Warning:".yellow(), dir.display(), e);
                        continue;
                    }
                };
                rows.push((dir, summary));
            }

            if json {
                let entries: Vec<_> = rows
                    .iter()
                    .map(|(dir, summary)| {
                        serde_json::json!({
                            "path": dir,
                            "status": summary,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if rows.is_empty() {
                println!("{} No projects found under {}", "Info:".blue(), workspace.display());
            } else {
                println!("\n{} {}", "Projects:".cyan().bold(), workspace.display());
                println!("{}", "─".repeat(40));
                for (dir, summary) in &rows {
                    let name = dir
                        .strip_prefix(&workspace)
                        .ok()
                        .filter(|p| !p.as_os_str().is_empty())
                        .unwrap_or(dir.as_path());
                    println!(
                        "   {:<30} {} {}",
                        name.display(),
                        colored_status(summary.status),
                        summary
                            .completion_percentage
                            .map(|p| format!("({p:.0}%)"))
                            .unwrap_or_default()
                    );
                }
            }
        }

        Commands::Reset { force } => {
            if !store.exists() {
                println!("{} No progress record to delete", "Info:".blue());
                return Ok(());
            }
            if !force {
                eprintln!(
                    "{} This will delete {}. Use --force to confirm.",
                    "Warning:".yellow().bold(),
                    store.record_path().display()
                );
                std::process::exit(1);
            }

            store.delete()?;
            println!("{} Progress record deleted", "OK".green().bold());
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                let (config, chain) = ConfigLoader::new().load_with_chain(&project_path)?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    println!("\n{} Resolved Configuration", "Config:".cyan().bold());
                    println!("{}", "─".repeat(40));
                    print!("{}", config.to_toml()?);
                    println!("\n{}", chain.describe());
                }
            }

            ConfigAction::Validate => {
                let config = match ConfigLoader::new().load(&project_path) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("{} {}", "Error:".red(), e);
                        std::process::exit(e.exit_code());
                    }
                };
                let problems = config.validate();
                if problems.is_empty() {
                    println!("{} Configuration is valid", "OK".green());
                } else {
                    for problem in &problems {
                        eprintln!("{} {}", "Error:".red(), problem);
                    }
                    std::process::exit(1);
                }
                if config.collaborators.executor.is_none() {
                    println!(
                        "{} No executor configured; `run` will refuse to start",
                        "Warning:".yellow()
                    );
                }
            }

            ConfigAction::Paths => {
                println!("\n{} Configuration Paths", "Config:".cyan().bold());
                println!("{}", "─".repeat(40));
                println!(
                    "   User: {}",
                    ForemanConfig::user_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(unavailable)".to_string())
                );
                println!(
                    "   Project: {}",
                    ForemanConfig::project_path(&project_path).display()
                );
                println!("   Progress: {}", store.record_path().display());
                println!("   Plan: {}", store.plan_path().display());
                println!("   Architecture: {}", store.architecture_path().display());
            }
        },
    }

    Ok(())
}

fn progress_bar(total: u64, verbose: bool) -> ProgressBar {
    if verbose {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░");
    bar.set_style(style);
    bar.set_prefix("Components");
    bar
}

fn describe_iteration(summary: &IterationSummary) -> String {
    let tests = match summary.tests {
        TestStatus::NotRun => "",
        TestStatus::Passed => " tests ok",
        TestStatus::Skipped => " tests skipped",
        TestStatus::Failed => " tests failed",
    };
    format!("#{} {}{}", summary.iteration, summary.task_id, tests)
}

fn colored_status(status: ProjectStatus) -> colored::ColoredString {
    match status {
        ProjectStatus::NotStarted => status.to_string().dimmed(),
        ProjectStatus::InProgress => status.to_string().yellow(),
        ProjectStatus::Completed => status.to_string().green(),
    }
}

fn print_status(project: &Path, summary: &StatusSummary) {
    println!("\n{} {}", "Status:".cyan().bold(), project.display());
    println!("{}", "─".repeat(40));
    println!("   State: {}", colored_status(summary.status));
    if let Some(pct) = summary.completion_percentage {
        println!(
            "   Completion: {:.1}% ({}/{} components)",
            pct, summary.completed_components, summary.total_components
        );
    }
    if let Some(iteration) = summary.iteration {
        println!("   Iteration: {}", iteration);
    }
    if let Some(updated) = summary.last_updated {
        println!("   Last updated: {}", updated.to_rfc3339());
    }
}

/// Directories under `workspace` holding a metadata directory.
fn discover_projects(workspace: &Path) -> Vec<PathBuf> {
    let mut projects: Vec<PathBuf> = WalkDir::new(workspace)
        .max_depth(LIST_MAX_DEPTH)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with('.') && n != METADATA_DIR)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.file_name() == METADATA_DIR)
        .filter_map(|e| e.path().parent().map(Path::to_path_buf))
        .collect();
    projects.sort();
    projects
}

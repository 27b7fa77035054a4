use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use sharplens::queries;
use sharplens::server::run_stdio_server;
use sharplens::smells::{find_code_smells, SmellCategory};
use sharplens::workspace::{CancelToken, SolutionHandle, WorkspaceManager};

#[derive(Debug, Parser)]
#[command(name = "sharplens")]
#[command(version)]
#[command(about = "C# code-intelligence MCP server (semantic queries, refactoring, code smells)")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the MCP stdio server
    Mcp,
    /// One-shot: list projects of a solution
    Projects {
        /// Path to the .sln or .csproj
        solution: PathBuf,
    },
    /// One-shot: search symbols by name
    Symbols {
        solution: PathBuf,
        query: String,
        /// Exact-name match instead of substring
        #[arg(long)]
        exact: bool,
    },
    /// One-shot: run the code-smell analyzer
    Smells {
        solution: PathBuf,
        /// all, complexity, design, or inheritance
        #[arg(long, default_value = "all")]
        category: String,
        /// Enable the semantic deep check (feature envy)
        #[arg(long)]
        deep: bool,
    },
}

fn load_with_spinner(
    ws: &WorkspaceManager,
    solution: &PathBuf,
) -> Result<std::sync::Arc<SolutionHandle>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} loading solution...")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    let handle = ws.acquire(solution, &CancelToken::new())?;
    spinner.finish_with_message(format!(
        "loaded {} project(s)",
        handle.layout.projects.len()
    ));
    Ok(handle)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Mcp => run_stdio_server(),
        Command::Projects { solution } => {
            let ws = WorkspaceManager::new();
            let handle = load_with_spinner(&ws, &solution)?;
            print!("{}", queries::list_projects(&handle));
            Ok(())
        }
        Command::Symbols {
            solution,
            query,
            exact,
        } => {
            let ws = WorkspaceManager::new();
            let handle = load_with_spinner(&ws, &solution)?;
            let results = queries::find_symbols(&handle, &query, None, exact, false);
            print!(
                "{}",
                sharplens::format::render_symbol_list(&results, false)
            );
            Ok(())
        }
        Command::Smells {
            solution,
            category,
            deep,
        } => {
            let ws = WorkspaceManager::new();
            let handle = load_with_spinner(&ws, &solution)?;
            let category = SmellCategory::parse(&category)?;
            let report = find_code_smells(&handle, category, None, deep, &CancelToken::new())?;
            print!("{report}");
            Ok(())
        }
    }
}

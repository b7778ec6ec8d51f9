use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "punch", about = concat!("punch v", env!("CARGO_PKG_VERSION"), " - construction checklists from the terminal"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// API token for this run (overrides the stored session)
    #[arg(long, global = true, env = "PUNCHLIST_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store an API token after checking it against the API
    Login(LoginArgs),
    /// Forget the stored token and project
    Logout,
    /// List projects, optionally filtered by name or address
    Projects(ProjectsArgs),
    /// Select the project the other commands work on
    Select(SelectArgs),
    /// Show the selected project's checklists
    Show(ShowArgs),
    /// Toggle a task's completion
    Toggle(ToggleArgs),
    /// Section progress across all checklists
    Summary(SummaryArgs),
    /// Overall task totals for the selected project
    Stats,
    /// Write a checklist as CSV
    Export(ExportArgs),
    /// Write a checklist as a printable HTML page
    Print(PrintArgs),
    /// List photo URLs for the project or one task
    Photos(PhotosArgs),
    /// Local cache management
    Cache(CacheCmd),
}

// ---------------------------------------------------------------------------
// Session args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LoginArgs {
    /// API token
    pub token: String,
}

#[derive(Args)]
pub struct ProjectsArgs {
    /// Match project names by prefix, then names or addresses by substring
    pub filter: Option<String>,
    /// Number of projects to show when no filter is given
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args)]
pub struct SelectArgs {
    /// Project ID
    pub project_id: String,
}

// ---------------------------------------------------------------------------
// Checklist args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    /// Skip the cache and fetch from the API
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Args)]
pub struct ToggleArgs {
    /// Checklist ID
    pub checklist: String,
    /// Task ID
    pub task: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SummarySort {
    Name,
    Percent,
}

#[derive(Args)]
pub struct SummaryArgs {
    /// Sort sections by name or completion
    #[arg(long, value_enum, default_value_t = SummarySort::Percent)]
    pub sort: SummarySort,
    /// Sort descending
    #[arg(long)]
    pub desc: bool,
    /// Only show this section, with its per-checklist breakdown
    #[arg(long)]
    pub section: Option<String>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Checklist ID
    pub checklist: String,
    /// Output file (default: <checklist name>_checklist.csv; "-" for stdout)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct PrintArgs {
    /// Checklist ID
    pub checklist: String,
    /// Output file (default: stdout)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PhotoSize {
    Thumbnail,
    Web,
    Original,
}

#[derive(Args)]
pub struct PhotosArgs {
    /// Only the photo strip shown for this task
    #[arg(long)]
    pub task: Option<String>,
    /// Preferred image variant
    #[arg(long, value_enum, default_value_t = PhotoSize::Web)]
    pub kind: PhotoSize,
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct CacheCmd {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Drop the selected project's cached checklists
    Clear,
}

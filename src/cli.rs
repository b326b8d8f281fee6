use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "supplychain-audit",
    about = "Audit Go dependencies for VCS origin, last commit, and license",
    version
)]
pub struct Cli {
    /// Go packages whose dependencies are audited
    #[arg(default_value = "./...")]
    pub packages: Vec<String>,

    /// Skip dependencies whose import path contains this substring (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// Config file [default: ./.supplychain-audit/config.toml, fallback ~/.config/supplychain-audit/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory `go list` runs in
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Packages processed concurrently (overrides config)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Never touch the network (no go-get discovery)
    #[arg(long)]
    pub offline: bool,

    /// Count commits between origin/master and each dependency's last commit
    #[arg(long)]
    pub behind: bool,

    /// Exit with status 1 when any dependency has no detected license
    #[arg(long)]
    pub fail_unlicensed: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

//! `supplychain-audit` — report the VCS origin, last commit, and license of
//! every non-standard dependency of a Go project.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and load config ([`config::load_config`]).
//! 2. Enumerate and filter the transitive package set ([`resolver`]).
//! 3. Run the audit pipeline ([`pipeline`]): VCS identity ([`vcs`]), license
//!    detection ([`license`]) with parent inheritance ([`inheritance`]),
//!    last commit ([`commit`]), and license links ([`link`]).
//! 4. Render the requested report ([`report`]).

mod cli;
mod command;
mod commit;
mod config;
mod error;
mod inheritance;
mod license;
mod link;
mod meta;
mod models;
mod pipeline;
mod report;
mod resolver;
mod vcs;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use commit::GitLog;
use config::load_config;
use license::detector::FsLicenseDetector;
use link::{HttpDiscovery, LinkBuilder, SourceLinkDiscovery};
use meta::MetaCache;
use pipeline::{Pipeline, PipelineOptions};
use resolver::golist::GoList;
use vcs::local::LocalVcs;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workdir = cli.dir.canonicalize().unwrap_or_else(|_| cli.dir.clone());
    let config = load_config(&workdir, cli.config.as_deref())?;

    let mut ignores = config.ignore.clone();
    ignores.extend(cli.ignore.iter().cloned());

    let meta_cache = if cli.offline {
        None
    } else {
        let client = reqwest::Client::builder()
            .timeout(config.limits.http_timeout())
            .build()?;
        Some(Arc::new(MetaCache::new(client)))
    };

    let discovery: Option<Arc<dyn SourceLinkDiscovery>> = match &meta_cache {
        Some(cache) if config.links.discovery => Some(Arc::new(HttpDiscovery::new(cache.clone()))),
        _ => None,
    };

    let pipeline = Pipeline::new(
        Arc::new(GoList::new(&workdir, config.limits.command_timeout())),
        Arc::new(LocalVcs::new(meta_cache)),
        Arc::new(FsLicenseDetector::new()),
        Arc::new(GitLog::new(config.limits.command_timeout())),
        LinkBuilder::new(discovery, &config.links.default_branch),
        PipelineOptions {
            jobs: cli.jobs.unwrap_or(config.limits.jobs),
            commits_behind: cli.behind,
        },
    );

    let show_progress = !cli.quiet && matches!(cli.report, ReportFormat::Terminal);
    let pb = if show_progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };
    let pipeline = match &pb {
        Some(pb) => pipeline.with_progress(pb.clone()),
        None => pipeline,
    };

    let deps = pipeline.load_dependencies(&cli.packages, &ignores).await?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&deps, cli.verbose > 0, cli.quiet)?;
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&deps)?);
        }
    }

    let unlicensed = deps
        .iter()
        .filter(|d| d.license.license_type().is_empty())
        .count();
    if cli.fail_unlicensed && unlicensed > 0 {
        tracing::error!(unlicensed, "dependencies without a detected license");
        std::process::exit(1);
    }

    Ok(())
}

/// Logs go to stderr so JSON on stdout stays clean. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("supplychain_audit={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

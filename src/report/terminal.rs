use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::license::risk::classify;
use crate::models::{Dependency, LicenseRisk};

/// Render a colored terminal report.
pub fn render(deps: &[Dependency], verbose: bool, quiet: bool) -> Result<()> {
    let total = deps.len();
    let licensed = deps
        .iter()
        .filter(|d| !d.license.license_type().is_empty())
        .count();
    let unlicensed = total - licensed;
    let no_commit = deps.iter().filter(|d| d.commit.found().is_none()).count();

    if quiet {
        println!(
            "Total: {}  Licensed: {}  Unlicensed: {}",
            total,
            licensed.to_string().green(),
            unlicensed.to_string().red(),
        );
        return Ok(());
    }

    println!(
        "\n {} v{}\n",
        "supplychain-audit".bold(),
        env!("CARGO_PKG_VERSION")
    );

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Dependencies       : {}", total));
    println!(
        " │  {:<48} │",
        format!(
            "{}  Licensed        : {:>4}  {}",
            "✓".green(),
            licensed,
            summarize_licenses(deps)
        )
    );
    println!(
        " │  {:<48} │",
        format!("{}  Unlicensed      : {:>4}", "✗".red(), unlicensed)
    );
    println!(
        " │  {:<48} │",
        format!("{}  No commit info  : {:>4}", "⚠".yellow(), no_commit)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if total > 0 {
        render_table(deps, verbose);
        println!();
    }

    Ok(())
}

fn render_table(deps: &[Dependency], verbose: bool) {
    let mut header = vec![
        Cell::new("Import Path").add_attribute(Attribute::Bold),
        Cell::new("VCS").add_attribute(Attribute::Bold),
        Cell::new("License").add_attribute(Attribute::Bold),
        Cell::new("Risk").add_attribute(Attribute::Bold),
        Cell::new("Commit").add_attribute(Attribute::Bold),
        Cell::new("Date").add_attribute(Attribute::Bold),
    ];
    if verbose {
        header.push(Cell::new("Subject").add_attribute(Attribute::Bold));
        header.push(Cell::new("Link").add_attribute(Attribute::Bold));
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for dep in deps {
        let license = dep.license.license_type();
        let risk = classify(license);
        let risk_color = match risk {
            LicenseRisk::Permissive => Color::Green,
            LicenseRisk::WeakCopyleft => Color::Yellow,
            LicenseRisk::StrongCopyleft => Color::Red,
            LicenseRisk::Proprietary => Color::Magenta,
            LicenseRisk::Unknown => Color::DarkGrey,
        };
        let commit: String = dep.commit.commit_id().chars().take(10).collect();

        let mut row = vec![
            Cell::new(dep.import_path()),
            Cell::new(&dep.project.vcs_cmd),
            if license.is_empty() {
                Cell::new("none").fg(Color::Red)
            } else {
                Cell::new(license)
            },
            Cell::new(risk.to_string()).fg(risk_color),
            Cell::new(commit),
            Cell::new(dep.commit.date()),
        ];
        if verbose {
            row.push(Cell::new(dep.commit.subject()));
            row.push(Cell::new(&dep.project.license_link));
        }
        table.add_row(row);
    }

    println!("{}", table);
}

fn summarize_licenses(deps: &[Dependency]) -> String {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for dep in deps {
        let lic = dep.license.license_type();
        if !lic.is_empty() {
            *counts.entry(lic).or_insert(0) += 1;
        }
    }

    let mut pairs: Vec<(&str, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let summary: Vec<String> = pairs
        .iter()
        .take(3)
        .map(|(lic, cnt)| format!("{} ({})", lic, cnt))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}

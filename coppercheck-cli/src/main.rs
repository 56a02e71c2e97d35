//! CopperCheck CLI - run DRC rule decks against layout snapshots.

use clap::{Parser, Subcommand, ValueEnum};
use coppercheck::{DrcEngine, DrcReport, LayoutSnapshot, RuleKind, RuleSet};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "coppercheck")]
#[command(about = "PCB design rule checking from the command line", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a rule deck against a layout snapshot
    Check {
        /// Path to the layout snapshot JSON
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// Path to the rule deck JSON
        #[arg(value_name = "RULES")]
        rules: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Also write an IPC-D-356A style netlist report to this file
        #[arg(long, value_name = "FILE")]
        netlist: Option<PathBuf>,

        /// Exit with an error code when violations are found
        #[arg(long)]
        fail_on_violations: bool,
    },

    /// List the rule kinds the engine knows
    Rules {
        /// Show rule descriptions
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// Violation table as CSV
    Csv,
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Check {
            snapshot,
            rules,
            format,
            netlist,
            fail_on_violations,
        } => handle_check(&snapshot, &rules, format, netlist.as_deref(), fail_on_violations),
        Commands::Rules { verbose } => {
            handle_rules(verbose);
            0
        }
    };

    process::exit(exit_code);
}

fn handle_check(
    snapshot_path: &Path,
    rules_path: &Path,
    format: OutputFormat,
    netlist: Option<&Path>,
    fail_on_violations: bool,
) -> i32 {
    let snapshot = match LayoutSnapshot::from_json_file(snapshot_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    let rules = match RuleSet::from_json_file(rules_path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    let engine = DrcEngine::new(&snapshot);
    let report = engine.check(&rules);

    if let Some(path) = netlist {
        if let Err(e) = engine.write_netlist_report(path, &report) {
            eprintln!("Error: {e}");
            return 1;
        }
    }

    match format {
        OutputFormat::Human => output_human(snapshot_path, &snapshot, &report),
        OutputFormat::Json => output_json(snapshot_path, &report),
        OutputFormat::Csv => {
            if let Err(e) = report.write_csv(std::io::stdout()) {
                eprintln!("Error: {e}");
                return 1;
            }
        }
    }

    if fail_on_violations && !report.is_clean() {
        return 1;
    }
    0
}

fn output_human(path: &Path, snapshot: &LayoutSnapshot, report: &DrcReport) {
    println!("\nSnapshot: {}", path.display());
    println!(
        "  {} primitives, {} vias, {} components, {} nets",
        snapshot.primitives.len(),
        snapshot.vias.len(),
        snapshot.components.len(),
        snapshot.net_names().len()
    );
    println!("{}", "─".repeat(60));

    if report.is_clean() {
        println!("  No violations found");
    } else {
        for violation in &report.violations {
            println!("  - [{}] {}", violation.rule, violation.message);
        }
        println!("\n  Summary:");
        for (kind, count) in report.counts_by_kind() {
            println!("    {kind:<26} {count}");
        }
        println!("    {:<26} {}", "total", report.len());
    }

    for skipped in &report.skipped {
        println!("  Skipped rule kind {:?}: {}", skipped.kind, skipped.reason);
    }
}

fn output_json(path: &Path, report: &DrcReport) {
    let output = serde_json::json!({
        "snapshot": path.display().to_string(),
        "violations": report.violations,
        "skipped": report.skipped,
        "summary": {
            "total": report.len(),
            "by_kind": report.counts_by_kind()
                .into_iter()
                .map(|(k, n)| serde_json::json!({ "kind": k, "count": n }))
                .collect::<Vec<_>>(),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

fn handle_rules(verbose: bool) {
    println!("Available rule kinds:\n");
    for kind in RuleKind::ALL {
        println!("  {}", kind.as_str());
        if verbose {
            println!("    {}", kind.description());
        }
    }
    println!();
}

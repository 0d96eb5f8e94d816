//! Run report rendering

use owo_colors::OwoColorize;
use sweep_cleaners::RunReport;

/// Print a per-strategy summary to stdout
pub fn print_report(report: &RunReport) {
    println!();
    println!("{}", "Sweep Complete".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(stats) => {
                println!(
                    "{} {} - {} deleted, {} skipped, {} failed",
                    "ok".green().bold(),
                    outcome.description,
                    stats.deleted.to_string().yellow(),
                    stats.skipped,
                    stats.failed
                );
            }
            Err(e) => {
                println!(
                    "{} {} - {}",
                    "failed".red().bold(),
                    outcome.description,
                    e
                );
            }
        }
    }

    let totals = report.totals();
    println!();
    if totals.is_noop() {
        println!("{}", "Nothing to delete - backends are already clean".dimmed());
    } else {
        println!(
            "Total deleted: {}  failed: {}",
            totals.deleted.to_string().yellow(),
            totals.failed
        );
    }
}

use colored::Colorize;
use dashkit::{DeploySummary, Error, ErrorCategory};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a resource kind heading with its entry count
pub fn section(title: &str, count: usize) {
    println!();
    println!("{} {}", title.cyan().bold(), format!("({count})").dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a deployed dashboard with its web link
pub fn dashboard(name: &str, link: &str) {
    println!("{} {} {}", "✓".green(), name.bold(), link.underline());
}

/// Print the create/update/cleanup counters of a run
pub fn summary(summary: &DeploySummary, verbose: bool) {
    println!();
    kv("Created", &summary.created().to_string());
    kv("Updated", &summary.updated().to_string());
    kv("Orphans deleted", &summary.orphans_deleted.to_string());
    if verbose {
        kv("Dashboards created", &summary.dashboards_created.to_string());
        kv("Queries created", &summary.queries_created.to_string());
        kv("Visualizations created", &summary.visualizations_created.to_string());
        kv("Widgets rebuilt", &summary.widgets_created.to_string());
        kv("Widgets cleared", &summary.widgets_cleared.to_string());
    }
    if summary.orphans_failed > 0 {
        warn(&format!(
            "{} orphaned objects could not be deleted and were dropped from state",
            summary.orphans_failed
        ));
    }
}

/// Print a library error, one line per definition error, with category advice
pub fn report(err: &Error) {
    match err {
        Error::Validation(errors) => errors.iter().for_each(|e| error(&e.to_string())),
        other => error(&other.to_string()),
    }
    advise(err.category());
}

fn advise(category: ErrorCategory) {
    println!("  {}", format!("{category}: {}", category.advice()).dimmed());
}

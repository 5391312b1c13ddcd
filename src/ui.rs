use colored::Colorize;
use declarative::ApplyResult;

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

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// One line per reconciled resource
pub fn result_line(id: &str, result: &ApplyResult) {
    match result {
        ApplyResult::NoChange => println!("  {} {}", "✓".green(), id.dimmed()),
        ApplyResult::Created => println!("  {} {} created", "+".green().bold(), id),
        ApplyResult::Modified => println!("  {} {} modified", "~".yellow().bold(), id),
        ApplyResult::Deferred { reason } => {
            println!("  {} {} {}", "…".cyan(), id, format!("({reason})").dimmed())
        }
        ApplyResult::Skipped { reason } => {
            println!("  {} {} {}", "-".dimmed(), id, reason.dimmed())
        }
        ApplyResult::Failed { error } => println!("  {} {}: {}", "✗".red(), id, error.red()),
    }
}

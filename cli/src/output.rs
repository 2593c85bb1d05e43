use colored::{ColoredString, Colorize};
use ward_core::Tristate;

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

pub fn verdict(value: Tristate) -> ColoredString {
    match value {
        Tristate::Allow => value.as_str().green().bold(),
        Tristate::Deny => value.as_str().red().bold(),
        Tristate::Undefined => value.as_str().dimmed(),
    }
}

pub fn enabled(enabled: bool) -> ColoredString {
    if enabled {
        "enabled".green()
    } else {
        "disabled".yellow()
    }
}

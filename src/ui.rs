use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Terminal output for the CLI. Status lines go to stdout; spinners draw on
/// stderr and disappear when it is not a terminal.
#[derive(Debug, Clone)]
pub struct UIManager {
    colors_enabled: bool,
}

impl UIManager {
    pub fn new(colors_enabled: bool) -> Self {
        colored::control::set_override(colors_enabled);
        Self { colors_enabled }
    }

    pub fn colors_enabled(&self) -> bool {
        self.colors_enabled
    }

    pub fn print_header(&self, title: &str) {
        println!("\n{}", title.bold().cyan());
        println!("{}", "=".repeat(title.chars().count()).cyan());
    }

    pub fn print_success(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn print_info(&self, message: &str) {
        println!("{} {}", "•".blue(), message);
    }

    pub fn print_warning(&self, message: &str) {
        println!("{} {}", "!".yellow().bold(), message.yellow());
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    }

    pub fn print_error_with_suggestions(&self, message: &str, suggestion: Option<&str>) {
        self.print_error(message);
        if let Some(suggestion) = suggestion {
            eprintln!("  {} {}", "hint:".dimmed(), suggestion);
        }
    }

    /// One line per path, indented under a dimmed label.
    pub fn print_path_list<P: AsRef<Path>>(&self, label: &str, paths: &[P]) {
        println!("  {} ({})", label.dimmed(), paths.len());
        for path in paths {
            println!("    {}", path.as_ref().display());
        }
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

impl Default for UIManager {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_finishes() {
        let ui = UIManager::new(false);
        assert!(!ui.colors_enabled());

        let spinner = ui.create_spinner("Scanning");
        spinner.finish_and_clear();
        assert!(spinner.is_finished());
    }
}

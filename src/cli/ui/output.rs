use console::style;

use crate::evidence::ConfidenceLevel;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        println!("  {:<12} {}", style(format!("{}:", label)).dim(), value);
    }

    pub fn bullet(&self, message: &str) {
        println!("  • {}", message);
    }

    /// Confidence colored by level
    pub fn confidence(&self, level: ConfidenceLevel) -> String {
        let text = level.to_string();
        match level {
            ConfidenceLevel::High => style(text).green().bold().to_string(),
            ConfidenceLevel::Medium => style(text).yellow().to_string(),
            ConfidenceLevel::Low => style(text).red().to_string(),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

use std::fmt::Display;

use console::style;

/// Styled terminal output. `quiet` silences everything except errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    quiet: bool,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quiet(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn success(&self, message: impl Display) {
        if !self.quiet {
            println!("{} {}", style("✓").green(), message);
        }
    }

    pub fn error(&self, message: impl Display) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: impl Display) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn info(&self, message: impl Display) {
        if !self.quiet {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    pub fn section(&self, title: impl Display) {
        if !self.quiet {
            println!("\n{}", style(title).bold());
            println!("{}", "─".repeat(40));
        }
    }

    /// Aligned `label: value` line
    pub fn field(&self, label: &str, value: impl Display) {
        if !self.quiet {
            println!("  {:<18} {}", style(format!("{}:", label)).dim(), value);
        }
    }

    pub fn item(&self, value: impl Display) {
        if !self.quiet {
            println!("  {} {}", style("•").dim(), value);
        }
    }
}

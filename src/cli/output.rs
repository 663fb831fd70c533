//! CLI output formatting utilities.

use crate::message::{Step, StepStatus};
use crate::protocol::Source;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a session summary line.
    pub fn session_info(title: &str, id: &str, updated: &str) {
        println!(
            "  {} {} ({}, {})",
            style("*").cyan(),
            style(title).bold(),
            style(id).dim(),
            updated
        );
    }

    /// Print a research step with its status marker.
    pub fn step(step: &Step) {
        let marker = match step.status {
            StepStatus::Completed => style("✓").green(),
            StepStatus::InProgress => style("…").yellow(),
            StepStatus::Pending => style("·").dim(),
        };
        println!("  {} {}", marker, step.title);
    }

    /// Print the sources cited by an answer.
    pub fn sources(sources: &[Source]) {
        if sources.is_empty() {
            return;
        }
        println!("\n{}", style("Sources:").bold());
        for (i, source) in sources.iter().enumerate() {
            println!("  [{}] {}", i + 1, style(&source.title).bold());
            if source.url != "#" {
                println!("      {}", style(&source.url).dim());
            }
        }
    }

    /// Print follow-up suggestions.
    pub fn suggestions(suggestions: &[String]) {
        if suggestions.is_empty() {
            return;
        }
        println!("\n{}", style("You might also ask:").bold());
        for suggestion in suggestions {
            println!("  {} {}", style("?").cyan(), suggestion);
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
pub fn content_preview(content: &str, max_len: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_len {
        content
    } else {
        let cut: String = content.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}

//! Output formatting utilities

use agent_lib::memory::format_bytes;
use agent_lib::{DesiredLimits, EntryReport, LiveLimits, ReconcileOutcome};
use colored::Colorize;
use std::fmt;

/// Line tag shown in front of every message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Ok,
    Fix,
    Done,
    Warn,
    Error,
}

impl Tag {
    /// Tag text padded so messages line up
    fn label(&self) -> &'static str {
        match self {
            Tag::Ok => "[OK]  ",
            Tag::Fix => "[FIX] ",
            Tag::Done => "[DONE]",
            Tag::Warn => "[WARN]",
            Tag::Error => "[ERROR]",
        }
    }

    fn colored(&self) -> String {
        let label = self.label();
        match self {
            Tag::Ok | Tag::Done => label.green().bold().to_string(),
            Tag::Fix => label.cyan().bold().to_string(),
            Tag::Warn => label.yellow().bold().to_string(),
            Tag::Error => label.red().bold().to_string(),
        }
    }
}

/// One line of batch output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub tag: Tag,
    pub message: String,
}

impl Line {
    fn new(tag: Tag, message: impl Into<String>) -> Self {
        Self {
            tag,
            message: message.into(),
        }
    }

    pub fn print(&self) {
        println!("{} {}", self.tag.colored(), self.message);
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tag.label(), self.message)
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    Line::new(Tag::Error, message).print();
}

fn format_live(limits: &LiveLimits) -> String {
    format!(
        "{}/{:.2}",
        format_bytes(limits.memory_bytes.max(0) as u64),
        limits.effective_cpus()
    )
}

fn format_desired(limits: &DesiredLimits) -> String {
    let memory = if limits.manages_memory() {
        format_bytes(limits.memory_bytes)
    } else {
        "unmanaged".to_string()
    };
    format!("{}/{:.2}", memory, limits.cpus)
}

/// Lines reporting one reconciled entry
pub fn format_entry(entry: &EntryReport) -> Vec<Line> {
    let detail = entry.detail.as_deref().unwrap_or("unknown error");
    let mut lines = Vec::new();

    match entry.outcome {
        ReconcileOutcome::AlreadyCorrect => {
            if let Some(current) = &entry.current {
                lines.push(Line::new(
                    Tag::Ok,
                    format!(
                        "{}: memory={} bytes, cpus={:.2}",
                        entry.name,
                        current.memory_bytes,
                        current.effective_cpus()
                    ),
                ));
            }
        }
        ReconcileOutcome::Corrected | ReconcileOutcome::ApplyFailed => {
            if let (Some(current), Some(desired)) = (&entry.current, &entry.desired) {
                lines.push(Line::new(
                    Tag::Fix,
                    format!(
                        "{}: {} → {}",
                        entry.name,
                        format_live(current),
                        format_desired(desired)
                    ),
                ));
            }
            if entry.outcome == ReconcileOutcome::Corrected {
                lines.push(Line::new(
                    Tag::Done,
                    format!("limits applied to {}", entry.name),
                ));
            } else {
                lines.push(Line::new(
                    Tag::Error,
                    format!("failed to apply limits to {}: {}", entry.name, detail),
                ));
            }
        }
        ReconcileOutcome::ResolveFailed => {
            let message = if entry.not_found {
                format!("container {} not found, skipping", entry.name)
            } else {
                format!("{}: {}, skipping", entry.name, detail)
            };
            lines.push(Line::new(Tag::Warn, message));
        }
        ReconcileOutcome::InvalidSpec => {
            lines.push(Line::new(
                Tag::Warn,
                format!("{}: invalid spec ({})", entry.name, detail),
            ));
        }
    }

    lines
}

/// Print the lines for one reconciled entry
pub fn print_entry(entry: &EntryReport) {
    for line in format_entry(entry) {
        line.print();
    }
}

/// One-line tally printed after the entries
pub fn print_summary(entries: &[EntryReport]) {
    let count = |outcome| entries.iter().filter(|e| e.outcome == outcome).count();
    let tally: Vec<String> = ReconcileOutcome::ALL
        .iter()
        .map(|outcome| format!("{}={}", outcome, count(*outcome)))
        .collect();
    println!("{}", tally.join(" ").dimmed());
}

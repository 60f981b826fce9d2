//! Console event log shared by the orchestrator and every task.
//!
//! Lines go to stdout (stderr for warnings), one `println!` per event so
//! lines from different threads never interleave mid-line. Colours follow
//! `NO_COLOR`.

use colored::{Color, Colorize};
use serde::Deserialize;

use crate::error::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Nothing at all.
    Quiet,
    /// Banner, phase changes, results and warnings.
    Summary,
    /// Everything above plus one line per put/take/wait.
    #[default]
    Events,
}

#[derive(Debug, Clone, Copy)]
pub struct EventLog {
    verbosity: Verbosity,
    color: bool,
}

impl EventLog {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            color: Self::should_use_colors(),
        }
    }

    pub fn quiet() -> Self {
        Self::new(Verbosity::Quiet)
    }

    pub fn should_use_colors() -> bool {
        std::env::var("NO_COLOR").is_err()
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Quiet && self.verbosity >= level
    }

    pub fn info(&self, message: impl AsRef<str>) {
        if self.enabled(Verbosity::Summary) {
            println!("{}", message.as_ref());
        }
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        if self.enabled(Verbosity::Summary) {
            eprintln!("{} {}", self.paint("[WARN]", Color::Yellow), message.as_ref());
        }
    }

    /// Section marker such as `--- All producers finished ---`.
    pub fn milestone(&self, message: impl AsRef<str>) {
        if self.enabled(Verbosity::Summary) {
            let line = format!("--- {} ---", message.as_ref());
            println!("\n{}\n", self.paint(&line, Color::Blue));
        }
    }

    pub fn event(&self, role: Role, id: usize, message: impl AsRef<str>) {
        if self.enabled(Verbosity::Events) {
            println!("{}", self.format_event(role, id, message.as_ref()));
        }
    }

    pub fn format_event(&self, role: Role, id: usize, message: &str) -> String {
        let color = match role {
            Role::Producer => Color::Cyan,
            Role::Consumer => Color::Magenta,
        };
        format!("{}: {}", self.paint(&format!("{role} {id}"), color), message)
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(Verbosity::default())
    }
}

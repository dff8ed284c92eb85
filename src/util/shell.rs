//! User-facing CLI output.
//!
//! Every status line, warning, and progress bar goes through [`Shell`], so
//! commands never format output themselves. A shell is either human-facing
//! (status verbs right-aligned in the gutter, optional color, progress bars)
//! or a JSON event stream for machine consumers; the two never mix on the
//! same stream.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};

use indicatif::{ProgressBar, ProgressStyle};

/// Column width of the status-verb gutter.
const VERB_WIDTH: usize = 12;

/// How much human output to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only, no progress
    Quiet,
    /// Default: status lines + progress bars
    #[default]
    Normal,
    /// --verbose: every status line immediately, no progress bars
    Verbose,
}

/// When to emit ANSI color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Color only when stderr is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Semantic status of an output line; the shell picks verb and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Created,
    Validated,
    Passed,
    Retained,
    Finished,
    Expanding,
    Running,
    Building,
    Info,
    Skipped,
    Warning,
    Canceled,
    Failed,
    TimedOut,
    Error,
}

impl Status {
    /// The display verb and its ANSI style.
    fn verb(&self) -> (&'static str, &'static str) {
        const GREEN: &str = "\x1b[1;32m";
        const CYAN: &str = "\x1b[1;36m";
        const BLUE: &str = "\x1b[1;34m";
        const YELLOW: &str = "\x1b[1;33m";
        const RED: &str = "\x1b[1;31m";

        match self {
            Status::Created => ("Created", GREEN),
            Status::Validated => ("Validated", GREEN),
            Status::Passed => ("Passed", GREEN),
            Status::Retained => ("Retained", GREEN),
            Status::Finished => ("Finished", GREEN),
            Status::Expanding => ("Expanding", CYAN),
            Status::Running => ("Running", CYAN),
            Status::Building => ("Building", CYAN),
            Status::Info => ("Info", BLUE),
            Status::Skipped => ("Skipped", YELLOW),
            Status::Warning => ("Warning", YELLOW),
            Status::Canceled => ("Canceled", YELLOW),
            Status::Failed => ("Failed", RED),
            Status::TimedOut => ("Timed out", RED),
            Status::Error => ("error", RED),
        }
    }
}

/// Central sink for all CLI output.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    json: bool,
    use_color: bool,
}

impl Shell {
    /// Create a shell from CLI flags. JSON wins over quiet/verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice, json: bool) -> Self {
        let verbosity = if json || quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };

        let use_color = !json
            && match color {
                ColorChoice::Auto => io::stderr().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            };

        Shell {
            verbosity,
            json,
            use_color,
        }
    }

    /// Whether this shell emits JSON events instead of human output.
    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print one status line to stderr: `{verb:>12} {message}`.
    ///
    /// Suppressed in JSON mode; in quiet mode only `Error` gets through.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.json {
            return;
        }
        if self.verbosity == Verbosity::Quiet && status != Status::Error {
            return;
        }

        let (verb, style) = status.verb();
        if self.use_color {
            eprintln!("{}{:>VERB_WIDTH$}\x1b[0m {}", style, verb, msg);
        } else {
            eprintln!("{:>VERB_WIDTH$} {}", verb, msg);
        }
    }

    /// Print a warning.
    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    /// Print an error, as a JSON event when in JSON mode.
    pub fn error(&self, msg: impl Display) {
        if self.json {
            self.json_event(&serde_json::json!({
                "reason": "error",
                "message": msg.to_string(),
            }));
        } else {
            self.status(Status::Error, msg);
        }
    }

    /// Emit one JSON event line on stdout. No-op outside JSON mode.
    pub fn json_event(&self, event: &serde_json::Value) {
        if !self.json {
            return;
        }
        println!("{}", serde_json::to_string(event).unwrap_or_default());
        let _ = io::stdout().flush();
    }

    /// A progress bar over `total` items.
    ///
    /// Quiet, verbose, and JSON shells get a silent bar; callers drive it
    /// the same either way.
    pub fn progress(&self, total: u64, msg: impl Display) -> Progress {
        let bar = if self.verbosity == Verbosity::Normal && !self.json && total > 1 {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            bar.set_message(msg.to_string());
            Some(bar)
        } else {
            None
        };

        Progress { bar }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::from_flags(false, false, ColorChoice::Auto, false)
    }
}

/// Handle to the job-set progress bar.
///
/// `ProgressBar` is internally synchronized, so `inc` takes `&self` and may
/// be called from worker threads.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    /// Record one completed item.
    pub fn inc(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    /// Finish and clear the bar.
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Render a duration for summary lines.
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

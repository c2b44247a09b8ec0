//! Where command output goes.
//!
//! A [`Console`] is either *streaming* (straight to the process's stdout and
//! stderr) or *captured* (collected in memory). [`Cli::main`](crate::Cli::main)
//! streams; [`Cli::call`](crate::Cli::call) captures, so tests and embedders
//! can inspect everything a run printed through the returned [`Outcome`].

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use serde_json::Value;

#[derive(Debug, Default)]
struct Captured {
    stdout: String,
    stderr: String,
}

/// Output sink shared by the dispatcher and every command of one run.
#[derive(Debug, Clone)]
pub struct Console {
    captured: Option<Rc<RefCell<Captured>>>,
}

impl Console {
    /// Writes through to the process streams.
    pub fn streaming() -> Self {
        Self { captured: None }
    }

    /// Collects output in memory.
    pub fn captured() -> Self {
        Self {
            captured: Some(Rc::new(RefCell::new(Captured::default()))),
        }
    }

    pub fn is_captured(&self) -> bool {
        self.captured.is_some()
    }

    /// Writes `text` and a newline to stdout.
    pub fn out(&self, text: &str) {
        match &self.captured {
            Some(c) => {
                let mut c = c.borrow_mut();
                c.stdout.push_str(text);
                c.stdout.push('\n');
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                let _ = writeln!(stdout, "{}", text);
            }
        }
    }

    /// Writes `text` and a newline to stderr.
    pub fn err(&self, text: &str) {
        match &self.captured {
            Some(c) => {
                let mut c = c.borrow_mut();
                c.stderr.push_str(text);
                c.stderr.push('\n');
            }
            None => {
                let mut stderr = std::io::stderr().lock();
                let _ = writeln!(stderr, "{}", text);
            }
        }
    }

    /// Drains captured output as `(stdout, stderr)`. Empty when streaming.
    pub fn take(&self) -> (String, String) {
        match &self.captured {
            Some(c) => {
                let mut c = c.borrow_mut();
                (
                    std::mem::take(&mut c.stdout),
                    std::mem::take(&mut c.stderr),
                )
            }
            None => (String::new(), String::new()),
        }
    }
}

/// The result of one top-level run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Process exit status: 0 on success.
    pub status: i32,
    /// The value the command returned, `Null` on failure or for `()`.
    pub value: Value,
    /// Captured stdout (empty when streaming).
    pub stdout: String,
    /// Captured stderr (empty when streaming).
    pub stderr: String,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// Renders a returned value for printing: strings bare, everything else as
/// pretty JSON. `Null` renders as nothing.
pub fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())),
    }
}

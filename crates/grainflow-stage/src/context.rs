//! Per-call reporting context handed to stages.
//!
//! [`StageContext`] collects a stage's error code and messages for one
//! `preflight` or `execute` call. When built with a [`MessageSink`] every
//! message is also forwarded as soon as it is recorded, so observers see
//! status updates from long-running stages without waiting for the call to
//! return.

use std::fmt;

/// Which half of the two-phase protocol a data check runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckMode {
    /// Declare-only: validate inputs, create zero-tuple placeholder outputs.
    Preflight,
    /// Real: validate inputs and size outputs to true tuple counts.
    Execute,
}

impl CheckMode {
    /// Whether this is the declare-only pass.
    pub fn is_preflight(self) -> bool {
        self == Self::Preflight
    }
}

/// Severity of a stage message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Informational progress text.
    Status,
    /// Non-fatal problem; never halts a run.
    Warning,
    /// Fatal for the stage; halts the run.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Status => "status",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One `(stage index, severity, code, message)` record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageMessage {
    /// Position of the reporting stage in its pipeline.
    pub stage_index: usize,
    /// Message severity.
    pub severity: Severity,
    /// Associated code; zero for status messages.
    pub code: i32,
    /// Human-readable text.
    pub text: String,
}

impl fmt::Display for StageMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[stage {}] {} ({}): {}",
            self.stage_index, self.severity, self.code, self.text
        )
    }
}

/// Receives stage messages as they are recorded.
pub trait MessageSink {
    /// Called once per recorded message.
    fn message(&mut self, message: &StageMessage);
}

impl MessageSink for Vec<StageMessage> {
    fn message(&mut self, message: &StageMessage) {
        self.push(message.clone());
    }
}

/// Error code and messages for one stage call.
///
/// The error code starts at zero. [`error`](Self::error) sets it; once
/// negative it stays negative for the rest of the call, so a later
/// success path cannot mask an earlier failure.
pub struct StageContext<'a> {
    stage_index: usize,
    error_code: i32,
    messages: Vec<StageMessage>,
    sink: Option<&'a mut dyn MessageSink>,
}

impl StageContext<'static> {
    /// Context that only collects.
    pub fn new(stage_index: usize) -> Self {
        Self {
            stage_index,
            error_code: 0,
            messages: Vec::new(),
            sink: None,
        }
    }
}

impl<'a> StageContext<'a> {
    /// Context that collects and forwards each message to `sink`.
    pub fn with_sink(stage_index: usize, sink: &'a mut dyn MessageSink) -> Self {
        Self {
            stage_index,
            error_code: 0,
            messages: Vec::new(),
            sink: Some(sink),
        }
    }

    /// Index of the stage this context reports for.
    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    /// Current error code: zero on success, negative on failure.
    pub fn error_code(&self) -> i32 {
        self.error_code
    }

    /// Whether an error has been recorded.
    pub fn has_failed(&self) -> bool {
        self.error_code < 0
    }

    /// Record a failure. Non-negative codes are coerced to `-1`.
    pub fn error(&mut self, code: i32, text: impl Into<String>) {
        let code = if code < 0 { code } else { -1 };
        if self.error_code == 0 {
            self.error_code = code;
        }
        self.push(Severity::Error, code, text.into());
    }

    /// Record a warning. Does not change the error code.
    pub fn warning(&mut self, code: i32, text: impl Into<String>) {
        self.push(Severity::Warning, code, text.into());
    }

    /// Record a status message.
    pub fn status(&mut self, text: impl Into<String>) {
        self.push(Severity::Status, 0, text.into());
    }

    /// Messages recorded so far, in order.
    pub fn messages(&self) -> &[StageMessage] {
        &self.messages
    }

    /// Number of warnings recorded so far.
    pub fn warning_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
            .count()
    }

    /// Consume the context, returning the error code and messages.
    pub fn finish(self) -> (i32, Vec<StageMessage>) {
        (self.error_code, self.messages)
    }

    fn push(&mut self, severity: Severity, code: i32, text: String) {
        let message = StageMessage {
            stage_index: self.stage_index,
            severity,
            code,
            text,
        };
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.message(&message);
        }
        self.messages.push(message);
    }
}

impl fmt::Debug for StageContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("stage_index", &self.stage_index)
            .field("error_code", &self.error_code)
            .field("messages", &self.messages.len())
            .field("forwarding", &self.sink.is_some())
            .finish()
    }
}

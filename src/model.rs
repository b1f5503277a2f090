//! Core data model for extracted CI diagnostics.
//!
//! Every tool parser ultimately produces zero or more [`ExtractedError`]
//! values. The shape here is the stable contract between the extraction
//! engine and its consumers (rendering, the healing agent, persistence) —
//! see the JSON field names in `Serialize`.

use serde::{Deserialize, Serialize};

/// Upper bound on `message` length in bytes (UTF-8 safe truncation applied).
pub const MAX_MESSAGE_BYTES: usize = 2000;
/// Upper bound on `stack_trace` length in bytes.
pub const MAX_STACK_TRACE_BYTES: usize = 256 * 1024;

/// Coarse classification used for grouping and default severity inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Lint,
    TypeCheck,
    Test,
    Compile,
    Runtime,
    Metadata,
    Unknown,
}

impl Category {
    /// String form used in logs and as a map key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lint => "lint",
            Self::TypeCheck => "type-check",
            Self::Test => "test",
            Self::Compile => "compile",
            Self::Runtime => "runtime",
            Self::Metadata => "metadata",
            Self::Unknown => "unknown",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Diagnostic severity. Empty (`Unset`) is a valid intermediate state during
/// parsing — [`crate::categorize::infer_severity`] fills it in afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Unset,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Unset => "",
        }
    }

    #[must_use]
    pub fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }

    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Unset
    }
}

impl Serialize for Severity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "error" => Self::Error,
            "warning" => Self::Warning,
            _ => Self::Unset,
        })
    }
}

/// Job/step/action context a CI runner attaches to a slice of output.
///
/// Deep-cloned into every error at emission time so a later job switch
/// cannot retroactively mutate an already-emitted error's context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl WorkflowContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.job.is_none() && self.step.is_none() && self.action.is_none()
    }
}

/// A small window of source lines around an error location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub lines: Vec<String>,
    pub start_line: usize,
    pub error_line: usize,
    pub language: String,
}

/// A single structured diagnostic recognized from CI output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedError {
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub file: String,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub line: u32,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub column: u32,
    #[serde(skip_serializing_if = "Severity::is_unset", default, rename = "severity")]
    pub severity: Severity,
    pub raw: String,
    #[serde(skip_serializing_if = "String::is_empty", default, rename = "stack_trace")]
    pub stack_trace: String,
    #[serde(skip_serializing_if = "String::is_empty", default, rename = "rule_id")]
    pub rule_id: String,
    pub category: Category,
    pub source: String,
    #[serde(skip_serializing_if = "WorkflowContext::is_empty", default, rename = "workflow_context")]
    pub workflow_context: WorkflowContext,
    #[serde(skip_serializing_if = "Option::is_none", default, rename = "code_snippet")]
    pub code_snippet: Option<CodeSnippet>,
    #[serde(skip_serializing_if = "is_false", default, rename = "unknown_pattern")]
    pub unknown_pattern: bool,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ExtractedError {
    /// Construct a bare error with the invariants already applied
    /// (message truncated, `line==0 => column==0`).
    #[must_use]
    pub fn new(message: impl Into<String>, raw: impl Into<String>, category: Category, source: impl Into<String>) -> Self {
        Self {
            message: truncate_utf8(&message.into(), MAX_MESSAGE_BYTES),
            file: String::new(),
            line: 0,
            column: 0,
            severity: Severity::Unset,
            raw: raw.into(),
            stack_trace: String::new(),
            rule_id: String::new(),
            category,
            source: source.into(),
            workflow_context: WorkflowContext::default(),
            code_snippet: None,
            unknown_pattern: false,
        }
    }

    #[must_use]
    pub fn with_location(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self.column = if line == 0 { 0 } else { column };
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.set_severity(severity);
        self
    }

    pub fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    #[must_use]
    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = rule_id.into();
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = truncate_utf8(&trace.into(), MAX_STACK_TRACE_BYTES);
        self
    }

    #[must_use]
    pub fn with_workflow_context(mut self, ctx: WorkflowContext) -> Self {
        self.workflow_context = ctx;
        self
    }

    #[must_use]
    pub fn as_unknown_pattern(mut self) -> Self {
        self.unknown_pattern = true;
        self
    }

    /// Deduplication key: `(message, file, line)`.
    #[must_use]
    pub fn dedup_key(&self) -> (String, String, u32) {
        (self.message.clone(), self.file.clone(), self.line)
    }
}

/// Truncate `s` to at most `max_bytes` bytes, always landing on a UTF-8
/// character boundary (never splits a multi-byte codepoint).
#[must_use]
pub fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

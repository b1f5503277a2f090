//! Rust compiler/Clippy parser. Multi-line is the norm:
//! a diagnostic header opens a block that accumulates location, code spans,
//! notes and helps until a blank-after-location, a new header, or noise.

use std::sync::LazyLock;

use regex::Regex;

use crate::limits::{RUST_MAX_HELPS, RUST_MAX_NOTES, RUST_MULTILINE_MAX_BYTES, RUST_MULTILINE_MAX_LINES};
use crate::model::{Category, ExtractedError, Severity};
use crate::registry::{ParseContext, ToolParser};

static HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(error|warning)(\[(?P<code>[A-Za-z0-9]+)\])?:\s*(?P<msg>.+)$").unwrap());
static LOCATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*-->\s*(?P<file>[^:]+):(?P<line>\d+):(?P<col>\d+)\s*$").unwrap());
static CODE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+\s*)?\|").unwrap());
static NOTE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*=\s*note:\s*(.+)$").unwrap());
static HELP_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*=\s*help:\s*(.+)$").unwrap());
static CLIPPY_LINT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\[(?:warn|deny)\(clippy::([a-zA-Z0-9_]+)\)\]").unwrap());
static TEST_FAILED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^test\s+(\S+)\s+\.\.\.\s+FAILED$").unwrap());

const NOISE_PREFIXES: &[&str] = &[
    "   Compiling", "  Downloading", "  Downloaded", "    Finished", "     Running", "  Doc-tests",
    "Caused by:", "   Updating", "Blocking waiting", "      Fresh", "  Packaging", "  Verifying",
    "  Archiving", "  Uploading", "   Waiting",
];
const NOISE_SUBSTRINGS: &[&str] = &[
    "For more information about this error",
    "aborting due to previous error",
    "Some errors have detailed explanations",
    "error: could not compile",
    "warning: build failed",
];

const CRITICAL_CLIPPY_LINTS: &[&str] = &["unwrap_used", "expect_used", "panic", "todo", "unimplemented"];

struct Accum {
    header_line: String,
    base_severity: Severity,
    code: Option<String>,
    message: String,
    location: Option<(String, u32, u32)>,
    context: Vec<String>,
    bytes: usize,
    notes: Vec<String>,
    helps: Vec<String>,
    clippy_lint: Option<String>,
}

enum RustState {
    Idle,
    Accumulating(Accum),
}

pub struct RustParser {
    state: RustState,
}

impl RustParser {
    #[must_use]
    pub fn new() -> Self {
        Self { state: RustState::Idle }
    }

    fn is_noise_line(line: &str) -> bool {
        NOISE_PREFIXES.iter().any(|p| line.starts_with(p)) || NOISE_SUBSTRINGS.iter().any(|s| line.contains(s)) || line.starts_with("test result: ok.")
    }

    fn finalize(acc: Accum) -> ExtractedError {
        let raw = acc.context.join("\n");
        let mut rule_id = String::new();
        let category = if let Some(lint) = &acc.clippy_lint {
            match &acc.code {
                Some(code) => rule_id = format!("{code}/clippy::{lint}"),
                None => rule_id = format!("clippy::{lint}"),
            }
            Category::Lint
        } else {
            if let Some(code) = &acc.code {
                rule_id = code.clone();
            }
            Category::Compile
        };

        let mut severity = acc.base_severity;
        if let Some(lint) = &acc.clippy_lint {
            if CRITICAL_CLIPPY_LINTS.contains(&lint.as_str()) {
                severity = Severity::Error;
            }
        }

        let mut err = ExtractedError::new(acc.message, acc.header_line.clone(), category, "rust")
            .with_stack_trace(raw)
            .with_rule_id(rule_id);
        if let Some((file, line, col)) = acc.location {
            err = err.with_location(file, line, col);
        }
        err.set_severity(severity);
        err
    }
}

impl Default for RustParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParser for RustParser {
    fn id(&self) -> &'static str {
        "rust"
    }

    fn priority(&self) -> u8 {
        85
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if Self::is_noise_line(line) {
            return 0.0;
        }
        if HEADER.is_match(line) || TEST_FAILED.is_match(line) {
            0.9
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
        if let Some(caps) = TEST_FAILED.captures(line) {
            let name = caps.get(1).unwrap().as_str();
            let mut err = ExtractedError::new(format!("test failed: {name}"), line, Category::Test, "rust");
            err.set_severity(Severity::Error);
            return Some(err);
        }

        if let Some(caps) = HEADER.captures(line) {
            let base_severity = if &caps[1] == "error" { Severity::Error } else { Severity::Warning };
            self.state = RustState::Accumulating(Accum {
                header_line: line.to_string(),
                base_severity,
                code: caps.name("code").map(|m| m.as_str().to_string()),
                message: caps.name("msg").unwrap().as_str().to_string(),
                location: None,
                context: vec![line.to_string()],
                bytes: line.len(),
                notes: Vec::new(),
                helps: Vec::new(),
                clippy_lint: None,
            });
            return None;
        }

        None
    }

    fn is_noise(&self, line: &str) -> bool {
        Self::is_noise_line(line)
    }

    fn supports_multi_line(&self) -> bool {
        true
    }

    fn continue_multi_line(&mut self, line: &str, _ctx: &ParseContext) -> bool {
        let RustState::Accumulating(acc) = &mut self.state else {
            return false;
        };

        if acc.context.len() >= RUST_MULTILINE_MAX_LINES || acc.bytes >= RUST_MULTILINE_MAX_BYTES {
            return false;
        }

        if line.trim().is_empty() {
            return acc.location.is_none();
        }

        if HEADER.is_match(line) || Self::is_noise_line(line) {
            return false;
        }

        if let Some(caps) = LOCATION.captures(line) {
            if acc.location.is_none() {
                let file = caps.name("file").unwrap().as_str().to_string();
                let ln: u32 = caps.name("line").unwrap().as_str().parse().unwrap_or(0);
                let col: u32 = caps.name("col").unwrap().as_str().parse().unwrap_or(0);
                acc.location = Some((file, ln, col));
            }
            acc.context.push(line.to_string());
            acc.bytes += line.len();
            return true;
        }

        if let Some(caps) = NOTE_LINE.captures(line) {
            if acc.notes.len() < RUST_MAX_NOTES {
                let note = caps.get(1).unwrap().as_str().to_string();
                if let Some(lint_caps) = CLIPPY_LINT.captures(&note) {
                    acc.clippy_lint = Some(lint_caps.get(1).unwrap().as_str().to_string());
                }
                acc.notes.push(note);
            }
            acc.context.push(line.to_string());
            acc.bytes += line.len();
            return true;
        }

        if let Some(caps) = HELP_LINE.captures(line) {
            if acc.helps.len() < RUST_MAX_HELPS {
                acc.helps.push(caps.get(1).unwrap().as_str().to_string());
            }
            acc.context.push(line.to_string());
            acc.bytes += line.len();
            return true;
        }

        if CODE_LINE.is_match(line) {
            acc.context.push(line.to_string());
            acc.bytes += line.len();
            return true;
        }

        false
    }

    fn finish_multi_line(&mut self, _ctx: &ParseContext) -> Option<ExtractedError> {
        let state = std::mem::replace(&mut self.state, RustState::Idle);
        match state {
            RustState::Idle => None,
            RustState::Accumulating(acc) => Some(Self::finalize(acc)),
        }
    }

    fn reset(&mut self) {
        self.state = RustState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ParseContext {
        ParseContext::default()
    }

    #[test]
    fn compile_error_with_code_and_location() {
        let mut p = RustParser::new();
        assert!(p.parse("error[E0308]: mismatched types", &ctx()).is_none());
        assert!(p.continue_multi_line("  --> src/main.rs:10:5", &ctx()));
        assert!(p.continue_multi_line("   |", &ctx()));
        assert!(!p.continue_multi_line("", &ctx()));
        let err = p.finish_multi_line(&ctx()).unwrap();
        assert_eq!(err.rule_id, "E0308");
        assert_eq!(err.category, Category::Compile);
        assert_eq!(err.file, "src/main.rs");
        assert_eq!(err.line, 10);
        assert_eq!(err.column, 5);
        assert_eq!(err.severity, Severity::Error);
    }

    #[test]
    fn clippy_lint_elevates_severity_to_error() {
        let mut p = RustParser::new();
        assert!(p.parse("warning: used unwrap() on a Result value", &ctx()).is_none());
        assert!(p.continue_multi_line("  --> src/main.rs:15:5", &ctx()));
        assert!(p.continue_multi_line("   = note: `#[warn(clippy::unwrap_used)]` on by default", &ctx()));
        assert!(!p.continue_multi_line("", &ctx()));
        let err = p.finish_multi_line(&ctx()).unwrap();
        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.rule_id, "clippy::unwrap_used");
        assert_eq!(err.category, Category::Lint);
        assert_eq!(err.file, "src/main.rs");
        assert_eq!(err.line, 15);
    }

    #[test]
    fn non_critical_clippy_lint_stays_warning() {
        let mut p = RustParser::new();
        p.parse("warning: this could be simplified", &ctx());
        p.continue_multi_line("  --> src/lib.rs:1:1", &ctx());
        p.continue_multi_line("   = note: `#[warn(clippy::needless_return)]` on by default", &ctx());
        p.continue_multi_line("", &ctx());
        let err = p.finish_multi_line(&ctx()).unwrap();
        assert_eq!(err.severity, Severity::Warning);
    }

    #[test]
    fn new_header_terminates_previous_block() {
        let mut p = RustParser::new();
        p.parse("error[E0382]: use of moved value", &ctx());
        p.continue_multi_line("  --> src/main.rs:3:3", &ctx());
        assert!(!p.continue_multi_line("error[E0308]: mismatched types", &ctx()));
        let err = p.finish_multi_line(&ctx()).unwrap();
        assert_eq!(err.rule_id, "E0382");
    }

    #[test]
    fn test_failed_is_single_line() {
        let mut p = RustParser::new();
        let err = p.parse("test module::name ... FAILED", &ctx()).unwrap();
        assert_eq!(err.category, Category::Test);
        assert_eq!(err.message, "test failed: module::name");
    }

    #[test]
    fn cargo_noise_is_recognized() {
        let p = RustParser::new();
        assert!(p.is_noise("   Compiling foo v0.1.0"));
        assert!(p.is_noise("error: could not compile `foo` due to previous error"));
        assert!(p.is_noise("test result: ok. 3 passed; 0 failed;"));
    }
}

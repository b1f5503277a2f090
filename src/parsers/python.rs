//! Python parser: pytest/mypy/ruff/flake8/pylint
//! single-line formats, plus a multi-line traceback state machine that
//! follows nested/chained exceptions to the deepest frame.

use std::sync::LazyLock;

use regex::Regex;

use crate::limits::{PYTHON_MAX_BYTES, PYTHON_MAX_FRAMES};
use crate::model::{Category, ExtractedError, Severity};
use crate::registry::{ParseContext, ToolParser};

static PYTEST_FAILED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^FAILED (?P<path>[^\s]+) - (?P<msg>.+)$").unwrap());
static PYTEST_ERROR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ERROR (?P<path>[^\s]+) - (?P<msg>.+)$").unwrap());
static MYPY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>[^\s:]+\.pyi?):(?P<line>\d+):\s*(?P<sev>error|warning|note):\s*(?P<msg>.+?)(?:\s*\[(?P<rule>[\w-]+)\])?$").unwrap()
});
static RUFF_FLAKE8: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>[^\s:]+\.pyi?):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<code>[A-Z]+[0-9]+)\s+(?P<msg>.+)$").unwrap()
});
static PYLINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>[^\s:]+\.pyi?):(?P<line>\d+):(?P<col>\d+):\s*(?P<code>[A-Z]\d+):\s*(?P<msg>.+?)\s*\((?P<rule>[\w-]+)\)$").unwrap()
});
static STANDALONE_EXC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?P<kind>[A-Z][A-Za-z0-9_]*(?:Error|Exception|Warning)):\s*(?P<msg>.+)$").unwrap());

const TRACEBACK_TRIGGER: &str = "Traceback (most recent call last):";
static FRAME_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^\s*File "(?P<path>[^"]+)", line (?P<line>\d+)(?:, in (?P<func>.+))?$"#).unwrap());
static CARET_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\^+\s*$").unwrap());
const CHAIN_HEADER_1: &str = "During handling of the above exception, another exception occurred:";
const CHAIN_HEADER_2: &str = "The above exception was the direct cause of the following exception:";
static EXC_TERMINATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?P<kind>[A-Za-z_][A-Za-z0-9_.]*):\s*(?P<msg>.*)$").unwrap());

const NOISE_SUBSTRINGS: &[&str] = &[
    "platform linux",
    "platform darwin",
    "platform win",
    "cachedir:",
    "rootdir:",
    "collecting",
    "collected ",
    "Your code has been rated",
    "All checks passed!",
];

fn is_syntax_kind(kind: &str) -> bool {
    matches!(kind, "SyntaxError" | "IndentationError" | "TabError")
}

fn ruff_severity(code: &str) -> Severity {
    if code.starts_with("E9") || code.starts_with("F4") || code.starts_with("F8") || code.starts_with('F') {
        Severity::Error
    } else {
        Severity::Warning
    }
}

fn pylint_severity(code: &str) -> Severity {
    match code.chars().next() {
        Some('E' | 'F') => Severity::Error,
        _ => Severity::Warning,
    }
}

struct TracebackAccum {
    lines: Vec<String>,
    bytes: usize,
    frame_count: usize,
    deepest_frame: Option<(String, u32)>,
    syntax_caret_col: Option<u32>,
    last_was_file_line: bool,
    pending_terminator: Option<String>,
}

enum PyState {
    Idle,
    Traceback(TracebackAccum),
}

pub struct PythonParser {
    state: PyState,
}

impl PythonParser {
    #[must_use]
    pub fn new() -> Self {
        Self { state: PyState::Idle }
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParser for PythonParser {
    fn id(&self) -> &'static str {
        "python"
    }

    fn priority(&self) -> u8 {
        90
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if self.is_noise(line) {
            return 0.0;
        }
        if line == TRACEBACK_TRIGGER {
            return 0.95;
        }
        if PYTEST_FAILED.is_match(line)
            || PYTEST_ERROR.is_match(line)
            || MYPY.is_match(line)
            || RUFF_FLAKE8.is_match(line)
            || PYLINT.is_match(line)
            || STANDALONE_EXC.is_match(line)
        {
            0.85
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
        if line == TRACEBACK_TRIGGER {
            self.state = PyState::Traceback(TracebackAccum {
                lines: vec![line.to_string()],
                bytes: line.len(),
                frame_count: 0,
                deepest_frame: None,
                syntax_caret_col: None,
                last_was_file_line: false,
                pending_terminator: None,
            });
            return None;
        }

        if let Some(caps) = PYTEST_FAILED.captures(line) {
            let path = caps.name("path").unwrap().as_str();
            let mut err = ExtractedError::new(caps.name("msg").unwrap().as_str(), line, Category::Test, "python")
                .with_rule_id(path.rsplit("::").next().unwrap_or(path));
            err.file = path.split("::").next().unwrap_or(path).to_string();
            err.set_severity(Severity::Error);
            return Some(err);
        }

        if let Some(caps) = PYTEST_ERROR.captures(line) {
            let mut err = ExtractedError::new(caps.name("msg").unwrap().as_str(), line, Category::Test, "python");
            err.file = caps.name("path").unwrap().as_str().to_string();
            err.set_severity(Severity::Error);
            return Some(err);
        }

        if let Some(caps) = MYPY.captures(line) {
            let sev = caps.name("sev").unwrap().as_str();
            let mut err = ExtractedError::new(caps.name("msg").unwrap().as_str(), line, Category::TypeCheck, "python")
                .with_location(caps.name("file").unwrap().as_str(), caps.name("line").unwrap().as_str().parse().ok()?, 0)
                .with_rule_id(caps.name("rule").map_or(String::new(), |m| m.as_str().to_string()));
            err.set_severity(if sev == "error" { Severity::Error } else { Severity::Warning });
            return Some(err);
        }

        if let Some(caps) = RUFF_FLAKE8.captures(line) {
            let code = caps.name("code").unwrap().as_str();
            let col: u32 = caps.name("col").map_or(0, |m| m.as_str().parse().unwrap_or(0));
            let mut err = ExtractedError::new(caps.name("msg").unwrap().as_str(), line, Category::Lint, "python")
                .with_location(caps.name("file").unwrap().as_str(), caps.name("line").unwrap().as_str().parse().ok()?, col)
                .with_rule_id(code);
            err.set_severity(ruff_severity(code));
            return Some(err);
        }

        if let Some(caps) = PYLINT.captures(line) {
            let code = caps.name("code").unwrap().as_str();
            let mut err = ExtractedError::new(caps.name("msg").unwrap().as_str(), line, Category::Lint, "python")
                .with_location(
                    caps.name("file").unwrap().as_str(),
                    caps.name("line").unwrap().as_str().parse().ok()?,
                    caps.name("col").unwrap().as_str().parse().unwrap_or(0),
                )
                .with_rule_id(caps.name("rule").unwrap().as_str());
            err.set_severity(pylint_severity(code));
            return Some(err);
        }

        if let Some(caps) = STANDALONE_EXC.captures(line) {
            let kind = caps.name("kind").unwrap().as_str();
            let category = if is_syntax_kind(kind) { Category::Compile } else { Category::Runtime };
            let mut err = ExtractedError::new(line, line, category, "python");
            err.set_severity(Severity::Error);
            return Some(err);
        }

        None
    }

    fn is_noise(&self, line: &str) -> bool {
        NOISE_SUBSTRINGS.iter().any(|p| line.contains(p))
    }

    fn supports_multi_line(&self) -> bool {
        true
    }

    fn continue_multi_line(&mut self, line: &str, _ctx: &ParseContext) -> bool {
        let PyState::Traceback(acc) = &mut self.state else {
            return false;
        };

        if acc.frame_count >= PYTHON_MAX_FRAMES || acc.bytes >= PYTHON_MAX_BYTES {
            return false;
        }

        if line == TRACEBACK_TRIGGER || line == CHAIN_HEADER_1 || line == CHAIN_HEADER_2 {
            acc.lines.push(line.to_string());
            acc.bytes += line.len();
            acc.last_was_file_line = false;
            return true;
        }

        if let Some(caps) = FRAME_LINE.captures(line) {
            acc.deepest_frame = Some((
                caps.name("path").unwrap().as_str().to_string(),
                caps.name("line").unwrap().as_str().parse().unwrap_or(0),
            ));
            acc.frame_count += 1;
            acc.lines.push(line.to_string());
            acc.bytes += line.len();
            acc.last_was_file_line = true;
            return true;
        }

        if acc.last_was_file_line && line.starts_with("    ") && !line.trim().is_empty() {
            acc.lines.push(line.to_string());
            acc.bytes += line.len();
            acc.last_was_file_line = false;
            return true;
        }

        if CARET_LINE.is_match(line) {
            let col = line.find('^').map_or(0, |i| i as u32 + 1);
            acc.syntax_caret_col = Some(col);
            acc.lines.push(line.to_string());
            acc.bytes += line.len();
            return true;
        }

        // Anything else is the terminating exception line: stash it for
        // `finish_multi_line` and signal the block has ended.
        acc.pending_terminator = Some(line.to_string());
        false
    }

    fn finish_multi_line(&mut self, _ctx: &ParseContext) -> Option<ExtractedError> {
        let state = std::mem::replace(&mut self.state, PyState::Idle);
        let PyState::Traceback(mut acc) = state else {
            return None;
        };

        let terminator = acc.pending_terminator.clone().unwrap_or_default();
        if acc.pending_terminator.is_some() {
            acc.lines.push(terminator.clone());
        }
        let raw = acc.lines.join("\n");

        let caps = EXC_TERMINATOR.captures(&terminator);
        let (kind, msg) = caps
            .as_ref()
            .map(|c| (c.name("kind").unwrap().as_str(), c.name("msg").unwrap().as_str()))
            .unwrap_or(("", terminator.as_str()));

        let category = if is_syntax_kind(kind) { Category::Compile } else { Category::Runtime };
        let message = if kind.is_empty() { terminator.clone() } else { format!("{kind}: {msg}") };
        let mut err = ExtractedError::new(message, raw.clone(), category, "python").with_stack_trace(raw);
        if let Some((file, line)) = acc.deepest_frame {
            let col = if is_syntax_kind(kind) { acc.syntax_caret_col.unwrap_or(0) } else { 0 };
            err = err.with_location(file, line, col);
        }
        err.set_severity(Severity::Error);
        Some(err)
    }

    fn consumes_terminator(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.state = PyState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ParseContext {
        ParseContext::default()
    }

    #[test]
    fn pytest_failed_line() {
        let mut p = PythonParser::new();
        let err = p.parse("FAILED tests/test_a.py::test_one - AssertionError: boom", &ctx()).unwrap();
        assert_eq!(err.category, Category::Test);
        assert_eq!(err.file, "tests/test_a.py");
    }

    #[test]
    fn mypy_line() {
        let mut p = PythonParser::new();
        let err = p.parse("app/main.py:10: error: Incompatible types [arg-type]", &ctx()).unwrap();
        assert_eq!(err.category, Category::TypeCheck);
        assert_eq!(err.file, "app/main.py");
        assert_eq!(err.line, 10);
        assert_eq!(err.rule_id, "arg-type");
    }

    #[test]
    fn ruff_severity_by_code_prefix() {
        let mut p = PythonParser::new();
        let e = p.parse("a.py:1:1: F401 'os' imported but unused", &ctx()).unwrap();
        assert_eq!(e.severity, Severity::Error);
        let w = p.parse("a.py:1:1: E501 line too long", &ctx()).unwrap();
        assert_eq!(w.severity, Severity::Warning);
    }

    #[test]
    fn pylint_line() {
        let mut p = PythonParser::new();
        let err = p.parse("a.py:5:0: C0103: name doesn't conform (invalid-name)", &ctx()).unwrap();
        assert_eq!(err.rule_id, "invalid-name");
        assert_eq!(err.severity, Severity::Warning);
    }

    #[test]
    fn traceback_uses_deepest_frame() {
        let mut p = PythonParser::new();
        assert!(p.parse("Traceback (most recent call last):", &ctx()).is_none());
        assert!(p.continue_multi_line("  File \"/app/main.py\", line 10, in main", &ctx()));
        assert!(p.continue_multi_line("    result = process(data)", &ctx()));
        assert!(p.continue_multi_line("  File \"/app/transform.py\", line 42, in transform", &ctx()));
        assert!(p.continue_multi_line("    raise ValueError('bad')", &ctx()));
        assert!(!p.continue_multi_line("ValueError: bad", &ctx()));
        let err = p.finish_multi_line(&ctx()).unwrap();
        assert_eq!(err.file, "/app/transform.py");
        assert_eq!(err.line, 42);
        assert_eq!(err.message, "ValueError: bad");
        assert_eq!(err.category, Category::Runtime);
        assert!(err.stack_trace.contains("Traceback"));
    }

    #[test]
    fn syntax_error_consumes_caret_for_column() {
        let mut p = PythonParser::new();
        p.parse("Traceback (most recent call last):", &ctx());
        p.continue_multi_line("  File \"a.py\", line 3", &ctx());
        p.continue_multi_line("    def f(:", &ctx());
        p.continue_multi_line("        ^", &ctx());
        assert!(!p.continue_multi_line("SyntaxError: invalid syntax", &ctx()));
        let err = p.finish_multi_line(&ctx()).unwrap();
        assert_eq!(err.category, Category::Compile);
        assert!(err.column > 0);
    }

    #[test]
    fn standalone_exception_line() {
        let mut p = PythonParser::new();
        let err = p.parse("ValueError: something broke", &ctx()).unwrap();
        assert_eq!(err.category, Category::Runtime);
    }
}

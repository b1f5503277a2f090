//! Go compiler/linter/panic/test-failure parser.

use std::sync::LazyLock;

use regex::Regex;

use crate::limits::{GO_MULTILINE_MAX_BYTES, GO_MULTILINE_MAX_LINES};
use crate::model::{Category, ExtractedError, Severity};
use crate::registry::{ParseContext, ToolParser};

static COMPILE_WITH_COL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<file>[^\s:]+\.go):(?P<line>\d+):(?P<col>\d+):\s*(?P<msg>.+)$").unwrap());
static COMPILE_NO_COL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<file>[^\s:]+\.go):(?P<line>\d+):\s*(?P<msg>.+)$").unwrap());
static MODULE_ERROR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(go:\s.+|go\.mod:\d+:\s.+)$").unwrap());
static LINTER_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*) \(([A-Za-z0-9_.\-]+)\)$").unwrap());
static CODE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Z]+[0-9]+):\s(.+)$").unwrap());

static PANIC_TRIGGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^panic:\s").unwrap());
static GOROUTINE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^goroutine\s+\d+\s+\[[^\]]*\]:").unwrap());
static STACK_FRAME_LOCATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\S+\.go):(\d+)(?:\s|$)").unwrap());

static TEST_FAIL_TRIGGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^--- FAIL:\s+(\S+)").unwrap());
static TEST_INDENTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ {4,}\S").unwrap());
static TEST_FILE_LINE_MSG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*([^\s:]+\.go):(\d+):\s*(.+)$").unwrap());

const ERROR_LINTERS: &[&str] = &[
    "gosec", "errcheck", "govet", "ineffassign", "bodyclose", "unused", "copyloopvar", "fatcontext",
];
const WARNING_LINTERS: &[&str] = &[
    "gocritic", "gocyclo", "misspell", "golint", "revive", "gofmt", "gosimple", "testifylint", "stylecheck",
];

const NOISE_PREFIXES: &[&str] = &["=== RUN", "=== PAUSE", "=== CONT", "=== NAME", "--- PASS", "--- SKIP", "PASS", "FAIL\t", "? ", "# ", "go: downloading", "go: finding", "level=info msg="];

enum GoState {
    Idle,
    Panic(PanicAccum),
    TestFail(TestAccum),
}

struct PanicAccum {
    lines: Vec<String>,
    bytes: usize,
    seen_blank: bool,
    seen_goroutine: bool,
    location: Option<(String, u32)>,
    first_line: String,
}

struct TestAccum {
    test_name: String,
    lines: Vec<String>,
    bytes: usize,
    location: Option<(String, u32)>,
    message: Option<String>,
}

pub struct GoParser {
    state: GoState,
}

impl GoParser {
    #[must_use]
    pub fn new() -> Self {
        Self { state: GoState::Idle }
    }

    fn severity_for_linter(linter: &str, code: Option<&str>) -> Severity {
        if let Some(code) = code {
            if code.starts_with("SA") {
                return Severity::Error;
            }
            if code.starts_with('S') || code.starts_with("QF") {
                return Severity::Warning;
            }
        }
        if ERROR_LINTERS.contains(&linter) {
            Severity::Error
        } else if WARNING_LINTERS.contains(&linter) || linter == "staticcheck" {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    fn parse_single_line(line: &str) -> Option<ExtractedError> {
        if MODULE_ERROR.is_match(line) {
            return Some(ExtractedError::new(line, line, Category::Compile, "go"));
        }

        let caps = COMPILE_WITH_COL.captures(line).or_else(|| COMPILE_NO_COL.captures(line))?;
        let file = caps.name("file").unwrap().as_str().to_string();
        let ln: u32 = caps.name("line").unwrap().as_str().parse().ok()?;
        let col: u32 = caps.name("col").map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let mut msg = caps.name("msg").unwrap().as_str().to_string();

        let mut rule_id = String::new();
        let mut category = Category::Compile;
        let mut linter: Option<String> = None;

        if let Some(suf) = LINTER_SUFFIX.captures(&msg) {
            msg = suf.get(1).unwrap().as_str().to_string();
            linter = Some(suf.get(2).unwrap().as_str().to_string());
            category = Category::Lint;
        }

        let mut code: Option<String> = None;
        if let Some(c) = CODE_PREFIX.captures(&msg) {
            code = Some(c.get(1).unwrap().as_str().to_string());
            msg = c.get(2).unwrap().as_str().to_string();
            category = Category::Lint;
        }

        match (&code, &linter) {
            (Some(code), Some(linter)) => rule_id = format!("{code}/{linter}"),
            (Some(code), None) => rule_id = code.clone(),
            (None, Some(linter)) => rule_id = linter.clone(),
            (None, None) => {}
        }

        let severity = if category == Category::Lint {
            Self::severity_for_linter(linter.as_deref().unwrap_or(""), code.as_deref())
        } else {
            Severity::Error
        };

        let mut err = ExtractedError::new(msg, line, category, "go")
            .with_location(file, ln, col)
            .with_rule_id(rule_id);
        err.set_severity(severity);
        Some(err)
    }
}

impl Default for GoParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParser for GoParser {
    fn id(&self) -> &'static str {
        "go"
    }

    fn priority(&self) -> u8 {
        90
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if self.is_noise(line) {
            return 0.0;
        }
        if PANIC_TRIGGER.is_match(line) || TEST_FAIL_TRIGGER.is_match(line) {
            return 0.95;
        }
        if MODULE_ERROR.is_match(line) || COMPILE_WITH_COL.is_match(line) || COMPILE_NO_COL.is_match(line) {
            return 0.9;
        }
        0.0
    }

    fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
        if let Some(caps) = PANIC_TRIGGER.find(line) {
            let _ = caps;
            self.state = GoState::Panic(PanicAccum {
                lines: vec![line.to_string()],
                bytes: line.len(),
                seen_blank: false,
                seen_goroutine: false,
                location: None,
                first_line: line.to_string(),
            });
            return None;
        }

        if let Some(caps) = TEST_FAIL_TRIGGER.captures(line) {
            self.state = GoState::TestFail(TestAccum {
                test_name: caps.get(1).unwrap().as_str().to_string(),
                lines: vec![line.to_string()],
                bytes: line.len(),
                location: None,
                message: None,
            });
            return None;
        }

        Self::parse_single_line(line)
    }

    fn is_noise(&self, line: &str) -> bool {
        if NOISE_PREFIXES.iter().any(|p| line.starts_with(p)) {
            return true;
        }
        line.starts_with("ok ") || line.contains("coverage:") || line.starts_with("Issues:")
    }

    fn supports_multi_line(&self) -> bool {
        true
    }

    fn continue_multi_line(&mut self, line: &str, _ctx: &ParseContext) -> bool {
        match &mut self.state {
            GoState::Panic(acc) => {
                if acc.lines.len() >= GO_MULTILINE_MAX_LINES || acc.bytes >= GO_MULTILINE_MAX_BYTES {
                    return false;
                }
                if acc.location.is_none() {
                    if let Some(caps) = STACK_FRAME_LOCATION.captures(line) {
                        let file = caps.get(1).unwrap().as_str().to_string();
                        if let Ok(ln) = caps.get(2).unwrap().as_str().parse::<u32>() {
                            acc.location = Some((file, ln));
                        }
                    }
                }
                if GOROUTINE_HEADER.is_match(line.trim_start()) {
                    acc.seen_goroutine = true;
                }
                if line.trim().is_empty() {
                    if acc.seen_blank && acc.seen_goroutine {
                        return false;
                    }
                    acc.seen_blank = true;
                }
                acc.lines.push(line.to_string());
                acc.bytes += line.len();
                true
            }
            GoState::TestFail(acc) => {
                if acc.lines.len() >= GO_MULTILINE_MAX_LINES || acc.bytes >= GO_MULTILINE_MAX_BYTES {
                    return false;
                }
                if !TEST_INDENTED.is_match(line) {
                    return false;
                }
                if acc.location.is_none() {
                    if let Some(caps) = TEST_FILE_LINE_MSG.captures(line.trim_start()) {
                        let file = caps.get(1).unwrap().as_str().to_string();
                        if let Ok(ln) = caps.get(2).unwrap().as_str().parse::<u32>() {
                            acc.location = Some((file, ln));
                            acc.message = Some(caps.get(3).unwrap().as_str().to_string());
                        }
                    }
                }
                acc.lines.push(line.to_string());
                acc.bytes += line.len();
                true
            }
            GoState::Idle => false,
        }
    }

    fn finish_multi_line(&mut self, _ctx: &ParseContext) -> Option<ExtractedError> {
        let state = std::mem::replace(&mut self.state, GoState::Idle);
        match state {
            GoState::Idle => None,
            GoState::Panic(acc) => {
                let raw = acc.lines.join("\n");
                let message = acc
                    .first_line
                    .strip_prefix("panic: ")
                    .unwrap_or(&acc.first_line)
                    .to_string();
                let mut err = ExtractedError::new(message, acc.first_line.clone(), Category::Runtime, "go")
                    .with_stack_trace(raw);
                if let Some((file, ln)) = acc.location {
                    err = err.with_location(file, ln, 0);
                }
                err.set_severity(Severity::Error);
                Some(err)
            }
            GoState::TestFail(acc) => {
                let raw = acc.lines.join("\n");
                let message = acc.message.clone().unwrap_or_else(|| format!("test failed: {}", acc.test_name));
                let mut err = ExtractedError::new(message, raw.clone(), Category::Test, "go-test").with_stack_trace(raw);
                if let Some((file, ln)) = acc.location {
                    err = err.with_location(file, ln, 0);
                }
                err.set_severity(Severity::Error);
                Some(err)
            }
        }
    }

    fn reset(&mut self) {
        self.state = GoState::Idle;
    }
}

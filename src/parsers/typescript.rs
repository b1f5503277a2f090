//! TypeScript compiler (`tsc`) parser. Stateless — one
//! line in, zero or one error out; pretty-printed code frames are noise.

use std::sync::LazyLock;

use regex::Regex;

use crate::context::strip_ansi;
use crate::model::{Category, ExtractedError, Severity};
use crate::registry::{ParseContext, ToolParser};

static TS_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>[^()]+\.(?:d\.ts|d\.tsx|tsx|ts|mts|cts|mtsx|ctsx))\((?P<line>\d+),(?P<col>\d+)\):\s*(?:(?P<sev>error|warning)\s+(?:TS(?P<code>\d+):\s*)?)?(?P<msg>.+)$",
    )
    .unwrap()
});

const NOISE_PATTERNS: &[&str] = &[
    "Starting compilation in watch mode",
    "Found ",
    "Watching for file changes",
    "Projects in this build:",
    "is up to date because",
    "Skipping build of",
];

static CODE_FRAME_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d+\s*\|").unwrap());
static CODE_FRAME_CARET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\|\s*\^+").unwrap());
static WATCH_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[\d{1,2}:\d{2}:\d{2}\s*(AM|PM)?\]").unwrap());

/// Conceptual-category lookup for a TS error-code prefix. Not emitted on the
/// wire; kept for callers that want to bucket codes without re-deriving the
/// table themselves.
#[must_use]
pub fn ts_code_conceptual_category(code: &str) -> &'static str {
    match code.chars().next() {
        Some('1') => "syntax",
        Some('2') => "type-or-semantic",
        Some('5') => "config",
        Some('6') => "build-or-project-reference",
        Some('7') => "strict",
        Some('8') => "jsdoc",
        Some('9') => "advanced",
        _ if code.starts_with("17") || code.starts_with("18") => "jsx",
        _ => "other",
    }
}

pub struct TypeScriptParser;

impl TypeScriptParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TypeScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParser for TypeScriptParser {
    fn id(&self) -> &'static str {
        "typescript"
    }

    fn priority(&self) -> u8 {
        90
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        let cleaned = strip_ansi(line);
        if self.is_noise(&cleaned) {
            return 0.0;
        }
        if TS_DIAGNOSTIC.is_match(&cleaned) {
            0.9
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
        let cleaned = strip_ansi(line);
        let caps = TS_DIAGNOSTIC.captures(&cleaned)?;
        let file = caps.name("file").unwrap().as_str().to_string();
        let ln: u32 = caps.name("line").unwrap().as_str().parse().ok()?;
        let col: u32 = caps.name("col").unwrap().as_str().parse().ok()?;
        let msg = caps.name("msg").unwrap().as_str().to_string();
        let rule_id = caps.name("code").map_or(String::new(), |m| format!("TS{}", m.as_str()));

        let mut err = ExtractedError::new(msg, line, Category::TypeCheck, "typescript")
            .with_location(file, ln, col)
            .with_rule_id(rule_id);
        err.set_severity(Severity::Error);
        Some(err)
    }

    fn is_noise(&self, line: &str) -> bool {
        let cleaned = strip_ansi(line);
        NOISE_PATTERNS.iter().any(|p| cleaned.contains(p))
            || CODE_FRAME_LINE.is_match(&cleaned)
            || CODE_FRAME_CARET.is_match(&cleaned)
            || WATCH_TIMESTAMP.is_match(&cleaned)
    }

    fn reset(&mut self) {}
}

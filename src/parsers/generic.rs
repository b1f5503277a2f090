//! Generic fallback parser.
//! Flags lines that look like errors but match no dedicated parser. Always
//! registered last and never reported as a "dedicated" parser
//! (`ParserRegistry::has_dedicated_parser` excludes it by id).

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Category, ExtractedError};
use crate::registry::{ParseContext, ToolParser};

const AFFIRMATIVE_SUBSTRINGS: &[&str] = &[
    "Error:",
    "Fatal:",
    "permission denied",
    "command not found",
    "no such file",
    "segmentation fault",
    "out of memory",
];

static EXIT_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"exit code (?P<code>\d+)").unwrap());

static SOURCE_SHAPES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"if err != nil|\}\s*catch|throw new Error|setupErrorHandler").unwrap());

const SUCCESS_SUBSTRINGS: &[&str] = &["✓", " OK", "passed", "no errors", "succeeded", "completed successfully"];
const PROGRESS_SUBSTRINGS: &[&str] = &["Downloading", "Installing", "Using cached", "Retrying", "Cache hit"];
const TEST_FRAMEWORK_SUBSTRINGS: &[&str] = &["test result:", "tests passed", "Ran ", "collected ", "PASS ", "RUNS "];
const COVERAGE_SUBSTRINGS: &[&str] = &["Coverage summary", "% Lines", "Statements   :"];
const DOCKER_STEP_SUBSTRINGS: &[&str] = &["Step ", "--->", "Successfully built", "Successfully tagged"];

static STACK_FRAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*at\s|^\s*File \"").unwrap());
static GHA_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^::\w+::|^##\[").unwrap());
static URL_OR_PATH_ERROR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:https?://|/)\S*error\S*").unwrap());

fn has_affirmative_token(line: &str) -> bool {
    AFFIRMATIVE_SUBSTRINGS.iter().any(|t| line.contains(t)) || EXIT_CODE.captures(line).is_some_and(|c| c["code"] != *"0")
}

fn matches_negative_filter(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') || trimmed.starts_with("//") {
        return true;
    }
    if SOURCE_SHAPES.is_match(line) {
        return true;
    }
    if SUCCESS_SUBSTRINGS.iter().any(|t| line.contains(t)) {
        return true;
    }
    if PROGRESS_SUBSTRINGS.iter().any(|t| line.contains(t)) {
        return true;
    }
    if GHA_ANNOTATION.is_match(line) {
        return true;
    }
    if TEST_FRAMEWORK_SUBSTRINGS.iter().any(|t| line.contains(t)) {
        return true;
    }
    if COVERAGE_SUBSTRINGS.iter().any(|t| line.contains(t)) {
        return true;
    }
    if DOCKER_STEP_SUBSTRINGS.iter().any(|t| line.contains(t)) {
        return true;
    }
    if STACK_FRAME.is_match(line) {
        return true;
    }
    if URL_OR_PATH_ERROR.is_match(line) && !AFFIRMATIVE_SUBSTRINGS.iter().any(|t| line.contains(t)) {
        return true;
    }
    let len = line.len();
    len < 10 || len > 500
}

pub struct GenericParser;

impl GenericParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn looks_like_error(line: &str) -> bool {
        has_affirmative_token(line) && !matches_negative_filter(line)
    }
}

impl Default for GenericParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParser for GenericParser {
    fn id(&self) -> &'static str {
        "generic"
    }

    fn priority(&self) -> u8 {
        10
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if Self::looks_like_error(line) {
            0.3
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
        if !Self::looks_like_error(line) {
            return None;
        }
        Some(ExtractedError::new(line.trim(), line, Category::Unknown, "generic").as_unknown_pattern())
    }

    fn is_noise(&self, _line: &str) -> bool {
        false
    }

    fn reset(&mut self) {}
}

//! ESLint parser — stylish (multi-line per file) and
//! unix/compact (one line per diagnostic) formats.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Category, ExtractedError, Severity};
use crate::registry::{ParseContext, ToolParser};

static BARE_FILE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(/[^\s:]+|[A-Za-z]:[\\/][^\s:]+|\./[^\s:]+)\.(?:js|jsx|mjs|cjs|ts|tsx)$").unwrap());
static STYLISH_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{2,}(\d+):(\d+)\s+(error|warning)\s+(.+?)\s{2,}(\S+)$").unwrap());
static UNIX_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<file>[^\s:]+\.(?:js|jsx|mjs|cjs|ts|tsx)):(?P<line>\d+):(?P<col>\d+):\s*(?P<msg>.+?)\s*\[(?P<sev>error|warning)/(?P<rule>[^\]]+)\]$").unwrap());
static SUMMARY_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[✖✓]\s|problems? \(|potentially fixable|All files pass linting").unwrap());

pub struct EsLintParser {
    last_file: Option<String>,
}

impl EsLintParser {
    #[must_use]
    pub fn new() -> Self {
        Self { last_file: None }
    }

    fn severity_from_str(s: &str) -> Severity {
        if s == "error" {
            Severity::Error
        } else {
            Severity::Warning
        }
    }
}

impl Default for EsLintParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParser for EsLintParser {
    fn id(&self) -> &'static str {
        "eslint"
    }

    fn priority(&self) -> u8 {
        85
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if UNIX_ENTRY.is_match(line) {
            0.85
        } else if BARE_FILE_PATH.is_match(line.trim()) {
            0.6
        } else if self.last_file.is_some() && STYLISH_ENTRY.is_match(line) {
            0.85
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
        if let Some(caps) = UNIX_ENTRY.captures(line) {
            let mut err = ExtractedError::new(
                caps.name("msg").unwrap().as_str(),
                line,
                Category::Lint,
                "eslint",
            )
            .with_location(
                caps.name("file").unwrap().as_str(),
                caps.name("line").unwrap().as_str().parse().ok()?,
                caps.name("col").unwrap().as_str().parse().ok()?,
            )
            .with_rule_id(caps.name("rule").unwrap().as_str());
            err.set_severity(Self::severity_from_str(caps.name("sev").unwrap().as_str()));
            return Some(err);
        }

        let trimmed = line.trim();
        if BARE_FILE_PATH.is_match(trimmed) {
            self.last_file = Some(trimmed.to_string());
            return None;
        }

        if let Some(file) = self.last_file.clone() {
            if let Some(caps) = STYLISH_ENTRY.captures(line) {
                let mut err = ExtractedError::new(
                    caps.get(4).unwrap().as_str().trim(),
                    line,
                    Category::Lint,
                    "eslint",
                )
                .with_location(
                    file,
                    caps.get(1).unwrap().as_str().parse().ok()?,
                    caps.get(2).unwrap().as_str().parse().ok()?,
                )
                .with_rule_id(caps.get(5).unwrap().as_str());
                err.set_severity(Self::severity_from_str(caps.get(3).unwrap().as_str()));
                return Some(err);
            }
        }
        None
    }

    fn is_noise(&self, line: &str) -> bool {
        SUMMARY_LINE.is_match(line.trim())
    }

    fn reset(&mut self) {
        self.last_file = None;
    }
}

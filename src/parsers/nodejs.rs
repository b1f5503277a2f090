//! Node.js runtime parser. Recognizes a bare stack frame
//! line; it carries no category/severity information of its own, so every
//! hit is reported as a generic runtime error.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Category, ExtractedError, Severity};
use crate::registry::{ParseContext, ToolParser};

static STACK_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at\s+(?:(?P<func>.+?)\s+\()?(?P<file>[^()\s]+):(?P<line>\d+):(?P<col>\d+)\)?\s*$").unwrap()
});

pub struct NodeJsParser;

impl NodeJsParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for NodeJsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParser for NodeJsParser {
    fn id(&self) -> &'static str {
        "nodejs"
    }

    fn priority(&self) -> u8 {
        80
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if STACK_FRAME.is_match(line) {
            0.7
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
        let caps = STACK_FRAME.captures(line)?;
        let file = caps.name("file").unwrap().as_str().to_string();
        let ln: u32 = caps.name("line").unwrap().as_str().parse().ok()?;
        let col: u32 = caps.name("col").unwrap().as_str().parse().ok()?;

        let mut err = ExtractedError::new("Node.js error", line, Category::Runtime, "nodejs").with_location(file, ln, col);
        err.set_severity(Severity::Error);
        Some(err)
    }

    fn is_noise(&self, _line: &str) -> bool {
        false
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_with_function_name() {
        let mut p = NodeJsParser::new();
        let err = p.parse("    at Object.process (/app/index.js:12:5)", &ParseContext::default()).unwrap();
        assert_eq!(err.file, "/app/index.js");
        assert_eq!(err.line, 12);
        assert_eq!(err.column, 5);
        assert_eq!(err.message, "Node.js error");
        assert_eq!(err.category, Category::Runtime);
    }

    #[test]
    fn parses_bare_frame_without_function_name() {
        let mut p = NodeJsParser::new();
        let err = p.parse("    at /app/index.js:12:5", &ParseContext::default()).unwrap();
        assert_eq!(err.file, "/app/index.js");
        assert_eq!(err.line, 12);
    }

    #[test]
    fn rejects_unrelated_lines() {
        let p = NodeJsParser::new();
        assert_eq!(p.can_parse("npm ERR! missing script: build", &ParseContext::default()), 0.0);
    }
}

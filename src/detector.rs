//! Tool Detector. Given the shell command(s) a CI step
//! actually ran, guesses which parser(s) apply — lets the registry take the
//! tool-hint fast path instead of scoring every line.

use std::sync::LazyLock;

use regex::Regex;

use crate::registry::ParserRegistry;

/// Ordered (pattern, parser id) table. First match wins per segment.
static TOOL_TABLE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"golangci-lint\s").unwrap(), "go"),
        (Regex::new(r"^go\s+(test|build|vet|run)\b").unwrap(), "go"),
        (Regex::new(r"(?:^|\s)(?:npx|bunx|yarn|pnpm(?:\s+exec)?)\s+tsc\b|^tsc\b").unwrap(), "typescript"),
        (Regex::new(r"(?:^|\s)(?:npx|bunx|yarn|pnpm(?:\s+exec)?)\s+eslint\b|^eslint\b").unwrap(), "eslint"),
        (Regex::new(r"^cargo\s+(test|build|check|clippy|run|fmt)\b").unwrap(), "rust"),
        (Regex::new(r"^pytest\b").unwrap(), "python"),
        (Regex::new(r"^mypy\b").unwrap(), "python"),
        (Regex::new(r"^ruff\b").unwrap(), "python"),
        (Regex::new(r"^pylint\b").unwrap(), "python"),
        (Regex::new(r"^flake8\b").unwrap(), "python"),
        (Regex::new(r"^node\b").unwrap(), "nodejs"),
        (Regex::new(r"^docker\s").unwrap(), "docker"),
        (Regex::new(r"^(mvn|gradle)\b").unwrap(), "java"),
        (Regex::new(r"^rspec\b").unwrap(), "ruby"),
        (Regex::new(r"^(phpunit|composer)\b").unwrap(), "php"),
        (Regex::new(r"^(gcc|g\+\+|clang|clang\+\+|make)\b").unwrap(), "c"),
    ]
});

/// A tool identified in a run's command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedTool {
    pub parser_id: String,
    pub segment: String,
}

/// Split `command` into shell segments on `&&`, `||`, `;`, `|`, respecting
/// single/double quotes and backslash escapes.
fn split_segments(command: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = command.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        if c == '\\' && !in_single {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
            continue;
        }
        if c == '\'' && !in_double {
            in_single = !in_single;
            current.push(c);
            continue;
        }
        if c == '"' && !in_single {
            in_double = !in_double;
            current.push(c);
            continue;
        }
        if !in_single && !in_double {
            if c == '&' && chars.peek() == Some(&'&') {
                chars.next();
                segments.push(std::mem::take(&mut current));
                continue;
            }
            if c == '|' && chars.peek() == Some(&'|') {
                chars.next();
                segments.push(std::mem::take(&mut current));
                continue;
            }
            if c == ';' || c == '|' {
                segments.push(std::mem::take(&mut current));
                continue;
            }
        }
        current.push(c);
    }
    segments.push(current);
    segments
}

fn iter_segments(command: &str) -> Vec<String> {
    command
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .flat_map(|line| split_segments(line))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn match_segment(segment: &str) -> Option<&'static str> {
    TOOL_TABLE.iter().find(|(re, _)| re.is_match(segment)).map(|(_, id)| *id)
}

/// First tool recognized across the whole command string, or `None`.
#[must_use]
pub fn detect_tool_from_run(command: &str) -> Option<String> {
    iter_segments(command).iter().find_map(|seg| match_segment(seg).map(str::to_string))
}

/// Every distinct tool recognized across the command string, in first-seen order.
#[must_use]
pub fn detect_all_tools_from_run(command: &str) -> Vec<DetectedTool> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for segment in iter_segments(command) {
        if let Some(id) = match_segment(&segment) {
            if seen.insert(id) {
                out.push(DetectedTool {
                    parser_id: id.to_string(),
                    segment,
                });
            }
        }
    }
    out
}

/// Result of checking detected tools against a registry's dedicated-parser
/// coverage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSupport {
    pub tool: DetectedTool,
    pub supported: bool,
}

/// Detect every tool and report whether the registry has a dedicated
/// parser for each.
#[must_use]
pub fn detect_all_and_check_support(command: &str, registry: &ParserRegistry) -> Vec<ToolSupport> {
    detect_all_tools_from_run(command)
        .into_iter()
        .map(|tool| {
            let supported = registry.has_dedicated_parser(&tool.parser_id);
            ToolSupport { tool, supported }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_registry;

    #[test]
    fn detects_go_test_invocation() {
        assert_eq!(detect_tool_from_run("go test ./...").as_deref(), Some("go"));
    }

    #[test]
    fn detects_tsc_through_npx() {
        assert_eq!(detect_tool_from_run("npx tsc --noEmit").as_deref(), Some("typescript"));
    }

    #[test]
    fn detects_cargo_clippy() {
        assert_eq!(detect_tool_from_run("cargo clippy --all-targets").as_deref(), Some("rust"));
    }

    #[test]
    fn splits_on_shell_separators_with_quote_awareness() {
        let cmd = r#"echo "a && b" && go test ./..."#;
        let tools = detect_all_tools_from_run(cmd);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].parser_id, "go");
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let cmd = "# run the suite\n\npytest -x\n";
        assert_eq!(detect_tool_from_run(cmd).as_deref(), Some("python"));
    }

    #[test]
    fn detects_multiple_distinct_tools() {
        let cmd = "go build ./... && go test ./... && golangci-lint run";
        let tools = detect_all_tools_from_run(cmd);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].parser_id, "go");
    }

    #[test]
    fn check_support_flags_java_as_unsupported() {
        let registry = default_registry();
        let results = detect_all_and_check_support("mvn test", &registry);
        assert_eq!(results.len(), 1);
        assert!(!results[0].supported);
    }

    #[test]
    fn check_support_flags_go_as_supported() {
        let registry = default_registry();
        let results = detect_all_and_check_support("go test ./...", &registry);
        assert!(results[0].supported);
    }
}

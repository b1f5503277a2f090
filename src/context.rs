//! Context Parser.
//!
//! Runs ahead of every tool parser: strips ANSI, recognizes the CI runner's
//! `[job/step] | payload` framing, and flags lines the runner itself marks
//! as noise. It never recognizes an *error* — only prepares the line and
//! tracks which job/step produced it.

use std::sync::LazyLock;

use regex::Regex;

/// ANSI CSI sequences (`ESC [ ... letter`) and OSC sequences
/// (`ESC ] ... BEL` or `ESC ] ... ESC \`).
static ANSI_CSI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap());
static ANSI_OSC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)").unwrap());

/// `[job-or-workflow/step] | payload` — GitHub-Actions-runner style prefix.
static PREFIXED_JOB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[([^\]]+)\]\s*\|\s?(.*)$").unwrap());
/// Bare `[job] rest` with no pipe separator.
static BARE_JOB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[([^\]]+)\]\s?(.*)$").unwrap());

/// GitHub Actions workflow-command / group markers — runner-internal noise
/// that only the context parser (not any tool parser) needs to recognize.
static GHA_COMMAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(##\[(group|endgroup|section)\]|::(debug|notice|warning|error|group|endgroup)::)").unwrap());

/// Strip all recognized ANSI escape sequences from `line` in a single pass.
#[must_use]
pub fn strip_ansi(line: &str) -> String {
    let without_osc = ANSI_OSC.replace_all(line, "");
    ANSI_CSI.replace_all(&without_osc, "").into_owned()
}

/// Result of preparing one raw line for tool parsing.
#[derive(Debug, Clone, Default)]
pub struct LineContext {
    /// Job (or `job/step`) extracted from a runner prefix, if any.
    pub job: Option<String>,
    /// The line with runner framing and ANSI sequences stripped.
    pub payload: String,
    /// True if this line carries no diagnostic information at all.
    pub skip: bool,
}

/// Contract every runner-specific context parser must satisfy.
///
/// Implementations are stateful (they track the current job) and are NOT
/// safe to share across concurrent extraction passes.
pub trait ContextParser: Send {
    fn parse_line(&mut self, raw: &str) -> LineContext;
    fn reset(&mut self);
}

/// The engine's own GitHub-Actions-compatible context parser. Consumers
/// embedding a different CI runner provide their own `ContextParser` impl;
/// this one is the default wired into [`crate::extractor::Extractor::new`].
#[derive(Debug, Default)]
pub struct DefaultContextParser {
    current_job: Option<String>,
}

impl DefaultContextParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContextParser for DefaultContextParser {
    fn parse_line(&mut self, raw: &str) -> LineContext {
        let cleaned = strip_ansi(raw);
        let trimmed_end = cleaned.trim_end_matches(['\r', '\n']);

        if trimmed_end.trim().is_empty() {
            return LineContext {
                job: None,
                payload: String::new(),
                skip: true,
            };
        }

        if GHA_COMMAND.is_match(trimmed_end) {
            return LineContext {
                job: self.current_job.clone(),
                payload: trimmed_end.to_string(),
                skip: true,
            };
        }

        if let Some(caps) = PREFIXED_JOB.captures(trimmed_end) {
            let job = caps.get(1).unwrap().as_str().to_string();
            let payload = caps.get(2).unwrap().as_str().to_string();
            self.current_job = Some(job.clone());
            return LineContext {
                job: Some(job),
                payload,
                skip: false,
            };
        }

        if let Some(caps) = BARE_JOB.captures(trimmed_end) {
            let job = caps.get(1).unwrap().as_str().to_string();
            let payload = caps.get(2).unwrap().as_str().to_string();
            self.current_job = Some(job.clone());
            return LineContext {
                job: Some(job),
                payload,
                skip: false,
            };
        }

        LineContext {
            job: self.current_job.clone(),
            payload: trimmed_end.to_string(),
            skip: false,
        }
    }

    fn reset(&mut self) {
        self.current_job = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_csi_color_codes() {
        let colored = "\x1b[31merror\x1b[0m: boom";
        assert_eq!(strip_ansi(colored), "error: boom");
    }

    #[test]
    fn strips_osc_title_sequence() {
        let s = "\x1b]0;window title\x07error: boom";
        assert_eq!(strip_ansi(s), "error: boom");
    }

    #[test]
    fn recognizes_prefixed_job() {
        let mut cp = DefaultContextParser::new();
        let lc = cp.parse_line("[CI/build] | main.go:10:5: undefined: foo");
        assert_eq!(lc.job.as_deref(), Some("CI/build"));
        assert_eq!(lc.payload, "main.go:10:5: undefined: foo");
        assert!(!lc.skip);
    }

    #[test]
    fn recognizes_bare_job_prefix() {
        let mut cp = DefaultContextParser::new();
        let lc = cp.parse_line("[build] some output");
        assert_eq!(lc.job.as_deref(), Some("build"));
        assert_eq!(lc.payload, "some output");
    }

    #[test]
    fn current_job_persists_across_lines() {
        let mut cp = DefaultContextParser::new();
        cp.parse_line("[CI/build] | line one");
        let lc = cp.parse_line("line two, no prefix");
        assert_eq!(lc.job.as_deref(), Some("CI/build"));
        assert_eq!(lc.payload, "line two, no prefix");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut cp = DefaultContextParser::new();
        let lc = cp.parse_line("   \t  ");
        assert!(lc.skip);
    }

    #[test]
    fn gha_group_markers_are_skipped_but_keep_job() {
        let mut cp = DefaultContextParser::new();
        cp.parse_line("[CI/build] | setup");
        let lc = cp.parse_line("##[group]Run tests");
        assert!(lc.skip);
        assert_eq!(lc.job.as_deref(), Some("CI/build"));
    }

    #[test]
    fn reset_clears_current_job() {
        let mut cp = DefaultContextParser::new();
        cp.parse_line("[CI/build] | line one");
        cp.reset();
        let lc = cp.parse_line("line two");
        assert_eq!(lc.job, None);
    }
}

//! Extractor driver — the line-by-line scan that ties the context parser,
//! parser registry, and dedup set together.

use std::collections::HashSet;
use std::sync::OnceLock;

use tracing::{debug, trace, warn};

use crate::context::{ContextParser, DefaultContextParser};
use crate::limits::{MAX_DEDUPLICATION_SIZE, UNKNOWN_PATTERN_TELEMETRY_MAX};
use crate::model::{ExtractedError, WorkflowContext};
use crate::registry::{default_registry, ParseContext, ParserRegistry};
use crate::sanitize::sanitize_pattern_for_telemetry;

/// Lines longer than this are rejected outright rather than fed to any parser.
pub use crate::limits::MAX_LINE_LENGTH;

/// Set once at startup; `None` means the default no-op. Runtime mutation
/// isn't required, so a second call to [`set_unknown_pattern_reporter`] is
/// silently ignored rather than swapped in.
static UNKNOWN_PATTERN_REPORTER: OnceLock<Box<dyn Fn(&[String]) + Send + Sync>> = OnceLock::new();

/// Register the callback invoked once per [`Extractor::extract`] pass with
/// up to [`UNKNOWN_PATTERN_TELEMETRY_MAX`] sanitized raw lines from `unknown_pattern`
/// errors. Only the first registration takes effect.
pub fn set_unknown_pattern_reporter(reporter: impl Fn(&[String]) + Send + Sync + 'static) {
    let _ = UNKNOWN_PATTERN_REPORTER.set(Box::new(reporter));
}

/// Drives a single extraction pass over CI output.
///
/// Not `Sync`: parsers accumulate state across lines, so one `Extractor`
/// (and the registry/context parser it owns) serves one extraction at a time.
pub struct Extractor {
    registry: ParserRegistry,
    context_parser: Box<dyn ContextParser>,
    current_workflow_context: WorkflowContext,
    active_parser: Option<usize>,
    seen: HashSet<(String, String, u32)>,
    unknown_patterns: Vec<String>,
}

impl Extractor {
    /// Build an extractor wired with all built-in tool parsers and the
    /// GitHub-Actions-compatible default context parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: default_registry(),
            context_parser: Box::new(DefaultContextParser::new()),
            current_workflow_context: WorkflowContext::default(),
            active_parser: None,
            seen: HashSet::new(),
            unknown_patterns: Vec::new(),
        }
    }

    /// Build an extractor with a caller-supplied context parser, for CI
    /// runners that don't share GitHub Actions' `[job/step] | payload`
    /// framing.
    #[must_use]
    pub fn with_context_parser(context_parser: Box<dyn ContextParser>) -> Self {
        Self {
            context_parser,
            ..Self::new()
        }
    }

    /// Clear all per-run state so the same `Extractor` can be reused.
    pub fn reset(&mut self) {
        self.current_workflow_context = WorkflowContext::default();
        self.active_parser = None;
        self.seen.clear();
        self.unknown_patterns.clear();
        self.context_parser.reset();
        self.registry.reset_all();
    }

    /// Run the full driver loop over `output`, returning every distinct
    /// error recognized, in scan order.
    #[tracing::instrument(skip(self, output), fields(lines = output.lines().count()))]
    pub fn extract(&mut self, output: &str) -> Vec<ExtractedError> {
        let mut results = Vec::new();
        self.unknown_patterns.clear();

        for raw in output.lines() {
            if raw.len() > MAX_LINE_LENGTH {
                trace!(len = raw.len(), "rejecting oversized line");
                continue;
            }

            let line_ctx = self.context_parser.parse_line(raw);
            if line_ctx.skip && self.active_parser.is_none() {
                continue;
            }

            if let Some(job) = &line_ctx.job {
                self.current_workflow_context = WorkflowContext {
                    job: Some(job.clone()),
                    step: None,
                    action: None,
                };
            }

            let clean_line = line_ctx.payload;
            let ctx = ParseContext {
                tool: None,
                workflow: self.current_workflow_context.clone(),
            };

            if self.registry.is_noise(&clean_line) {
                continue;
            }

            let mut found = None;
            let mut redispatch = true;

            if let Some(idx) = self.active_parser {
                if self.registry.continue_multi_line(idx, &clean_line, &ctx) {
                    continue;
                }
                found = self.registry.finish_multi_line(idx, &ctx);
                redispatch = !self.registry.consumes_terminator(idx);
                self.active_parser = None;
                if let Some(err) = found.take() {
                    self.emit(err, &mut results);
                }
            }

            if !redispatch {
                continue;
            }

            if let Some(idx) = self.registry.find_parser(&clean_line, &ctx) {
                let parsed = self.registry.parse_at(idx, &clean_line, &ctx);
                if parsed.is_none() && self.registry.supports_multi_line(idx) {
                    self.active_parser = Some(idx);
                    debug!(parser = self.registry.parser_id(idx), "started multi-line accumulation");
                } else if let Some(err) = parsed {
                    self.emit(err, &mut results);
                }
            }
        }

        if let Some(idx) = self.active_parser.take() {
            if let Some(err) = self.registry.finish_multi_line(idx, &ParseContext {
                tool: None,
                workflow: self.current_workflow_context.clone(),
            }) {
                self.emit(err, &mut results);
            }
        }

        if let Some(reporter) = UNKNOWN_PATTERN_REPORTER.get() {
            reporter(&self.unknown_patterns);
        }

        results
    }

    fn emit(&mut self, mut err: ExtractedError, results: &mut Vec<ExtractedError>) {
        if err.workflow_context.is_empty() {
            err.workflow_context = self.current_workflow_context.clone();
        }

        if err.unknown_pattern && self.unknown_patterns.len() < UNKNOWN_PATTERN_TELEMETRY_MAX {
            self.unknown_patterns.push(sanitize_pattern_for_telemetry(&err.raw));
        }

        let key = err.dedup_key();
        if self.seen.len() >= MAX_DEDUPLICATION_SIZE {
            warn!(size = self.seen.len(), "dedup set at capacity, failing open");
            results.push(err);
            return;
        }
        if self.seen.insert(key) {
            results.push(err);
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Severity};

    #[test]
    fn extracts_single_line_go_error() {
        let mut ex = Extractor::new();
        let errs = ex.extract("main.go:10:5: undefined: foo\n");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].file, "main.go");
        assert_eq!(errs[0].category, Category::Compile);
    }

    #[test]
    fn dedups_repeated_identical_errors() {
        let mut ex = Extractor::new();
        let log = "main.go:10:5: undefined: foo\nmain.go:10:5: undefined: foo\n";
        let errs = ex.extract(log);
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn go_panic_block_emits_once_with_location() {
        let mut ex = Extractor::new();
        let log = "panic: runtime error: index out of range\n\ngoroutine 1 [running]:\nmain.main()\n\t/app/main.go:42 +0x1b\n\n";
        let errs = ex.extract(log);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].category, Category::Runtime);
        assert_eq!(errs[0].file, "/app/main.go");
    }

    #[test]
    fn rust_error_followed_immediately_by_next_header_both_emit() {
        let mut ex = Extractor::new();
        let log = "error[E0382]: use of moved value\n  --> src/main.rs:3:3\nerror[E0308]: mismatched types\n  --> src/main.rs:10:1\n\n";
        let errs = ex.extract(log);
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].rule_id, "E0382");
        assert_eq!(errs[1].rule_id, "E0308");
    }

    #[test]
    fn python_traceback_terminator_is_not_redispatched_as_generic() {
        let mut ex = Extractor::new();
        let log = "Traceback (most recent call last):\n  File \"/app/main.py\", line 10, in main\n    result = process(data)\n  File \"/app/transform.py\", line 42, in transform\n    raise ValueError('bad')\nValueError: bad\n";
        let errs = ex.extract(log);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].source, "python");
        assert_eq!(errs[0].file, "/app/transform.py");
        assert_eq!(errs[0].line, 42);
    }

    #[test]
    fn workflow_context_mirrors_prefixed_job() {
        let mut ex = Extractor::new();
        let log = "[CI/build] | main.go:10:5: undefined: foo\n";
        let errs = ex.extract(log);
        assert_eq!(errs[0].workflow_context.job.as_deref(), Some("CI/build"));
        assert_eq!(errs[0].workflow_context.step, None);
    }

    #[test]
    fn oversized_line_is_rejected() {
        let mut ex = Extractor::new();
        let huge = "x".repeat(MAX_LINE_LENGTH + 10);
        let errs = ex.extract(&huge);
        assert!(errs.is_empty());
    }

    #[test]
    fn reset_clears_dedup_and_active_parser() {
        let mut ex = Extractor::new();
        ex.extract("main.go:10:5: undefined: foo\n");
        ex.reset();
        let errs = ex.extract("main.go:10:5: undefined: foo\n");
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn unrecognized_noise_produces_nothing() {
        let mut ex = Extractor::new();
        let errs = ex.extract("Building project...\nRunning tests...\n");
        assert!(errs.is_empty());
    }

    #[test]
    fn unknown_pattern_reporter_receives_sanitized_lines() {
        use std::sync::{Arc, Mutex};

        let captured: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        set_unknown_pattern_reporter(move |patterns| {
            *sink.lock().unwrap() = patterns.to_vec();
        });

        let mut ex = Extractor::new();
        let errs = ex.extract("Error: could not acquire lock on /tmp/build.lock\n");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].unknown_pattern);

        let seen = captured.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("could not acquire lock"));
    }

    #[test]
    fn clippy_elevation_end_to_end() {
        let mut ex = Extractor::new();
        let log = "warning: used unwrap() on a Result value\n  --> src/main.rs:15:5\n   = note: `#[warn(clippy::unwrap_used)]` on by default\n\n";
        let errs = ex.extract(log);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].severity, Severity::Error);
        assert_eq!(errs[0].rule_id, "clippy::unwrap_used");
    }
}

//! Parser Registry.
//!
//! Holds the set of registered [`ToolParser`]s and routes each line to the
//! right one by tool hint, extension fast path, or scored scan. The registry
//! container is safe for concurrent lookup/registration; the parsers it
//! holds are not safe for concurrent *use* — run one [`crate::Extractor`]
//! (and therefore one registry) per extraction pass.

use std::sync::RwLock;

use crate::model::{ExtractedError, WorkflowContext};

/// Per-line context threaded through every `ToolParser` call.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Pre-identified tool for the current step, if the caller already ran
    /// command detection and knows it.
    pub tool: Option<String>,
    /// Current job/step, mirrored from the context parser.
    pub workflow: WorkflowContext,
}

/// Capability set every tool-specific parser implements.
///
/// `Parse`/`ContinueMultiLine`/`FinishMultiLine` take `&mut self` because
/// multi-line parsers own accumulation state; nothing here is `Sync`.
pub trait ToolParser: Send {
    /// Unique short identifier, e.g. `"go"`, `"typescript"`.
    fn id(&self) -> &'static str;

    /// Routing priority, 0-100. Higher is tried first on ties.
    fn priority(&self) -> u8;

    /// Confidence in `[0, 1]` that this parser recognizes `line`. `0.0` means no.
    fn can_parse(&self, line: &str, ctx: &ParseContext) -> f32;

    /// Parse a single line. Returns `None` if this isn't my line, or if a
    /// multi-line block was just started internally (check
    /// `supports_multi_line()` to disambiguate).
    fn parse(&mut self, line: &str, ctx: &ParseContext) -> Option<ExtractedError>;

    /// True if `line` is this tool's own decorative/informational noise.
    fn is_noise(&self, line: &str) -> bool;

    /// True if this parser accumulates state across lines.
    fn supports_multi_line(&self) -> bool {
        false
    }

    /// Feed a continuation line into an in-progress multi-line block.
    /// Returns `false` to signal the block has ended (caller should then
    /// call `finish_multi_line` and re-dispatch this same line).
    fn continue_multi_line(&mut self, _line: &str, _ctx: &ParseContext) -> bool {
        false
    }

    /// Finalize any in-progress multi-line block.
    fn finish_multi_line(&mut self, _ctx: &ParseContext) -> Option<ExtractedError> {
        None
    }

    /// True if the line that just ended a multi-line block (the one
    /// `continue_multi_line` returned `false` on) was itself fully absorbed
    /// into the finished error and should not be re-dispatched for a fresh
    /// parse. Most parsers terminate on boundary noise or a new header that
    /// still needs normal selection; Python's traceback terminator carries
    /// the exception type/message the finished error already reports, so
    /// re-parsing it would double-emit.
    fn consumes_terminator(&self) -> bool {
        false
    }

    /// Clear all accumulated state.
    fn reset(&mut self);
}

/// Cheap extension-based routing hint table.
const EXTENSION_HINTS: &[(&str, &str)] = &[
    (".go", "go"),
    (".tsx", "typescript"),
    (".mts", "typescript"),
    (".cts", "typescript"),
    (".ts", "typescript"),
    (".rs", "rust"),
    (".py", "python"),
    (".pyi", "python"),
    (".mjs", "eslint"),
    (".cjs", "eslint"),
    (".jsx", "eslint"),
    (".js", "eslint"),
];

/// Holds registered parsers and routes lines to the best match.
pub struct ParserRegistry {
    parsers: RwLock<Vec<Box<dyn ToolParser>>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: RwLock::new(Vec::new()),
        }
    }

    /// Register a parser. Safe to call concurrently with lookups.
    pub fn register(&self, parser: Box<dyn ToolParser>) {
        self.parsers.write().unwrap().push(parser);
    }

    /// True if a non-generic parser with this id is registered.
    #[must_use]
    pub fn has_dedicated_parser(&self, id: &str) -> bool {
        if id == "generic" {
            return false;
        }
        self.parsers.read().unwrap().iter().any(|p| p.id() == id)
    }

    /// True if ANY registered parser considers `line` noise.
    #[must_use]
    pub fn is_noise(&self, line: &str) -> bool {
        self.parsers.read().unwrap().iter().any(|p| p.is_noise(line))
    }

    /// Picks the best parser for a line. Returns the index of the chosen
    /// parser (stable across calls as long as the registered set doesn't
    /// change).
    #[must_use]
    pub fn find_parser(&self, line: &str, ctx: &ParseContext) -> Option<usize> {
        let parsers = self.parsers.read().unwrap();

        // 1. Explicit tool hint.
        if let Some(tool) = &ctx.tool {
            if let Some(idx) = parsers.iter().position(|p| p.id() == tool) {
                return Some(idx);
            }
        }

        // 2. Extension fast path.
        for (ext, parser_id) in EXTENSION_HINTS {
            if line.contains(ext) {
                if let Some(idx) = parsers.iter().position(|p| p.id() == *parser_id) {
                    if parsers[idx].can_parse(line, ctx) > 0.0 {
                        return Some(idx);
                    }
                }
                break;
            }
        }

        // 3. Scored scan, highest priority first, first max wins (stable).
        let mut order: Vec<usize> = (0..parsers.len()).collect();
        order.sort_by(|&a, &b| parsers[b].priority().cmp(&parsers[a].priority()));

        let mut best: Option<(usize, f32)> = None;
        for idx in order {
            let score = parsers[idx].can_parse(line, ctx);
            if score > 0.0 {
                match best {
                    Some((_, best_score)) if best_score >= score => {}
                    _ => best = Some((idx, score)),
                }
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Dispatch `parse` to the parser at `idx`.
    pub fn parse_at(&self, idx: usize, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        self.parsers.write().unwrap()[idx].parse(line, ctx)
    }

    #[must_use]
    pub fn supports_multi_line(&self, idx: usize) -> bool {
        self.parsers.read().unwrap()[idx].supports_multi_line()
    }

    pub fn continue_multi_line(&self, idx: usize, line: &str, ctx: &ParseContext) -> bool {
        self.parsers.write().unwrap()[idx].continue_multi_line(line, ctx)
    }

    pub fn finish_multi_line(&self, idx: usize, ctx: &ParseContext) -> Option<ExtractedError> {
        self.parsers.write().unwrap()[idx].finish_multi_line(ctx)
    }

    #[must_use]
    pub fn consumes_terminator(&self, idx: usize) -> bool {
        self.parsers.read().unwrap()[idx].consumes_terminator()
    }

    #[must_use]
    pub fn parser_id(&self, idx: usize) -> &'static str {
        self.parsers.read().unwrap()[idx].id()
    }

    /// Reset all registered parsers' accumulated state.
    pub fn reset_all(&self) {
        for p in self.parsers.write().unwrap().iter_mut() {
            p.reset();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parsers.read().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the registry wired with all built-in tool parsers.
#[must_use]
pub fn default_registry() -> ParserRegistry {
    let registry = ParserRegistry::new();
    registry.register(Box::new(crate::parsers::go::GoParser::new()));
    registry.register(Box::new(crate::parsers::typescript::TypeScriptParser::new()));
    registry.register(Box::new(crate::parsers::eslint::EsLintParser::new()));
    registry.register(Box::new(crate::parsers::rust::RustParser::new()));
    registry.register(Box::new(crate::parsers::python::PythonParser::new()));
    registry.register(Box::new(crate::parsers::nodejs::NodeJsParser::new()));
    registry.register(Box::new(crate::parsers::docker::DockerParser::new()));
    registry.register(Box::new(crate::parsers::generic::GenericParser::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    struct StubParser {
        id: &'static str,
        priority: u8,
        score: f32,
    }

    impl ToolParser for StubParser {
        fn id(&self) -> &'static str {
            self.id
        }
        fn priority(&self) -> u8 {
            self.priority
        }
        fn can_parse(&self, _line: &str, _ctx: &ParseContext) -> f32 {
            self.score
        }
        fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
            Some(ExtractedError::new(line, line, Category::Unknown, self.id))
        }
        fn is_noise(&self, line: &str) -> bool {
            line == "noise"
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn tool_hint_short_circuits_scoring() {
        let reg = ParserRegistry::new();
        reg.register(Box::new(StubParser { id: "a", priority: 10, score: 0.0 }));
        reg.register(Box::new(StubParser { id: "b", priority: 5, score: 1.0 }));
        let ctx = ParseContext {
            tool: Some("a".to_string()),
            ..Default::default()
        };
        let idx = reg.find_parser("whatever", &ctx).unwrap();
        assert_eq!(reg.parser_id(idx), "a");
    }

    #[test]
    fn scored_scan_picks_highest_score_then_priority() {
        let reg = ParserRegistry::new();
        reg.register(Box::new(StubParser { id: "low", priority: 10, score: 0.5 }));
        reg.register(Box::new(StubParser { id: "high", priority: 90, score: 0.5 }));
        let idx = reg.find_parser("whatever", &ParseContext::default()).unwrap();
        assert_eq!(reg.parser_id(idx), "high");
    }

    #[test]
    fn no_match_returns_none() {
        let reg = ParserRegistry::new();
        reg.register(Box::new(StubParser { id: "a", priority: 10, score: 0.0 }));
        assert!(reg.find_parser("whatever", &ParseContext::default()).is_none());
    }

    #[test]
    fn is_noise_true_if_any_parser_says_so() {
        let reg = ParserRegistry::new();
        reg.register(Box::new(StubParser { id: "a", priority: 10, score: 0.0 }));
        assert!(reg.is_noise("noise"));
        assert!(!reg.is_noise("not noise"));
    }

    #[test]
    fn has_dedicated_parser_excludes_generic() {
        let reg = default_registry();
        assert!(reg.has_dedicated_parser("go"));
        assert!(!reg.has_dedicated_parser("generic"));
        assert!(!reg.has_dedicated_parser("java"));
    }
}

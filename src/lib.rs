//! CI log error extraction engine. Parses heterogeneous tool output
//! (compilers, linters, test runners, runtimes) into structured,
//! deduplicated diagnostics for downstream rendering, persistence, or an
//! automated healing agent — none of which live in this crate.

pub mod categorize;
pub mod context;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod grouping;
pub mod limits;
pub mod model;
pub mod parsers;
pub mod registry;
pub mod sanitize;
pub mod snippet;

pub use categorize::{apply_severity, infer_severity};
pub use context::{ContextParser, DefaultContextParser, LineContext};
pub use detector::{detect_all_and_check_support, detect_all_tools_from_run, detect_tool_from_run, DetectedTool, ToolSupport};
pub use error::EngineError;
pub use extractor::{set_unknown_pattern_reporter, Extractor};
pub use grouping::{filter_by_category, filter_by_file, filter_by_severity, ComprehensiveErrorGroup, GroupedErrors, OrchestratorView, Stats};
pub use model::{Category, CodeSnippet, ExtractedError, Severity, WorkflowContext};
pub use registry::{default_registry, ParseContext, ParserRegistry, ToolParser};
pub use sanitize::sanitize_pattern_for_telemetry;
pub use snippet::{extract_snippet, extract_snippets_for_errors};

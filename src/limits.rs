//! Resource bounds enforced across the engine.

/// Lines longer than this are skipped rather than read into memory.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Dedup set size above which new errors bypass dedup (fail-open).
pub const MAX_DEDUPLICATION_SIZE: usize = 10_000;

/// Go panic/test-failure accumulation bound.
pub const GO_MULTILINE_MAX_LINES: usize = 500;
pub const GO_MULTILINE_MAX_BYTES: usize = 256 * 1024;

/// Rust compiler diagnostic accumulation bound.
pub const RUST_MULTILINE_MAX_LINES: usize = 200;
pub const RUST_MULTILINE_MAX_BYTES: usize = 256 * 1024;
pub const RUST_MAX_NOTES: usize = 50;
pub const RUST_MAX_HELPS: usize = 50;

/// Python traceback accumulation bound.
pub const PYTHON_MAX_FRAMES: usize = 100;
pub const PYTHON_MAX_BYTES: usize = 256 * 1024;

/// Unknown-pattern telemetry reporting bound.
pub const UNKNOWN_PATTERN_TELEMETRY_MAX: usize = 10;

/// Snippet extraction bounds.
pub const SNIPPET_MAX_FILE_SIZE: u64 = 1024 * 1024;
pub const SNIPPET_MAX_SIZE: usize = 2 * 1024;
pub const SNIPPET_MAX_LINE_LENGTH: usize = 500;

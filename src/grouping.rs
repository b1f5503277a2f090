//! Grouping & views over a finished `[]ExtractedError`.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{Category, ExtractedError, Severity};

const NO_WORKFLOW: &str = "no-workflow";

/// Relativize `file` against `base_path` using a real relative-path
/// computation. Returns `None` (never a string starting with `..`) if
/// `file` doesn't lie under `base_path` or either path is malformed.
#[must_use]
pub fn relativize(file: &str, base_path: &Path) -> Option<String> {
    let file_path = Path::new(file);
    let relative = file_path.strip_prefix(base_path).ok()?;
    let rel_str = relative.to_string_lossy().into_owned();
    if rel_str.starts_with("..") {
        return None;
    }
    Some(rel_str)
}

fn file_key(err: &ExtractedError, base_path: Option<&Path>) -> String {
    match base_path {
        Some(base) => relativize(&err.file, base).unwrap_or_else(|| err.file.clone()),
        None => err.file.clone(),
    }
}

/// Lightweight grouping: by file only, with an O(1) `has_errors` flag set
/// during insertion rather than recomputed by scanning.
#[derive(Debug, Clone, Default)]
pub struct GroupedErrors {
    pub by_file: HashMap<String, Vec<ExtractedError>>,
    pub no_file: Vec<ExtractedError>,
    pub total: usize,
    has_errors: bool,
}

impl GroupedErrors {
    #[must_use]
    pub fn build(errs: &[ExtractedError], base_path: Option<&Path>) -> Self {
        let mut g = Self::default();
        for err in errs {
            g.total += 1;
            if err.severity == Severity::Error {
                g.has_errors = true;
            }
            if err.file.is_empty() {
                g.no_file.push(err.clone());
            } else {
                g.by_file.entry(file_key(err, base_path)).or_default().push(err.clone());
            }
        }
        g
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }
}

/// Aggregate counts over a slice of errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub error_count: usize,
    pub warning_count: usize,
    pub by_category: HashMap<String, usize>,
    pub by_source: HashMap<String, usize>,
    pub unique_files: usize,
    pub unique_rules: usize,
}

/// The full multi-axis view: by file, by category, by workflow job, plus
/// aggregate stats. Built in two passes so destination slices allocate
/// with exact capacity instead of regrowing.
#[derive(Debug, Clone, Default)]
pub struct ComprehensiveErrorGroup {
    pub by_file: HashMap<String, Vec<ExtractedError>>,
    pub by_category: HashMap<Category, Vec<ExtractedError>>,
    pub by_workflow: HashMap<String, Vec<ExtractedError>>,
    pub no_file: Vec<ExtractedError>,
    pub total: usize,
    pub stats: Stats,
}

impl ComprehensiveErrorGroup {
    #[must_use]
    pub fn build(errs: &[ExtractedError], base_path: Option<&Path>) -> Self {
        let mut file_counts: HashMap<String, usize> = HashMap::new();
        let mut category_counts: HashMap<Category, usize> = HashMap::new();
        let mut workflow_counts: HashMap<String, usize> = HashMap::new();
        let mut no_file_count = 0usize;

        for err in errs {
            if err.file.is_empty() {
                no_file_count += 1;
            } else {
                *file_counts.entry(file_key(err, base_path)).or_insert(0) += 1;
            }
            *category_counts.entry(err.category).or_insert(0) += 1;
            let job = if err.workflow_context.job.as_deref().unwrap_or("").is_empty() {
                NO_WORKFLOW.to_string()
            } else {
                err.workflow_context.job.clone().unwrap()
            };
            *workflow_counts.entry(job).or_insert(0) += 1;
        }

        let mut by_file: HashMap<String, Vec<ExtractedError>> =
            file_counts.iter().map(|(k, &n)| (k.clone(), Vec::with_capacity(n))).collect();
        let mut by_category: HashMap<Category, Vec<ExtractedError>> =
            category_counts.iter().map(|(&k, &n)| (k, Vec::with_capacity(n))).collect();
        let mut by_workflow: HashMap<String, Vec<ExtractedError>> =
            workflow_counts.iter().map(|(k, &n)| (k.clone(), Vec::with_capacity(n))).collect();
        let mut no_file = Vec::with_capacity(no_file_count);

        let mut error_count = 0usize;
        let mut warning_count = 0usize;
        let mut by_source: HashMap<String, usize> = HashMap::new();
        let mut rule_ids: std::collections::HashSet<&str> = std::collections::HashSet::new();

        for err in errs {
            match err.severity {
                Severity::Error => error_count += 1,
                Severity::Warning => warning_count += 1,
                Severity::Unset => {}
            }
            *by_source.entry(err.source.clone()).or_insert(0) += 1;
            if !err.rule_id.is_empty() {
                rule_ids.insert(&err.rule_id);
            }

            if err.file.is_empty() {
                no_file.push(err.clone());
            } else {
                by_file.entry(file_key(err, base_path)).or_default().push(err.clone());
            }
            by_category.entry(err.category).or_default().push(err.clone());
            let job = if err.workflow_context.job.as_deref().unwrap_or("").is_empty() {
                NO_WORKFLOW.to_string()
            } else {
                err.workflow_context.job.clone().unwrap()
            };
            by_workflow.entry(job).or_default().push(err.clone());
        }

        let by_category_str = category_counts.iter().map(|(k, &v)| (k.as_str().to_string(), v)).collect();

        Self {
            total: errs.len(),
            stats: Stats {
                error_count,
                warning_count,
                by_category: by_category_str,
                by_source,
                unique_files: file_counts.len(),
                unique_rules: rule_ids.len(),
            },
            by_file,
            by_category,
            by_workflow,
            no_file,
        }
    }

    /// A smaller, stable-shape projection for orchestration consumers. Drops
    /// `raw`/`stack_trace`/`code_snippet`.
    #[must_use]
    pub fn for_orchestrator(&self) -> OrchestratorView {
        let mut errors: Vec<OrchestratorError> = self
            .by_file
            .values()
            .flatten()
            .chain(self.no_file.iter())
            .map(OrchestratorError::from)
            .collect();
        errors.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        OrchestratorView {
            errors,
            stats: self.stats.clone(),
        }
    }

    /// Flatten `by_file ∪ no_file` and keep only errors matching `filter`.
    #[must_use]
    pub fn for_agent(&self, filter: impl Fn(&ExtractedError) -> bool) -> Vec<ExtractedError> {
        self.by_file
            .values()
            .flatten()
            .chain(self.no_file.iter())
            .filter(|e| filter(e))
            .cloned()
            .collect()
    }
}

/// `ExtractedError` with `raw`/`stack_trace`/`code_snippet` dropped, keyed by
/// the JSON field names the orchestrator consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorError {
    pub file: String,
    pub line: u32,
    pub message: String,
    pub severity: Severity,
    pub category: Category,
    pub source: String,
    #[serde(rename = "rule_id")]
    pub rule_id: String,
    pub workflow_job: Option<String>,
}

impl From<&ExtractedError> for OrchestratorError {
    fn from(err: &ExtractedError) -> Self {
        Self {
            file: err.file.clone(),
            line: err.line,
            message: err.message.clone(),
            severity: err.severity,
            category: err.category,
            source: err.source.clone(),
            rule_id: err.rule_id.clone(),
            workflow_job: err.workflow_context.job.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorView {
    pub errors: Vec<OrchestratorError>,
    pub stats: Stats,
}

/// Filter combinators for [`ComprehensiveErrorGroup::for_agent`]. Compose
/// with plain closures: `|e| filter_by_category(Category::Lint)(e) && filter_by_severity(Severity::Error)(e)`.
#[must_use]
pub fn filter_by_category(category: Category) -> impl Fn(&ExtractedError) -> bool {
    move |e| e.category == category
}

#[must_use]
pub fn filter_by_file(prefix: String) -> impl Fn(&ExtractedError) -> bool {
    move |e| e.file.starts_with(&prefix)
}

#[must_use]
pub fn filter_by_severity(severity: Severity) -> impl Fn(&ExtractedError) -> bool {
    move |e| e.severity == severity
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(file: &str, category: Category, severity: Severity) -> ExtractedError {
        let mut e = ExtractedError::new("m", "r", category, "go").with_location(file, if file.is_empty() { 0 } else { 1 }, 0);
        e.set_severity(severity);
        e
    }

    #[test]
    fn grouped_errors_splits_by_file_and_no_file() {
        let errs = vec![err("a.go", Category::Compile, Severity::Error), err("", Category::Unknown, Severity::Warning)];
        let g = GroupedErrors::build(&errs, None);
        assert_eq!(g.total, 2);
        assert_eq!(g.by_file.get("a.go").unwrap().len(), 1);
        assert_eq!(g.no_file.len(), 1);
        assert!(g.has_errors());
    }

    #[test]
    fn has_errors_false_when_only_warnings() {
        let errs = vec![err("a.go", Category::Lint, Severity::Warning)];
        let g = GroupedErrors::build(&errs, None);
        assert!(!g.has_errors());
    }

    #[test]
    fn relativize_rejects_escapes() {
        assert_eq!(relativize("/etc/passwd", Path::new("/home/user/project")), None);
        assert_eq!(relativize("/home/user/project/src/a.go", Path::new("/home/user/project")), Some("src/a.go".to_string()));
    }

    #[test]
    fn relativize_does_not_confuse_sibling_prefix() {
        assert_eq!(relativize("/home/user-data/x.go", Path::new("/home/user")), None);
    }

    #[test]
    fn comprehensive_group_totality() {
        let errs = vec![
            err("a.go", Category::Compile, Severity::Error),
            err("b.go", Category::Lint, Severity::Warning),
            err("", Category::Unknown, Severity::Warning),
        ];
        let g = ComprehensiveErrorGroup::build(&errs, None);
        assert_eq!(g.total, 3);
        assert_eq!(g.stats.error_count, 1);
        assert_eq!(g.stats.warning_count, 2);
        assert_eq!(g.stats.unique_files, 2);
    }

    #[test]
    fn for_orchestrator_drops_raw_fields() {
        let errs = vec![err("a.go", Category::Compile, Severity::Error).with_stack_trace("trace")];
        let g = ComprehensiveErrorGroup::build(&errs, None);
        let view = g.for_orchestrator();
        assert_eq!(view.errors.len(), 1);
        assert_eq!(view.errors[0].file, "a.go");
    }

    #[test]
    fn for_agent_filters_combine_with_and() {
        let errs = vec![
            err("a.go", Category::Compile, Severity::Error),
            err("a.go", Category::Lint, Severity::Warning),
        ];
        let g = ComprehensiveErrorGroup::build(&errs, None);
        let filtered = g.for_agent(|e| filter_by_category(Category::Compile)(e) && filter_by_severity(Severity::Error)(e));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].category, Category::Compile);
    }

    #[test]
    fn filter_by_file_prefix_is_case_sensitive() {
        let errs = vec![err("src/a.go", Category::Compile, Severity::Error), err("SRC/b.go", Category::Compile, Severity::Error)];
        let g = ComprehensiveErrorGroup::build(&errs, None);
        let filtered = g.for_agent(filter_by_file("src/".to_string()));
        assert_eq!(filtered.len(), 1);
    }
}

//! Severity inference. A deliberate post-processing pass
//! kept separate from parsing so extraction itself stays pure.

use crate::model::{Category, ExtractedError, Severity};

/// Severity a bare category implies when no parser set one explicitly.
#[must_use]
pub fn infer_severity(err: &ExtractedError) -> Severity {
    if err.severity.is_set() {
        return err.severity;
    }
    match err.category {
        Category::Compile | Category::TypeCheck | Category::Test | Category::Runtime => Severity::Error,
        Category::Lint | Category::Unknown => Severity::Warning,
        Category::Metadata => Severity::Unset,
    }
}

/// Apply [`infer_severity`] to every error in place.
pub fn apply_severity(errs: &mut [ExtractedError]) {
    for err in errs {
        err.severity = infer_severity(err);
    }
}

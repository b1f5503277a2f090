//! Snippet extraction. The engine's one fallible I/O boundary — every
//! failure mode degrades to `None`/a `failed` counter rather than surfacing
//! a panic or propagating past this module.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::limits::{SNIPPET_MAX_FILE_SIZE, SNIPPET_MAX_LINE_LENGTH, SNIPPET_MAX_SIZE};
use crate::model::{truncate_utf8, CodeSnippet, ExtractedError};

const SENSITIVE_EXACT: &[&str] = &[
    "credentials.json",
    "secrets.json",
    "secrets.yaml",
    "secrets.yml",
    ".netrc",
    ".npmrc",
    ".pypirc",
    "id_rsa",
    "id_ed25519",
    "id_ecdsa",
    "id_dsa",
    "htpasswd",
    "shadow",
    "passwd",
];
const SENSITIVE_EXTENSIONS: &[&str] = &["pem", "key", "p12", "pfx"];

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn is_sensitive(path: &Path) -> bool {
    let name = file_name(path);
    if name.starts_with(".env") {
        return true;
    }
    if SENSITIVE_EXACT.contains(&name.as_str()) {
        return true;
    }
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if SENSITIVE_EXTENSIONS.contains(&ext) {
            return true;
        }
    }
    false
}

fn language_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("go") => "go",
        Some("rs") => "rust",
        Some("ts" | "tsx" | "mts" | "cts") => "typescript",
        Some("js" | "jsx" | "mjs" | "cjs") => "javascript",
        Some("py" | "pyi") => "python",
        Some("java") => "java",
        Some("rb") => "ruby",
        Some("c" | "h") => "c",
        Some("cpp" | "cc" | "hpp") => "cpp",
        Some("json") => "json",
        Some("yaml" | "yml") => "yaml",
        _ => "text",
    }
}

fn is_mostly_printable(bytes: &[u8]) -> bool {
    if bytes.contains(&0) {
        return false;
    }
    if bytes.is_empty() {
        return true;
    }
    let non_printable = bytes.iter().filter(|&&b| b < 0x09 || (b > 0x0d && b < 0x20)).count();
    (non_printable as f64) / (bytes.len() as f64) <= 0.10
}

fn truncate_with_ellipsis(line: &str) -> String {
    if line.len() <= SNIPPET_MAX_LINE_LENGTH {
        return line.to_string();
    }
    format!("{}...", truncate_utf8(line, SNIPPET_MAX_LINE_LENGTH))
}

/// Open `path`, applying every safety guard, and return its metadata plus a
/// reader positioned at the start, or the reason it was refused.
fn open_guarded(path: &Path) -> Result<(File, std::fs::Metadata), EngineError> {
    let path_str = path.to_string_lossy().into_owned();

    if is_sensitive(path) {
        return Err(EngineError::SensitivePath(path_str));
    }

    let lstat = std::fs::symlink_metadata(path).map_err(|source| EngineError::Io { path: path_str.clone(), source })?;
    if lstat.file_type().is_symlink() {
        return Err(EngineError::Symlink(path_str));
    }
    if lstat.is_dir() {
        return Err(EngineError::NotAFile(path_str));
    }
    if lstat.len() > SNIPPET_MAX_FILE_SIZE {
        return Err(EngineError::TooLarge { path: path_str, size: lstat.len() });
    }

    let file = File::open(path).map_err(|source| EngineError::Io { path: path_str.clone(), source })?;
    let fstat = file.metadata().map_err(|source| EngineError::Io { path: path_str.clone(), source })?;
    if fstat.ino() != lstat.ino() || fstat.dev() != lstat.dev() || fstat.len() != lstat.len() {
        return Err(EngineError::Toctouched(path_str));
    }

    Ok((file, fstat))
}

/// Extract a `[max(1, line - context_lines), line + context_lines]` window
/// of source around `line`. Returns `None` on any precondition failure.
#[must_use]
pub fn extract_snippet(path: &str, line: i64, context_lines: i64) -> Option<CodeSnippet> {
    if path.is_empty() || line <= 0 || context_lines < 0 {
        return None;
    }
    let path_ref = Path::new(path);

    let (file, _meta) = open_guarded(path_ref)
        .inspect_err(|e| debug!(path, error = %e, "snippet extraction refused"))
        .ok()?;

    let start = (line - context_lines).max(1) as usize;
    let end = (line + context_lines) as usize;

    let mut lines = Vec::new();
    let mut total_bytes = 0usize;
    for (idx, raw_line) in BufReader::new(file).lines().enumerate() {
        let lineno = idx + 1;
        if lineno < start {
            continue;
        }
        if lineno > end {
            break;
        }
        let Ok(text) = raw_line else {
            return None;
        };
        if !is_mostly_printable(text.as_bytes()) {
            debug!(path, "binary content detected, refusing snippet");
            return None;
        }
        let truncated = truncate_with_ellipsis(&text);
        total_bytes += truncated.len();
        if total_bytes > SNIPPET_MAX_SIZE {
            debug!(path, "snippet exceeds max size");
            return None;
        }
        lines.push(truncated);
    }

    if lines.is_empty() {
        return None;
    }

    let error_line = (line as usize).saturating_sub(start) + 1;
    let error_line = error_line.clamp(1, lines.len());

    Some(CodeSnippet {
        lines,
        start_line: start,
        error_line,
        language: language_for(path_ref).to_string(),
    })
}

fn resolve_under_base(file: &str, base_path: &Path) -> Result<PathBuf, EngineError> {
    let candidate = base_path.join(file);
    let joined = candidate.to_string_lossy().into_owned();
    if crate::grouping::relativize(&joined, base_path).is_none() {
        return Err(EngineError::Traversal {
            base: base_path.to_string_lossy().into_owned(),
            requested: file.to_string(),
        });
    }
    Ok(candidate)
}

/// Batch snippet extraction over every error with a non-empty `file`,
/// opening each distinct resolved path once regardless of how many errors
/// reference it. Returns `(succeeded, failed)` counts.
pub fn extract_snippets_for_errors(errs: &mut [ExtractedError], base_path: &Path, context_lines: i64) -> (usize, usize) {
    let mut by_path: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (idx, err) in errs.iter().enumerate() {
        if err.file.is_empty() || err.line == 0 {
            continue;
        }
        match resolve_under_base(&err.file, base_path) {
            Ok(resolved) => {
                by_path.entry(resolved).or_default().push(idx);
            }
            Err(e) => {
                warn!(file = %err.file, error = %e, "refusing snippet path");
                failed += 1;
            }
        }
    }

    for (path, mut indices) in by_path {
        indices.sort_by_key(|&i| errs[i].line);

        if indices.len() == 1 {
            let idx = indices[0];
            match extract_snippet(&path.to_string_lossy(), i64::from(errs[idx].line), context_lines) {
                Some(snippet) => {
                    errs[idx].code_snippet = Some(snippet);
                    succeeded += 1;
                }
                None => failed += 1,
            }
            continue;
        }

        let (file, _meta) = match open_guarded(&path) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "refusing snippet file");
                failed += indices.len();
                continue;
            }
        };

        // Bound the scan to the union of windows the pending errors actually
        // need, so one non-printable byte outside every window can't fail
        // the whole batch.
        let needed_start = indices.iter().map(|&i| (i64::from(errs[i].line) - context_lines).max(1) as usize).min().unwrap();
        let needed_end = indices.iter().map(|&i| (i64::from(errs[i].line) + context_lines) as usize).max().unwrap();

        let mut cache: HashMap<usize, String> = HashMap::new();
        let mut binary = false;
        for (lineno_0, raw_line) in BufReader::new(file).lines().enumerate() {
            let lineno = lineno_0 + 1;
            if lineno < needed_start {
                continue;
            }
            if lineno > needed_end {
                break;
            }
            let Ok(text) = raw_line else { continue };
            if !is_mostly_printable(text.as_bytes()) {
                binary = true;
                break;
            }
            cache.insert(lineno, text);
        }

        if binary {
            failed += indices.len();
            continue;
        }

        for idx in indices {
            let line = errs[idx].line as i64;
            let start = (line - context_lines).max(1) as usize;
            let end = (line + context_lines) as usize;

            let mut lines = Vec::new();
            let mut total_bytes = 0usize;
            let mut ok = true;
            for lineno in start..=end {
                if let Some(text) = cache.get(&lineno) {
                    let truncated = truncate_with_ellipsis(text);
                    total_bytes += truncated.len();
                    if total_bytes > SNIPPET_MAX_SIZE {
                        ok = false;
                        break;
                    }
                    lines.push(truncated);
                }
            }

            if !ok || lines.is_empty() {
                failed += 1;
                continue;
            }

            let error_line = (line as usize).saturating_sub(start) + 1;
            let error_line = error_line.clamp(1, lines.len());
            errs[idx].code_snippet = Some(CodeSnippet {
                lines,
                start_line: start,
                error_line,
                language: language_for(&path).to_string(),
            });
            succeeded += 1;
        }
    }

    (succeeded, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn extracts_window_around_line() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "a.go", "l1\nl2\nl3\nl4\nl5\n");
        let snippet = extract_snippet(path.to_str().unwrap(), 3, 1).unwrap();
        assert_eq!(snippet.lines, vec!["l2", "l3", "l4"]);
        assert_eq!(snippet.error_line, 2);
        assert_eq!(snippet.language, "go");
    }

    #[test]
    fn refuses_sensitive_files() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), ".env", "SECRET=1\n");
        assert!(extract_snippet(path.to_str().unwrap(), 1, 1).is_none());
    }

    #[test]
    fn refuses_symlinks() {
        let dir = tempdir().unwrap();
        let target = write_file(dir.path(), "real.go", "x\n");
        let link = dir.path().join("link.go");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        assert!(extract_snippet(link.to_str().unwrap(), 1, 1).is_none());
    }

    #[test]
    fn refuses_empty_path_or_nonpositive_line() {
        assert!(extract_snippet("", 1, 1).is_none());
        assert!(extract_snippet("a.go", 0, 1).is_none());
        assert!(extract_snippet("a.go", 1, -1).is_none());
    }

    #[test]
    fn batched_extraction_rejects_traversal() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        let mut errs = vec![ExtractedError::new("m", "r", crate::model::Category::Compile, "go").with_location("../../etc/passwd", 1, 0)];
        let (succeeded, failed) = extract_snippets_for_errors(&mut errs, base, 1);
        assert_eq!(succeeded, 0);
        assert_eq!(failed, 1);
        assert!(errs[0].code_snippet.is_none());
    }

    #[test]
    fn batched_extraction_ignores_binary_bytes_outside_needed_windows() {
        let dir = tempdir().unwrap();
        // Binary byte on line 1, well outside either error's requested window.
        let mut contents = String::from("binary: \0\n");
        for i in 2..=11 {
            contents.push_str(&format!("l{i}\n"));
        }
        write_file(dir.path(), "a.go", &contents);
        let mut errs = vec![
            ExtractedError::new("m1", "r", crate::model::Category::Compile, "go").with_location("a.go", 5, 1),
            ExtractedError::new("m2", "r", crate::model::Category::Compile, "go").with_location("a.go", 10, 1),
        ];
        let (succeeded, failed) = extract_snippets_for_errors(&mut errs, dir.path(), 1);
        assert_eq!(succeeded, 2);
        assert_eq!(failed, 0);
        assert!(errs[0].code_snippet.is_some());
        assert!(errs[1].code_snippet.is_some());
    }

    #[test]
    fn batched_extraction_shares_one_open_across_errors() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "a.go", "l1\nl2\nl3\nl4\nl5\n");
        let mut errs = vec![
            ExtractedError::new("m1", "r", crate::model::Category::Compile, "go").with_location("a.go", 2, 0),
            ExtractedError::new("m2", "r", crate::model::Category::Compile, "go").with_location("a.go", 4, 0),
        ];
        let (succeeded, failed) = extract_snippets_for_errors(&mut errs, dir.path(), 1);
        assert_eq!(succeeded, 2);
        assert_eq!(failed, 0);
        assert!(errs[0].code_snippet.is_some());
        assert!(errs[1].code_snippet.is_some());
    }
}

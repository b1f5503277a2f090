//! Docker daemon error parser. A single case-insensitive
//! disjunction over common daemon failure phrasings.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Category, ExtractedError, Severity};
use crate::registry::{ParseContext, ToolParser};

static DAEMON_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(no such container|cannot connect to.*docker|image pull failed|docker.*error response from daemon|container.*is not running|failed to.*docker|docker.*permission denied)",
    )
    .unwrap()
});

pub struct DockerParser;

impl DockerParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for DockerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParser for DockerParser {
    fn id(&self) -> &'static str {
        "docker"
    }

    fn priority(&self) -> u8 {
        55
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> f32 {
        if DAEMON_ERROR.is_match(line) {
            0.75
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
        if !DAEMON_ERROR.is_match(line) {
            return None;
        }
        let mut err = ExtractedError::new(line.trim(), line, Category::Runtime, "docker");
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
    fn recognizes_no_such_container() {
        let mut p = DockerParser::new();
        let err = p.parse("Error: No such container: abc123", &ParseContext::default()).unwrap();
        assert_eq!(err.category, Category::Runtime);
        assert_eq!(err.severity, Severity::Error);
    }

    #[test]
    fn recognizes_cannot_connect_to_docker() {
        let mut p = DockerParser::new();
        assert!(p
            .parse("Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?", &ParseContext::default())
            .is_some());
    }

    #[test]
    fn recognizes_image_pull_failed() {
        let mut p = DockerParser::new();
        assert!(p.parse("Error: image pull failed for nginx:latest", &ParseContext::default()).is_some());
    }

    #[test]
    fn recognizes_error_response_from_daemon() {
        let mut p = DockerParser::new();
        assert!(p.parse("docker: Error response from daemon: pull access denied for myimage", &ParseContext::default()).is_some());
    }

    #[test]
    fn recognizes_container_is_not_running() {
        let mut p = DockerParser::new();
        assert!(p.parse("Error: container 3f2a9b is not running", &ParseContext::default()).is_some());
    }

    #[test]
    fn recognizes_failed_to_docker() {
        let mut p = DockerParser::new();
        assert!(p.parse("failed to start docker: exit status 1", &ParseContext::default()).is_some());
    }

    #[test]
    fn recognizes_docker_permission_denied() {
        let mut p = DockerParser::new();
        assert!(p
            .parse("docker: permission denied while trying to connect to the Docker daemon socket", &ParseContext::default())
            .is_some());
    }

    #[test]
    fn is_case_insensitive() {
        let p = DockerParser::new();
        assert!(p.can_parse("NO SUCH CONTAINER: ABC123", &ParseContext::default()) > 0.0);
    }

    #[test]
    fn rejects_unrelated_lines() {
        let p = DockerParser::new();
        assert_eq!(p.can_parse("Successfully built 4f2a9b1c3d5e", &ParseContext::default()), 0.0);
    }
}

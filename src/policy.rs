//! Capability gates for tool execution.
//!
//! Two layers: the coarse [`ToolPolicy`] (I/O toggles, domain/path
//! allowlists, response byte cap) that tools themselves enforce, and the
//! optional fine-grained [`ActionPolicy`] collaborator the reasoning engine
//! consults per step. Policy is configuration, not owned state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::reason::ReasoningContext;

/// Coarse capability gate a tool must enforce before acting.
///
/// Empty allowlists leave that dimension unrestricted; the boolean toggles
/// are the primary gate. The default policy denies all I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPolicy {
    /// Whether network tools may act at all.
    pub allow_network: bool,
    /// Whether file tools may act at all.
    pub allow_file_io: bool,
    /// Host suffixes network tools may contact (empty = any host).
    pub allowed_domains: Vec<String>,
    /// Path prefixes file tools may write under (empty = any path).
    pub allowed_paths: Vec<PathBuf>,
    /// Cap on tool response size; longer responses are truncated.
    pub max_response_bytes: usize,
}

impl Default for ToolPolicy {
    fn default() -> Self {
        Self {
            allow_network: false,
            allow_file_io: false,
            allowed_domains: Vec::new(),
            allowed_paths: Vec::new(),
            max_response_bytes: 256 * 1024,
        }
    }
}

impl ToolPolicy {
    /// A policy with both I/O toggles on and no allowlist restrictions.
    pub fn permissive() -> Self {
        Self {
            allow_network: true,
            allow_file_io: true,
            ..Self::default()
        }
    }

    /// Load a policy from a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, ToolError> {
        toml::from_str(document).map_err(|e| ToolError::InvalidPolicy {
            message: e.to_string(),
        })
    }

    /// Whether a host passes the domain allowlist.
    pub fn permits_domain(&self, host: &str) -> bool {
        self.allowed_domains.is_empty()
            || self
                .allowed_domains
                .iter()
                .any(|d| host == d || host.ends_with(&format!(".{d}")))
    }

    /// Whether a write path passes the path allowlist.
    pub fn permits_path(&self, path: &Path) -> bool {
        self.allowed_paths.is_empty() || self.allowed_paths.iter().any(|p| path.starts_with(p))
    }

    /// Truncate a response to the byte cap, noting the truncation.
    pub fn cap_response(&self, body: String) -> String {
        if body.len() <= self.max_response_bytes {
            return body;
        }
        // Cut on a char boundary at or below the cap.
        let mut cut = self.max_response_bytes;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... [truncated at {} bytes, total: {}]",
            &body[..cut],
            cut,
            body.len()
        )
    }
}

/// Verdict of the fine-grained policy collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDecision {
    Allowed,
    Denied { reason: String },
}

/// Optional per-step policy collaborator consulted before every tool call
/// the reasoning engine makes. A denial is non-fatal: the engine records a
/// system message and skips the step.
pub trait ActionPolicy: Send + Sync {
    fn evaluate(
        &self,
        tool: &str,
        args: &HashMap<String, String>,
        ctx: &ReasoningContext,
    ) -> PolicyDecision;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_denies_io() {
        let policy = ToolPolicy::default();
        assert!(!policy.allow_network);
        assert!(!policy.allow_file_io);
        assert_eq!(policy.max_response_bytes, 256 * 1024);
    }

    #[test]
    fn domain_allowlist_matches_suffixes() {
        let policy = ToolPolicy {
            allowed_domains: vec!["example.com".into()],
            ..ToolPolicy::permissive()
        };
        assert!(policy.permits_domain("example.com"));
        assert!(policy.permits_domain("api.example.com"));
        assert!(!policy.permits_domain("example.org"));
        assert!(!policy.permits_domain("notexample.com"));
    }

    #[test]
    fn empty_allowlists_are_unrestricted() {
        let policy = ToolPolicy::permissive();
        assert!(policy.permits_domain("anything.net"));
        assert!(policy.permits_path(Path::new("/anywhere/file.txt")));
    }

    #[test]
    fn path_allowlist_is_prefix_based() {
        let policy = ToolPolicy {
            allowed_paths: vec![PathBuf::from("/tmp/scratch")],
            ..ToolPolicy::permissive()
        };
        assert!(policy.permits_path(Path::new("/tmp/scratch/out.txt")));
        assert!(!policy.permits_path(Path::new("/etc/passwd")));
    }

    #[test]
    fn responses_are_capped() {
        let policy = ToolPolicy {
            max_response_bytes: 8,
            ..ToolPolicy::default()
        };
        let capped = policy.cap_response("0123456789abcdef".into());
        assert!(capped.starts_with("01234567"));
        assert!(capped.contains("truncated"));
        // Short bodies pass through unchanged.
        assert_eq!(policy.cap_response("short".into()), "short");
    }

    #[test]
    fn policy_loads_from_toml() {
        let policy = ToolPolicy::from_toml_str(
            r#"
            allow_network = true
            allowed_domains = ["example.com"]
            max_response_bytes = 1024
            "#,
        )
        .unwrap();
        assert!(policy.allow_network);
        assert!(!policy.allow_file_io);
        assert_eq!(policy.max_response_bytes, 1024);
    }

    #[test]
    fn invalid_toml_is_a_policy_error() {
        let err = ToolPolicy::from_toml_str("allow_network = \"yes\"").unwrap_err();
        assert!(matches!(err, ToolError::InvalidPolicy { .. }));
    }
}

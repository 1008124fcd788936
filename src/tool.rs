//! Tool collaborators: trait-based tools with runtime registration.
//!
//! Tools are the core's interface to the outside world. Each tool implements
//! the [`Tool`] trait and enforces the coarse [`ToolPolicy`] itself before
//! acting; the registry only routes calls by name. Two built-in tools cover
//! the common collaborator shapes (network fetch, file write); task and
//! calendar mutation tools are supplied by the host.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use crate::error::ToolError;
use crate::policy::ToolPolicy;

/// A tool the reasoning engine or a kernel may invoke.
pub trait Tool: Send + Sync {
    /// Unique name, used for plan binding and registry lookup.
    fn name(&self) -> &str;

    /// What this tool does.
    fn description(&self) -> &str;

    /// Execute with string-keyed arguments under the given policy.
    /// The tool must enforce the policy itself before acting.
    fn call(&self, args: &HashMap<String, String>, policy: &ToolPolicy)
    -> Result<String, ToolError>;
}

/// Fetch a required argument, with a tool-attributed error when missing.
pub fn require_arg<'a>(
    args: &'a HashMap<String, String>,
    name: &str,
    tool: &str,
) -> Result<&'a str, ToolError> {
    args.get(name)
        .map(String::as_str)
        .ok_or_else(|| ToolError::MissingArgument {
            tool: tool.into(),
            name: name.into(),
        })
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. If a tool with the same name exists, it is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|b| b.as_ref())
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Execute a tool by name under the given policy.
    pub fn call(
        &self,
        name: &str,
        args: &HashMap<String, String>,
        policy: &ToolPolicy,
    ) -> Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.into(),
        })?;
        tool.call(args, policy)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in tools
// ---------------------------------------------------------------------------

/// Fetch content from a URL via HTTP GET, enforcing the network toggle,
/// domain allowlist, and response byte cap.
pub struct HttpFetchTool;

impl Tool for HttpFetchTool {
    fn name(&self) -> &str {
        "http_fetch"
    }

    fn description(&self) -> &str {
        "Fetch content from a URL via HTTP GET (policy-capped response)."
    }

    fn call(
        &self,
        args: &HashMap<String, String>,
        policy: &ToolPolicy,
    ) -> Result<String, ToolError> {
        if !policy.allow_network {
            return Err(ToolError::PolicyDenied {
                tool: self.name().into(),
                reason: "network access is disabled".into(),
            });
        }

        let url = require_arg(args, "url", self.name())?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::Network {
                tool: self.name().into(),
                message: format!("invalid URL \"{url}\": must start with http:// or https://"),
            });
        }

        let host = host_of(url);
        if !policy.permits_domain(&host) {
            return Err(ToolError::PolicyDenied {
                tool: self.name().into(),
                reason: format!("domain \"{host}\" is not in the allowlist"),
            });
        }

        let timeout_secs: u64 = args
            .get("timeout")
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build();

        match agent.get(url).call() {
            Ok(response) => {
                let status = response.status();
                // Read at most the cap plus one byte so oversized bodies are
                // detected without buffering them whole.
                let mut body = String::new();
                let limit = policy.max_response_bytes as u64 + 1;
                response
                    .into_reader()
                    .take(limit)
                    .read_to_string(&mut body)
                    .map_err(|e| ToolError::Network {
                        tool: self.name().into(),
                        message: format!("failed to read body: {e}"),
                    })?;
                Ok(format!("HTTP {status}: {}", policy.cap_response(body)))
            }
            Err(ureq::Error::Status(code, _)) => Err(ToolError::Network {
                tool: self.name().into(),
                message: format!("HTTP error {code} for \"{url}\""),
            }),
            Err(ureq::Error::Transport(transport)) => Err(ToolError::Network {
                tool: self.name().into(),
                message: format!("transport error for \"{url}\": {transport}"),
            }),
        }
    }
}

fn host_of(url: &str) -> String {
    let rest = url.split("://").nth(1).unwrap_or(url);
    let authority = rest.split('/').next().unwrap_or(rest);
    let host = authority.rsplit('@').next().unwrap_or(authority);
    host.split(':').next().unwrap_or(host).to_string()
}

/// Write content to a file, enforcing the file-I/O toggle and path allowlist.
pub struct FileWriteTool;

impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file under the policy's allowed paths."
    }

    fn call(
        &self,
        args: &HashMap<String, String>,
        policy: &ToolPolicy,
    ) -> Result<String, ToolError> {
        if !policy.allow_file_io {
            return Err(ToolError::PolicyDenied {
                tool: self.name().into(),
                reason: "file I/O is disabled".into(),
            });
        }

        let path = PathBuf::from(require_arg(args, "path", self.name())?);
        let content = require_arg(args, "content", self.name())?;

        if !policy.permits_path(&path) {
            return Err(ToolError::PolicyDenied {
                tool: self.name().into(),
                reason: format!("path \"{}\" is not in the allowlist", path.display()),
            });
        }

        std::fs::write(&path, content).map_err(|e| ToolError::Io {
            tool: self.name().into(),
            message: format!("write \"{}\": {e}", path.display()),
        })?;
        Ok(format!(
            "Wrote {} bytes to \"{}\"",
            content.len(),
            path.display()
        ))
    }
}

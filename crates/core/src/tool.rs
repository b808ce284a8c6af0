//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are named side-effecting actions the model can request from its
//! reply text. Arguments arrive as positional, untyped strings; results go
//! back to the model as plain text.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::channel::Channel;
use crate::error::ToolError;

/// Result text meaning "take no further action and send nothing".
pub const NO_OP_SENTINEL: &str = "system:_none";

/// A declared positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolArg {
    pub name: &'static str,
    /// Coarse type label shown in the catalog ("string", "integer", "any").
    pub type_label: &'static str,
}

impl ToolArg {
    pub const fn string(name: &'static str) -> Self {
        Self {
            name,
            type_label: "string",
        }
    }
}

/// Where the current turn is happening, for tools that act on the platform.
#[derive(Clone)]
pub struct ToolContext {
    pub channel: Arc<dyn Channel>,
    pub chat_id: String,
    /// The inbound message that triggered this turn
    pub message_id: Option<String>,
}

/// The core Tool trait.
///
/// Each built-in (weather, search, status, react, nick, none) implements
/// this trait and is registered once at startup.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (shown to the model).
    fn description(&self) -> &str;

    /// Ordered positional arguments.
    fn args(&self) -> &[ToolArg];

    /// Execute the tool. `args` has already been checked against [`Tool::args`].
    async fn call(
        &self,
        args: Vec<String>,
        ctx: &ToolContext,
    ) -> std::result::Result<String, ToolError>;
}

/// What an invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Text to feed back to the model (including `Error: ...` results)
    Output(String),
    /// The no-op sentinel: suppress all output for this turn
    NoOp,
}

/// A registry of available tools, kept in registration order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the catalog injected into the system prompt.
    ///
    /// One `\n\t- name <arg:type>,<arg:type>: description` line per tool.
    pub fn catalog(&self) -> String {
        let mut result = String::new();
        for tool in &self.tools {
            result.push_str("\n\t- ");
            result.push_str(tool.name());
            let args = tool.args();
            if !args.is_empty() {
                let rendered: Vec<String> = args
                    .iter()
                    .map(|a| format!("<{}:{}>", a.name, a.type_label))
                    .collect();
                result.push(' ');
                result.push_str(&rendered.join(","));
            }
            result.push_str(": ");
            result.push_str(tool.description());
        }
        result
    }

    /// Split a raw argument string on commas. No escaping, no coercion.
    pub fn split_arguments(raw: Option<&str>) -> Vec<String> {
        match raw.map(str::trim) {
            None | Some("") => Vec::new(),
            Some(raw) => raw.split(',').map(|a| a.trim().to_string()).collect(),
        }
    }

    /// Invoke a tool by name.
    ///
    /// Only an unknown name is an `Err`. Arity mismatches and failures inside
    /// the tool body come back as `Output("Error: <message>")`.
    pub async fn invoke(
        &self,
        name: &str,
        raw_arguments: Option<&str>,
        ctx: &ToolContext,
    ) -> std::result::Result<ToolOutcome, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let args = Self::split_arguments(raw_arguments);
        let expected = tool.args().len();
        if args.len() != expected {
            let err = ToolError::Arity {
                tool_name: name.to_string(),
                expected,
                given: args.len(),
            };
            warn!(tool = %name, error = %err, "Tool called with wrong arity");
            return Ok(ToolOutcome::Output(format!("Error: {err}")));
        }

        info!(tool = %name, args = ?args, "Invoking tool");
        match tool.call(args, ctx).await {
            Ok(output) if output == NO_OP_SENTINEL => Ok(ToolOutcome::NoOp),
            Ok(output) => Ok(ToolOutcome::Output(output)),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                Ok(ToolOutcome::Output(format!("Error: {e}")))
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

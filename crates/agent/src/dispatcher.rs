//! Tool-call dispatch over a model reply.
//!
//! A reply may end with a directive line:
//!
//! ```text
//! Sure thing!
//! call weather Paris
//! ```
//!
//! The dispatcher runs one round per directive. Text before the directive
//! is sent right away, the whole reply is recorded as the agent's own
//! message, the tool runs, its result is recorded as a system entry, and a
//! fresh completion is requested. The loop state is an explicit
//! `(reply, depth)` pair; it ends when a reply carries no directive
//! (final text), asks for silence, names an unknown tool, or runs out of
//! depth.

use std::time::Instant;

use chrono::Utc;
use mnemo_core::error::{ProviderError, ToolError};
use mnemo_core::event::{DomainEvent, EventBus};
use mnemo_core::memory::MemoryBank;
use mnemo_core::message::RollingMessage;
use mnemo_core::tool::{ToolContext, ToolOutcome, ToolRegistry};
use mnemo_core::window::RollingWindow;
use tracing::{debug, info, warn};

use crate::context::ContextAssembler;
use crate::generation::Generator;

/// Marker that starts a directive line.
pub const DIRECTIVE_PREFIX: &str = "\ncall ";

/// Appended when the depth budget is spent.
pub const TRUNCATION_NOTICE: &str = "\n\n[tool call limit reached]";

/// Name of the tool whose directive means "send nothing".
pub const NO_OP_TOOL: &str = "none";

/// A directive found at the end of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    /// No directive; the reply is final.
    Absent,
    /// The reply ends in `call none`.
    NoOp,
    /// `call <name>[ <arguments>]`
    Call {
        preface: &'a str,
        name: &'a str,
        arguments: Option<&'a str>,
    },
}

impl<'a> Directive<'a> {
    /// Find the directive at the end of `reply`.
    ///
    /// Only the last `\ncall ` occurrence counts, and only when nothing but
    /// the directive line follows it. A reply that is exactly `call none`
    /// is also a no-op.
    pub fn parse(reply: &'a str) -> Self {
        let text = reply.trim_end();
        if text.trim_start() == "call none" {
            return Self::NoOp;
        }

        let Some(start) = text.rfind(DIRECTIVE_PREFIX) else {
            return Self::Absent;
        };
        let line = &text[start + DIRECTIVE_PREFIX.len()..];
        if line.contains('\n') {
            return Self::Absent;
        }

        let line = line.trim();
        let (name, arguments) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim()).filter(|a| !a.is_empty())),
            None => (line, None),
        };
        if name.is_empty() {
            return Self::Absent;
        }
        if name == NO_OP_TOOL && arguments.is_none() {
            return Self::NoOp;
        }

        Self::Call {
            preface: &text[..start],
            name,
            arguments,
        }
    }
}

/// How a dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Send this text.
    Final(String),
    /// Send nothing.
    Silent,
    /// Depth ran out; send this text (it carries the truncation notice).
    DepthExceeded(String),
}

impl Dispatch {
    /// Text to deliver, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Final(text) | Self::DepthExceeded(text) => Some(text),
            Self::Silent => None,
        }
    }
}

/// Inline diagnostic for a directive naming an unregistered tool.
pub fn unknown_tool_notice(name: &str) -> String {
    format!("\n\n[unknown tool: {name}]")
}

/// Append `notice` to `text`, dropping the separator when `text` is blank.
fn with_notice(text: &str, notice: &str) -> String {
    if text.trim().is_empty() {
        notice.trim_start().to_string()
    } else {
        format!("{}{notice}", text.trim_end())
    }
}

/// Runs directive rounds for one turn. Borrowed from the session per turn.
pub struct ToolDispatcher<'a> {
    pub assembler: &'a ContextAssembler,
    pub generator: &'a Generator,
    pub tools: &'a ToolRegistry,
    pub events: &'a EventBus,
}

impl ToolDispatcher<'_> {
    /// Dispatch `reply`, allowing at most `max_depth` tool rounds.
    ///
    /// Appends the agent's directive replies and tool results to `window`
    /// in order. A failed follow-up completion ends the turn with an error.
    pub async fn dispatch(
        &self,
        reply: String,
        bank: &MemoryBank,
        window: &mut RollingWindow,
        ctx: &ToolContext,
        max_depth: u32,
    ) -> Result<Dispatch, ProviderError> {
        let mut reply = reply;
        let mut depth = max_depth;

        loop {
            if depth == 0 {
                warn!(max_depth, "Tool call depth exhausted");
                return Ok(Dispatch::DepthExceeded(with_notice(&reply, TRUNCATION_NOTICE)));
            }

            let (preface, name, arguments) = match Directive::parse(&reply) {
                Directive::Absent => return Ok(Dispatch::Final(reply)),
                Directive::NoOp => {
                    debug!("Reply asked for silence");
                    return Ok(Dispatch::Silent);
                }
                Directive::Call {
                    preface,
                    name,
                    arguments,
                } => (preface, name, arguments),
            };

            if !self.tools.contains(name) {
                warn!(tool = %name, "Reply named an unknown tool");
                return Ok(Dispatch::Final(with_notice(preface, &unknown_tool_notice(name))));
            }

            let preface = preface.trim();
            if !preface.is_empty() {
                if let Err(e) = ctx.channel.send(&ctx.chat_id, preface).await {
                    warn!(error = %e, "Failed to flush partial reply");
                }
            }

            let identity = self.assembler.identity();
            window.push(RollingMessage::new(&identity.name, &identity.id, reply.as_str()));

            let started = Instant::now();
            let outcome = match self.tools.invoke(name, arguments, ctx).await {
                Ok(outcome) => outcome,
                Err(ToolError::NotFound(_)) => {
                    return Ok(Dispatch::Final(with_notice(preface, &unknown_tool_notice(name))));
                }
                Err(e) => ToolOutcome::Output(format!("Error: {e}")),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            let result = match outcome {
                ToolOutcome::NoOp => {
                    self.publish_tool(name, true, duration_ms);
                    return Ok(Dispatch::Silent);
                }
                ToolOutcome::Output(result) => result,
            };
            self.publish_tool(name, !result.starts_with("Error: "), duration_ms);
            info!(tool = %name, depth, duration_ms, "Tool round complete");

            window.push(RollingMessage::system(result));
            let prompt = self.assembler.build(bank, window, Some(self.tools));
            reply = self.generator.complete(prompt).await?;
            depth -= 1;
        }
    }

    fn publish_tool(&self, name: &str, success: bool, duration_ms: u64) {
        self.events.publish(DomainEvent::ToolExecuted {
            tool_name: name.to_string(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
    }
}

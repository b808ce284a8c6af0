//! React tool: add an emoji reaction to the message being answered.

use async_trait::async_trait;
use mnemo_core::error::ToolError;
use mnemo_core::tool::{Tool, ToolArg, ToolContext};

pub struct ReactTool;

#[async_trait]
impl Tool for ReactTool {
    fn name(&self) -> &str {
        "react"
    }

    fn description(&self) -> &str {
        "React to this message with a Unicode emoji."
    }

    fn args(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::string("reaction")];
        ARGS
    }

    async fn call(&self, args: Vec<String>, ctx: &ToolContext) -> Result<String, ToolError> {
        let message_id = ctx
            .message_id
            .as_deref()
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: "react".into(),
                reason: "there is no message to react to".into(),
            })?;

        ctx.channel
            .add_reaction(&ctx.chat_id, message_id, &args[0])
            .await?;
        Ok("Successfully reacted to message.".into())
    }
}

//! Nick tool: change the agent's display name.
//!
//! Permission failures are the channel's concern; a guild that forbids
//! nickname changes is skipped there.

use async_trait::async_trait;
use mnemo_core::error::ToolError;
use mnemo_core::tool::{Tool, ToolArg, ToolContext};

pub struct NickTool;

#[async_trait]
impl Tool for NickTool {
    fn name(&self) -> &str {
        "nick"
    }

    fn description(&self) -> &str {
        "Change your display name."
    }

    fn args(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::string("name")];
        ARGS
    }

    async fn call(&self, args: Vec<String>, ctx: &ToolContext) -> Result<String, ToolError> {
        ctx.channel.set_nickname(&args[0]).await?;
        Ok("Successfully changed nickname.".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Action, RecordingChannel};

    #[tokio::test]
    async fn changes_nickname() {
        let (channel, ctx) = RecordingChannel::context();
        let out = NickTool.call(vec!["Pip".into()], &ctx).await.unwrap();
        assert_eq!(out, "Successfully changed nickname.");
        assert_eq!(channel.actions(), vec![Action::Nickname("Pip".into())]);
    }
}

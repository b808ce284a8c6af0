//! Status tool: change the agent's presence and custom status text.

use async_trait::async_trait;
use mnemo_core::channel::Presence;
use mnemo_core::error::ToolError;
use mnemo_core::tool::{Tool, ToolArg, ToolContext};

pub struct StatusTool;

#[async_trait]
impl Tool for StatusTool {
    fn name(&self) -> &str {
        "status"
    }

    fn description(&self) -> &str {
        "Change your Discord status to `status`, and change between `online`, `dnd`, `offline` \
         and `idle`. This will last until the bot restarts."
    }

    fn args(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::string("online"), ToolArg::string("status")];
        ARGS
    }

    async fn call(&self, args: Vec<String>, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some(presence) = Presence::parse(&args[0]) else {
            return Err(ToolError::InvalidArguments(format!(
                "`online` must be one of `online`, `dnd`, `offline` or `idle`, got {:?}",
                args[0]
            )));
        };

        ctx.channel.set_presence(presence, &args[1]).await?;
        Ok("Status changed successfully".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Action, RecordingChannel};

    #[tokio::test]
    async fn sets_presence_and_text() {
        let (channel, ctx) = RecordingChannel::context();
        let out = StatusTool
            .call(vec!["dnd".into(), "reading".into()], &ctx)
            .await
            .unwrap();
        assert_eq!(out, "Status changed successfully");
        assert_eq!(
            channel.actions(),
            vec![Action::Presence(Presence::DoNotDisturb, "reading".into())]
        );
    }

    #[tokio::test]
    async fn unknown_presence_is_rejected_not_applied() {
        let (channel, ctx) = RecordingChannel::context();
        let err = StatusTool
            .call(vec!["away".into(), "brb".into()], &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("\"away\"")));
        assert!(err.to_string().starts_with("Invalid tool arguments: `online` must be one of"));
        assert!(channel.actions().is_empty());
    }
}

//! None tool: stay silent this turn.

use async_trait::async_trait;
use mnemo_core::error::ToolError;
use mnemo_core::tool::{NO_OP_SENTINEL, Tool, ToolArg, ToolContext};

pub struct NoneTool;

#[async_trait]
impl Tool for NoneTool {
    fn name(&self) -> &str {
        "none"
    }

    fn description(&self) -> &str {
        "Do not send anything in reply."
    }

    fn args(&self) -> &[ToolArg] {
        &[]
    }

    async fn call(&self, _args: Vec<String>, _ctx: &ToolContext) -> Result<String, ToolError> {
        Ok(NO_OP_SENTINEL.into())
    }
}

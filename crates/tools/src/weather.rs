//! Weather tool: one-line current conditions from wttr.in.
//!
//! Uses the `format=4` output, e.g. `Paris: ⛅️  🌡️+20°C 🌬️↗11km/h`.

use async_trait::async_trait;
use mnemo_core::error::ToolError;
use mnemo_core::tool::{Tool, ToolArg, ToolContext};
use tracing::debug;

const BASE_URL: &str = "https://wttr.in";

pub struct WeatherTool {
    base_url: String,
    client: reqwest::Client,
}

impl WeatherTool {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: crate::http_client(),
        }
    }

    fn url(&self, location: &str) -> String {
        format!(
            "{}/{}?format=4",
            self.base_url,
            urlencoding::encode(location.trim())
        )
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get the weather in a given location. You can use any location, including countries, \
         continents, cities, geographic landmarks, IATA airport codes, IP addresses and even domain names."
    }

    fn args(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::string("location")];
        ARGS
    }

    async fn call(&self, args: Vec<String>, _ctx: &ToolContext) -> Result<String, ToolError> {
        let location = &args[0];
        let url = self.url(location);
        debug!(url = %url, "Fetching weather");

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "weather".into(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;

        let text = response.text().await.map_err(|e| failed(e.to_string()))?;
        Ok(text.trim_end().to_string())
    }
}

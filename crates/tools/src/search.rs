//! Search tool: DuckDuckGo lite results as plain text.
//!
//! The results page is reduced to its visible text: page chrome (scripts,
//! styles, header, footer, nav, forms) is dropped, whitespace is collapsed,
//! and each numbered result starts a new paragraph. Output is capped at
//! [`MAX_CHARS`] characters.

use std::sync::LazyLock;

use async_trait::async_trait;
use mnemo_core::error::ToolError;
use mnemo_core::tool::{Tool, ToolArg, ToolContext};
use regex_lite::Regex;
use scraper::Html;
use tracing::debug;

const BASE_URL: &str = "https://lite.duckduckgo.com/lite/";

/// Output cap, in characters.
pub const MAX_CHARS: usize = 4000;

/// Elements whose text never reaches the model.
const SKIPPED: &[&str] = &["script", "style", "header", "footer", "nav", "form"];

/// Result numbers (`1. `, `2. `, ...) that start a new paragraph.
static RESULT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\s)").expect("invalid result number regex"));

pub struct SearchTool {
    base_url: String,
    client: reqwest::Client,
}

impl SearchTool {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: crate::http_client(),
        }
    }

    fn url(&self, query: &str) -> String {
        format!("{}?q={}", self.base_url, urlencoding::encode(query))
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Use DuckDuckGo to search for a given query."
    }

    fn args(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::string("query")];
        ARGS
    }

    async fn call(&self, args: Vec<String>, _ctx: &ToolContext) -> Result<String, ToolError> {
        let url = self.url(&args[0]);
        debug!(url = %url, "Searching");

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "search".into(),
            reason,
        };

        let html = self
            .client
            .get(&url)
            .header("User-Agent", "Mozilla/5.0")
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?
            .text()
            .await
            .map_err(|e| failed(e.to_string()))?;

        Ok(results_to_text(&html))
    }
}

/// Reduce a results page to paragraphed plain text.
pub fn results_to_text(html: &str) -> String {
    let collapsed = visible_text(html)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let paragraphed = RESULT_NUMBER.replace_all(&collapsed, "\n\n$1");
    paragraphed.chars().take(MAX_CHARS).collect()
}

/// Text nodes outside the skipped elements, space-separated.
fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED.contains(&el.name()))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head><style>td { color: red }</style><script>var x = 1;</script></head>
          <body>
            <form><input name="q"> Search again</form>
            <table>
              <tr><td>1.&nbsp;</td><td><a href="https://www.rust-lang.org/">Rust <b>Programming</b> Language</a></td></tr>
              <tr><td class="result-snippet">A language empowering everyone.</td></tr>
              <tr><td>2. </td><td><a href="https://doc.rust-lang.org/book/">The Rust Book</a></td></tr>
            </table>
            <footer>Privacy</footer>
          </body>
        </html>
    "#;

    #[test]
    fn strips_chrome_and_paragraphs_results() {
        let text = results_to_text(PAGE);
        assert!(!text.contains("var x"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Search again"));
        assert!(!text.contains("Privacy"));
        assert!(text.contains("Rust Programming Language"));
        assert!(text.contains("\n\n2. The Rust Book"));
    }

    #[test]
    fn whitespace_is_collapsed() {
        let text = results_to_text("<p>a\n\n   b\t c</p>");
        assert_eq!(text, "a b c");
    }

    #[test]
    fn output_is_capped() {
        let long = format!("<p>{}</p>", "word ".repeat(2000));
        let text = results_to_text(&long);
        assert_eq!(text.chars().count(), MAX_CHARS);
    }

    #[test]
    fn query_is_percent_encoded() {
        let tool = SearchTool::new();
        assert_eq!(
            tool.url("rust async, tokio"),
            "https://lite.duckduckgo.com/lite/?q=rust%20async%2C%20tokio"
        );
    }
}

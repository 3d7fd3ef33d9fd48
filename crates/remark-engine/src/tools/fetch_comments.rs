use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use remark_core::tools::{Tool, ToolError};
use remark_schema::{Field, Schema};

pub const DEFAULT_COMMENTS_URL: &str = "https://jsonplaceholder.typicode.com/comments";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches comment records from the remote source, with server-side
/// filters and a client-side `limit` applied after the fact by the
/// registry.
pub struct FetchCommentsTool {
    client: reqwest::Client,
    base_url: String,
    input: Schema,
    output: Schema,
}

impl FetchCommentsTool {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent("remark/0.1")
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            input: Schema::object(vec![
                Field::optional("id", Schema::Integer)
                    .describe("Filter comments by specific comment ID"),
                Field::optional("postId", Schema::Integer).describe("Filter comments by post ID"),
                Field::optional("email", Schema::String)
                    .describe("Filter comments by email address"),
                Field::optional("name", Schema::String).describe("Filter comments by name"),
                Field::optional("limit", Schema::Integer)
                    .describe("Limit the number of results returned (applied client-side)"),
            ]),
            output: Schema::array(Schema::object(vec![
                Field::required("postId", Schema::Integer),
                Field::required("id", Schema::Integer),
                Field::required("name", Schema::String),
                Field::required("email", Schema::String),
                Field::required("body", Schema::String),
            ])),
        }
    }
}

impl Default for FetchCommentsTool {
    fn default() -> Self {
        Self::new(DEFAULT_COMMENTS_URL)
    }
}

/// Query parameters for the remote source. Only filters that are
/// actually present get appended; `limit` is client-side and never
/// sent upstream.
fn filter_params(args: &Value) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(id) = args.get("id").and_then(Value::as_i64) {
        params.push(("id", id.to_string()));
    }
    if let Some(post_id) = args.get("postId").and_then(Value::as_i64) {
        params.push(("postId", post_id.to_string()));
    }
    if let Some(email) = args.get("email").and_then(Value::as_str) {
        params.push(("email", email.to_string()));
    }
    if let Some(name) = args.get("name").and_then(Value::as_str) {
        params.push(("name", name.to_string()));
    }
    params
}

#[async_trait]
impl Tool for FetchCommentsTool {
    fn name(&self) -> &str {
        "fetch_comments"
    }

    fn description(&self) -> &str {
        "Fetch comments from the comments API with optional filtering"
    }

    fn input_schema(&self) -> &Schema {
        &self.input
    }

    fn output_schema(&self) -> &Schema {
        &self.output
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let params = filter_params(&args);

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "comments API returned HTTP {status}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("bad response body: {e}")))
    }
}

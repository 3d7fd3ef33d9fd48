use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use remark_core::tools::{Tool, ToolDescriptor, ToolError};

use crate::limit;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
}

/// Registry of available tools. Populated at startup, then shared
/// read-only across requests via `Arc` — there are no writes after
/// construction.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Names are unique; a second registration under
    /// the same name is an error, not an overwrite.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Tool descriptors for the model.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.to_descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Dispatch one tool call: lookup, validate arguments (the
    /// executor is never called on bad input), execute under a bounded
    /// wait, validate the output, then apply the caller's `limit` as a
    /// first-N truncation.
    pub async fn invoke(
        &self,
        name: &str,
        raw_args: &Value,
        timeout: Duration,
    ) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        tool.input_schema()
            .validate(raw_args)
            .map_err(ToolError::InvalidArguments)?;

        let result = tokio::time::timeout(timeout, tool.execute(raw_args.clone()))
            .await
            .map_err(|_| ToolError::Timeout(timeout))??;

        tool.output_schema()
            .validate(&result)
            .map_err(ToolError::MalformedOutput)?;

        Ok(limit::apply_limit(result, limit::limit_from_args(raw_args)))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use remark_schema::{Field, Schema};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubTool {
        name: String,
        input: Schema,
        output: Schema,
        result: Value,
        fail: bool,
        delay: Option<Duration>,
        executions: AtomicUsize,
    }

    impl StubTool {
        fn new(name: &str, result: Value) -> Self {
            Self {
                name: name.to_string(),
                input: Schema::object(vec![
                    Field::optional("postId", Schema::Integer),
                    Field::optional("limit", Schema::Integer),
                ]),
                output: Schema::array(Schema::object(vec![Field::required(
                    "id",
                    Schema::Integer,
                )])),
                result,
                fail: false,
                delay: None,
                executions: AtomicUsize::new(0),
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "A stub tool for testing"
        }
        fn input_schema(&self) -> &Schema {
            &self.input
        }
        fn output_schema(&self) -> &Schema {
            &self.output
        }
        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            self.executions.fetch_add(1, Ordering::Relaxed);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ToolError::ExecutionFailed("remote said no".into()));
            }
            Ok(self.result.clone())
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool::new("fetch_comments", json!([]))))
            .unwrap();

        assert!(registry.contains("fetch_comments"));
        assert!(!registry.contains("other"));
        assert_eq!(registry.count(), 1);
        assert!(registry.get("fetch_comments").is_some());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool::new("fetch_comments", json!([]))))
            .unwrap();
        let err = registry
            .register(Arc::new(StubTool::new("fetch_comments", json!([]))))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "fetch_comments"));
    }

    #[test]
    fn descriptors_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool::new("zeta", json!([])))).unwrap();
        registry.register(Arc::new(StubTool::new("alpha", json!([])))).unwrap();

        let descriptors = registry.descriptors();
        assert_eq!(descriptors[0].name, "alpha");
        assert_eq!(descriptors[1].name, "zeta");
    }

    #[tokio::test]
    async fn invoke_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("nope", &json!({}), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "nope"));
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_executor() {
        let mut registry = ToolRegistry::new();
        let tool = Arc::new(StubTool::new("fetch_comments", json!([])));
        registry.register(Arc::clone(&tool) as Arc<dyn Tool>).unwrap();

        let err = registry
            .invoke("fetch_comments", &json!({"postId": "one"}), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(tool.executions.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn execution_failure_wrapped() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool::new("fetch_comments", json!([])).failing()))
            .unwrap();

        let err = registry
            .invoke("fetch_comments", &json!({}), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn malformed_output_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool::new("fetch_comments", json!([{"id": "one"}]))))
            .unwrap();

        let err = registry
            .invoke("fetch_comments", &json!({}), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(
                StubTool::new("fetch_comments", json!([])).slow(Duration::from_secs(60)),
            ))
            .unwrap();

        let err = registry
            .invoke("fetch_comments", &json!({}), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(_)));
    }

    #[tokio::test]
    async fn limit_truncates_to_first_n() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool::new(
                "fetch_comments",
                json!([{"id": 1}, {"id": 2}, {"id": 3}]),
            )))
            .unwrap();

        let result = registry
            .invoke("fetch_comments", &json!({"limit": 2}), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(result, json!([{"id": 1}, {"id": 2}]));
    }

    #[tokio::test]
    async fn no_limit_returns_everything() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool::new(
                "fetch_comments",
                json!([{"id": 1}, {"id": 2}]),
            )))
            .unwrap();

        let result = registry
            .invoke("fetch_comments", &json!({}), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(result.as_array().unwrap().len(), 2);
    }
}

//! Tool System
//!
//! Tools are discovered once from a `ToolSource` (or registered locally),
//! then resolved by exact name for every tool call the model makes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

fn new_call_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Arguments as a JSON object
    #[serde(default = "empty_arguments")]
    pub arguments: Value,

    /// Correlation id, generated when the backend does not supply one
    #[serde(default = "new_call_id")]
    pub id: String,
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: new_call_id(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Look up a single argument
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key)
    }
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Correlation id of the originating call
    pub id: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output (success payload or error description)
    pub output: String,

    /// Structured data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            success: false,
            output: error.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Text fed back to the model. Failures are wrapped as `{"error": ...}`.
    pub fn payload(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            json!({ "error": self.output }).to_string()
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, integer, number, boolean, object, array, any)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(name: impl Into<String>, param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self.param_type.as_str() {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        }
    }
}

/// Tool definition schema (the ToolDescriptor shown to the LLM)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

impl ToolSchema {
    /// Build a schema from a JSON Schema object (`properties` + `required`)
    pub fn from_json_schema(name: impl Into<String>, description: impl Into<String>, schema: &Value) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let parameters = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(param, prop)| ParameterSchema {
                        name: param.clone(),
                        param_type: prop
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or("any")
                            .to_string(),
                        description: prop
                            .get("description")
                            .or_else(|| prop.get("title"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        required: required.contains(&param.as_str()),
                        default: prop.get("default").cloned(),
                        enum_values: prop.get("enum").and_then(Value::as_array).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            category: None,
            has_side_effects: false,
        }
    }

    /// Render the parameters as a JSON Schema object
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            if param.param_type != "any" {
                prop.insert("type".into(), json!(param.param_type));
            }
            if !param.description.is_empty() {
                prop.insert("description".into(), json!(param.description));
            }
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check call arguments against the parameter list
    pub fn validate_arguments(&self, arguments: &Value) -> Result<()> {
        let invalid = |reason: String| AgentError::InvalidArguments {
            tool: self.name.clone(),
            reason,
        };

        let args = arguments
            .as_object()
            .ok_or_else(|| invalid(format!("arguments must be a JSON object, got {}", arguments)))?;

        for param in &self.parameters {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(invalid(format!("missing required parameter '{}'", param.name)));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    if !param.accepts(value) {
                        return Err(invalid(format!(
                            "parameter '{}' must be of type {}, got {}",
                            param.name, param.param_type, value
                        )));
                    }
                    if let Some(allowed) = &param.enum_values {
                        if !allowed.contains(value) {
                            return Err(invalid(format!(
                                "parameter '{}' must be one of {:?}",
                                param.name, allowed
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        self.schema().validate_arguments(&call.arguments)
    }
}

/// A remote capability provider that can list its tools
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Human-readable source name for logs
    fn name(&self) -> &str;

    /// List every tool the provider exposes
    async fn discover(&self) -> Result<Vec<Arc<dyn Tool>>>;
}

/// Registry for available tools.
///
/// Read-only once built; share it behind an `Arc`.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Build a registry from a remote source. Any discovery failure is
    /// returned as-is; no partial registry is produced.
    pub async fn discover(source: &dyn ToolSource) -> Result<Self> {
        let tools = source.discover().await?;

        let mut registry = Self::new();
        for tool in tools {
            registry.register_boxed(tool)?;
        }

        tracing::info!(source = source.name(), tools = registry.len(), "Discovered tools");
        Ok(registry)
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_boxed(Arc::new(tool))
    }

    /// Register a shared tool. Names must be unique.
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.tools.contains_key(&name) {
            return Err(AgentError::Config(format!("duplicate tool name: {}", name)));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Resolve a tool by exact name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))
    }

    /// All tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate system prompt section describing available tools
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("You can use the following tools by responding with one JSON block per call:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");

        for schema in self.schemas() {
            prompt.push_str(&format!("### {}\n", schema.name));
            prompt.push_str(&format!("{}\n", schema.description));

            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    prompt.push_str(&format!(
                        "- `{}` ({}){}: {}\n",
                        param.name, param.param_type, required, param.description
                    ));
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool(&'static str);

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: self.0.into(),
                description: "Echo the text back".into(),
                parameters: vec![ParameterSchema::required("text", "string", "Text to echo")],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let text = call.argument("text").and_then(Value::as_str).unwrap_or_default();
            Ok(ToolResult::success(self.0, text))
        }
    }

    struct StaticSource(Vec<&'static str>);

    #[async_trait]
    impl ToolSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn discover(&self) -> Result<Vec<Arc<dyn Tool>>> {
            Ok(self.0.iter().map(|n| Arc::new(EchoTool(n)) as Arc<dyn Tool>).collect())
        }
    }

    struct DownSource;

    #[async_trait]
    impl ToolSource for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        async fn discover(&self) -> Result<Vec<Arc<dyn Tool>>> {
            Err(AgentError::ToolExecution("connection refused".into()))
        }
    }

    #[test]
    fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool("echo")).unwrap();
        registry.register(EchoTool("shout")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["echo", "shout"]);
        assert!(registry.get("unknown").is_none());
        assert!(registry.register(EchoTool("echo")).is_err());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool("echo")).unwrap();

        let first = registry.resolve("echo").unwrap();
        let second = registry.resolve("echo").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        for _ in 0..3 {
            assert!(matches!(registry.resolve("Echo"), Err(AgentError::ToolNotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_discover() {
        let registry = ToolRegistry::discover(&StaticSource(vec!["b", "a"])).await.unwrap();
        assert_eq!(registry.names(), vec!["a", "b"]);

        assert!(ToolRegistry::discover(&DownSource).await.is_err());
        assert!(ToolRegistry::discover(&StaticSource(vec!["a", "a"])).await.is_err());
    }

    #[test]
    fn test_json_schema_conversion() {
        let schema = json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer", "title": "Id"},
                "mode": {"type": "string", "enum": ["short", "full"]}
            },
            "required": ["id"]
        });

        let tool = ToolSchema::from_json_schema("get_client", "Fetch a client", &schema);
        let id = tool.parameters.iter().find(|p| p.name == "id").unwrap();
        assert!(id.required);
        assert_eq!(id.param_type, "integer");
        assert_eq!(id.description, "Id");

        let back = tool.to_json_schema();
        assert_eq!(back["required"], json!(["id"]));
        assert_eq!(back["properties"]["mode"]["enum"], json!(["short", "full"]));
    }

    #[test]
    fn test_validate_arguments() {
        let schema = ToolSchema::from_json_schema(
            "get_client",
            "",
            &json!({
                "properties": {"id": {"type": "integer"}},
                "required": ["id"]
            }),
        );

        assert!(schema.validate_arguments(&json!({"id": 7})).is_ok());
        assert!(matches!(
            schema.validate_arguments(&json!({"id": "seven"})),
            Err(AgentError::InvalidArguments { .. })
        ));
        assert!(schema.validate_arguments(&json!({"id": 1.5})).is_err());
        assert!(schema.validate_arguments(&json!({})).is_err());
        assert!(schema.validate_arguments(&json!([7])).is_err());
    }

    #[test]
    fn test_tool_call_parsing_accepts_tool_key() {
        let call: ToolCall =
            serde_json::from_str(r#"{"tool": "echo", "arguments": {"text": "hi"}}"#).unwrap();
        assert_eq!(call.name, "echo");
        assert!(!call.id.is_empty());
    }

    #[test]
    fn test_failure_payload_is_error_object() {
        let result = ToolResult::failure("get_client", "Client not found");
        let payload: Value = serde_json::from_str(&result.payload()).unwrap();
        assert_eq!(payload, json!({"error": "Client not found"}));
    }
}

//! Tool registry and invoker: a flat map from name to handler, populated
//! by explicit registration calls. Registering the same name twice is
//! rejected at registration time, not silently overwritten.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, ToolSourceError};
use crate::events::EventBus;
use crate::llm::ToolSpec;
use crate::message::ToolCallRecord;
use crate::session::{Key, SharedSession};

use super::r#trait::Tool;

pub const TOOL_CALL_LOG: Key<Vec<ToolCallRecord>> = Key::new("tool_call_log");

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistryBuilder")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: Arc<dyn Tool>) -> Result<Self, EngineError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(EngineError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn catalog(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<_> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Validates the tool exists and its input carries every field the
    /// tool's schema marks required, invokes the handler, and appends a
    /// record to the session store's tool-call log regardless of success or
    /// failure. A handler failure is turned into a well-formed error string
    /// surfaced back to the LLM turn so the model can react — it never
    /// propagates as a run failure.
    pub async fn invoke(
        &self,
        session: &SharedSession,
        events: &EventBus,
        name: &str,
        args: serde_json::Value,
    ) -> String {
        let result = match self.tools.get(name) {
            None => Err(ToolSourceError::NotFound(name.to_string())),
            Some(tool) => match validate_required(&tool.spec().input_schema, &args) {
                Err(e) => Err(e),
                Ok(()) => tool.call(args.clone()).await,
            },
        };

        let summary = match &result {
            Ok(content) => content.text.clone(),
            Err(e) => format!("error: {e}"),
        };

        events.tool_execution(name, &summary);

        let mut log = session.get(TOOL_CALL_LOG).ok().flatten().unwrap_or_default();
        log.push(ToolCallRecord {
            name: name.to_string(),
            arguments: args,
            result_summary: summary.clone(),
        });
        session.set(TOOL_CALL_LOG, &log);

        summary
    }
}

/// Checks `args` against the schema's `required` list before the handler
/// runs, so a malformed call is reported to the LLM as a validation error
/// rather than a handler-specific one.
fn validate_required(schema: &serde_json::Value, args: &serde_json::Value) -> Result<(), ToolSourceError> {
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    for field in required.iter().filter_map(|f| f.as_str()) {
        if args.get(field).is_none() {
            return Err(ToolSourceError::InvalidInput(format!("missing required field '{field}'")));
        }
    }
    Ok(())
}

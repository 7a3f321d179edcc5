//! # Strata MCP Server
//!
//! Implements `ServerHandler` with 6 MCP tools that proxy to the Strata HTTP
//! API. Every write goes through the gateway's gates; the bridge only
//! translates requests and renders the outcome.

use crate::client::StrataClient;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Deserialize;
use serde_json::Value;

// =============================================================================
// MCP SERVER
// =============================================================================

/// Graph naming the bridge needs to address the agent's staging graph.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Base URI the server renders graph names under.
    pub base_uri: String,
    /// Session used when a tool call does not name one.
    pub default_session: String,
}

impl BridgeSettings {
    fn staging_graph(&self, agent_id: &str) -> String {
        format!("{}/staging/{agent_id}", self.base_uri.trim_end_matches('/'))
    }

    fn session<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.default_session)
    }
}

/// MCP server that bridges to a Strata HTTP API.
#[derive(Clone)]
pub struct StrataMcp {
    client: StrataClient,
    settings: BridgeSettings,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

// =============================================================================
// TOOL PARAMETER STRUCTS
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SubmitDeltaParams {
    /// Turtle payload holding the candidate facts.
    #[schemars(description = "Turtle payload holding the candidate facts")]
    pub payload: String,
    /// "add" (default) or "remove".
    #[schemars(description = "Delta operation: 'add' (default) or 'remove'")]
    pub operation: Option<String>,
    /// Session to stage under (defaults to the bridge session).
    #[schemars(description = "Session to stage under (defaults to the bridge session)")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SessionParams {
    /// Session to act on (defaults to the bridge session).
    #[schemars(description = "Session to act on (defaults to the bridge session)")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueryParams {
    /// A SELECT query, e.g. "SELECT ?c WHERE { ?c a tourism:City }".
    #[schemars(description = "A SELECT query, e.g. 'SELECT ?c WHERE { ?c a tourism:City }'")]
    pub query: String,
    /// Named graph URI to scope the query to (defaults to every graph).
    #[schemars(description = "Named graph URI to scope the query to (defaults to every graph)")]
    pub graph_uri: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ProvenanceParams {
    /// Only records derived from this agent's submissions.
    #[schemars(description = "Only records derived from this agent's submissions")]
    pub agent_id: Option<String>,
}

// =============================================================================
// TOOL IMPLEMENTATIONS
// =============================================================================

#[tool_router]
impl StrataMcp {
    pub fn new(client: StrataClient, settings: BridgeSettings) -> Self {
        Self {
            client,
            settings,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Submit Turtle facts to this agent's staging graph. \
                          The delta is shape-checked, reasoned over and checked for consistency")]
    async fn strata_submit_delta(
        &self,
        params: Parameters<SubmitDeltaParams>,
    ) -> Result<CallToolResult, McpError> {
        let SubmitDeltaParams {
            payload,
            operation,
            session_id,
        } = params.0;
        let operation = operation.as_deref().unwrap_or("add");
        if operation != "add" && operation != "remove" {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Unknown operation '{operation}': expected 'add' or 'remove'"
            ))]));
        }
        let target = self.settings.staging_graph(self.client.agent_id());
        let session = self.settings.session(session_id.as_deref());
        let result = self
            .client
            .submit_delta(session, &target, &payload, operation)
            .await;
        validation_tool_result(result)
    }

    #[tool(description = "Commit this agent's staging graph into the session's consensus graph")]
    async fn strata_commit(
        &self,
        params: Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = self.settings.session(params.0.session_id.as_deref());
        validation_tool_result(self.client.commit(session).await)
    }

    #[tool(description = "Promote the session's consensus graph into the main graph")]
    async fn strata_promote(
        &self,
        params: Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = self.settings.session(params.0.session_id.as_deref());
        validation_tool_result(self.client.promote(session).await)
    }

    #[tool(description = "Run a SELECT query over the knowledge graph layers")]
    async fn strata_query(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let QueryParams { query, graph_uri } = params.0;
        match self.client.query(&query, graph_uri.as_deref()).await {
            Ok(resp) => Ok(render(&resp, format_query_response(&resp))),
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "Get per-layer triple counts and the active rule version")]
    async fn strata_status(&self) -> Result<CallToolResult, McpError> {
        let health = self
            .client
            .health()
            .await
            .map_err(|e| McpError::internal_error(format!("{e}"), None))?;
        match self.client.status().await {
            Ok(resp) => Ok(CallToolResult::success(vec![Content::text(format_status(
                &health, &resp,
            ))])),
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(description = "List provenance records for derived facts, optionally for one agent")]
    async fn strata_provenance(
        &self,
        params: Parameters<ProvenanceParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.client.provenance(params.0.agent_id.as_deref()).await {
            Ok(resp) => Ok(CallToolResult::success(vec![Content::text(
                format_provenance(&resp),
            )])),
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }
}

// =============================================================================
// SERVER HANDLER
// =============================================================================

#[tool_handler]
impl ServerHandler for StrataMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Strata validator gateway. Stage Turtle facts with strata_submit_delta, \
                 then strata_commit and strata_promote them. Rejected deltas report the \
                 failing gate and every error found."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// =============================================================================
// RESPONSE FORMATTING
// =============================================================================

/// Rejections are tool errors the model can read, not protocol errors.
fn render(resp: &Value, text: String) -> CallToolResult {
    if resp.get("success").and_then(Value::as_bool).unwrap_or(false) {
        CallToolResult::success(vec![Content::text(text)])
    } else {
        CallToolResult::error(vec![Content::text(text)])
    }
}

fn validation_tool_result(
    result: Result<Value, crate::client::ClientError>,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(resp) => Ok(render(&resp, format_validation(&resp))),
        Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("?")
}

/// Short rendering of a serialized triple.
fn format_triple(triple: &Value) -> String {
    let object = match triple.get("object") {
        Some(Value::Object(term)) => term
            .get("Iri")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                term.get("Literal")
                    .and_then(|l| l.get("lexical"))
                    .and_then(Value::as_str)
                    .map(|lexical| format!("\"{lexical}\""))
            })
            .unwrap_or_else(|| "?".to_string()),
        _ => "?".to_string(),
    };
    format!(
        "{} {} {object}",
        str_field(triple, "subject"),
        str_field(triple, "predicate")
    )
}

/// Format a validation result JSON into human-readable text.
fn format_validation(resp: &Value) -> String {
    let mut parts = Vec::new();
    let message = resp
        .get("message")
        .or_else(|| resp.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("no message");

    if resp.get("success").and_then(Value::as_bool).unwrap_or(false) {
        parts.push(format!("Accepted: {message}"));
    } else {
        let gate = resp
            .get("failed_gate")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        parts.push(format!("Rejected at gate '{gate}': {message}"));
    }

    if let Some(errors) = resp.get("errors").and_then(Value::as_array)
        && !errors.is_empty()
    {
        parts.push(format!("Errors ({}):", errors.len()));
        for error in errors {
            let category = str_field(error, "category");
            let detail = error
                .get("message")
                .or_else(|| error.get("explanation"))
                .and_then(Value::as_str)
                .unwrap_or("?");
            parts.push(format!("  [{category}] {detail}"));
        }
    }

    if let Some(derived) = resp.get("derived").and_then(Value::as_array)
        && !derived.is_empty()
    {
        parts.push(format!("Derived ({}):", derived.len()));
        for inference in derived {
            let triple = inference.get("triple").map(format_triple).unwrap_or_default();
            parts.push(format!("  {triple}  ({})", str_field(inference, "rule_id")));
        }
    }

    if resp.get("rolled_back").and_then(Value::as_bool).unwrap_or(false) {
        parts.push("Store changes were rolled back.".to_string());
    }

    parts.join("\n")
}

/// Format a query response JSON into a tab-separated table.
fn format_query_response(resp: &Value) -> String {
    if !resp.get("success").and_then(Value::as_bool).unwrap_or(false) {
        return format_validation(resp);
    }

    let variables: Vec<&str> = resp
        .get("variables")
        .and_then(Value::as_array)
        .map(|vars| vars.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let rows = resp
        .get("rows")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if rows.is_empty() {
        return "No results.".to_string();
    }

    let mut lines = vec![variables.join("\t")];
    for row in &rows {
        let cells: Vec<&str> = variables
            .iter()
            .map(|var| row.get(*var).and_then(Value::as_str).unwrap_or(""))
            .collect();
        lines.push(cells.join("\t"));
    }
    lines.push(format!("({} rows)", rows.len()));
    lines.join("\n")
}

/// Format the status response.
fn format_status(health: &Value, status: &Value) -> String {
    let mut parts = vec![format!(
        "Strata {} ({})",
        str_field(health, "version"),
        str_field(health, "status")
    )];
    if let Some(layers) = status.get("layers").and_then(Value::as_object) {
        for (layer, count) in layers {
            parts.push(format!("  {layer}: {}", count.as_u64().unwrap_or(0)));
        }
    }
    let total = status
        .get("total_triples")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let agents = status.get("agents").and_then(Value::as_u64).unwrap_or(0);
    let rule_version = status
        .get("rule_version")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    parts.push(format!(
        "Total: {total} triples, {agents} agents, rules v{rule_version}"
    ));
    parts.join("\n")
}

/// Format provenance records.
fn format_provenance(resp: &Value) -> String {
    let records = resp.as_array().cloned().unwrap_or_default();
    if records.is_empty() {
        return "No provenance records.".to_string();
    }
    let mut parts = vec![format!("Provenance ({} records):", records.len())];
    for record in &records {
        let triple = record.get("triple").map(format_triple).unwrap_or_default();
        parts.push(format!(
            "  {triple}  [{} by {} in {}]",
            str_field(record, "rule_id"),
            str_field(record, "source_agent"),
            str_field(record, "session_id"),
        ));
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_staging_graph_and_session() {
        let settings = BridgeSettings {
            base_uri: "http://example.org/".to_string(),
            default_session: "mcp".to_string(),
        };
        assert_eq!(
            settings.staging_graph("a1"),
            "http://example.org/staging/a1"
        );
        assert_eq!(settings.session(None), "mcp");
        assert_eq!(settings.session(Some("s2")), "s2");
    }

    #[test]
    fn test_format_rejection_lists_every_error() {
        let resp = json!({
            "success": false,
            "state": "rejected",
            "message": "Shape validation failed",
            "failed_gate": "shape_valid",
            "errors": [
                {"category": "shape", "focus_node": "http://example.org/tourism#Dubai",
                 "path": null, "message": "missing rdfs:label", "severity": "violation"},
                {"category": "contradiction", "kind": "disjoint_types",
                 "entity": "http://example.org/tourism#Dubai", "property": null,
                 "conflicting": [], "explanation": "City and Country are disjoint"}
            ],
            "derived": [],
            "rolled_back": false
        });
        let text = format_validation(&resp);
        assert!(text.starts_with("Rejected at gate 'shape_valid'"));
        assert!(text.contains("Errors (2):"));
        assert!(text.contains("[shape] missing rdfs:label"));
        assert!(text.contains("[contradiction] City and Country are disjoint"));
    }

    #[test]
    fn test_format_acceptance_lists_derived() {
        let resp = json!({
            "success": true,
            "message": "Delta accepted",
            "errors": [],
            "derived": [{
                "triple": {
                    "subject": "http://example.org/tourism#Dubai",
                    "predicate": "http://example.org/tourism#isCoastal",
                    "object": {"Literal": {"lexical": "true", "datatype": "http://www.w3.org/2001/XMLSchema#boolean"}}
                },
                "rule_id": "coastal_city",
                "iteration": 1
            }]
        });
        let text = format_validation(&resp);
        assert!(text.starts_with("Accepted: Delta accepted"));
        assert!(text.contains("Derived (1):"));
        assert!(text.contains("\"true\"  (coastal_city)"));
    }

    #[test]
    fn test_format_query_table() {
        let resp = json!({
            "success": true,
            "variables": ["c"],
            "rows": [{"c": "tourism:Dubai"}, {"c": "tourism:Paris"}]
        });
        let text = format_query_response(&resp);
        assert_eq!(text, "c\ntourism:Dubai\ntourism:Paris\n(2 rows)");

        let empty = json!({"success": true, "variables": ["c"], "rows": []});
        assert_eq!(format_query_response(&empty), "No results.");
    }

    #[test]
    fn test_format_status() {
        let health = json!({"status": "ok", "version": "0.1.0"});
        let status = json!({
            "layers": {"main": 6, "ontology": 20},
            "total_triples": 26,
            "agents": 1,
            "rule_version": 1,
            "rules": 6
        });
        let text = format_status(&health, &status);
        assert!(text.starts_with("Strata 0.1.0 (ok)"));
        assert!(text.contains("  main: 6"));
        assert!(text.contains("Total: 26 triples, 1 agents, rules v1"));
    }

    #[test]
    fn test_format_empty_provenance() {
        assert_eq!(format_provenance(&json!([])), "No provenance records.");
    }
}

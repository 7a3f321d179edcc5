//! # Strata HTTP Client
//!
//! Wrapper around the Strata REST API for use by the MCP server. Pipeline
//! calls carry the agent's credentials; operator calls carry the admin key
//! when one is configured.

use serde_json::Value;

/// Errors from the HTTP client layer.
#[derive(Debug)]
pub enum ClientError {
    /// Cannot reach the Strata server.
    ConnectionFailed(String),
    /// 401 Unauthorized - unknown agent, wrong secret or missing permission.
    Unauthorized(String),
    /// 429 Too Many Requests.
    RateLimited,
    /// Server returned a 5xx error.
    ServerError(u16, String),
    /// Failed to parse response body.
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(url) => write!(f, "Cannot connect to Strata at {url}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::RateLimited => write!(f, "Rate limited: too many requests"),
            Self::ServerError(status, msg) => write!(f, "Server error ({status}): {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Identity the bridge acts as.
#[derive(Debug, Clone)]
pub struct AgentCredentials {
    pub agent_id: String,
    pub secret: String,
}

/// HTTP client that wraps calls to the Strata REST API.
#[derive(Clone)]
pub struct StrataClient {
    http: reqwest::Client,
    base_url: String,
    agent: AgentCredentials,
    admin_key: Option<String>,
}

impl StrataClient {
    /// Create a new client pointing at the given Strata server URL.
    pub fn new(base_url: String, agent: AgentCredentials, admin_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
            admin_key,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent.agent_id
    }

    /// Request authenticated as the agent.
    fn agent_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http
            .request(method, &url)
            .header("X-Agent-Id", &self.agent.agent_id)
            .bearer_auth(&self.agent.secret)
    }

    /// Request with optional admin Bearer auth.
    fn admin_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(ref key) = self.admin_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Handle HTTP response: check status codes and parse JSON.
    ///
    /// Validation rejections (422) carry a structured body and are returned
    /// as `Ok` for the caller to render.
    async fn handle_response(&self, resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Unauthorized(unauthorized_reason(&body)));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::ServerError(status.as_u16(), body));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// Send a request and handle connection errors.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, ClientError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {e}", self.base_url)))?;
        self.handle_response(resp).await
    }

    /// GET /health
    pub async fn health(&self) -> Result<Value, ClientError> {
        self.send(self.admin_request(reqwest::Method::GET, "/health"))
            .await
    }

    /// GET /status → per-layer triple counts.
    pub async fn status(&self) -> Result<Value, ClientError> {
        self.send(self.admin_request(reqwest::Method::GET, "/status"))
            .await
    }

    /// GET /provenance?agent_id= → provenance records.
    pub async fn provenance(&self, agent_id: Option<&str>) -> Result<Value, ClientError> {
        let mut req = self.admin_request(reqwest::Method::GET, "/provenance");
        if let Some(agent_id) = agent_id {
            req = req.query(&[("agent_id", agent_id)]);
        }
        self.send(req).await
    }

    /// POST /delta → submit a delta to the agent's staging graph.
    pub async fn submit_delta(
        &self,
        session_id: &str,
        target_graph: &str,
        payload: &str,
        operation: &str,
    ) -> Result<Value, ClientError> {
        let body = serde_json::json!({
            "session_id": session_id,
            "target_graph": target_graph,
            "payload": payload,
            "operation": operation,
        });
        self.send(self.agent_request(reqwest::Method::POST, "/delta").json(&body))
            .await
    }

    /// POST /commit → commit the agent's staging graph into consensus.
    pub async fn commit(&self, session_id: &str) -> Result<Value, ClientError> {
        let body = serde_json::json!({ "session_id": session_id });
        self.send(self.agent_request(reqwest::Method::POST, "/commit").json(&body))
            .await
    }

    /// POST /promote → promote the session's consensus into main.
    pub async fn promote(&self, session_id: &str) -> Result<Value, ClientError> {
        let body = serde_json::json!({ "session_id": session_id });
        self.send(self.agent_request(reqwest::Method::POST, "/promote").json(&body))
            .await
    }

    /// POST /query → run a `SELECT` query.
    pub async fn query(&self, query: &str, graph_uri: Option<&str>) -> Result<Value, ClientError> {
        let body = serde_json::json!({
            "query": query,
            "graph_uri": graph_uri,
        });
        self.send(self.agent_request(reqwest::Method::POST, "/query").json(&body))
            .await
    }
}

/// Pull the server's message out of a 401 body.
fn unauthorized_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("message"))
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "invalid or missing agent credentials".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_reason_prefers_gate_error() {
        let body = r#"{"success":false,"errors":[{"category":"authentication","message":"agent 'a1' lacks write_consensus"}]}"#;
        assert_eq!(unauthorized_reason(body), "agent 'a1' lacks write_consensus");

        let body = r#"{"success":false,"error":"Authentication failed"}"#;
        assert_eq!(unauthorized_reason(body), "Authentication failed");

        assert_eq!(
            unauthorized_reason("not json"),
            "invalid or missing agent credentials"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = StrataClient::new(
            "http://localhost:8080/".to_string(),
            AgentCredentials {
                agent_id: "a1".to_string(),
                secret: "k1".to_string(),
            },
            None,
        );
        assert_eq!(client.base_url, "http://localhost:8080");
        assert_eq!(client.agent_id(), "a1");
    }
}

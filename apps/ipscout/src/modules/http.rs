//! # HTTP Client
//!
//! Blocking wrapper shared by the API-backed modules.

use crate::config::NetworkConfig;
use ipscout_core::ModuleError;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::redirect::Policy;
use serde_json::Value;

/// HTTP client with the configured timeout and user agent.
///
/// `direct` never follows redirects, for callers that walk the chain
/// themselves.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    direct: Client,
}

impl ApiClient {
    /// Build a client from the `[network]` settings.
    pub fn new(network: &NetworkConfig) -> Result<Self, ModuleError> {
        let http = Client::builder()
            .timeout(network.timeout())
            .user_agent(network.user_agent.clone())
            .build()
            .map_err(|e| ModuleError::Http(e.to_string()))?;
        let direct = Client::builder()
            .timeout(network.timeout())
            .user_agent(network.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|e| ModuleError::Http(e.to_string()))?;
        Ok(Self { http, direct })
    }

    /// Start a GET request.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url)
    }

    /// Start a GET request that returns redirects instead of following them.
    pub fn get_direct(&self, url: &str) -> RequestBuilder {
        self.direct.get(url)
    }

    /// Send a request, mapping transport failures.
    pub fn send(&self, req: RequestBuilder) -> Result<Response, ModuleError> {
        req.send().map_err(|e| ModuleError::Http(e.to_string()))
    }

    /// Send a request and decode a JSON body from a success response.
    pub fn json(&self, req: RequestBuilder) -> Result<Value, ModuleError> {
        let resp = self.send(req)?;
        handle_response(resp)
    }
}

/// Check the status code and parse JSON.
fn handle_response(resp: Response) -> Result<Value, ModuleError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(ModuleError::HttpStatus {
            status: status.as_u16(),
            body: body.trim().to_string(),
        });
    }
    resp.json::<Value>()
        .map_err(|e| ModuleError::Parse(e.to_string()))
}

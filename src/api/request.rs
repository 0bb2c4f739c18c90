use axum::http::Method;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// An inbound API call, already stripped of the API prefix
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub id: Uuid,
    pub method: Method,
    pub path: String,
    /// Values captured by `:name` segments of the matched route
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Parsed JSON body, `Null` when the request had none
    pub body: Value,
    pub received_at: DateTime<Utc>,
}

impl ApiRequest {
    pub fn new<S: Into<String>>(method: Method, path: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            params: HashMap::new(),
            query: HashMap::new(),
            body: Value::Null,
            received_at: Utc::now(),
        }
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Short form used in log lines
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

//! HTTP transport used by the farm API client.
//!
//! The client only talks to [`HttpTransport`], so tests can swap in a recording
//! fake while production code uses [`ReqwestTransport`].

use std::{fmt, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Full value of the `Authorization` header.
    pub authorization: String,
    /// JSON body, if any.
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("{}", status_message(.status, .detail))]
    Status { status: u16, detail: Option<String> },
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        source: Box<ApiError>,
    },
}

fn status_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(detail) => detail.clone(),
        None => format!("Server answered with status {}", status),
    }
}

pub trait HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("krishisat")
            .timeout(timeout)
            .build()
            .map_err(|err| {
                ApiError::Transport(format!("Could not build HTTP client, {}", err))
            })?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        log::debug!("{} {}", request.method, request.url);
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Patch => self.client.patch(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        let mut builder = builder
            .header(reqwest::header::AUTHORIZATION, &request.authorization)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        let response = builder
            .send()
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| ApiError::Transport(format!("No response text, {}", err)))?;
        Ok(ApiResponse { status, body })
    }
}

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::Credentials;
use crate::config::ClientOptions;
use crate::metrics::Metrics;
use crate::oauth::AuthParams;
use crate::requests::{
    AgileIssueRequest, BoardRequest, DashboardRequest, EpicRequest, FieldRequest, ResourceRequest,
    ServerInfoRequest, UserRequest, WorkflowRequest,
};

const MAX_ERROR_BODY: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum JiraError {
    #[error("jira rejected the request as unauthorized (HTTP {status}): {body}")]
    Unauthorized { status: StatusCode, body: String },
    #[error("jira resource not found: {body}")]
    NotFound { body: String },
    #[error("jira returned HTTP {status}: {body}")]
    Client { status: StatusCode, body: String },
    #[error("jira request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to decode jira response: {source}; body: {body}")]
    Decode {
        source: serde_json::Error,
        body: String,
    },
    #[error("invalid jira base url '{0}'")]
    InvalidBaseUrl(String),
    #[error("oauth: {0}")]
    OAuth(String),
}

/// The three failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    Client,
}

impl JiraError {
    /// Classifies a non-2xx status: 401/403 unauthorized, 404 not found,
    /// everything else a generic client error.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized { status, body },
            StatusCode::NOT_FOUND => Self::NotFound { body },
            _ => Self::Client { status, body },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Client,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { status, .. } | Self::Client { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Self::Request(err) => err.status(),
            _ => None,
        }
    }
}

/// REST API family a resource path is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    Platform,
    PlatformV3,
    Agile,
}

impl Api {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Platform => "/rest/api/2",
            Self::PlatformV3 => "/rest/api/3",
            Self::Agile => "/rest/agile/1.0",
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    base_url: String,
    cloud_id: Option<String>,
    credentials: Credentials,
    http: Client,
    metrics: Arc<Metrics>,
}

impl JiraClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, JiraError> {
        Self::with_options(base_url, credentials, &ClientOptions::default())
    }

    pub fn with_options(
        base_url: &str,
        credentials: Credentials,
        options: &ClientOptions,
    ) -> Result<Self, JiraError> {
        let http = build_http_client(options)?;
        Self::from_parts(base_url, credentials, http, Arc::new(Metrics::new()))
    }

    pub fn from_parts(
        base_url: &str,
        credentials: Credentials,
        http: Client,
        metrics: Arc<Metrics>,
    ) -> Result<Self, JiraError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            cloud_id: None,
            credentials,
            http,
            metrics,
        })
    }

    /// Scopes every path under `/{cloud_id}`. An empty id clears the scope.
    pub fn with_cloud_id(mut self, cloud_id: impl Into<String>) -> Self {
        let cloud_id = cloud_id.into();
        self.cloud_id = (!cloud_id.trim().is_empty()).then_some(cloud_id);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Copy of this client that talks to the given cloud with a bearer token.
    pub fn for_auth_params(&self, params: &AuthParams) -> Self {
        let scoped = self
            .clone()
            .with_credentials(Credentials::bearer(params.access_token.clone()));
        match &params.cloud_id {
            Some(cloud_id) => scoped.with_cloud_id(cloud_id.clone()),
            None => scoped,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cloud_id(&self) -> Option<&str> {
        self.cloud_id.as_deref()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn url(&self, api: Api, resource: &str) -> String {
        let mut url = self.base_url.clone();
        if let Some(cloud_id) = &self.cloud_id {
            url.push('/');
            url.push_str(cloud_id.trim_matches('/'));
        }
        url.push_str(api.prefix());
        url.push('/');
        url.push_str(resource.trim_start_matches('/'));
        url
    }

    /// Sends one request. GET/DELETE params go in the query string, anything
    /// else is sent as a JSON body. Non-2xx responses become errors.
    pub fn execute<P>(
        &self,
        method: Method,
        api: Api,
        resource: &str,
        params: Option<&P>,
    ) -> Result<Response, JiraError>
    where
        P: Serialize + ?Sized,
    {
        let url = self.url(api, resource);
        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json");
        builder = self.credentials.apply(builder);
        if let Some(params) = params {
            builder = if sends_query(&method) {
                builder.query(params)
            } else {
                builder.json(params)
            };
        }

        self.send(builder, &method, &url)
    }

    pub fn execute_bare(
        &self,
        method: Method,
        api: Api,
        resource: &str,
    ) -> Result<Response, JiraError> {
        self.execute::<()>(method, api, resource, None)
    }

    /// Sends a raw body, e.g. an avatar image. Jira requires the XSRF opt-out
    /// header on these uploads.
    pub fn execute_bytes(
        &self,
        method: Method,
        api: Api,
        resource: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Response, JiraError> {
        let url = self.url(api, resource);
        let builder = self
            .http
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, content_type)
            .header("X-Atlassian-Token", "no-check")
            .body(body);
        let builder = self.credentials.apply(builder);
        self.send(builder, &method, &url)
    }

    fn send(
        &self,
        builder: RequestBuilder,
        method: &Method,
        url: &str,
    ) -> Result<Response, JiraError> {
        self.metrics.inc_api_request();
        tracing::debug!(%method, %url, "jira request");

        let response = builder.send().map_err(|err| {
            self.metrics.inc_transport_error();
            tracing::warn!(%method, %url, error = %err, "jira request transport error");
            JiraError::Request(err)
        })?;

        ensure_success(response).map_err(|err| {
            self.metrics.record_failure(err.kind());
            tracing::warn!(%method, %url, status = ?err.status(), "jira request failed");
            err
        })
    }

    pub fn board(&self) -> BoardRequest {
        BoardRequest::new(self.clone())
    }

    pub fn epic(&self) -> EpicRequest {
        EpicRequest::new(self.clone())
    }

    pub fn agile_issue(&self) -> AgileIssueRequest {
        AgileIssueRequest::new(self.clone())
    }

    pub fn dashboard(&self) -> DashboardRequest {
        DashboardRequest::new(self.clone())
    }

    pub fn field(&self) -> FieldRequest {
        FieldRequest::new(self.clone())
    }

    pub fn user(&self) -> UserRequest {
        UserRequest::new(self.clone())
    }

    pub fn workflow(&self) -> WorkflowRequest {
        WorkflowRequest::new(self.clone())
    }

    pub fn server_info(&self) -> ServerInfoRequest {
        ServerInfoRequest::new(self.clone())
    }

    pub fn resource(&self) -> ResourceRequest {
        ResourceRequest::new(self.clone())
    }
}

pub fn build_http_client(options: &ClientOptions) -> Result<Client, JiraError> {
    let mut builder = Client::builder().user_agent(options.user_agent.clone());
    if options.timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(options.timeout_secs));
    }
    Ok(builder.build()?)
}

/// Passes 2xx responses through and turns anything else into a classified error.
pub fn ensure_success(response: Response) -> Result<Response, JiraError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(JiraError::from_status(status, truncate_body(&body)))
}

pub fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, JiraError> {
    let body = response.text()?;
    serde_json::from_str(&body).map_err(|source| JiraError::Decode {
        source,
        body: truncate_body(&body),
    })
}

pub(crate) fn sends_query(method: &Method) -> bool {
    *method == Method::GET || *method == Method::DELETE || *method == Method::HEAD
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY {
        let short: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{short}...")
    } else {
        body.to_string()
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String, JiraError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(JiraError::InvalidBaseUrl(raw.to_string()));
    }

    let mut candidate = trimmed.to_string();

    if candidate.starts_with("https://https//") {
        candidate = candidate.replacen("https://https//", "https://", 1);
    } else if candidate.starts_with("http://http//") {
        candidate = candidate.replacen("http://http//", "http://", 1);
    }

    if candidate.starts_with("https//") {
        candidate = format!("https://{}", candidate.trim_start_matches("https//"));
    } else if candidate.starts_with("http//") {
        candidate = format!("http://{}", candidate.trim_start_matches("http//"));
    } else if !candidate.starts_with("https://") && !candidate.starts_with("http://") {
        candidate = format!("https://{candidate}");
    }

    let parsed =
        reqwest::Url::parse(&candidate).map_err(|_| JiraError::InvalidBaseUrl(raw.to_string()))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

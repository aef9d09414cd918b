//! OAuth2 (3LO) authorization-code flow against Atlassian's auth server.
//!
//! A typical web login:
//!
//! 1. redirect the user to [`OAuthHandler::authorization_url`],
//! 2. exchange the `code` Atlassian sends back with [`OAuthHandler::exchange_code`],
//! 3. keep the returned [`TokenSet`] in a [`SessionStore`],
//! 4. build request types from the handler (`handler.board()?`, ...).

use std::fmt;
use std::sync::Arc;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::Credentials;
use crate::client::{
    build_http_client, decode_json, ensure_success, sends_query, JiraClient, JiraError,
};
use crate::config::{AppConfig, ClientOptions};
use crate::metrics::Metrics;
use crate::requests::{
    AgileIssueRequest, BoardRequest, DashboardRequest, EpicRequest, FieldRequest, ResourceRequest,
    ServerInfoRequest, UserRequest, WorkflowRequest,
};
use crate::session::{self, SessionError, SessionStore};

pub const AUTHORIZE_URL: &str = "https://auth.atlassian.com/authorize";
pub const TOKEN_URL: &str = "https://auth.atlassian.com/oauth/token";
pub const API_URL: &str = "https://api.atlassian.com";
pub const AUDIENCE: &str = "api.atlassian.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub api_url: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            api_url: API_URL.to_string(),
        }
    }
}

impl OAuthEndpoints {
    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path)
    }
}

/// Credentials issued for one Atlassian site. `expires` is a unix timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub cloud_id: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires: Option<i64>,
}

impl TokenSet {
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires, Some(at) if at <= now)
    }
}

/// What a request type needs to talk to a cloud site on a user's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParams {
    pub cloud_id: Option<String>,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token_set(self, cloud_id: Option<String>, issued_at: i64) -> TokenSet {
        TokenSet {
            cloud_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires: self.expires_in.map(|secs| issued_at + secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessibleResource {
    id: String,
    #[serde(default)]
    name: String,
}

pub struct OAuthHandler {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    endpoints: OAuthEndpoints,
    host: Option<String>,
    http: Client,
    metrics: Arc<Metrics>,
    state: Option<String>,
    token: Option<TokenSet>,
}

impl fmt::Debug for OAuthHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthHandler")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("endpoints", &self.endpoints)
            .field("cloud_id", &self.cloud_id())
            .finish_non_exhaustive()
    }
}

impl OAuthHandler {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Result<Self, JiraError> {
        Self::with_options(
            client_id,
            client_secret,
            redirect_uri,
            scopes,
            &ClientOptions::default(),
        )
    }

    pub fn with_options(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
        options: &ClientOptions,
    ) -> Result<Self, JiraError> {
        let scopes = if scopes.is_empty() {
            vec!["read:jira-user".to_string(), "read:jira-work".to_string()]
        } else {
            scopes
        };
        Ok(Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            endpoints: OAuthEndpoints::default(),
            host: None,
            http: build_http_client(options)?,
            metrics: Arc::new(Metrics::new()),
            state: None,
            token: None,
        })
    }

    /// Handler for the `[auth.oauth2]` section. A static access token and
    /// cloud id in the config are loaded as the current token.
    pub fn from_config(config: &AppConfig) -> Result<Self, JiraError> {
        let oauth = &config.auth.oauth2;
        let mut handler = Self::with_options(
            &oauth.client_id,
            &oauth.client_secret,
            &oauth.redirect_uri,
            oauth.scopes.clone(),
            &config.client_options,
        )?
        .with_host(&oauth.api_host);

        if !oauth.access_token.trim().is_empty() {
            handler.set_auth_parameters(TokenSet {
                cloud_id: Some(oauth.cloud_id.clone()).filter(|id| !id.trim().is_empty()),
                access_token: oauth.access_token.clone(),
                refresh_token: None,
                expires: None,
            });
        }
        Ok(handler)
    }

    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Base for REST calls; the cloud id is appended to it. Defaults to
    /// `{api}/ex/jira`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.host = (!host.trim().is_empty()).then_some(host);
        self
    }

    pub fn host(&self) -> String {
        match &self.host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => self.endpoints.api("ex/jira"),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn cloud_id(&self) -> Option<&str> {
        self.token.as_ref().and_then(|t| t.cloud_id.as_deref())
    }

    pub fn token_set(&self) -> Option<&TokenSet> {
        self.token.as_ref()
    }

    pub fn random_state() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// URL the user must visit to grant consent. `state` comes back untouched
    /// on the redirect and should be checked by the caller.
    pub fn authorization_url(&mut self, state: &str) -> Result<String, JiraError> {
        let mut url = url::Url::parse(&self.endpoints.authorize_url)
            .map_err(|err| JiraError::OAuth(format!("invalid authorize url: {err}")))?;
        url.query_pairs_mut()
            .append_pair("audience", AUDIENCE)
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state)
            .append_pair("response_type", "code")
            .append_pair("prompt", "consent");
        self.state = Some(state.to_string());
        Ok(url.into())
    }

    /// Trades an authorization code for tokens and resolves the cloud id of
    /// the first site the token can reach. The handler's token is only
    /// replaced once the whole exchange succeeds.
    pub fn exchange_code(&mut self, code: &str) -> Result<TokenSet, JiraError> {
        let issued_at = now();
        let response = self.send(
            self.http
                .post(&self.endpoints.token_url)
                .header(ACCEPT, "application/json")
                .json(&json!({
                    "grant_type": "authorization_code",
                    "client_id": self.client_id,
                    "client_secret": self.client_secret,
                    "code": code,
                    "redirect_uri": self.redirect_uri,
                })),
        )?;
        let payload: TokenResponse = decode_json(self.check(response)?)?;

        let (site_id, owner) = self.owner_for(&payload.access_token)?;
        let from_self = owner
            .get("self")
            .and_then(Value::as_str)
            .and_then(cloud_id_from_self);
        let cloud_id = match from_self {
            Some(cloud_id) => cloud_id,
            None => {
                tracing::debug!(cloud_id = %site_id, "owner self link has no cloud id, using site id");
                site_id
            }
        };

        let tokens = payload.into_token_set(Some(cloud_id), issued_at);
        self.token = Some(tokens.clone());
        Ok(tokens)
    }

    /// The `myself` record of the token's owner on the first accessible site.
    pub fn resource_owner(&self) -> Result<Value, JiraError> {
        let (_, owner) = self.owner_for(self.access_token()?)?;
        Ok(owner)
    }

    fn owner_for(&self, access_token: &str) -> Result<(String, Value), JiraError> {
        let response = self.send(
            self.http
                .get(self.endpoints.api("oauth/token/accessible-resources"))
                .header(ACCEPT, "application/json")
                .bearer_auth(access_token),
        )?;
        let sites: Vec<AccessibleResource> = decode_json(self.check(response)?)?;
        let site = sites.into_iter().next().ok_or_else(|| {
            JiraError::OAuth("token grants access to no Jira site".into())
        })?;
        tracing::debug!(site = %site.name, cloud_id = %site.id, "resolved accessible resource");

        let response = self.send(
            self.http
                .get(
                    self.endpoints
                        .api(&format!("ex/jira/{}/rest/api/3/myself", site.id)),
                )
                .header(ACCEPT, "application/json")
                .bearer_auth(access_token),
        )?;
        let owner = decode_json(self.check(response)?)?;
        Ok((site.id, owner))
    }

    /// Swaps a refresh token for a new access token. Atlassian rotates
    /// refresh tokens, so the returned set replaces the old one.
    pub fn refresh(&mut self, refresh_token: &str) -> Result<TokenSet, JiraError> {
        let issued_at = now();
        let response = self.send(
            self.http
                .post(&self.endpoints.token_url)
                .header(ACCEPT, "application/json")
                .json(&json!({
                    "grant_type": "refresh_token",
                    "client_id": self.client_id,
                    "client_secret": self.client_secret,
                    "refresh_token": refresh_token,
                })),
        )?;

        if response.status() != StatusCode::OK {
            return Err(self.failure(JiraError::Client {
                status: response.status(),
                body: "Cannot get a new access token".into(),
            }));
        }

        let payload: TokenResponse = decode_json(response)?;
        let cloud_id = self.cloud_id().map(str::to_string);
        let tokens = payload.into_token_set(cloud_id, issued_at);
        self.token = Some(tokens.clone());
        Ok(tokens)
    }

    /// Refreshes the current token when it has expired. Returns whether a
    /// refresh happened.
    pub fn refresh_if_expired(&mut self) -> Result<bool, JiraError> {
        let refresh_token = match &self.token {
            Some(token) if token.is_expired(now()) => token.refresh_token.clone(),
            _ => return Ok(false),
        };
        let refresh_token = refresh_token.ok_or_else(|| {
            JiraError::OAuth("access token expired and no refresh token is stored".into())
        })?;
        self.refresh(&refresh_token)?;
        Ok(true)
    }

    /// Profile of the authenticated Atlassian account.
    pub fn me(&self) -> Result<Value, JiraError> {
        let response = self.send(
            self.http
                .get(self.endpoints.api("me"))
                .header(ACCEPT, "application/json")
                .bearer_auth(self.access_token()?),
        )?;

        if response.status() != StatusCode::OK {
            return Err(self.failure(JiraError::Client {
                status: response.status(),
                body: "Cannot get current user".into(),
            }));
        }
        decode_json(response)
    }

    /// Calls `{host}/{cloud_id}/rest/api/2/{resource}` and decodes the JSON
    /// answer. Anything but HTTP 200 is a client error carrying the body.
    pub fn send_request<P>(
        &self,
        method: Method,
        resource: &str,
        params: Option<&P>,
    ) -> Result<Value, JiraError>
    where
        P: Serialize + ?Sized,
    {
        let cloud_id = self.cloud_id().ok_or_else(|| {
            JiraError::OAuth("no cloud id; exchange a code or set auth parameters first".into())
        })?;
        let url = format!(
            "{}/{}/rest/api/2/{}",
            self.host(),
            cloud_id,
            resource.trim_start_matches('/')
        );
        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json")
            .bearer_auth(self.access_token()?);
        if let Some(params) = params {
            builder = if sends_query(&method) {
                builder.query(params)
            } else {
                builder.json(params)
            };
        }

        let response = self.send(builder)?;
        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(self.failure(JiraError::Client { status, body }));
        }
        decode_json(response)
    }

    /// Replaces the current token. A set without a cloud id keeps the
    /// previously known one.
    pub fn set_auth_parameters(&mut self, mut tokens: TokenSet) {
        if tokens.cloud_id.is_none() {
            tokens.cloud_id = self.cloud_id().map(str::to_string);
        }
        self.token = Some(tokens);
    }

    pub fn auth_params(&self) -> Result<AuthParams, JiraError> {
        Ok(AuthParams {
            cloud_id: self.cloud_id().map(str::to_string),
            access_token: self.access_token()?.to_string(),
        })
    }

    /// A [`JiraClient`] scoped to the current cloud with bearer credentials.
    pub fn jira_client(&self) -> Result<JiraClient, JiraError> {
        let params = self.auth_params()?;
        let client = JiraClient::from_parts(
            &self.host(),
            Credentials::None,
            self.http.clone(),
            Arc::clone(&self.metrics),
        )?;
        Ok(client.for_auth_params(&params))
    }

    pub fn board(&self) -> Result<BoardRequest, JiraError> {
        Ok(self.jira_client()?.board())
    }

    pub fn epic(&self) -> Result<EpicRequest, JiraError> {
        Ok(self.jira_client()?.epic())
    }

    pub fn agile_issue(&self) -> Result<AgileIssueRequest, JiraError> {
        Ok(self.jira_client()?.agile_issue())
    }

    pub fn dashboard(&self) -> Result<DashboardRequest, JiraError> {
        Ok(self.jira_client()?.dashboard())
    }

    pub fn field(&self) -> Result<FieldRequest, JiraError> {
        Ok(self.jira_client()?.field())
    }

    pub fn user(&self) -> Result<UserRequest, JiraError> {
        Ok(self.jira_client()?.user())
    }

    pub fn workflow(&self) -> Result<WorkflowRequest, JiraError> {
        Ok(self.jira_client()?.workflow())
    }

    pub fn server_info(&self) -> Result<ServerInfoRequest, JiraError> {
        Ok(self.jira_client()?.server_info())
    }

    pub fn resource(&self) -> Result<ResourceRequest, JiraError> {
        Ok(self.jira_client()?.resource())
    }

    pub fn store_in_session(&self, store: &dyn SessionStore) -> Result<(), SessionError> {
        match &self.token {
            Some(tokens) => session::save_tokens(store, tokens),
            None => session::clear_tokens(store),
        }
    }

    /// Loads tokens saved by [`store_in_session`](Self::store_in_session).
    /// Returns whether the session held any.
    pub fn restore_from_session(&mut self, store: &dyn SessionStore) -> Result<bool, SessionError> {
        match session::load_tokens(store)? {
            Some(tokens) => {
                self.set_auth_parameters(tokens);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn access_token(&self) -> Result<&str, JiraError> {
        self.token
            .as_ref()
            .map(|t| t.access_token.as_str())
            .ok_or_else(|| {
                JiraError::OAuth(
                    "no access token; exchange a code or set auth parameters first".into(),
                )
            })
    }

    fn check(&self, response: Response) -> Result<Response, JiraError> {
        ensure_success(response).map_err(|err| self.failure(err))
    }

    fn failure(&self, err: JiraError) -> JiraError {
        self.metrics.record_failure(err.kind());
        tracing::warn!(status = ?err.status(), error = %err, "oauth request failed");
        err
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, JiraError> {
        self.metrics.inc_api_request();
        builder.send().map_err(|err| {
            self.metrics.inc_transport_error();
            tracing::warn!(error = %err, "oauth request transport error");
            JiraError::Request(err)
        })
    }
}

/// Cloud id embedded in a resource-owner `self` link, e.g.
/// `https://api.atlassian.com/ex/jira/{cloud_id}/rest/api/3/user?accountId=..`.
pub fn cloud_id_from_self(self_url: &str) -> Option<String> {
    let parsed = url::Url::parse(self_url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    let at = segments
        .windows(2)
        .position(|pair| pair == ["ex", "jira"])?;
    let cloud_id = segments.get(at + 2)?;
    (!cloud_id.is_empty()).then(|| cloud_id.to_string())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ErrorKind;
    use crate::session::MemorySessionStore;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;

    fn handler(server: &MockServer) -> OAuthHandler {
        OAuthHandler::new(
            "cid",
            "csecret",
            "https://app.example.com/callback",
            vec!["read:jira-work".into(), "offline_access".into()],
        )
        .expect("handler")
        .with_endpoints(OAuthEndpoints {
            authorize_url: server.url("/authorize"),
            token_url: server.url("/oauth/token"),
            api_url: server.base_url(),
        })
    }

    fn with_token(mut handler: OAuthHandler, cloud_id: Option<&str>) -> OAuthHandler {
        handler.set_auth_parameters(TokenSet {
            cloud_id: cloud_id.map(str::to_string),
            access_token: "at-1".into(),
            refresh_token: Some("rt-1".into()),
            expires: None,
        });
        handler
    }

    #[test]
    fn authorization_url_carries_consent_params() {
        let mut handler = OAuthHandler::new(
            "cid",
            "csecret",
            "https://app.example.com/callback",
            Vec::new(),
        )
        .expect("handler");

        let raw = handler.authorization_url("state-42").expect("url");
        let url = url::Url::parse(&raw).expect("valid url");
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert!(raw.starts_with(AUTHORIZE_URL));
        assert_eq!(pairs["audience"], "api.atlassian.com");
        assert_eq!(pairs["client_id"], "cid");
        assert_eq!(pairs["scope"], "read:jira-user read:jira-work");
        assert_eq!(pairs["redirect_uri"], "https://app.example.com/callback");
        assert_eq!(pairs["state"], "state-42");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["prompt"], "consent");
        assert_eq!(handler.state(), Some("state-42"));
    }

    #[test]
    fn exchange_code_resolves_cloud_id() {
        let server = MockServer::start();
        let token = server.mock(|when, then| {
            when.method(POST).path("/oauth/token").json_body(json!({
                "grant_type": "authorization_code",
                "client_id": "cid",
                "client_secret": "csecret",
                "code": "c0de",
                "redirect_uri": "https://app.example.com/callback",
            }));
            then.status(200).json_body(json!({
                "access_token": "at-1",
                "refresh_token": "rt-1",
                "expires_in": 3600,
                "scope": "read:jira-work offline_access",
                "token_type": "Bearer"
            }));
        });
        let sites = server.mock(|when, then| {
            when.method(GET)
                .path("/oauth/token/accessible-resources")
                .header("Authorization", "Bearer at-1");
            then.status(200).json_body(json!([
                {"id": "cloud-abc", "name": "acme", "url": "https://acme.atlassian.net", "scopes": []}
            ]));
        });
        let self_url = format!(
            "{}/ex/jira/cloud-abc/rest/api/3/user?accountId=557058",
            server.base_url()
        );
        let myself = server.mock(|when, then| {
            when.method(GET)
                .path("/ex/jira/cloud-abc/rest/api/3/myself")
                .header("Authorization", "Bearer at-1");
            then.status(200)
                .json_body(json!({"self": self_url, "accountId": "557058"}));
        });

        let mut handler = handler(&server);
        let before = now();
        let tokens = handler.exchange_code("c0de").expect("exchange");

        token.assert();
        sites.assert();
        myself.assert();
        assert_eq!(tokens.cloud_id.as_deref(), Some("cloud-abc"));
        assert_eq!(tokens.access_token, "at-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
        let expires = tokens.expires.expect("expiry");
        assert!(expires >= before + 3600 && expires <= now() + 3600);
        assert_eq!(handler.cloud_id(), Some("cloud-abc"));
    }

    #[test]
    fn rejected_code_maps_to_error_kind() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(403)
                .json_body(json!({"error": "invalid_grant"}));
        });

        let err = handler(&server)
            .exchange_code("stale")
            .expect_err("403 should fail");
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn refresh_keeps_cloud_id_and_rotates_tokens() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/oauth/token").json_body(json!({
                "grant_type": "refresh_token",
                "client_id": "cid",
                "client_secret": "csecret",
                "refresh_token": "rt-1",
            }));
            then.status(200).json_body(json!({
                "access_token": "at-2",
                "refresh_token": "rt-2",
                "expires_in": 3600
            }));
        });

        let mut handler = with_token(handler(&server), Some("cloud-abc"));
        let tokens = handler.refresh("rt-1").expect("refresh");

        mock.assert();
        assert_eq!(tokens.cloud_id.as_deref(), Some("cloud-abc"));
        assert_eq!(tokens.access_token, "at-2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-2"));
        assert_eq!(handler.token_set(), Some(&tokens));
    }

    #[test]
    fn refresh_failure_is_client_error_with_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(401).json_body(json!({"error": "unauthorized_client"}));
        });

        let err = handler(&server).refresh("rt-x").expect_err("401 should fail");
        assert!(matches!(
            err,
            JiraError::Client { status, ref body }
                if status == StatusCode::UNAUTHORIZED && body == "Cannot get a new access token"
        ));
    }

    #[test]
    fn refresh_if_expired_only_refreshes_stale_tokens() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200)
                .json_body(json!({"access_token": "at-new", "expires_in": 60}));
        });

        let mut handler = with_token(handler(&server), Some("cloud-abc"));
        assert!(!handler.refresh_if_expired().expect("fresh token"));
        mock.assert_hits(0);

        handler.set_auth_parameters(TokenSet {
            cloud_id: None,
            access_token: "at-old".into(),
            refresh_token: Some("rt-old".into()),
            expires: Some(now() - 10),
        });
        assert!(handler.refresh_if_expired().expect("stale token"));
        mock.assert_hits(1);
        assert_eq!(handler.auth_params().expect("params").access_token, "at-new");
        assert_eq!(handler.cloud_id(), Some("cloud-abc"));
    }

    #[test]
    fn me_requires_200() {
        let server = MockServer::start();
        let ok = server.mock(|when, then| {
            when.method(GET)
                .path("/me")
                .header("Authorization", "Bearer at-1");
            then.status(200)
                .json_body(json!({"account_id": "557058", "name": "Mia"}));
        });

        let handler = with_token(handler(&server), None);
        let me = handler.me().expect("me");
        assert_eq!(me["name"], "Mia");
        ok.assert();

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/me");
            then.status(204);
        });
        let handler = with_token(self::handler(&server), None);
        let err = handler.me().expect_err("204 is not a profile");
        assert_eq!(err.status(), Some(StatusCode::NO_CONTENT));
    }

    #[test]
    fn send_request_targets_cloud_scoped_v2() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/ex/jira/cloud-abc/rest/api/2/issue/PR-1")
                .query_param("fields", "summary")
                .header("Authorization", "Bearer at-1");
            then.status(200)
                .json_body(json!({"key": "PR-1", "fields": {"summary": "S"}}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/ex/jira/cloud-abc/rest/api/2/issue/PR-404");
            then.status(404).body("{\"errorMessages\":[\"Issue does not exist\"]}");
        });

        let handler = with_token(handler(&server), Some("cloud-abc"));
        let issue = handler
            .send_request(Method::GET, "issue/PR-1", Some(&json!({"fields": "summary"})))
            .expect("issue");
        assert_eq!(issue["key"], "PR-1");
        mock.assert();

        let err = handler
            .send_request::<()>(Method::GET, "issue/PR-404", None)
            .expect_err("404");
        assert!(matches!(err, JiraError::Client { ref body, .. } if body.contains("Issue does not exist")));
    }

    #[test]
    fn factories_build_cloud_scoped_bearer_clients() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/ex/jira/cloud-abc/rest/agile/1.0/board/7")
                .header("Authorization", "Bearer at-1");
            then.status(200).json_body(json!({"id": 7}));
        });

        let handler = with_token(handler(&server), Some("cloud-abc"));
        handler.board().expect("board request").get(7).expect("board");
        mock.assert();
        assert_eq!(handler.metrics().snapshot().api_requests, 1);
    }

    #[test]
    fn factories_need_a_token() {
        let server = MockServer::start();
        let err = handler(&server).field().expect_err("no token yet");
        assert!(matches!(err, JiraError::OAuth(_)));
    }

    #[test]
    fn session_round_trip_restores_tokens() {
        let server = MockServer::start();
        let store = MemorySessionStore::new();

        let source = with_token(handler(&server), Some("cloud-abc"));
        source.store_in_session(&store).expect("store");

        let mut restored = handler(&server);
        assert!(restored.restore_from_session(&store).expect("restore"));
        assert_eq!(restored.token_set(), source.token_set());

        let empty = handler(&server);
        empty.store_in_session(&store).expect("clear");
        let mut again = handler(&server);
        assert!(!again.restore_from_session(&store).expect("restore"));
    }

    #[test]
    fn set_auth_parameters_keeps_known_cloud_id() {
        let server = MockServer::start();
        let mut handler = with_token(handler(&server), Some("cloud-abc"));
        handler.set_auth_parameters(TokenSet {
            cloud_id: None,
            access_token: "at-2".into(),
            refresh_token: None,
            expires: Some(10),
        });
        assert_eq!(handler.cloud_id(), Some("cloud-abc"));
        assert!(handler.token_set().expect("token").is_expired(10));
    }

    #[test]
    fn from_config_loads_static_token() {
        let config: AppConfig = toml::from_str(
            r#"
host = "https://acme.atlassian.net"
default_auth = "oauth2"

[auth.oauth2]
access_token = "static-at"
cloud_id = "cloud-abc"
"#,
        )
        .expect("config");

        let handler = OAuthHandler::from_config(&config).expect("handler");
        assert_eq!(
            handler.auth_params().expect("params"),
            AuthParams {
                cloud_id: Some("cloud-abc".into()),
                access_token: "static-at".into(),
            }
        );
        assert_eq!(handler.host(), "https://api.atlassian.com/ex/jira");
        assert_eq!(handler.scopes(), ["read:jira-user", "read:jira-work"]);
    }

    #[test]
    fn parses_cloud_id_from_self_link() {
        assert_eq!(
            cloud_id_from_self(
                "https://api.atlassian.com/ex/jira/1324a887-45db-1bf4-1e99-ef0ff456d421/rest/api/3/user?accountId=5b10"
            )
            .as_deref(),
            Some("1324a887-45db-1bf4-1e99-ef0ff456d421")
        );
        assert_eq!(cloud_id_from_self("https://api.atlassian.com/me"), None);
        assert_eq!(cloud_id_from_self("not a url"), None);
    }

    #[test]
    fn cloud_id_needs_the_ex_jira_marker() {
        assert_eq!(
            cloud_id_from_self("https://acme.atlassian.net/rest/api/3/user?accountId=5b10"),
            None
        );
        assert_eq!(
            cloud_id_from_self("https://gw.example.com/atlassian/ex/jira/CLOUD/rest/api/3/user")
                .as_deref(),
            Some("CLOUD")
        );
        assert_eq!(cloud_id_from_self("https://api.atlassian.com/ex/jira/"), None);
    }

    fn mock_token_grant(server: &MockServer, access_token: &str) {
        let body = json!({"access_token": access_token, "refresh_token": "rt-9", "expires_in": 60});
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200).json_body(body);
        });
        server.mock(|when, then| {
            when.method(GET).path("/oauth/token/accessible-resources");
            then.status(200)
                .json_body(json!([{"id": "site-77", "name": "acme"}]));
        });
    }

    #[test]
    fn exchange_falls_back_to_site_id_for_site_self_links() {
        let server = MockServer::start();
        mock_token_grant(&server, "at-9");
        server.mock(|when, then| {
            when.method(GET).path("/ex/jira/site-77/rest/api/3/myself");
            then.status(200).json_body(json!({
                "self": "https://acme.atlassian.net/rest/api/3/user?accountId=5b10"
            }));
        });

        let mut handler = handler(&server);
        let tokens = handler.exchange_code("c0de").expect("exchange");
        assert_eq!(tokens.cloud_id.as_deref(), Some("site-77"));
        assert_eq!(handler.cloud_id(), Some("site-77"));
    }

    #[test]
    fn failed_owner_lookup_keeps_previous_token() {
        let server = MockServer::start();
        mock_token_grant(&server, "at-9");
        server.mock(|when, then| {
            when.method(GET).path("/ex/jira/site-77/rest/api/3/myself");
            then.status(500);
        });

        let mut handler = with_token(handler(&server), Some("cloud-abc"));
        let before = handler.token_set().cloned();
        let err = handler.exchange_code("c0de").expect_err("owner lookup fails");

        assert_eq!(err.kind(), ErrorKind::Client);
        assert_eq!(handler.token_set().cloned(), before);
        assert_eq!(handler.cloud_id(), Some("cloud-abc"));
    }

    #[test]
    fn oauth_failures_are_counted() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(401);
        });
        server.mock(|when, then| {
            when.method(GET).path("/me");
            then.status(500);
        });
        server.mock(|when, then| {
            when.method(GET).path("/oauth/token/accessible-resources");
            then.status(403);
        });

        let mut handler = with_token(handler(&server), Some("cloud-abc"));
        handler.refresh("rt-1").expect_err("401 refresh");
        handler.me().expect_err("500 me");
        handler.resource_owner().expect_err("403 resources");

        let snapshot = handler.metrics().snapshot();
        assert_eq!(snapshot.api_requests, 3);
        assert_eq!(snapshot.client_errors, 2);
        assert_eq!(snapshot.unauthorized, 1);
        assert_eq!(snapshot.transport_errors, 0);
    }

    #[test]
    fn send_request_requires_cloud_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.path_contains("field");
            then.status(200).json_body(json!({}));
        });

        let handler = with_token(handler(&server), None);
        let err = handler
            .send_request::<()>(Method::GET, "field", None)
            .expect_err("no cloud id");
        assert!(matches!(err, JiraError::OAuth(_)));
        mock.assert_hits(0);
    }

    #[test]
    fn send_request_puts_delete_params_in_query() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::DELETE)
                .path("/ex/jira/cloud-abc/rest/api/2/issue/PR-1")
                .query_param("deleteSubtasks", "true");
            then.status(200).json_body(json!({}));
        });

        let handler = with_token(handler(&server), Some("cloud-abc"));
        handler
            .send_request(
                Method::DELETE,
                "issue/PR-1",
                Some(&json!({"deleteSubtasks": "true"})),
            )
            .expect("delete");
        mock.assert();
    }
}

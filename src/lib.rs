//! `jira_rest` is a blocking client for the Jira Cloud REST and Agile APIs.
//! It covers basic, API-token, and OAuth2 (3LO) authentication.

/// Credential strategies and the `Authorization` header they produce.
pub mod auth;
/// HTTP transport, URL building, and error classification.
pub mod client;
/// Runtime configuration loading and validation.
pub mod config;
/// Tracing subscriber setup.
pub mod logging;
/// Runtime metrics counters.
pub mod metrics;
/// OAuth2 authorization-code flow and token handling.
pub mod oauth;
/// Per-resource request types.
pub mod requests;
/// Session storage for OAuth tokens.
pub mod session;

pub use auth::{AuthStrategy, Credentials};
pub use client::{Api, ErrorKind, JiraClient, JiraError};
pub use oauth::{AuthParams, OAuthHandler, TokenSet};

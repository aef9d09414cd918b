use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::RequestBuilder;
use reqwest::header::AUTHORIZATION;

/// Credentials attached to every outgoing request as an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    ApiToken { username: String, token: String },
    OAuth2 { access_token: String },
    None,
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn api_token(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self::ApiToken {
            username: username.into(),
            token: token.into(),
        }
    }

    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self::OAuth2 {
            access_token: access_token.into(),
        }
    }

    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Self::Basic { username, password } => Some(basic_header(username, password)),
            Self::ApiToken { username, token } => Some(basic_header(username, token)),
            Self::OAuth2 { access_token } => Some(format!("Bearer {access_token}")),
            Self::None => None,
        }
    }

    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.authorization_header() {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        }
    }

    pub fn strategy(&self) -> Option<AuthStrategy> {
        match self {
            Self::Basic { .. } => Some(AuthStrategy::Basic),
            Self::ApiToken { .. } => Some(AuthStrategy::BasicToken),
            Self::OAuth2 { .. } => Some(AuthStrategy::OAuth2),
            Self::None => None,
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::ApiToken { username, .. } => f
                .debug_struct("ApiToken")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::OAuth2 { .. } => f.debug_struct("OAuth2").finish_non_exhaustive(),
            Self::None => f.write_str("None"),
        }
    }
}

fn basic_header(username: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{secret}")))
}

/// Which credential set from the config drives the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    Basic,
    BasicToken,
    OAuth2,
}

impl AuthStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::BasicToken => "basic_token",
            Self::OAuth2 => "oauth2",
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown authentication strategy '{0}', expected basic, basic_token or oauth2")]
pub struct UnknownStrategy(pub String);

impl FromStr for AuthStrategy {
    type Err = UnknownStrategy;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "basic_token" | "token" => Ok(Self::BasicToken),
            "oauth2" | "oauth" => Ok(Self::OAuth2),
            _ => Err(UnknownStrategy(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_header_encodes_username_and_password() {
        let creds = Credentials::basic("admin", "secret");
        assert_eq!(
            creds.authorization_header().as_deref(),
            Some("Basic YWRtaW46c2VjcmV0")
        );
    }

    #[test]
    fn api_token_uses_basic_scheme() {
        let creds = Credentials::api_token("you@example.com", "tok");
        let expected = format!("Basic {}", STANDARD.encode("you@example.com:tok"));
        assert_eq!(creds.authorization_header(), Some(expected));
    }

    #[test]
    fn oauth2_uses_bearer_scheme() {
        let creds = Credentials::bearer("abc123");
        assert_eq!(
            creds.authorization_header().as_deref(),
            Some("Bearer abc123")
        );
        assert_eq!(Credentials::None.authorization_header(), None);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", Credentials::basic("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));

        let rendered = format!("{:?}", Credentials::bearer("top-secret"));
        assert!(!rendered.contains("top-secret"));
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("basic".parse::<AuthStrategy>().ok(), Some(AuthStrategy::Basic));
        assert_eq!(
            "basic_token".parse::<AuthStrategy>().ok(),
            Some(AuthStrategy::BasicToken)
        );
        assert_eq!(" OAuth2 ".parse::<AuthStrategy>().ok(), Some(AuthStrategy::OAuth2));
        assert!("kerberos".parse::<AuthStrategy>().is_err());
    }
}

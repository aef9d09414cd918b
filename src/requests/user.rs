use reqwest::blocking::Response;
use reqwest::Method;
use serde::Serialize;

use crate::client::{Api, JiraClient, JiraError};

#[derive(Debug, Clone)]
pub struct UserRequest {
    client: JiraClient,
}

impl UserRequest {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    /// A single user, typically selected by `accountId`. Not available anonymously.
    pub fn get<P: Serialize + ?Sized>(&self, params: &P) -> Result<Response, JiraError> {
        self.client
            .execute(Method::GET, Api::Platform, "user", Some(params))
    }

    /// Users matching a query string on display name or email.
    pub fn search<P: Serialize + ?Sized>(&self, params: &P) -> Result<Response, JiraError> {
        self.client
            .execute(Method::GET, Api::Platform, "user/search", Some(params))
    }

    /// Every user, including inactive and app users.
    pub fn search_all<P: Serialize + ?Sized>(&self, params: &P) -> Result<Response, JiraError> {
        self.client
            .execute(Method::GET, Api::Platform, "users/search", Some(params))
    }
}

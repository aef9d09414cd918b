use reqwest::blocking::Response;
use reqwest::Method;

use crate::client::{Api, JiraClient, JiraError};

#[derive(Debug, Clone)]
pub struct FieldRequest {
    client: JiraClient,
}

impl FieldRequest {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    /// System and custom issue fields.
    pub fn get(&self) -> Result<Response, JiraError> {
        self.client.execute_bare(Method::GET, Api::Platform, "field")
    }
}

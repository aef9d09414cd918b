use reqwest::blocking::Response;
use reqwest::Method;

use crate::client::{Api, JiraClient, JiraError};

#[derive(Debug, Clone)]
pub struct ServerInfoRequest {
    client: JiraClient,
}

impl ServerInfoRequest {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    pub fn get(&self) -> Result<Response, JiraError> {
        self.client
            .execute_bare(Method::GET, Api::Platform, "serverInfo")
    }
}

use reqwest::blocking::Response;
use reqwest::Method;

use crate::client::{Api, JiraClient, JiraError};

/// Workflow lookups. These live on the v3 platform API.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    client: JiraClient,
}

impl WorkflowRequest {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    /// Every status associated with an active workflow.
    pub fn all_statuses(&self) -> Result<Response, JiraError> {
        self.client
            .execute_bare(Method::GET, Api::PlatformV3, "status")
    }
}

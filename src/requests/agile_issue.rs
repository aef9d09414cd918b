use std::fmt::Display;

use reqwest::blocking::Response;
use reqwest::Method;
use serde::Serialize;
use serde_json::json;

use crate::client::{Api, JiraClient, JiraError};

/// Issue endpoints of the Agile API (ranking and estimation).
#[derive(Debug, Clone)]
pub struct AgileIssueRequest {
    client: JiraClient,
}

impl AgileIssueRequest {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    /// Moves issues before or after a given issue. At most 50 at once.
    pub fn rank<P: Serialize + ?Sized>(&self, params: &P) -> Result<Response, JiraError> {
        self.client
            .execute(Method::PUT, Api::Agile, "issue/rank", Some(params))
    }

    /// Includes Agile fields such as sprint, closedSprints, flagged and epic.
    pub fn get<P: Serialize + ?Sized>(
        &self,
        issue_id_or_key: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.client.execute(
            Method::GET,
            Api::Agile,
            &format!("issue/{issue_id_or_key}"),
            Some(params),
        )
    }

    pub fn estimation(
        &self,
        issue_id_or_key: impl Display,
        board_id: impl Display,
    ) -> Result<Response, JiraError> {
        self.client.execute(
            Method::GET,
            Api::Agile,
            &format!("issue/{issue_id_or_key}/estimation"),
            Some(&[("boardId", board_id.to_string())]),
        )
    }

    /// The board id rides in the query string; the body carries only the value.
    pub fn update_estimation<V: Serialize>(
        &self,
        issue_id_or_key: impl Display,
        board_id: impl Display,
        value: V,
    ) -> Result<Response, JiraError> {
        self.client.execute(
            Method::PUT,
            Api::Agile,
            &format!("issue/{issue_id_or_key}/estimation?boardId={board_id}"),
            Some(&json!({ "value": value })),
        )
    }
}

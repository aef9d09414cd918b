use std::fmt::Display;

use reqwest::blocking::Response;
use reqwest::Method;
use serde::Serialize;
use serde_json::json;

use crate::client::{Api, JiraClient, JiraError};

/// Agile epic endpoints. Epics are addressed by id or key.
#[derive(Debug, Clone)]
pub struct EpicRequest {
    client: JiraClient,
}

impl EpicRequest {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    pub fn issues_without_epic<P: Serialize + ?Sized>(
        &self,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.issues("none", params)
    }

    /// Detaches the given issues from whatever epic they belong to.
    pub fn remove_issues_from_epic<S: AsRef<str>>(
        &self,
        issues: &[S],
    ) -> Result<Response, JiraError> {
        self.move_issues("none", issues)
    }

    pub fn get(&self, epic_id_or_key: impl Display) -> Result<Response, JiraError> {
        self.client
            .execute_bare(Method::GET, Api::Agile, &format!("epic/{epic_id_or_key}"))
    }

    pub fn partial_update<P: Serialize + ?Sized>(
        &self,
        epic_id_or_key: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.client.execute(
            Method::POST,
            Api::Agile,
            &format!("epic/{epic_id_or_key}"),
            Some(params),
        )
    }

    pub fn issues<P: Serialize + ?Sized>(
        &self,
        epic_id_or_key: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.client.execute(
            Method::GET,
            Api::Agile,
            &format!("epic/{epic_id_or_key}/issue"),
            Some(params),
        )
    }

    pub fn move_issues<S: AsRef<str>>(
        &self,
        epic_id_or_key: impl Display,
        issues: &[S],
    ) -> Result<Response, JiraError> {
        let issues: Vec<&str> = issues.iter().map(AsRef::as_ref).collect();
        self.client.execute(
            Method::POST,
            Api::Agile,
            &format!("epic/{epic_id_or_key}/issue"),
            Some(&json!({ "issues": issues })),
        )
    }

    pub fn rank<P: Serialize + ?Sized>(
        &self,
        epic_id_or_key: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.client.execute(
            Method::PUT,
            Api::Agile,
            &format!("epic/{epic_id_or_key}/rank"),
            Some(params),
        )
    }
}

use std::fmt::Display;

use reqwest::blocking::Response;
use reqwest::Method;
use serde::Serialize;

use crate::client::{Api, JiraClient, JiraError};

/// Agile board endpoints under `/rest/agile/1.0/board`.
#[derive(Debug, Clone)]
pub struct BoardRequest {
    client: JiraClient,
}

impl BoardRequest {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    fn call<P: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        params: Option<&P>,
    ) -> Result<Response, JiraError> {
        self.client.execute(method, Api::Agile, path, params)
    }

    fn get_path(&self, path: &str) -> Result<Response, JiraError> {
        self.client.execute_bare(Method::GET, Api::Agile, path)
    }

    /// Boards the current user may view.
    pub fn all<P: Serialize + ?Sized>(&self, params: &P) -> Result<Response, JiraError> {
        self.call(Method::GET, "board", Some(params))
    }

    /// Name, type and filter id are required by Jira.
    pub fn create<P: Serialize + ?Sized>(&self, params: &P) -> Result<Response, JiraError> {
        self.call(Method::POST, "board", Some(params))
    }

    /// Boards that use the given filter.
    pub fn get_by_filter_id(&self, filter_id: impl Display) -> Result<Response, JiraError> {
        self.get_path(&format!("board/filter/{filter_id}"))
    }

    pub fn get(&self, board_id: impl Display) -> Result<Response, JiraError> {
        self.get_path(&format!("board/{board_id}"))
    }

    pub fn delete(&self, board_id: impl Display) -> Result<Response, JiraError> {
        self.client
            .execute_bare(Method::DELETE, Api::Agile, &format!("board/{board_id}"))
    }

    /// Incomplete issues not assigned to any future or active sprint, ordered by rank.
    pub fn issues_for_backlog<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::GET, &format!("board/{board_id}/backlog"), Some(params))
    }

    pub fn configuration(&self, board_id: impl Display) -> Result<Response, JiraError> {
        self.get_path(&format!("board/{board_id}/configuration"))
    }

    pub fn epics<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::GET, &format!("board/{board_id}/epic"), Some(params))
    }

    pub fn issues_without_epic<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.issues_for_epic(board_id, "none", params)
    }

    pub fn issues_for_epic<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        epic_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(
            Method::GET,
            &format!("board/{board_id}/epic/{epic_id}/issue"),
            Some(params),
        )
    }

    pub fn features(&self, board_id: impl Display) -> Result<Response, JiraError> {
        self.get_path(&format!("board/{board_id}/features"))
    }

    pub fn toggle_features<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::PUT, &format!("board/{board_id}/features"), Some(params))
    }

    /// Issues whose status maps to one of the board's columns.
    pub fn issues<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::GET, &format!("board/{board_id}/issue"), Some(params))
    }

    /// Moves at most 50 issues from the backlog onto the board.
    pub fn move_issues_to_board<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::POST, &format!("board/{board_id}/issue"), Some(params))
    }

    pub fn projects<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::GET, &format!("board/{board_id}/project"), Some(params))
    }

    /// Projects statically associated with the board.
    pub fn projects_full(&self, board_id: impl Display) -> Result<Response, JiraError> {
        self.get_path(&format!("board/{board_id}/project/full"))
    }

    pub fn properties(&self, board_id: impl Display) -> Result<Response, JiraError> {
        self.get_path(&format!("board/{board_id}/properties"))
    }

    pub fn property(
        &self,
        board_id: impl Display,
        property_key: impl Display,
    ) -> Result<Response, JiraError> {
        self.get_path(&format!("board/{board_id}/properties/{property_key}"))
    }

    /// Stores `value` verbatim as the JSON body of the property.
    pub fn set_property<V: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        property_key: impl Display,
        value: &V,
    ) -> Result<Response, JiraError> {
        self.call(
            Method::PUT,
            &format!("board/{board_id}/properties/{property_key}"),
            Some(value),
        )
    }

    pub fn delete_property(
        &self,
        board_id: impl Display,
        property_key: impl Display,
    ) -> Result<Response, JiraError> {
        self.client.execute_bare(
            Method::DELETE,
            Api::Agile,
            &format!("board/{board_id}/properties/{property_key}"),
        )
    }

    pub fn quick_filters<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(
            Method::GET,
            &format!("board/{board_id}/quickfilter"),
            Some(params),
        )
    }

    pub fn quick_filter(
        &self,
        board_id: impl Display,
        quick_filter_id: impl Display,
    ) -> Result<Response, JiraError> {
        self.get_path(&format!("board/{board_id}/quickfilter/{quick_filter_id}"))
    }

    pub fn reports(&self, board_id: impl Display) -> Result<Response, JiraError> {
        self.get_path(&format!("board/{board_id}/reports"))
    }

    pub fn sprints<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::GET, &format!("board/{board_id}/sprint"), Some(params))
    }

    pub fn issues_for_sprint<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        sprint_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(
            Method::GET,
            &format!("board/{board_id}/sprint/{sprint_id}/issue"),
            Some(params),
        )
    }

    pub fn versions<P: Serialize + ?Sized>(
        &self,
        board_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::GET, &format!("board/{board_id}/version"), Some(params))
    }
}

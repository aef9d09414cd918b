use std::collections::BTreeMap;
use std::fmt::Display;

use reqwest::blocking::Response;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::client::{Api, JiraClient, JiraError};

/// Generic CRUD over any platform resource, e.g. `project`, `filter`, `group`.
///
/// The resource name is the first path segment; identifiers follow it.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    client: JiraClient,
}

/// Body and `expand` selector for [`ResourceRequest::update_with`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateParameters {
    /// Comma separated, e.g. `description,lead,issueTypes`.
    pub expand: Option<String>,
    pub body: Value,
}

impl UpdateParameters {
    fn path_suffix(&self) -> String {
        match self.expand.as_deref().filter(|expand| !expand.is_empty()) {
            Some(expand) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("expand", expand)
                    .finish();
                format!("?{query}")
            }
            None => String::new(),
        }
    }
}

/// Crop window applied to an uploaded avatar image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvatarCrop {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// Role actors keyed by actor type (`atlassian-user-role-actor`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActorsParameters {
    pub categorised_actors: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl ResourceRequest {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    fn call<P: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        params: Option<&P>,
    ) -> Result<Response, JiraError> {
        self.client.execute(method, Api::Platform, path, params)
    }

    /// Prefer [`search`](Self::search); Jira deprecated most unpaginated listings.
    pub fn all<P: Serialize + ?Sized>(
        &self,
        resource: &str,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::GET, resource, Some(params))
    }

    pub fn create<P: Serialize + ?Sized>(
        &self,
        resource: &str,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::POST, resource, Some(params))
    }

    pub fn search<P: Serialize + ?Sized>(
        &self,
        resource: &str,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::GET, &format!("{resource}/search"), Some(params))
    }

    pub fn get<P: Serialize + ?Sized>(
        &self,
        resource: &str,
        id_or_key: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::GET, &format!("{resource}/{id_or_key}"), Some(params))
    }

    pub fn update<P: Serialize + ?Sized>(
        &self,
        resource: &str,
        id_or_key: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(Method::PUT, &format!("{resource}/{id_or_key}"), Some(params))
    }

    pub fn update_with(
        &self,
        resource: &str,
        id_or_key: impl Display,
        params: &UpdateParameters,
    ) -> Result<Response, JiraError> {
        let path = format!("{resource}/{id_or_key}{}", params.path_suffix());
        self.call(Method::PUT, &path, Some(&params.body))
    }

    pub fn delete(&self, resource: &str, id_or_key: impl Display) -> Result<Response, JiraError> {
        self.client.execute_bare(
            Method::DELETE,
            Api::Platform,
            &format!("{resource}/{id_or_key}"),
        )
    }

    /// Issue types with their valid statuses. Only projects expose this.
    pub fn statuses(&self, project_id_or_key: impl Display) -> Result<Response, JiraError> {
        self.client.execute_bare(
            Method::GET,
            Api::Platform,
            &format!("project/{project_id_or_key}/statuses"),
        )
    }

    pub fn update_type(
        &self,
        resource: &str,
        id_or_key: impl Display,
        new_type_key: impl Display,
    ) -> Result<Response, JiraError> {
        self.client.execute_bare(
            Method::PUT,
            Api::Platform,
            &format!("{resource}/{id_or_key}/type/{new_type_key}"),
        )
    }

    pub fn notification_scheme<P: Serialize + ?Sized>(
        &self,
        resource: &str,
        id_or_key: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(
            Method::GET,
            &format!("{resource}/{id_or_key}/notificationscheme"),
            Some(params),
        )
    }

    /// Replaces the actors of a project role.
    pub fn set_actors(
        &self,
        resource: &str,
        id_or_key: impl Display,
        role_id: impl Display,
        params: &SetActorsParameters,
    ) -> Result<Response, JiraError> {
        self.call(
            Method::PUT,
            &format!("{resource}/{id_or_key}/role/{role_id}"),
            Some(params),
        )
    }

    pub fn avatars(&self, resource: &str, id_or_key: impl Display) -> Result<Response, JiraError> {
        self.client.execute_bare(
            Method::GET,
            Api::Platform,
            &format!("{resource}/{id_or_key}/avatars"),
        )
    }

    /// Selects one of the already uploaded avatars, e.g. `{"id": "10010"}`.
    pub fn update_avatar<P: Serialize + ?Sized>(
        &self,
        resource: &str,
        id_or_key: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.call(
            Method::PUT,
            &format!("{resource}/{id_or_key}/avatar"),
            Some(params),
        )
    }

    pub fn delete_avatar(
        &self,
        resource: &str,
        id_or_key: impl Display,
        avatar_id: impl Display,
    ) -> Result<Response, JiraError> {
        self.client.execute_bare(
            Method::DELETE,
            Api::Platform,
            &format!("{resource}/{id_or_key}/avatar/{avatar_id}"),
        )
    }

    /// Uploads an image and crops it to a square of `size` pixels at (`x`, `y`).
    pub fn create_avatar(
        &self,
        resource: &str,
        id_or_key: impl Display,
        crop: &AvatarCrop,
        image: Vec<u8>,
        content_type: &str,
    ) -> Result<Response, JiraError> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("x", &crop.x.to_string())
            .append_pair("y", &crop.y.to_string())
            .append_pair("size", &crop.size.to_string())
            .finish();
        self.client.execute_bytes(
            Method::POST,
            Api::Platform,
            &format!("{resource}/{id_or_key}/avatar2?{query}"),
            image,
            content_type,
        )
    }
}

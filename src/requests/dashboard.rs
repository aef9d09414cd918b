use std::fmt::Display;

use reqwest::blocking::Response;
use reqwest::Method;
use serde::Serialize;

use crate::client::{Api, JiraClient, JiraError};

#[derive(Debug, Clone)]
pub struct DashboardRequest {
    client: JiraClient,
}

impl DashboardRequest {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }

    pub fn all<P: Serialize + ?Sized>(&self, params: &P) -> Result<Response, JiraError> {
        self.client
            .execute(Method::GET, Api::Platform, "dashboard", Some(params))
    }

    pub fn create<P: Serialize + ?Sized>(&self, params: &P) -> Result<Response, JiraError> {
        self.client
            .execute(Method::POST, Api::Platform, "dashboard", Some(params))
    }

    pub fn search<P: Serialize + ?Sized>(&self, params: &P) -> Result<Response, JiraError> {
        self.client
            .execute(Method::GET, Api::Platform, "dashboard/search", Some(params))
    }

    pub fn get<P: Serialize + ?Sized>(
        &self,
        dashboard_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.client.execute(
            Method::GET,
            Api::Platform,
            &format!("dashboard/{dashboard_id}"),
            Some(params),
        )
    }

    pub fn update<P: Serialize + ?Sized>(
        &self,
        dashboard_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.client.execute(
            Method::PUT,
            Api::Platform,
            &format!("dashboard/{dashboard_id}"),
            Some(params),
        )
    }

    pub fn delete(&self, dashboard_id: impl Display) -> Result<Response, JiraError> {
        self.client.execute_bare(
            Method::DELETE,
            Api::Platform,
            &format!("dashboard/{dashboard_id}"),
        )
    }

    /// Statuses are a project concept, so this reads from `project/{id}/statuses`.
    pub fn statuses(&self, project_id_or_key: impl Display) -> Result<Response, JiraError> {
        self.client.execute_bare(
            Method::GET,
            Api::Platform,
            &format!("project/{project_id_or_key}/statuses"),
        )
    }

    pub fn update_type(
        &self,
        dashboard_id: impl Display,
        new_type_key: impl Display,
    ) -> Result<Response, JiraError> {
        self.client.execute_bare(
            Method::PUT,
            Api::Platform,
            &format!("dashboard/{dashboard_id}/type/{new_type_key}"),
        )
    }

    pub fn notification_scheme<P: Serialize + ?Sized>(
        &self,
        dashboard_id: impl Display,
        params: &P,
    ) -> Result<Response, JiraError> {
        self.client.execute(
            Method::GET,
            Api::Platform,
            &format!("dashboard/{dashboard_id}/notificationscheme"),
            Some(params),
        )
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{DELETE, GET, PUT};
    use httpmock::MockServer;
    use serde_json::json;

    use crate::client::ErrorKind;
    use crate::requests::test_support::client;

    #[test]
    fn search_uses_platform_v2() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/api/2/dashboard/search")
                .query_param("dashboardName", "ops");
            then.status(200).json_body(json!({"values": []}));
        });

        client(&server)
            .dashboard()
            .search(&json!({"dashboardName": "ops"}))
            .expect("search");
        mock.assert();
    }

    #[test]
    fn update_and_delete_address_single_dashboard() {
        let server = MockServer::start();
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/rest/api/2/dashboard/10100")
                .json_body(json!({"name": "Renamed"}));
            then.status(200).json_body(json!({"id": "10100"}));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/rest/api/2/dashboard/10100");
            then.status(204);
        });

        let dashboards = client(&server).dashboard();
        dashboards
            .update(10100, &json!({"name": "Renamed"}))
            .expect("update");
        dashboards.delete(10100).expect("delete");
        update.assert();
        delete.assert();
    }

    #[test]
    fn forbidden_dashboard_is_unauthorized() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/dashboard/1");
            then.status(403);
        });

        let err = client(&server)
            .dashboard()
            .get(1, &json!({}))
            .expect_err("403");
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn dashboard_routes_match_the_platform_api() {
        use httpmock::Method::{GET, POST, PUT};

        use crate::requests::test_support::{assert_routes, Route};
        use crate::requests::DashboardRequest;

        let server = MockServer::start();
        let dashboards = client(&server).dashboard();
        let routes: Vec<Route<DashboardRequest>> = vec![
            Route::new(GET, "/rest/api/2/dashboard", |d: &DashboardRequest| {
                d.all(&json!({"filter": "favourite"}))
            })
            .query("filter", "favourite"),
            Route::new(POST, "/rest/api/2/dashboard", |d: &DashboardRequest| {
                d.create(&json!({"name": "Ops", "sharePermissions": []}))
            })
            .body(json!({"name": "Ops", "sharePermissions": []})),
            Route::new(GET, "/rest/api/2/dashboard/10100", |d: &DashboardRequest| {
                d.get(10100, &json!({"expand": "owner"}))
            })
            .query("expand", "owner"),
            Route::new(GET, "/rest/api/2/project/PR/statuses", |d: &DashboardRequest| {
                d.statuses("PR")
            }),
            Route::new(PUT, "/rest/api/2/dashboard/10100/type/business", |d: &DashboardRequest| {
                d.update_type(10100, "business")
            }),
            Route::new(
                GET,
                "/rest/api/2/dashboard/10100/notificationscheme",
                |d: &DashboardRequest| d.notification_scheme(10100, &json!({"expand": "all"})),
            )
            .query("expand", "all"),
        ];

        assert_routes(&server, &dashboards, routes);
    }
}

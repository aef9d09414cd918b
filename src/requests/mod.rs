//! One request type per Jira resource group. Every method formats a path and
//! hands it to [`JiraClient::execute`](crate::client::JiraClient::execute),
//! returning the raw response.

mod agile_issue;
mod board;
mod dashboard;
mod epic;
mod field;
mod resource;
mod server_info;
mod user;
mod workflow;

pub use agile_issue::AgileIssueRequest;
pub use board::BoardRequest;
pub use dashboard::DashboardRequest;
pub use epic::EpicRequest;
pub use field::FieldRequest;
pub use resource::{AvatarCrop, ResourceRequest, SetActorsParameters, UpdateParameters};
pub use server_info::ServerInfoRequest;
pub use user::UserRequest;
pub use workflow::WorkflowRequest;

pub mod http;

use std::future::Future;

use thiserror::Error;

use crate::domain::{EmployeeFields, EmployeeId, EmployeeRecord, ServerPage, ServerPageKey};

pub use self::http::{HttpEmployeeApi, HttpOptions};

/// Failures surfaced by the directory transport.
///
/// Errors are `Clone` so a single failed in-flight fetch can be delivered to
/// every caller waiting on it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("server error {status}{}", message_suffix(.message))]
    Server { status: u16, message: Option<String> },
}

fn message_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.trim().is_empty() => format!(": {m}"),
        _ => String::new(),
    }
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: Option<String>) -> Self {
        Self::Server { status, message }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// REST surface of the employee directory.
///
/// The reconciler only talks to the backend through this trait, which keeps
/// the HTTP client swappable in tests.
pub trait EmployeeApi: Send + Sync + 'static {
    /// `GET /employees/page/{page}/sort/{field}/{order}/filters/{filter}`
    fn fetch_page(&self, key: ServerPageKey) -> impl Future<Output = ApiResult<ServerPage>> + Send;

    /// `POST /employees`
    fn create(&self, fields: EmployeeFields) -> impl Future<Output = ApiResult<EmployeeRecord>> + Send;

    /// `PUT /employees/{id}`
    fn update(&self, record: EmployeeRecord) -> impl Future<Output = ApiResult<EmployeeRecord>> + Send;

    /// `DELETE /employees/{id}`
    fn delete(&self, id: EmployeeId) -> impl Future<Output = ApiResult<()>> + Send;
}

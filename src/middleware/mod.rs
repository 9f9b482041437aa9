pub mod auth;
pub mod response;

pub use auth::{csrf_middleware, session_middleware};
pub use response::{ApiResponse, ApiResult};

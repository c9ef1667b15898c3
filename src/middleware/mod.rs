pub mod auth;
pub mod context;
pub mod response;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use context::{request_context_middleware, RequestContext};
pub use response::{ApiResponse, ApiResult};

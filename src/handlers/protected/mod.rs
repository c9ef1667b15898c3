// Protected handlers. Every route here runs behind
// jwt_auth_middleware -> request_context_middleware -> rate_limit_middleware
// and receives the resolved actor as `Extension<RequestContext>`.
pub mod appointments;
pub mod monitoring;
pub mod portal;

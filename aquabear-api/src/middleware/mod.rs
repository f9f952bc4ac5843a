pub mod auth;
pub mod rate_limit;
pub mod trace;

pub use auth::staff_gate;
pub use rate_limit::rate_limit_middleware;
pub use trace::request_span;

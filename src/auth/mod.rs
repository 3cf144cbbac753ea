pub mod middleware;
pub mod password;
pub mod permissions;
pub mod session;

pub use middleware::RequireAuth;
pub use session::SESSION_COOKIE;

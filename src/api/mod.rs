//! Shared API response and pagination types.

pub mod pagination;
pub mod response;

pub use pagination::PaginationParams;
pub use response::{Created, MessageResponse};

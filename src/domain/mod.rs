//! Domain models: database rows and request/response DTOs.

pub mod activity;
pub mod documents;
pub mod entities;
pub mod extraction;
pub mod land_budget;
pub mod pricing;
pub mod users;

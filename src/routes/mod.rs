pub mod activity_log;
pub mod approvals;
pub mod auth;
pub mod companies;
pub mod custom_fields;
pub mod documents;
pub mod health;
pub mod invitations;
pub mod invoices;
pub mod land_budget;
pub mod lot_subgroups;
pub mod lots;
pub mod permits;
pub mod precincts;
pub mod preferences;
pub mod pricing;
pub mod projects;
pub mod roles;
pub mod stages;
pub mod user_access;
pub mod users;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/user/theme", get(auth::get_theme).put(auth::update_theme))
        // Users and access control
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", put(users::update_user))
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route("/roles/:id", put(roles::update_role).delete(roles::delete_role))
        .route(
            "/user-access",
            get(user_access::list_access).post(user_access::grant_access),
        )
        .route("/user-access/:id", delete(user_access::revoke_access))
        .route(
            "/invitations",
            get(invitations::list_invitations).post(invitations::create_invitation),
        )
        .route("/invitations/:id", delete(invitations::delete_invitation))
        .route("/activity-log", get(activity_log::list_activity))
        // Per-entity preferences and custom fields
        .route(
            "/preferences",
            get(preferences::get_preferences).post(preferences::save_preference),
        )
        .route(
            "/custom-fields",
            get(custom_fields::list_custom_fields).post(custom_fields::create_custom_field),
        )
        .route("/custom-fields/:id", delete(custom_fields::delete_custom_field))
        // Development hierarchy
        .route(
            "/companies",
            get(companies::list_companies).post(companies::create_company),
        )
        .route(
            "/companies/:id",
            put(companies::update_company).delete(companies::delete_company),
        )
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/:id",
            put(projects::update_project).delete(projects::delete_project),
        )
        .route(
            "/precincts",
            get(precincts::list_precincts).post(precincts::create_precinct),
        )
        .route(
            "/precincts/:id",
            put(precincts::update_precinct).delete(precincts::delete_precinct),
        )
        .route("/stages", get(stages::list_stages).post(stages::create_stage))
        .route(
            "/stages/:id",
            put(stages::update_stage).delete(stages::delete_stage),
        )
        .route("/lots", get(lots::list_lots).post(lots::create_lot))
        .route(
            "/lots/:id",
            get(lots::get_lot)
                .put(lots::update_lot)
                .patch(lots::update_lot)
                .delete(lots::delete_lot),
        )
        .route(
            "/lot-subgroups",
            get(lot_subgroups::list_subgroups).post(lot_subgroups::create_subgroup),
        )
        .route(
            "/lot-subgroups/:id",
            put(lot_subgroups::update_subgroup).delete(lot_subgroups::delete_subgroup),
        )
        .route("/permits", get(permits::list_permits).post(permits::create_permit))
        .route(
            "/permits/:id",
            put(permits::update_permit).delete(permits::delete_permit),
        )
        .route(
            "/approvals",
            get(approvals::list_approvals).post(approvals::create_approval),
        )
        .route(
            "/approvals/:id",
            put(approvals::update_approval).delete(approvals::delete_approval),
        )
        .route(
            "/invoices",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route(
            "/invoices/:id",
            put(invoices::update_invoice).delete(invoices::delete_invoice),
        )
        // Land budget and product pricing
        .route(
            "/land-budget",
            get(land_budget::get_land_budget)
                .post(land_budget::upsert_precinct_item)
                .put(land_budget::save_stage_items),
        )
        .route("/land-budget/:id", delete(land_budget::delete_item))
        .route("/pricing", get(pricing::list_pricing).post(pricing::save_pricing))
        .route("/pricing/:id", delete(pricing::delete_product))
        // Documents and AI analysis
        .route(
            "/documents",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route("/documents/:id", delete(documents::delete_document))
        .route("/documents/:id/extract", post(documents::extract_document))
        .route("/documents/:id/verify", post(documents::verify_document))
        .route(
            "/documents/:id/cross-reference",
            post(documents::cross_reference_document),
        )
        .route("/documents/:id/analyze-pos", post(documents::analyze_pos))
        .route("/documents/ocr-region", post(documents::ocr_region))
}

//! # tc-api
//!
//! The HTTP read layer over the archive.

pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures the routes for the archive API.
///
/// The static front end under `/app` is mounted by the binary, since its
/// directory is deployment configuration.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index)).service(
        web::scope("/api")
            .route("/deleted", web::get().to(handlers::deleted_posts))
            .route("/post", web::get().to(handlers::get_post))
            .route("/database_check", web::get().to(handlers::database_check)),
    );
}

//! trashcan/crates/tc-api/src/middleware.rs Middleware
//!
//! Access logging and CORS for the read API.

use actix_cors::Cors;
use actix_web::middleware::Logger;

/// Returns the access logger for the API.
pub fn standard_middleware() -> Logger {
    // remote-ip "request-line" status-code response-size "referrer" "user-agent"
    Logger::default()
}

// The archive is read-only, so any origin may read it.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET"])
        .max_age(3600)
}

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod matching;
pub mod notify;
pub mod shutdown;

use actix_web::web::ServiceConfig;

/// Registers every HTTP route of the service
pub fn routes(config: &mut ServiceConfig) {
    config
        .configure(api::health::health_config)
        .configure(api::booking::handlers::booking_config);
}

pub mod dto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod query;
pub mod service;

// Re-export commonly used types
pub use error::ServiceError;
pub use service::BookingService;

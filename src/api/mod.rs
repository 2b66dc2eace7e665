pub mod booking;
pub mod caller;
pub mod health;
pub mod validation;

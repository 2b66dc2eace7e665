pub mod connection;
pub mod job_repository;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod store;

pub use job_repository::JobRepository;
pub use memory::MemoryStore;
pub use store::{DistanceStore, JobStore, StoreError, UserStore};

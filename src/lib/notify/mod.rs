pub mod publisher;
pub mod types;

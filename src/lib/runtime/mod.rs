pub mod docker;
pub mod types;

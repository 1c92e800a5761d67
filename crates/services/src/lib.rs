pub mod operations;
pub mod scheduler;
pub mod subscription;
pub mod types;

pub use types::ClientId;

pub mod client_repository;
pub mod operation_log_repository;

pub use client_repository::PostgresClientRepository;
pub use operation_log_repository::PostgresOperationLogRepository;

pub mod ports;

pub use ports::{NewOperation, OperationLogEntry, OperationLogRepository, OperationType};

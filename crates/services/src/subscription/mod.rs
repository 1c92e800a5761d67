pub mod dates;
pub mod duration;
pub mod memory;
pub mod ports;
pub mod service;
pub mod token;

// Re-export commonly used types
pub use duration::parse_duration;
pub use memory::InMemoryStore;
pub use ports::{
    BurnedToken, ClientRecord, ClientRepository, NewBurnRecord, NewClientRecord, PaymentStatus,
    Registration, SubscriptionError, SubscriptionService, SubscriptionStats,
};
pub use service::{SubscriptionServiceConfig, SubscriptionServiceImpl};
pub use token::{generate_unique_token, parse_token, TokenParts, MAX_TOKEN_ATTEMPTS};

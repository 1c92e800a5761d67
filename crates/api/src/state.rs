use std::sync::Arc;

use services::scheduler::{ExpirationNotifier, ExpirationScheduler};
use services::subscription::{
    SubscriptionError, SubscriptionService, SubscriptionServiceConfig, SubscriptionServiceImpl,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub subscription_service: Arc<dyn services::subscription::ports::SubscriptionService>,
    /// Bearer token for the admin routes; `None` leaves them open
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Wire the lifecycle service over `storage` and re-arm pending expiration notices.
    ///
    /// Returns the scheduler as well so the caller can shut it down on exit.
    pub async fn bootstrap(
        storage: &database::Storage,
        notifier: Arc<dyn ExpirationNotifier>,
        admin_token: Option<Arc<str>>,
    ) -> Result<(Self, Arc<ExpirationScheduler>), SubscriptionError> {
        let scheduler = Arc::new(ExpirationScheduler::new(notifier));
        let subscription_service = Arc::new(SubscriptionServiceImpl::new(SubscriptionServiceConfig {
            client_repo: storage.clients.clone(),
            operations_repo: storage.operations.clone(),
            scheduler: scheduler.clone(),
        }));

        // Pending notices live only in memory
        let restored = subscription_service.restore_schedule().await?;
        tracing::info!("Restored {} expiration notices", restored);

        let state = Self {
            subscription_service: subscription_service as Arc<dyn SubscriptionService>,
            admin_token,
        };
        Ok((state, scheduler))
    }
}

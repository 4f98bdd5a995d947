// Notifications announcing committed workflow transitions

pub mod audience;
pub mod dispatcher;
pub mod retry;
pub mod sink;
pub mod templates;
pub mod types;

pub use audience::{AudienceResolver, CachedAudience, StaticAudience};
pub use dispatcher::{DispatchStats, DispatcherHandle, NotificationDispatcher};
pub use retry::{DeliveryRetryHandler, RetryConfig};
pub use sink::{InMemorySink, NotificationSink, TracingSink};
pub use templates::{plan_notifications, AudienceTarget, NotificationPlan};
pub use types::{
    DispatchError, DossierSnapshot, Notification, NotificationPriority, NotificationType,
    TransitionOutcome,
};

#[cfg(any(test, feature = "testing"))]
pub use audience::MockAudienceResolver;

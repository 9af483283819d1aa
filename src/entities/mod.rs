pub mod alert;
pub mod alert_ai;
pub mod alert_metrics;
pub mod contact;
pub mod domain_event;
pub mod notification_delivery_event;
pub mod notification_result;
pub mod signal;
pub mod tenant;
pub mod usage_event;

pub use alert::Entity as Alert;
pub use alert_ai::Entity as AlertAi;
pub use alert_metrics::Entity as AlertMetrics;
pub use contact::Entity as Contact;
pub use domain_event::Entity as DomainEvent;
pub use notification_delivery_event::Entity as NotificationDeliveryEvent;
pub use notification_result::Entity as NotificationResult;
pub use signal::Entity as Signal;
pub use tenant::Entity as Tenant;
pub use usage_event::Entity as UsageEvent;

mod filters;
mod notifications;
mod store;

pub use filters::{GrantFilter, MembershipFilter};
pub use notifications::NotificationBus;
pub use store::{AccountStore, AccountTransaction};

pub mod line_items;
pub mod requests;
pub mod revoked_sessions;
pub mod services;
pub mod users;

pub use line_items::Entity as LineItems;
pub use requests::{Entity as Requests, RequestStatus};
pub use revoked_sessions::Entity as RevokedSessions;
pub use services::Entity as Services;
pub use users::{Entity as Users, Role};

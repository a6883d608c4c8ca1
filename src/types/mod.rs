mod models;
mod role;
mod service;

pub use models::*;
pub use role::UserRole;
pub use service::ServiceName;

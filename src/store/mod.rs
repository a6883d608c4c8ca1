mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &NewUser) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn touch_last_login(&self, id: i64) -> Result<()>;
    fn delete_user(&self, id: i64) -> Result<bool>;
    fn has_admin(&self) -> Result<bool>;

    // Service account operations
    fn upsert_service_account(&self, account: &ServiceAccount) -> Result<()>;
    fn get_service_account(
        &self,
        user_id: i64,
        service: ServiceName,
    ) -> Result<Option<ServiceAccount>>;
    fn list_service_accounts(&self, user_id: i64) -> Result<Vec<ServiceAccount>>;

    // Repository operations
    fn record_repository(
        &self,
        user_id: i64,
        service: ServiceName,
        web_url: &str,
    ) -> Result<Option<RepositoryRecord>>;
}

mod middleware;
mod password;
mod session;

pub use middleware::{AuthError, Session};
pub use password::PasswordHasher;
pub use session::{
    ACCESS_TOKEN_HEADER, Claims, REFRESH_TOKEN_HEADER, SessionKeys, SessionTokenError, TokenPair,
};

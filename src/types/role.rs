use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of an Amandus account. Admins may list every user and edit anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserRole {
    Admin,
    #[default]
    NonAdmin,
}

impl UserRole {
    /// Converts the stored or user-supplied role string to a role.
    pub fn parse(s: &str) -> Option<UserRole> {
        match s {
            "admin" => Some(Self::Admin),
            "non-admin" => Some(Self::NonAdmin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::NonAdmin => "non-admin",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// External git hosting provider a user can link to their account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum,
)]
#[serde(rename_all = "lowercase")]
#[graphql(rename_items = "lowercase")]
pub enum ServiceName {
    Github,
    Bitbucket,
    Gitlab,
}

impl ServiceName {
    /// Seed order of the `services` table.
    pub const ALL: [ServiceName; 3] = [Self::Github, Self::Bitbucket, Self::Gitlab];

    pub fn parse(s: &str) -> Option<ServiceName> {
        match s {
            "github" => Some(Self::Github),
            "bitbucket" => Some(Self::Bitbucket),
            "gitlab" => Some(Self::Gitlab),
            _ => None,
        }
    }

    /// Infers the provider from a hostname or URL by substring.
    pub fn from_host(host: &str) -> Option<ServiceName> {
        let host = host.to_ascii_lowercase();
        if host.contains("github") {
            Some(Self::Github)
        } else if host.contains("gitlab") {
            Some(Self::Gitlab)
        } else if host.contains("bitbucket") {
            Some(Self::Bitbucket)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Bitbucket => "bitbucket",
            Self::Gitlab => "gitlab",
        }
    }

    /// Public host serving the provider's git remotes.
    #[must_use]
    pub const fn host(self) -> &'static str {
        match self {
            Self::Github => "github.com",
            Self::Bitbucket => "bitbucket.org",
            Self::Gitlab => "gitlab.com",
        }
    }

    /// Display name used in user facing messages.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Github => "GitHub",
            Self::Bitbucket => "Bitbucket",
            Self::Gitlab => "GitLab",
        }
    }

    /// Whether the provider issues refresh tokens for expiring access tokens.
    #[must_use]
    pub const fn supports_refresh(self) -> bool {
        !matches!(self, Self::Github)
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_host_matches_substrings() {
        assert_eq!(ServiceName::from_host("github.com"), Some(ServiceName::Github));
        assert_eq!(
            ServiceName::from_host("gitlab.example.org"),
            Some(ServiceName::Gitlab)
        );
        assert_eq!(
            ServiceName::from_host("bitbucket.org"),
            Some(ServiceName::Bitbucket)
        );
        assert_eq!(ServiceName::from_host("sheetbucket.org"), None);
    }

    #[test]
    fn test_parse_service() {
        for service in ServiceName::ALL {
            assert_eq!(ServiceName::parse(service.as_str()), Some(service));
        }
        assert_eq!(ServiceName::parse("sourceforge"), None);
    }

    #[test]
    fn test_only_github_lacks_refresh() {
        assert!(!ServiceName::Github.supports_refresh());
        assert!(ServiceName::Gitlab.supports_refresh());
        assert!(ServiceName::Bitbucket.supports_refresh());
    }
}

use serde::{Deserialize, Serialize};

/// Where a root of capability documents comes from.
///
/// Each source carries a default trust level; callers may still assign any
/// explicit trust to a root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Documents shipped by the source repository.
    #[default]
    Shipped,
    /// User-local customizations (e.g. `~/.claude-library`).
    User,
    /// Project-local customizations.
    Project,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shipped => write!(f, "shipped"),
            Self::User => write!(f, "user"),
            Self::Project => write!(f, "project"),
        }
    }
}

impl SourceType {
    pub fn default_trust_level(&self) -> i32 {
        match self {
            Self::Shipped => 0,
            Self::User => 10,
            Self::Project => 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        assert_eq!(SourceType::default(), SourceType::Shipped);
    }

    #[test]
    fn test_display() {
        assert_eq!(SourceType::Shipped.to_string(), "shipped");
        assert_eq!(SourceType::User.to_string(), "user");
        assert_eq!(SourceType::Project.to_string(), "project");
    }

    #[test]
    fn test_trust_ordering() {
        assert!(SourceType::User.default_trust_level() > SourceType::Shipped.default_trust_level());
        assert!(
            SourceType::Project.default_trust_level() > SourceType::User.default_trust_level()
        );
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&SourceType::User).unwrap();
        assert_eq!(json, "\"user\"");

        let parsed: SourceType = serde_json::from_str("\"project\"").unwrap();
        assert_eq!(parsed, SourceType::Project);
    }
}

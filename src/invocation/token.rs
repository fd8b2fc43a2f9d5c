//! Reference token grammar: `@agent-<name>` and `/<name>`.

use std::fmt;

use crate::registry::{CapabilityKind, normalize_name};

const AGENT_PREFIX: &str = "@agent-";
const COMMAND_PREFIX: &str = "/";

/// A parsed reference. `name` is already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceToken {
    pub kind: CapabilityKind,
    pub name: String,
    raw: String,
}

impl ReferenceToken {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let trimmed = raw.trim();
        let invalid = || crate::Error::InvalidReference(raw.to_string());

        let (kind, rest) = if let Some(head) = trimmed.get(..AGENT_PREFIX.len())
            && head.eq_ignore_ascii_case(AGENT_PREFIX)
        {
            (CapabilityKind::Agent, &trimmed[AGENT_PREFIX.len()..])
        } else if let Some(rest) = trimmed.strip_prefix(COMMAND_PREFIX) {
            (CapabilityKind::Command, rest)
        } else {
            return Err(invalid());
        };

        let name = normalize_name(rest);
        if name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            kind,
            name,
            raw: trimmed.to_string(),
        })
    }

    /// The token as the caller wrote it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::str::FromStr for ReferenceToken {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ReferenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CapabilityKind::Agent => write!(f, "{}{}", AGENT_PREFIX, self.name),
            CapabilityKind::Command => write!(f, "{}{}", COMMAND_PREFIX, self.name),
        }
    }
}

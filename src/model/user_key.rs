use std::fmt;

use serde::{Deserialize, Serialize};

/// How a check reached the service. Anonymous checks are keyed per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSource {
    Get,
    Post,
}

impl CheckSource {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
        }
    }
}

/// Identity under which a check is aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    /// Anonymous identity for a name checked through the given source, e.g. `get_Alice`.
    pub fn anonymous(source: CheckSource, name: &str) -> Self {
        Self(format!("{}_{}", source.prefix(), name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for UserKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for UserKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

use serde::{Deserialize, Serialize};

/// Model-level permission codename.
///
/// The four built-in codenames are generated for every registered resource
/// type; `Custom` carries organization- or feature-specific codes created by
/// administrators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Codename {
    View,
    Add,
    Change,
    Delete,
    Custom(String),
}

impl Codename {
    /// Codenames generated for every resource type, in generation order.
    pub const BUILTIN: [Codename; 4] = [
        Codename::View,
        Codename::Add,
        Codename::Change,
        Codename::Delete,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Codename::View => "view",
            Codename::Add => "add",
            Codename::Change => "change",
            Codename::Delete => "delete",
            Codename::Custom(code) => code,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Codename::Custom(_))
    }

    /// Custom codes are lowercase ASCII letters, digits and `_`.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Codename::Custom(code) => {
                !code.is_empty()
                    && code
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
            }
            _ => true,
        }
    }
}

impl From<&str> for Codename {
    fn from(value: &str) -> Self {
        match value {
            "view" => Codename::View,
            "add" => Codename::Add,
            "change" => Codename::Change,
            "delete" => Codename::Delete,
            other => Codename::Custom(other.to_string()),
        }
    }
}

impl From<String> for Codename {
    fn from(value: String) -> Self {
        match value.as_str() {
            "view" | "add" | "change" | "delete" => Codename::from(value.as_str()),
            _ => Codename::Custom(value),
        }
    }
}

impl From<Codename> for String {
    fn from(value: Codename) -> Self {
        match value {
            Codename::Custom(code) => code,
            builtin => builtin.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Codename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Permission definitions and the permissible principal contract

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Baseline grant of a permission absent explicit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PermissionDefault {
    /// Granted to everyone
    True,
    /// Granted to no one
    False,
    /// Granted to operators only
    #[default]
    Op,
    /// Granted to non-operators only
    NotOp,
}

impl PermissionDefault {
    /// Whether operators hold this permission by default
    pub fn grants_operators(self) -> bool {
        matches!(self, Self::Op | Self::True)
    }

    /// Whether non-operators hold this permission by default
    pub fn grants_non_operators(self) -> bool {
        matches!(self, Self::NotOp | Self::True)
    }

    /// Whether a principal with the given operator status holds it by default
    pub fn grants(self, op: bool) -> bool {
        if op {
            self.grants_operators()
        } else {
            self.grants_non_operators()
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Op => "op",
            Self::NotOp => "notop",
        }
    }
}

/// Unrecognized permission default spelling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown permission default '{0}'")]
pub struct ParsePermissionDefaultError(pub String);

impl FromStr for PermissionDefault {
    type Err = ParsePermissionDefaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "true" => Ok(Self::True),
            "false" => Ok(Self::False),
            "op" | "isop" | "operator" | "isoperator" | "admin" | "isadmin" => Ok(Self::Op),
            "!op" | "notop" | "!operator" | "notoperator" | "!admin" | "notadmin" => {
                Ok(Self::NotOp)
            }
            _ => Err(ParsePermissionDefaultError(s.to_string())),
        }
    }
}

impl TryFrom<String> for PermissionDefault {
    type Error = ParsePermissionDefaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionDefault> for String {
    fn from(value: PermissionDefault) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PermissionDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named permission node
///
/// Names are case-insensitive: [`Permission::key`] is the lowercase form the
/// host indexes by, while [`Permission::name`] keeps the declared spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    default: PermissionDefault,
    #[serde(default)]
    children: BTreeMap<String, bool>,
}

impl Permission {
    /// Create a permission with the default tier ([`PermissionDefault::Op`])
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            default: PermissionDefault::default(),
            children: BTreeMap::new(),
        }
    }

    /// Builder: set the default tier
    #[must_use]
    pub fn with_default(mut self, default: PermissionDefault) -> Self {
        self.default = default;
        self
    }

    /// Builder: set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: add a child permission and the value it inherits
    #[must_use]
    pub fn with_child(mut self, name: impl Into<String>, value: bool) -> Self {
        self.children.insert(name.into().to_lowercase(), value);
        self
    }

    /// Name as declared
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized (lowercase) name used for lookups
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default(&self) -> PermissionDefault {
        self.default
    }

    /// Child permissions and the value each inherits from this one
    pub fn children(&self) -> &BTreeMap<String, bool> {
        &self.children
    }
}

/// A principal that can hold permissions
///
/// The permission registry calls [`Permissible::recalculate_permissions`] on
/// every subscriber of a default tier whenever that tier gains a permission.
pub trait Permissible: Send + Sync {
    /// Recompute the effective permission set
    fn recalculate_permissions(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tier_membership() {
        assert!(PermissionDefault::Op.grants(true));
        assert!(!PermissionDefault::Op.grants(false));
        assert!(PermissionDefault::NotOp.grants(false));
        assert!(!PermissionDefault::NotOp.grants(true));
        assert!(PermissionDefault::True.grants(true));
        assert!(PermissionDefault::True.grants(false));
        assert!(!PermissionDefault::False.grants(true));
        assert!(!PermissionDefault::False.grants(false));
    }

    #[test]
    fn test_parse_conventional_spellings() {
        assert_eq!("OP".parse(), Ok(PermissionDefault::Op));
        assert_eq!("isadmin".parse(), Ok(PermissionDefault::Op));
        assert_eq!("not op".parse(), Ok(PermissionDefault::NotOp));
        assert_eq!("!operator".parse(), Ok(PermissionDefault::NotOp));
        assert_eq!("True".parse(), Ok(PermissionDefault::True));
        assert_eq!("false".parse(), Ok(PermissionDefault::False));
        assert!("sometimes".parse::<PermissionDefault>().is_err());
    }

    #[test]
    fn test_permission_key_is_lowercase() {
        let perm = Permission::new("Cmd.Fly");
        assert_eq!(perm.name(), "Cmd.Fly");
        assert_eq!(perm.key(), "cmd.fly");
        assert_eq!(perm.default(), PermissionDefault::Op);
    }

    #[test]
    fn test_permission_from_toml() {
        let perm: Permission = toml::from_str(
            r#"
            name = "warp.use"
            description = "Use warps"
            default = "notop"

            [children]
            "warp.list" = true
            "#,
        )
        .unwrap();

        assert_eq!(perm.default(), PermissionDefault::NotOp);
        assert_eq!(perm.children().get("warp.list"), Some(&true));
    }

    #[test]
    fn test_permission_default_serializes_as_string() {
        let json = serde_json::to_string(&PermissionDefault::NotOp).unwrap();
        assert_eq!(json, "\"notop\"");
    }
}

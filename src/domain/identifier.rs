use std::{
    fmt::{Display, Formatter, Result},
    ops::Deref,
};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("invalid identifier: {0:?}")]
pub struct InvalidIdentifier(pub String);

/// A validated Python name: a letter or underscore followed by letters, digits, or underscores.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl Into<String>) -> std::result::Result<Self, InvalidIdentifier> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_');
        if valid_start && chars.all(|c| c.is_alphanumeric() || c == '_') {
            Ok(Self(name))
        } else {
            Err(InvalidIdentifier(name))
        }
    }

    /// Names the crate itself synthesizes into rewritten trees.
    pub(crate) fn internal(name: &'static str) -> Self {
        debug_assert!(Self::new(name).is_ok(), "{name} is not a valid identifier");
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Identifier {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(Identifier::new("install_requires").is_ok());
        assert!(Identifier::new("_private2").is_ok());
    }

    #[test]
    fn invalid_names() {
        assert_eq!(
            Identifier::new("2fast"),
            Err(InvalidIdentifier("2fast".to_string()))
        );
        assert!(Identifier::new("").is_err());
        assert!(Identifier::new("a-b").is_err());
    }
}

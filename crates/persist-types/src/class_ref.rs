use std::fmt;

use serde::{Deserialize, Serialize};

/// Symbolic reference to a class: module path plus class name.
///
/// A `ClassRef` is plain text. Holding one never implies the class can be
/// loaded in the current process.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassRef {
    pub module: String,
    pub name: String,
}

impl ClassRef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Fully-qualified dotted name, e.g. `app.models.Account`.
    pub fn qualified_name(&self) -> String {
        if self.module.is_empty() {
            return self.name.clone();
        }
        format!("{}.{}", self.module, self.name)
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.module, self.name)
        }
    }
}

impl<M: Into<String>, N: Into<String>> From<(M, N)> for ClassRef {
    fn from((module, name): (M, N)) -> Self {
        Self::new(module, name)
    }
}

/// The two ways a class can appear in a record.
///
/// `Blueprint` names the class of an instance: loading the record means
/// finding that class and instantiating it. `Literal` stands for the class
/// object itself used as a value, and is never instantiated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassRefToken {
    Blueprint(ClassRef),
    Literal(ClassRef),
}

impl ClassRefToken {
    /// The class named by this token, regardless of flavor.
    pub fn class(&self) -> &ClassRef {
        match self {
            Self::Blueprint(c) | Self::Literal(c) => c,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_joins_with_dot() {
        let c = ClassRef::new("app.models", "Account");
        assert_eq!(c.qualified_name(), "app.models.Account");
        assert_eq!(c.to_string(), "app.models.Account");
    }

    #[test]
    fn empty_module_is_bare_name() {
        let c = ClassRef::new("", "Builtin");
        assert_eq!(c.qualified_name(), "Builtin");
        assert_eq!(c.to_string(), "Builtin");
    }

    #[test]
    fn from_tuple() {
        let c: ClassRef = ("a.b", "C").into();
        assert_eq!(c, ClassRef::new("a.b", "C"));
    }

    #[test]
    fn token_flavors_share_class() {
        let c = ClassRef::new("m", "K");
        let blueprint = ClassRefToken::Blueprint(c.clone());
        let literal = ClassRefToken::Literal(c.clone());
        assert_eq!(blueprint.class(), literal.class());
        assert_ne!(blueprint, literal);
        assert!(literal.is_literal());
        assert!(!blueprint.is_literal());
    }

    #[test]
    fn token_serde_is_tagged() {
        let token = ClassRefToken::Literal(ClassRef::new("m", "K"));
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["kind"], "literal");
        assert_eq!(json["name"], "K");
        let parsed: ClassRefToken = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, token);
    }
}

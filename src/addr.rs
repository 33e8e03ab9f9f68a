//! Addressing of configuration constructs: module paths, `ForEach` indices,
//! and stable identifiers for names qualified by the module that declares
//! them.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::value::Value;

/// The index of one instance of a construct that supports `ForEach`.
///
/// `Int` and `String` indices are used depending on whether `ForEach` was
/// assigned a list or a map. [`EachIndex::None`] represents the absence of an
/// index, used when `ForEach` is not set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EachIndex {
    None,
    Int(i64),
    String(String),
}

impl EachIndex {
    pub fn each_type(&self) -> EachType {
        match self {
            EachIndex::None => EachType::None,
            EachIndex::Int(_) => EachType::Int,
            EachIndex::String(_) => EachType::String,
        }
    }

    /// The index as a value, for binding `Each.Key` during evaluation.
    ///
    /// Panics when called on `EachIndex::None`, which has no value; callers
    /// must check `each_type` first.
    pub fn value(&self) -> Value {
        match self {
            EachIndex::None => panic!("EachIndex::None has no value"),
            EachIndex::Int(i) => Value::from(*i),
            EachIndex::String(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for EachIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EachIndex::None => Ok(()),
            EachIndex::Int(i) => write!(f, "{}", i),
            EachIndex::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// The kind of index in use for a `ForEach` collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EachType {
    None,
    Int,
    String,
}

/// Produces the [`EachIndex`] equivalent of a number or string value.
///
/// Returns [`EachIndex::None`] if the value is of an unsuitable type or is a
/// number not exactly representable as a signed 64-bit integer. Panics if the
/// value is unknown or null, which callers must have ruled out already.
pub fn make_each_index(val: &Value) -> EachIndex {
    match val {
        Value::Null(_) | Value::Unknown(_) => {
            panic!("make_each_index called with unknown or null value")
        }
        Value::String(s) => EachIndex::String(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return EachIndex::Int(i);
            }
            // An integer-valued float is still an exact index; anything with
            // a fractional part or beyond the i64 range is not.
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    return EachIndex::Int(f as i64);
                }
            }
            EachIndex::None
        }
        _ => EachIndex::None,
    }
}

/// One step in a [`ModulePath`]: either the name given in a `Module` block or
/// the `ForEach` index of a particular instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModulePathStep {
    Name(String),
    Index(EachIndex),
}

/// The absolute path of a module instance within the module tree. The empty
/// path is the root module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModulePath(Vec<ModulePathStep>);

impl ModulePath {
    pub fn root() -> Self {
        ModulePath(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, name: &str) -> ModulePath {
        let mut steps = self.0.clone();
        steps.push(ModulePathStep::Name(name.to_string()));
        ModulePath(steps)
    }

    pub fn index(&self, key: EachIndex) -> ModulePath {
        let mut steps = self.0.clone();
        steps.push(ModulePathStep::Index(key));
        ModulePath(steps)
    }

    /// The path of the module that contains the addressed one. The parent of
    /// the root is the root itself.
    pub fn parent(&self) -> ModulePath {
        if self.0.is_empty() {
            return ModulePath::root();
        }
        let mut steps = &self.0[..self.0.len() - 1];
        while let Some(last) = steps.last() {
            if matches!(last, ModulePathStep::Name(_)) {
                return ModulePath(steps.to_vec());
            }
            steps = &steps[..steps.len() - 1];
        }
        ModulePath::root()
    }

    /// The longest prefix of this path that ends in a name step, which is the
    /// path itself when it already does.
    pub fn nearest_name(&self) -> ModulePath {
        let mut steps = &self.0[..];
        while let Some(last) = steps.last() {
            if matches!(last, ModulePathStep::Name(_)) {
                return ModulePath(steps.to_vec());
            }
            steps = &steps[..steps.len() - 1];
        }
        ModulePath::root()
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.0 {
            match step {
                ModulePathStep::Name(name) => write!(f, ".{}", name)?,
                ModulePathStep::Index(key) => write!(f, "[{}]", key)?,
            }
        }
        Ok(())
    }
}

/// A name defined within a particular module, with an optional index for
/// names that support `ForEach`. The key is [`EachIndex::None`] when no index
/// is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameInModule {
    pub module: ModulePath,
    pub name: String,
    pub key: EachIndex,
}

impl NameInModule {
    /// An opaque alphanumeric string that uniquely identifies the qualified
    /// name, suitable for use as a logical ID in CloudFormation template
    /// JSON. The result is a function of the display string only.
    ///
    /// The result is not intelligible to humans, so objects using such IDs
    /// should generally be annotated with a human-readable form too.
    pub fn id(&self) -> String {
        let digest = Sha256::digest(self.to_string().as_bytes());
        format!("{:x}", digest)[..16].to_string()
    }
}

impl fmt::Display for NameInModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_root() {
            match &self.key {
                EachIndex::None => write!(f, "{}", self.name),
                key => write!(f, "{}[{}]", self.name, key),
            }
        } else {
            match &self.key {
                EachIndex::None => write!(f, "{}:{}", self.module, self.name),
                key => write!(f, "{}:{}[{}]", self.module, self.name, key),
            }
        }
    }
}

/// Whether a declared name is usable verbatim in CloudFormation output, which
/// permits only alphanumeric characters.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_path_display() {
        let path = ModulePath::root()
            .child("Network")
            .index(EachIndex::Int(0))
            .child("Subnet");
        assert_eq!(path.to_string(), ".Network[0].Subnet");
        assert_eq!(ModulePath::root().to_string(), "");
    }

    #[test]
    fn module_path_parent_of_root_is_root() {
        assert_eq!(ModulePath::root().parent(), ModulePath::root());
    }

    #[test]
    fn module_path_parent_skips_indices() {
        let path = ModulePath::root().child("A").index(EachIndex::Int(2));
        assert_eq!(path.parent(), ModulePath::root().child("A"));
        assert_eq!(ModulePath::root().child("A").parent(), ModulePath::root());
    }

    #[test]
    fn nearest_name_keeps_named_path() {
        let named = ModulePath::root().child("A");
        assert_eq!(named.nearest_name(), named);
        let indexed = named.index(EachIndex::String("x".to_string()));
        assert_eq!(indexed.nearest_name(), named);
    }

    #[test]
    fn make_each_index_classifies_values() {
        assert_eq!(
            make_each_index(&Value::from("web")),
            EachIndex::String("web".to_string())
        );
        assert_eq!(make_each_index(&Value::from(3i64)), EachIndex::Int(3));
        assert_eq!(make_each_index(&Value::from(true)), EachIndex::None);
    }

    #[test]
    fn make_each_index_rejects_out_of_range_numbers() {
        let huge = Value::Number(hcl::Number::from_f64(1.0e300).unwrap());
        assert_eq!(make_each_index(&huge), EachIndex::None);
        let frac = Value::Number(hcl::Number::from_f64(1.5).unwrap());
        assert_eq!(make_each_index(&frac), EachIndex::None);
    }

    #[test]
    fn name_in_module_display_forms() {
        let root_plain = NameInModule {
            module: ModulePath::root(),
            name: "Bucket".to_string(),
            key: EachIndex::None,
        };
        assert_eq!(root_plain.to_string(), "Bucket");

        let root_indexed = NameInModule {
            key: EachIndex::Int(1),
            ..root_plain.clone()
        };
        assert_eq!(root_indexed.to_string(), "Bucket[1]");

        let nested = NameInModule {
            module: ModulePath::root().child("Net"),
            name: "Vpc".to_string(),
            key: EachIndex::String("a".to_string()),
        };
        assert_eq!(nested.to_string(), ".Net:Vpc[\"a\"]");
    }

    #[test]
    fn id_depends_only_on_display_string() {
        let a = NameInModule {
            module: ModulePath::root().child("Net"),
            name: "Vpc".to_string(),
            key: EachIndex::None,
        };
        let b = NameInModule {
            module: ModulePath::root().child("Net"),
            name: "Vpc".to_string(),
            key: EachIndex::None,
        };
        assert_eq!(a.id(), b.id());
        assert!(a.id().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(a.id().len(), 16);
    }

    #[test]
    fn valid_name_is_alphanumeric_only() {
        assert!(valid_name("Bucket01"));
        assert!(!valid_name("My-Bucket"));
        assert!(!valid_name(""));
    }
}

//! Type representation
//!
//! Types are a closed set: the universal `Any`, the primitives the checker
//! knows about, registered generic parameters, and any other annotation
//! kept by name.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::ast::TypeExpr;
use crate::symbols::GenericRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Universal type, compatible with everything in both directions
    Any,

    /// `int`
    Int,

    /// `str`
    Str,

    /// A registered generic parameter, by its binding name
    Generic(String),

    /// Any other annotation, compared by name
    Named(String),
}

impl Type {
    /// Resolve a source annotation against the generic parameters registered so far
    pub fn from_annotation(annotation: &TypeExpr, generics: &GenericRegistry) -> Type {
        match annotation {
            TypeExpr::Name(name) => match name.as_str() {
                "int" => Type::Int,
                "str" => Type::Str,
                "Any" | "typing.Any" => Type::Any,
                _ if generics.contains(name) => Type::Generic(name.clone()),
                _ => Type::Named(name.clone()),
            },
            subscript @ TypeExpr::Subscript { .. } => Type::Named(subscript.to_string()),
        }
    }

    /// Resolve an optional annotation; a missing one is `Any`
    pub fn from_optional(annotation: Option<&TypeExpr>, generics: &GenericRegistry) -> Type {
        annotation
            .map(|a| Type::from_annotation(a, generics))
            .unwrap_or(Type::Any)
    }

    /// Reclassify a named type as generic once `generics` holds its binding
    pub fn resolve_generic(&mut self, generics: &GenericRegistry) {
        if let Type::Named(name) = self {
            if generics.contains(name) {
                *self = Type::Generic(std::mem::take(name));
            }
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Type::Generic(_))
    }

    /// Gradual compatibility: `Any` on either side always passes
    pub fn compatible_with(&self, other: &Type) -> bool {
        self.is_any() || other.is_any() || self == other
    }

    /// Name as it appears in diagnostics
    pub fn name(&self) -> &str {
        match self {
            Type::Any => "Any",
            Type::Int => "int",
            Type::Str => "str",
            Type::Generic(name) | Type::Named(name) => name,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(name: &str) -> GenericRegistry {
        let mut generics = GenericRegistry::default();
        generics.register(name, name);
        generics
    }

    #[test]
    fn test_primitive_annotations() {
        let generics = GenericRegistry::default();
        assert_eq!(
            Type::from_annotation(&TypeExpr::Name("int".into()), &generics),
            Type::Int
        );
        assert_eq!(
            Type::from_annotation(&TypeExpr::Name("str".into()), &generics),
            Type::Str
        );
        assert_eq!(
            Type::from_annotation(&TypeExpr::Name("typing.Any".into()), &generics),
            Type::Any
        );
    }

    #[test]
    fn test_generic_annotation() {
        let generics = registry_with("T");
        assert_eq!(
            Type::from_annotation(&TypeExpr::Name("T".into()), &generics),
            Type::Generic("T".into())
        );
        assert_eq!(
            Type::from_annotation(&TypeExpr::Name("U".into()), &generics),
            Type::Named("U".into())
        );
    }

    #[test]
    fn test_named_type_resolved_after_registration() {
        let mut ty = Type::from_annotation(&TypeExpr::Name("T".into()), &GenericRegistry::default());
        assert_eq!(ty, Type::Named("T".into()));

        ty.resolve_generic(&registry_with("T"));
        assert_eq!(ty, Type::Generic("T".into()));

        let mut other = Type::Named("U".into());
        other.resolve_generic(&registry_with("T"));
        assert_eq!(other, Type::Named("U".into()));
    }

    #[test]
    fn test_subscript_kept_by_name() {
        let annotation = TypeExpr::Subscript {
            base: "list".into(),
            args: vec![TypeExpr::Name("int".into())],
        };
        let ty = Type::from_annotation(&annotation, &GenericRegistry::default());
        assert_eq!(ty.to_string(), "list[int]");
    }

    #[test]
    fn test_missing_annotation_is_any() {
        assert_eq!(
            Type::from_optional(None, &GenericRegistry::default()),
            Type::Any
        );
    }

    #[test]
    fn test_any_is_absorbing() {
        assert!(Type::Any.compatible_with(&Type::Int));
        assert!(Type::Str.compatible_with(&Type::Any));
        assert!(Type::Int.compatible_with(&Type::Int));
        assert!(!Type::Int.compatible_with(&Type::Str));
        assert!(!Type::Named("float".into()).compatible_with(&Type::Int));
    }
}

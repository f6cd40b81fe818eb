//! Symbol tables produced by the semantic analyzer
//!
//! Three tables: registered generic parameters, function signatures and the
//! declared types of annotated variables. They are filled during analysis and
//! only read afterwards. Ordered maps keep debug dumps stable.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::types::Type;

/// Generic parameters: binding name -> name passed to the declaration
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct GenericRegistry {
    params: BTreeMap<String, String>,
}

impl GenericRegistry {
    /// Register a generic parameter. Keys are write-once; returns false if the
    /// binding was already registered and the new declaration was ignored.
    pub fn register(&mut self, binding: &str, declared: &str) -> bool {
        if self.params.contains_key(binding) {
            return false;
        }
        self.params.insert(binding.to_string(), declared.to_string());
        true
    }

    pub fn contains(&self, binding: &str) -> bool {
        self.params.contains_key(binding)
    }

    pub fn declared_name(&self, binding: &str) -> Option<&str> {
        self.params.get(binding).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Signature of a user-defined function
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSignature {
    /// Parameters in declaration order
    pub params: Vec<(String, Type)>,
    pub return_type: Type,
}

impl FunctionSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (name, ty)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, ty)?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTables {
    generics: GenericRegistry,
    functions: BTreeMap<String, FunctionSignature>,
    variables: BTreeMap<String, Type>,
}

impl SymbolTables {
    pub fn generics(&self) -> &GenericRegistry {
        &self.generics
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &FunctionSignature)> {
        self.functions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn variable(&self, name: &str) -> Option<&Type> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn generics_mut(&mut self) -> &mut GenericRegistry {
        &mut self.generics
    }

    /// Returns the signature this one replaced, if any
    pub(crate) fn declare_function(
        &mut self,
        name: &str,
        signature: FunctionSignature,
    ) -> Option<FunctionSignature> {
        self.functions.insert(name.to_string(), signature)
    }

    /// Reclassify every named type that is a registered generic parameter.
    /// Generic declarations may follow the functions that use them.
    pub(crate) fn resolve_generics(&mut self) {
        let generics = &self.generics;
        for signature in self.functions.values_mut() {
            for (_, ty) in &mut signature.params {
                ty.resolve_generic(generics);
            }
            signature.return_type.resolve_generic(generics);
        }
        for ty in self.variables.values_mut() {
            ty.resolve_generic(generics);
        }
    }

    /// Last declaration wins
    pub(crate) fn declare_variable(&mut self, name: &str, ty: Type) -> Option<Type> {
        self.variables.insert(name.to_string(), ty)
    }
}

impl fmt::Display for SymbolTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "generics:")?;
        for (binding, declared) in self.generics.iter() {
            writeln!(f, "  {} = \"{}\"", binding, declared)?;
        }
        writeln!(f, "functions:")?;
        for (name, signature) in &self.functions {
            writeln!(f, "  {}{}", name, signature)?;
        }
        writeln!(f, "variables:")?;
        for (name, ty) in &self.variables {
            writeln!(f, "  {}: {}", name, ty)?;
        }
        Ok(())
    }
}

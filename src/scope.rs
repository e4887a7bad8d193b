//! Compile-time variable scopes
//!
//! A scope maps names to definitions in declaration order. Alias scripts have
//! a single top-level scope; `if` and `while` bodies share it.

use indexmap::IndexMap;

use crate::argument::ArgumentSpec;
use crate::types::TypeTag;

/// A declared variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub ty: TypeTag,
    /// Slot in the runtime environment
    pub slot: usize,
    /// Validator for variables bound from command arguments
    pub argument: Option<ArgumentSpec>,
}

/// Ordered name → definition map
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: IndexMap<String, VariableDefinition>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut VariableDefinition> {
        self.variables.get_mut(name)
    }

    /// Insert a definition, replacing any earlier one of the same name
    pub fn insert(&mut self, definition: VariableDefinition) {
        self.variables.insert(definition.name.clone(), definition);
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.variables.values()
    }
}

/// Resolve a name against a scope stack, innermost scope first
pub fn resolve<'s>(scopes: &'s [Scope], name: &str) -> Option<&'s VariableDefinition> {
    scopes.iter().rev().find_map(|scope| scope.get(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, ty: TypeTag, slot: usize) -> VariableDefinition {
        VariableDefinition {
            name: name.to_string(),
            ty,
            slot,
            argument: None,
        }
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut scope = Scope::new();
        scope.insert(def("zeta", TypeTag::Int, 0));
        scope.insert(def("alpha", TypeTag::Long, 1));
        scope.insert(def("mid", TypeTag::String, 2));
        let names: Vec<_> = scope.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_resolve_prefers_innermost() {
        let mut outer = Scope::new();
        outer.insert(def("x", TypeTag::Int, 0));
        outer.insert(def("y", TypeTag::Int, 1));
        let mut inner = Scope::new();
        inner.insert(def("x", TypeTag::Double, 2));

        let scopes = [outer, inner];
        assert_eq!(resolve(&scopes, "x").map(|d| d.ty), Some(TypeTag::Double));
        assert_eq!(resolve(&scopes, "y").map(|d| d.slot), Some(1));
        assert!(resolve(&scopes, "z").is_none());
    }
}

//! Variable environment for one alias invocation
//!
//! Slots are assigned at compile time, so lookups at run time are plain
//! indexing. Every declared variable starts out holding its type's zero
//! value, which means a variable first assigned inside a branch that never
//! ran still reads as a value rather than failing.

use crate::bytecode::Program;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableEnv {
    names: Vec<String>,
    values: Vec<Value>,
}

impl VariableEnv {
    /// Create an environment with one zeroed slot per declared variable
    pub fn for_program(program: &Program) -> Self {
        Self {
            names: program.variables.iter().map(|v| v.name.clone()).collect(),
            values: program
                .variables
                .iter()
                .map(|v| Value::default_for(v.ty))
                .collect(),
        }
    }

    /// Get a slot's value
    pub fn get(&self, slot: usize) -> &Value {
        &self.values[slot]
    }

    /// Store a value into a slot
    pub fn set(&mut self, slot: usize, value: Value) {
        self.values[slot] = value;
    }

    /// Look a variable up by name
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let slot = self.names.iter().position(|n| n == name)?;
        self.values.get(slot)
    }
}

//! Compiled alias programs
//!
//! A program is a flat, 0-indexed instruction array. Conditionals and loops
//! are expressed as jumps to absolute instruction indices; an index equal to
//! the program length means "stop".

use std::fmt;
use std::fmt::Write as _;

use crate::environment::VariableEnv;
use crate::scope::VariableDefinition;
use crate::token::{Comparator, Operator};
use crate::types::TypeTag;
use crate::value::Value;

/// One element of a postfix expression
#[derive(Debug, Clone, PartialEq)]
pub enum PostfixItem {
    Constant(Value),
    /// Environment slot
    Variable(usize),
    Operator(Operator),
}

/// A compiled expression in reverse-Polish order with its static type
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub items: Vec<PostfixItem>,
    pub ty: TypeTag,
}

/// `left <cmp> right`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: Expression,
    pub comparator: Comparator,
    pub right: Expression,
}

/// A piece of a command line
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    /// `{$name}` placeholder bound to a slot
    Variable { name: String, slot: usize },
}

/// A sub-command with its placeholders resolved to slots
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTemplate {
    /// The line as written
    pub text: String,
    pub segments: Vec<Segment>,
}

impl CommandTemplate {
    /// Substitute every placeholder with the current value of its variable
    pub fn render(&self, env: &VariableEnv) -> String {
        let mut out = String::with_capacity(self.text.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Variable { slot, .. } => {
                    let _ = write!(out, "{}", env.get(*slot));
                }
            }
        }
        out
    }
}

/// Instructions of the alias interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Dispatch a sub-command to the host
    Command(CommandTemplate),

    /// Evaluate `expr`, coerce it to `ty` and store it in `slot`
    Assign {
        slot: usize,
        expr: Expression,
        ty: TypeTag,
    },

    /// Unconditional jump
    Jump { target: usize },

    /// Fall through when the condition holds, otherwise jump to `target`
    If { condition: Condition, target: usize },

    /// Loop head; same semantics as `If`. The matching back jump is a
    /// separate `Jump` at the end of the body.
    While { condition: Condition, target: usize },

    /// Stop execution
    Return,
}

impl Instruction {
    /// The jump destination, for instructions that have one
    pub fn target(&self) -> Option<usize> {
        match self {
            Instruction::Jump { target }
            | Instruction::If { target, .. }
            | Instruction::While { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Overwrite the jump destination. No-op for other instructions.
    pub fn patch(&mut self, new_target: usize) {
        match self {
            Instruction::Jump { target }
            | Instruction::If { target, .. }
            | Instruction::While { target, .. } => *target = new_target,
            _ => {}
        }
    }
}

/// A frozen, shareable program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub instructions: Box<[Instruction]>,

    /// Script line of each instruction
    pub lines: Box<[usize]>,

    /// Every variable the script declares, by slot. Argument variables come
    /// first, in declaration order.
    pub variables: Vec<VariableDefinition>,
}

impl Program {
    pub fn new(
        instructions: Vec<Instruction>,
        lines: Vec<usize>,
        variables: Vec<VariableDefinition>,
    ) -> Self {
        debug_assert_eq!(instructions.len(), lines.len());
        Self {
            instructions: instructions.into_boxed_slice(),
            lines: lines.into_boxed_slice(),
            variables,
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Script line an instruction was compiled from
    pub fn line(&self, index: usize) -> Option<usize> {
        self.lines.get(index).copied()
    }

    fn slot_name(&self, slot: usize) -> &str {
        self.variables
            .get(slot)
            .map(|v| v.name.as_str())
            .unwrap_or("?")
    }

    fn expression(&self, expr: &Expression) -> String {
        let parts: Vec<String> = expr
            .items
            .iter()
            .map(|item| match item {
                PostfixItem::Constant(value) => format!("{:?}", value),
                PostfixItem::Variable(slot) => self.slot_name(*slot).to_string(),
                PostfixItem::Operator(op) => op.to_string(),
            })
            .collect();
        parts.join(" ")
    }

    fn condition(&self, condition: &Condition) -> String {
        format!(
            "[{}] {} [{}]",
            self.expression(&condition.left),
            condition.comparator,
            self.expression(&condition.right)
        )
    }

    /// Disassemble for debugging
    pub fn disassemble(&self, name: &str) -> String {
        let mut result = format!("== {} ==\n", name);
        for (index, instruction) in self.instructions.iter().enumerate() {
            let text = match instruction {
                Instruction::Command(template) => format!("COMMAND '{}'", template.text),
                Instruction::Assign { slot, expr, ty } => format!(
                    "ASSIGN {} {} <- {}",
                    ty,
                    self.slot_name(*slot),
                    self.expression(expr)
                ),
                Instruction::Jump { target } => format!("JUMP -> {:04}", target),
                Instruction::If { condition, target } => {
                    format!("IF {} else -> {:04}", self.condition(condition), target)
                }
                Instruction::While { condition, target } => {
                    format!("WHILE {} exit -> {:04}", self.condition(condition), target)
                }
                Instruction::Return => "RETURN".to_string(),
            };
            let line = self.line(index).unwrap_or(0);
            let _ = writeln!(result, "{:04} {:4} {}", index, line, text);
        }
        result
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.disassemble("alias"))
    }
}

//! Interpreter for compiled alias programs
//!
//! Walks the instruction array with a program counter. Expressions are
//! evaluated on a small value stack; commands are rendered and handed to a
//! [`CommandExecutor`] supplied by the host.

use std::fmt;

use log::{trace, warn};

use crate::bytecode::{Condition, Expression, Instruction, PostfixItem, Program};
use crate::environment::VariableEnv;
use crate::error::{AliasError, ErrorKind, Result};
use crate::value::Value;

/// Default instruction budget per invocation
pub const DEFAULT_MAX_STEPS: u64 = 100_000;

/// Why the host rejected a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CommandError {}

/// Host callback that dispatches one rendered sub-command
pub trait CommandExecutor {
    fn run(&mut self, command: &str) -> std::result::Result<(), CommandError>;
}

impl<F> CommandExecutor for F
where
    F: FnMut(&str) -> std::result::Result<(), CommandError>,
{
    fn run(&mut self, command: &str) -> std::result::Result<(), CommandError> {
        self(command)
    }
}

/// Executor that accepts every command and keeps a copy
#[derive(Debug, Default, Clone)]
pub struct RecordingExecutor {
    pub commands: Vec<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&mut self, command: &str) -> std::result::Result<(), CommandError> {
        self.commands.push(command.to_string());
        Ok(())
    }
}

/// Interpreter settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Instructions one invocation may execute; `None` disables the limit
    pub max_steps: Option<u64>,
}

impl VmConfig {
    pub fn unbounded() -> Self {
        Self { max_steps: None }
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_steps: Some(DEFAULT_MAX_STEPS),
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionOutcome {
    /// Instructions executed
    pub steps: u64,
    /// Commands dispatched to the executor
    pub commands: usize,
    /// Whether a `return` ended the run
    pub returned: bool,
}

/// The interpreter
pub struct Vm {
    config: VmConfig,
    /// Expression evaluation stack, reused between instructions
    stack: Vec<Value>,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Self {
            config,
            stack: Vec::with_capacity(16),
        }
    }

    /// Run `program` to completion against `env`. Runtime errors carry the
    /// script line of the failing instruction.
    pub fn execute(
        &mut self,
        program: &Program,
        env: &mut VariableEnv,
        exec: &mut dyn CommandExecutor,
    ) -> Result<ExecutionOutcome> {
        let mut outcome = ExecutionOutcome::default();
        let mut pc = 0;

        while let Some(instruction) = program.get(pc) {
            let located = |e: AliasError| match program.line(pc) {
                Some(line) => e.on_line(line),
                None => e,
            };

            if let Some(max) = self.config.max_steps {
                if outcome.steps >= max {
                    warn!("aborting at instruction {}: step budget of {} exhausted", pc, max);
                    return Err(located(ErrorKind::StepBudgetExceeded(max).into()));
                }
            }
            outcome.steps += 1;
            trace!("{:04} {:?}", pc, instruction);

            match self.step(pc, instruction, env, exec).map_err(located)? {
                Some(next) => {
                    if matches!(instruction, Instruction::Command(_)) {
                        outcome.commands += 1;
                    }
                    pc = next;
                }
                None => {
                    outcome.returned = true;
                    break;
                }
            }
        }

        Ok(outcome)
    }

    /// Execute one instruction, returning the next program counter or
    /// `None` on `return`
    fn step(
        &mut self,
        pc: usize,
        instruction: &Instruction,
        env: &mut VariableEnv,
        exec: &mut dyn CommandExecutor,
    ) -> Result<Option<usize>> {
        let next = match instruction {
            Instruction::Command(template) => {
                let command = template.render(env);
                if let Err(e) = exec.run(&command) {
                    warn!("command '{}' failed: {}", command, e);
                    return Err(ErrorKind::CommandFailed(e.message).into());
                }
                pc + 1
            }

            Instruction::Assign { slot, expr, ty } => {
                let value = self.evaluate(expr, env)?;
                env.set(*slot, value.coerce(*ty));
                pc + 1
            }

            Instruction::Jump { target } => *target,

            Instruction::If { condition, target } | Instruction::While { condition, target } => {
                if self.test(condition, env)? {
                    pc + 1
                } else {
                    *target
                }
            }

            Instruction::Return => return Ok(None),
        };
        Ok(Some(next))
    }

    fn test(&mut self, condition: &Condition, env: &VariableEnv) -> Result<bool> {
        let left = self.evaluate(&condition.left, env)?;
        let right = self.evaluate(&condition.right, env)?;
        left.compare(condition.comparator, &right)
    }

    /// Evaluate a postfix expression
    pub fn evaluate(&mut self, expr: &Expression, env: &VariableEnv) -> Result<Value> {
        self.stack.clear();

        for item in &expr.items {
            match item {
                PostfixItem::Constant(value) => self.stack.push(value.clone()),
                PostfixItem::Variable(slot) => self.stack.push(env.get(*slot).clone()),
                PostfixItem::Operator(op) => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.stack.push(lhs.operation(*op, &rhs)?);
                }
            }
        }

        let result = self.pop()?;
        if !self.stack.is_empty() {
            return Err(AliasError::new(ErrorKind::StackUnderflow));
        }
        Ok(result)
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| AliasError::new(ErrorKind::StackUnderflow))
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

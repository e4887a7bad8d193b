//! AliasVM - a scripting engine for command aliases
//!
//! An alias is a short script of host commands mixed with typed variables,
//! arithmetic and `if`/`while` blocks. Scripts are compiled once into a flat
//! instruction array and interpreted per invocation.

pub mod token;
pub mod lexer;
pub mod types;
pub mod scope;
pub mod argument;
pub mod value;
pub mod expression;
pub mod bytecode;
pub mod environment;
pub mod error;
pub mod compiler;
pub mod vm;
pub mod alias;
pub mod alias_file;

pub use alias::{Alias, AliasRegistry};
pub use alias_file::AliasFile;
pub use argument::{ArgumentDeclaration, ArgumentSpec};
pub use bytecode::Program;
pub use compiler::Compiler;
pub use environment::VariableEnv;
pub use error::{AliasError, ErrorKind, Result};
pub use types::TypeTag;
pub use value::Value;
pub use vm::{
    CommandError, CommandExecutor, ExecutionOutcome, RecordingExecutor, Vm, VmConfig,
};

/// Compile script lines with the given arguments declared
pub fn compile<S: AsRef<str>>(arguments: &[ArgumentDeclaration], lines: &[S]) -> Result<Program> {
    Compiler::with_arguments(arguments)?.compile(lines)
}

/// Compile and run a script that takes no arguments
pub fn run<S: AsRef<str>>(lines: &[S], exec: &mut dyn CommandExecutor) -> Result<ExecutionOutcome> {
    let program = compile(&[], lines)?;
    let mut env = VariableEnv::for_program(&program);
    Vm::default().execute(&program, &mut env, exec).map_err(|e| {
        let source: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
        e.with_source(&source.join("\n"))
    })
}

/// Version of AliasVM
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

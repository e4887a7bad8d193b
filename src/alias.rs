//! Named aliases and the registry that holds them
//!
//! An alias owns its argument declarations and its current compiled program.
//! Invocations take a snapshot of the program and run without holding any
//! lock, so a recompilation never disturbs a run already in flight.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};

use crate::argument::ArgumentDeclaration;
use crate::bytecode::Program;
use crate::compiler::Compiler;
use crate::environment::VariableEnv;
use crate::error::{AliasError, ErrorKind, Result};
use crate::value::Value;
use crate::vm::{CommandExecutor, ExecutionOutcome, Vm, VmConfig};

/// Script text and the program compiled from it, swapped as one unit
#[derive(Debug)]
struct Installed {
    lines: Arc<[String]>,
    program: Arc<Program>,
}

/// A compiled alias
#[derive(Debug)]
pub struct Alias {
    name: String,
    arguments: Vec<ArgumentDeclaration>,
    installed: RwLock<Installed>,
}

impl Alias {
    /// Compile `lines` into a new alias
    pub fn new<S: AsRef<str>>(
        name: &str,
        arguments: Vec<ArgumentDeclaration>,
        lines: &[S],
    ) -> Result<Self> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ErrorKind::InvalidName(name.to_string()).into());
        }

        let installed = compile(&arguments, lines)?;
        debug!(
            "alias '{}' compiled to {} instructions",
            name,
            installed.program.len()
        );
        Ok(Self {
            name: name.to_string(),
            arguments,
            installed: RwLock::new(installed),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[ArgumentDeclaration] {
        &self.arguments
    }

    /// Script lines of the installed program
    pub fn lines(&self) -> Arc<[String]> {
        Arc::clone(&self.read().lines)
    }

    /// Snapshot of the installed program
    pub fn program(&self) -> Arc<Program> {
        Arc::clone(&self.read().program)
    }

    /// Usage line, e.g. `give <amount:int_range(1,64)> <item:word>`
    pub fn syntax(&self) -> String {
        let mut syntax = self.name.clone();
        for argument in &self.arguments {
            let _ = write!(syntax, " <{}>", argument);
        }
        syntax
    }

    /// Replace the script. On a compile error the current program stays
    /// installed and the error is returned.
    pub fn recompile<S: AsRef<str>>(&self, lines: &[S]) -> Result<()> {
        let installed = compile(&self.arguments, lines).map_err(|e| {
            warn!("alias '{}' kept its previous program: {}", self.name, e);
            e
        })?;

        debug!(
            "alias '{}' recompiled to {} instructions",
            self.name,
            installed.program.len()
        );
        *self.installed.write().unwrap_or_else(PoisonError::into_inner) = installed;
        Ok(())
    }

    /// Validate raw arguments and convert them to values, in declaration
    /// order. A trailing `string` argument takes every remaining word.
    pub fn bind_arguments(&self, raw: &[&str]) -> Result<Vec<Value>> {
        let expected = self.arguments.len();
        let greedy = self.arguments.last().is_some_and(|a| a.spec.is_greedy());

        let count_ok = if greedy {
            raw.len() >= expected
        } else {
            raw.len() == expected
        };
        if !count_ok {
            return Err(ErrorKind::ArgumentCount {
                expected,
                got: raw.len(),
                usage: self.syntax(),
            }
            .into());
        }

        self.arguments
            .iter()
            .enumerate()
            .map(|(i, argument)| {
                let text = if greedy && i + 1 == expected {
                    raw[i..].join(" ")
                } else {
                    raw[i].to_string()
                };
                argument.spec.bind(&text).map_err(|reason| {
                    AliasError::from(ErrorKind::InvalidArgument {
                        name: argument.name.clone(),
                        reason,
                    })
                })
            })
            .collect()
    }

    /// Bind `raw` and run the installed program
    pub fn invoke(
        &self,
        raw: &[&str],
        exec: &mut dyn CommandExecutor,
        config: VmConfig,
    ) -> Result<ExecutionOutcome> {
        let values = self.bind_arguments(raw)?;
        let (lines, program) = {
            let installed = self.read();
            (Arc::clone(&installed.lines), Arc::clone(&installed.program))
        };

        let mut env = VariableEnv::for_program(&program);
        for (slot, (value, argument)) in values.into_iter().zip(&self.arguments).enumerate() {
            env.set(slot, value.coerce(argument.spec.value_type()));
        }

        debug!("invoking alias '{}' with {:?}", self.name, raw);
        let outcome = Vm::new(config)
            .execute(&program, &mut env, exec)
            .map_err(|e| e.with_source(&lines.join("\n")))?;
        debug!(
            "alias '{}' finished: {} steps, {} commands",
            self.name, outcome.steps, outcome.commands
        );
        Ok(outcome)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Installed> {
        self.installed.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn compile<S: AsRef<str>>(arguments: &[ArgumentDeclaration], lines: &[S]) -> Result<Installed> {
    let program = Compiler::with_arguments(arguments)?.compile(lines)?;
    Ok(Installed {
        lines: lines.iter().map(|l| l.as_ref().to_string()).collect(),
        program: Arc::new(program),
    })
}

/// Aliases by name
#[derive(Debug, Default)]
pub struct AliasRegistry {
    aliases: RwLock<HashMap<String, Arc<Alias>>>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an alias, returning the one it replaced
    pub fn insert(&self, alias: Alias) -> Option<Arc<Alias>> {
        self.aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(alias.name.clone(), Arc::new(alias))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Alias>> {
        self.aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Alias>> {
        self.aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.aliases.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `name` and invoke it
    pub fn invoke(
        &self,
        name: &str,
        raw: &[&str],
        exec: &mut dyn CommandExecutor,
        config: VmConfig,
    ) -> Result<ExecutionOutcome> {
        let alias = self
            .get(name)
            .ok_or_else(|| ErrorKind::UnknownAlias(name.to_string()))?;
        alias.invoke(raw, exec, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::RecordingExecutor;

    fn declarations(text: &str) -> Vec<ArgumentDeclaration> {
        ArgumentDeclaration::parse_list(text).unwrap()
    }

    fn give() -> Alias {
        Alias::new(
            "give_stack",
            declarations("amount:int_range(1,5) target:word"),
            &["give {$target} stone {$amount}"],
        )
        .unwrap()
    }

    fn invoke(alias: &Alias, raw: &[&str]) -> (Result<ExecutionOutcome>, Vec<String>) {
        let mut exec = RecordingExecutor::new();
        let result = alias.invoke(raw, &mut exec, VmConfig::default());
        (result, exec.commands)
    }

    #[test]
    fn test_alias_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Alias>();
        assert_send_sync::<AliasRegistry>();
    }

    #[test]
    fn test_syntax() {
        assert_eq!(
            give().syntax(),
            "give_stack <amount:int_range(1,5)> <target:word>"
        );
    }

    #[test]
    fn test_invoke_binds_arguments() {
        let (result, commands) = invoke(&give(), &["3", "steve"]);
        assert_eq!(result.unwrap().commands, 1);
        assert_eq!(commands, ["give steve stone 3"]);
    }

    #[test]
    fn test_runtime_error_points_at_script_line() {
        let alias = Alias::new(
            "split",
            declarations("n:int"),
            &["say start", "each = 12 / n", "say {$each}"],
        )
        .unwrap();
        let (result, commands) = invoke(&alias, &["0"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
        assert_eq!(err.line, Some(2));
        assert_eq!(err.source_line.as_deref(), Some("each = 12 / n"));
        assert_eq!(commands, ["say start"]);
    }

    #[test]
    fn test_range_is_checked_before_running() {
        for bad in ["0", "6", "three"] {
            let (result, commands) = invoke(&give(), &[bad, "steve"]);
            assert!(matches!(
                result.unwrap_err().kind,
                ErrorKind::InvalidArgument { ref name, .. } if name == "amount"
            ));
            assert!(commands.is_empty());
        }
    }

    #[test]
    fn test_argument_count() {
        let (result, _) = invoke(&give(), &["3"]);
        let err = result.unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::ArgumentCount {
                expected: 2,
                got: 1,
                usage: "give_stack <amount:int_range(1,5)> <target:word>".to_string(),
            }
        );
        assert!(!err.is_compile_error());
    }

    #[test]
    fn test_trailing_string_is_greedy() {
        let alias = Alias::new(
            "shout",
            declarations("times:int message:string"),
            &["i = 0", "while i < times", "say {$message}", "i = i + 1", "end"],
        )
        .unwrap();

        let (result, commands) = invoke(&alias, &["2", "hello", "there", "world"]);
        result.unwrap();
        assert_eq!(commands, ["say hello there world", "say hello there world"]);

        let (result, _) = invoke(&alias, &["2"]);
        assert!(matches!(result.unwrap_err().kind, ErrorKind::ArgumentCount { .. }));
    }

    #[test]
    fn test_arguments_take_declared_type() {
        let alias = Alias::new(
            "half",
            declarations("n:double"),
            &["h = n / 2", "say {$h}"],
        )
        .unwrap();
        let (_, commands) = invoke(&alias, &["3"]);
        assert_eq!(commands, ["say 1.5"]);
    }

    #[test]
    fn test_failed_recompile_keeps_program() {
        let alias = give();
        let before = alias.program();

        let err = alias.recompile(&["if amount > 1", "say many"]).unwrap_err();
        assert!(err.is_compile_error());
        assert_eq!(alias.program(), before);
        assert_eq!(&alias.lines()[..], ["give {$target} stone {$amount}".to_string()]);

        let (_, commands) = invoke(&alias, &["2", "alex"]);
        assert_eq!(commands, ["give alex stone 2"]);

        alias.recompile(&["say {$target} gets {$amount}"]).unwrap();
        let (_, commands) = invoke(&alias, &["2", "alex"]);
        assert_eq!(commands, ["say alex gets 2"]);
    }

    #[test]
    fn test_snapshot_survives_recompile() {
        let alias = give();
        let snapshot = alias.program();
        alias.recompile(&["say replaced"]).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_ne!(alias.program(), snapshot);
    }

    #[test]
    fn test_invalid_alias_name() {
        let err = Alias::new("two words", Vec::new(), &["say hi"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidName("two words".to_string()));
    }

    #[test]
    fn test_registry() {
        let registry = AliasRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.insert(give()).is_none());
        registry.insert(Alias::new("hello", Vec::new(), &["say hello"]).unwrap());
        assert_eq!(registry.names(), ["give_stack", "hello"]);

        let mut exec = RecordingExecutor::new();
        registry
            .invoke("hello", &[], &mut exec, VmConfig::default())
            .unwrap();
        assert_eq!(exec.commands, ["say hello"]);

        let err = registry
            .invoke("missing", &[], &mut exec, VmConfig::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownAlias("missing".to_string()));

        assert!(registry.remove("hello").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_invocations() {
        let registry = AliasRegistry::new();
        registry.insert(give());

        std::thread::scope(|scope| {
            for n in 1..=5 {
                let registry = &registry;
                scope.spawn(move || {
                    let amount = n.to_string();
                    let mut exec = RecordingExecutor::new();
                    registry
                        .invoke("give_stack", &[amount.as_str(), "steve"], &mut exec, VmConfig::default())
                        .unwrap();
                    assert_eq!(exec.commands, [format!("give steve stone {}", n)]);
                });
            }
            let alias = registry.get("give_stack").unwrap();
            alias.recompile(&["give {$target} stone {$amount}"]).unwrap();
        });
    }
}

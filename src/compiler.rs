//! Compiler: script lines → Program
//!
//! Each line becomes at most one statement. Control blocks are compiled in a
//! single pass with forward jumps emitted as placeholders and patched once
//! the block's `elif`, `else` or `end` is reached.

use log::debug;

use crate::argument::{is_identifier, ArgumentDeclaration};
use crate::bytecode::{CommandTemplate, Instruction, Program, Segment};
use crate::error::{AliasError, ErrorKind, Result};
use crate::expression::{compile_condition, compile_tokens};
use crate::lexer::Lexer;
use crate::scope::{self, Scope, VariableDefinition};
use crate::token::{lookup_keyword, Comparator, Keyword, Token, TokenKind};
use crate::types::TypeTag;

/// Jump target of an instruction that hasn't been patched yet
const PLACEHOLDER: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    While,
}

/// An open `if` or `while` block
#[derive(Debug)]
struct Block {
    kind: BlockKind,
    /// Script line that opened the block, for error reporting
    line: usize,
    /// Index of the opening conditional
    start: usize,
    /// Conditional whose false branch still needs a target
    open_condition: Option<usize>,
    /// Jumps out of finished `if`/`elif` branches
    exits: Vec<usize>,
    has_else: bool,
}

/// The alias compiler
pub struct Compiler {
    /// Scope stack; declarations go into the last one
    scopes: Vec<Scope>,
    /// Slot table, in declaration order
    variables: Vec<VariableDefinition>,
    instructions: Vec<Instruction>,
    /// Script line of each instruction
    lines: Vec<usize>,
    blocks: Vec<Block>,
    /// Line being compiled
    line: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
            variables: Vec::new(),
            instructions: Vec::new(),
            lines: Vec::new(),
            blocks: Vec::new(),
            line: 0,
        }
    }

    /// Create a compiler with the alias arguments already declared, in order
    pub fn with_arguments(arguments: &[ArgumentDeclaration]) -> Result<Self> {
        let mut compiler = Self::new();
        for argument in arguments {
            check_name(&argument.name)?;
            if compiler.resolve(&argument.name).is_some() {
                return Err(ErrorKind::DuplicateDeclaration(argument.name.clone()).into());
            }
            let ty = argument.spec.value_type();
            compiler.declare(&argument.name, ty, Some(argument.clone()));
        }
        Ok(compiler)
    }

    /// Compile a whole script. Nothing is produced unless every line compiles.
    pub fn compile<S: AsRef<str>>(mut self, lines: &[S]) -> Result<Program> {
        for (i, line) in lines.iter().enumerate() {
            let text = line.as_ref();
            self.line = i + 1;
            self.compile_line(text)
                .map_err(|e| e.at_line(i + 1, text))?;
        }

        if let Some(block) = self.blocks.last() {
            let keyword = match block.kind {
                BlockKind::If => "if",
                BlockKind::While => "while",
            };
            let line = block.line;
            let text = lines.get(line - 1).map_or("", |l| l.as_ref());
            return Err(AliasError::new(ErrorKind::UnterminatedBlock { keyword, line })
                .at_line(line, text));
        }

        let len = self.instructions.len();
        debug_assert!(self
            .instructions
            .iter()
            .filter_map(Instruction::target)
            .all(|target| target <= len));

        debug!(
            "compiled {} lines into {} instructions ({} variables)",
            lines.len(),
            len,
            self.variables.len()
        );
        Ok(Program::new(self.instructions, self.lines, self.variables))
    }

    // ==================== Lines ====================

    fn compile_line(&mut self, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        let first_word = trimmed.split_whitespace().next().unwrap_or_default();
        if let Some(keyword) = lookup_keyword(first_word) {
            let tokens = Lexer::new(text).tokenize();
            // The keyword itself is the first token
            return self.compile_keyword(keyword, &tokens[1..]);
        }

        let tokens = Lexer::new(text).tokenize();
        if let Some((keyword, name, rest, equals)) = split_assignment(&tokens) {
            return self.compile_assignment(keyword, name, rest, equals);
        }

        let template = self.command_template(trimmed)?;
        self.emit(Instruction::Command(template));
        Ok(())
    }

    fn compile_keyword(&mut self, keyword: Keyword, rest: &[Token]) -> Result<()> {
        match keyword {
            Keyword::If => {
                let condition = compile_condition(rest, &self.scopes)?;
                let start = self.emit(Instruction::If {
                    condition,
                    target: PLACEHOLDER,
                });
                self.open_block(BlockKind::If, start);
            }

            Keyword::While => {
                let condition = compile_condition(rest, &self.scopes)?;
                let start = self.emit(Instruction::While {
                    condition,
                    target: PLACEHOLDER,
                });
                self.open_block(BlockKind::While, start);
            }

            Keyword::Elif => {
                let block = self.open_if("elif")?;
                let condition = compile_condition(rest, &self.scopes)?;

                let exit = self.emit_jump();
                let next = self.emit(Instruction::If {
                    condition,
                    target: PLACEHOLDER,
                });
                // A failed test falls into the elif's own test
                if let Some(open) = self.blocks[block].open_condition.replace(next) {
                    self.patch_jump(open, next);
                }
                self.blocks[block].exits.push(exit);
            }

            Keyword::Else => {
                no_arguments(keyword, rest)?;
                let block = self.open_if("else")?;

                let exit = self.emit_jump();
                let next = self.instructions.len();
                if let Some(open) = self.blocks[block].open_condition.take() {
                    self.patch_jump(open, next);
                }
                self.blocks[block].exits.push(exit);
                self.blocks[block].has_else = true;
            }

            Keyword::End => {
                no_arguments(keyword, rest)?;
                let block = self
                    .blocks
                    .pop()
                    .ok_or_else(|| AliasError::new(ErrorKind::UnmatchedEnd))?;
                self.close_block(block);
            }

            Keyword::Return => {
                no_arguments(keyword, rest)?;
                self.emit(Instruction::Return);
            }
        }
        Ok(())
    }

    fn compile_assignment(
        &mut self,
        keyword: Option<TypeTag>,
        name: &Token,
        rest: &[Token],
        equals: &Token,
    ) -> Result<()> {
        let name_text = name.ident().unwrap_or_default();
        check_name(name_text).map_err(|e| e.at_column(name.span.column))?;

        if rest.is_empty() {
            return Err(
                AliasError::new(ErrorKind::ExpectedExpression).at_column(equals.span.column)
            );
        }

        // A type keyword only matters for a variable that already exists;
        // a first assignment always takes the inferred type
        let existing = self.resolve(name_text).map(|d| (d.slot, d.ty));
        let forced = existing.map(|(_, current)| keyword.unwrap_or(current));

        if let (Some((_, from)), Some(to)) = (existing, forced) {
            if from != to && !self.blocks.is_empty() {
                return Err(AliasError::new(ErrorKind::RetypeInBlock {
                    name: name_text.to_string(),
                    from,
                    to,
                })
                .at_column(name.span.column));
            }
        }

        let (ty, expr) = compile_tokens(rest, forced, &self.scopes)?;

        let slot = match existing {
            Some((slot, current)) => {
                if current != ty {
                    self.retype(name_text, ty);
                }
                slot
            }
            None => self.declare(name_text, ty, None),
        };

        self.emit(Instruction::Assign { slot, expr, ty });
        Ok(())
    }

    /// Split a command into literal text and `{$name}` placeholders
    fn command_template(&self, text: &str) -> Result<CommandTemplate> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(open) = rest.find("{$") {
            let after = &rest[open + 2..];
            let name = after
                .find('}')
                .map(|close| &after[..close])
                .filter(|name| is_identifier(name));

            let Some(name) = name else {
                // Not a placeholder; keep it as text
                literal.push_str(&rest[..open + 2]);
                rest = after;
                continue;
            };

            let definition = self.resolve(name).ok_or_else(|| {
                let offset = text.len() - rest.len() + open;
                AliasError::new(ErrorKind::UndeclaredVariable(name.to_string()))
                    .at_column(text[..offset].chars().count() + 1)
            })?;

            literal.push_str(&rest[..open]);
            if !literal.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Variable {
                name: name.to_string(),
                slot: definition.slot,
            });
            rest = &after[name.len() + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }

        Ok(CommandTemplate {
            text: text.to_string(),
            segments,
        })
    }

    // ==================== Blocks ====================

    fn open_block(&mut self, kind: BlockKind, start: usize) {
        self.blocks.push(Block {
            kind,
            line: self.line,
            start,
            open_condition: Some(start),
            exits: Vec::new(),
            has_else: false,
        });
    }

    /// Index of the innermost block, which must be an `if` without `else`
    fn open_if(&self, keyword: &'static str) -> Result<usize> {
        match self.blocks.last() {
            Some(block) if block.kind == BlockKind::If && block.has_else => {
                Err(ErrorKind::BranchAfterElse(keyword).into())
            }
            Some(block) if block.kind == BlockKind::If => Ok(self.blocks.len() - 1),
            _ => Err(ErrorKind::BranchWithoutIf(keyword).into()),
        }
    }

    fn close_block(&mut self, block: Block) {
        match block.kind {
            BlockKind::If => {
                let end = self.instructions.len();
                if let Some(open) = block.open_condition {
                    self.patch_jump(open, end);
                }
                for exit in block.exits {
                    self.patch_jump(exit, end);
                }
            }
            BlockKind::While => {
                self.emit(Instruction::Jump {
                    target: block.start,
                });
                let end = self.instructions.len();
                self.patch_jump(block.start, end);
            }
        }
    }

    // ==================== Emission ====================

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.lines.push(self.line);
        self.instructions.len() - 1
    }

    fn emit_jump(&mut self) -> usize {
        self.emit(Instruction::Jump {
            target: PLACEHOLDER,
        })
    }

    fn patch_jump(&mut self, index: usize, target: usize) {
        self.instructions[index].patch(target);
    }

    // ==================== Variables ====================

    fn resolve(&self, name: &str) -> Option<&VariableDefinition> {
        scope::resolve(&self.scopes, name)
    }

    fn declare(&mut self, name: &str, ty: TypeTag, argument: Option<ArgumentDeclaration>) -> usize {
        let definition = VariableDefinition {
            name: name.to_string(),
            ty,
            slot: self.variables.len(),
            argument: argument.map(|a| a.spec),
        };
        let slot = definition.slot;
        self.variables.push(definition.clone());
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(definition);
        }
        slot
    }

    fn retype(&mut self, name: &str, ty: TypeTag) {
        if let Some(definition) = self.scopes.iter_mut().rev().find_map(|s| s.get_mut(name)) {
            definition.ty = ty;
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Recognise `[type] name = expr`, returning the type keyword, the name
/// token, the expression tokens and the `=` token
fn split_assignment(tokens: &[Token]) -> Option<(Option<TypeTag>, &Token, &[Token], &Token)> {
    let is_assign = |t: &Token| {
        t.kind == TokenKind::Comparator(Comparator::Equal) && t.lexeme == "="
    };

    match tokens {
        [ty, name, equals, rest @ ..] if is_assign(equals) && name.ident().is_some() => {
            let keyword = TypeTag::from_keyword(ty.ident()?)?;
            Some((Some(keyword), name, rest, equals))
        }
        [name, equals, rest @ ..] if is_assign(equals) && name.ident().is_some() => {
            Some((None, name, rest, equals))
        }
        _ => None,
    }
}

/// Reject names that can't be variables
fn check_name(name: &str) -> Result<()> {
    if !is_identifier(name) || lookup_keyword(name).is_some() || TypeTag::from_keyword(name).is_some() {
        return Err(ErrorKind::InvalidName(name.to_string()).into());
    }
    Ok(())
}

fn no_arguments(keyword: Keyword, rest: &[Token]) -> Result<()> {
    match rest.first() {
        Some(token) => {
            Err(AliasError::new(ErrorKind::TrailingInput(keyword.as_str())).at_column(token.span.column))
        }
        None => Ok(()),
    }
}

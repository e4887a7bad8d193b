//! Alias definition files
//!
//! ```text
//! Alias: give_stack
//! Permission level: 2
//! Silent: false
//! Arguments: amount:int_range(1,64) item:word
//! Command list:
//! give @s {$item} {$amount}
//! ```
//!
//! Headers come first, one `Key: value` per line; `Arguments` may be left
//! out. Every line after `Command list:` is script.

use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;

use crate::alias::Alias;
use crate::argument::ArgumentDeclaration;
use crate::error::{AliasError, ErrorKind, Result};

const ALIAS: &str = "Alias";
const PERMISSION_LEVEL: &str = "Permission level";
const SILENT: &str = "Silent";
const ARGUMENTS: &str = "Arguments";
const COMMAND_LIST: &str = "Command list";

/// A parsed alias file
#[derive(Debug, Clone, PartialEq)]
pub struct AliasFile {
    pub name: String,
    pub permission_level: u8,
    /// Whether the host should suppress command feedback
    pub silent: bool,
    pub arguments: Vec<ArgumentDeclaration>,
    pub lines: Vec<String>,
}

impl AliasFile {
    /// Parse the text of an alias file. Errors point at the offending line.
    pub fn parse(source: &str) -> Result<AliasFile> {
        let mut name = None;
        let mut permission_level = None;
        let mut silent = None;
        let mut arguments = Vec::new();
        let mut body = None;

        for (i, raw) in source.lines().enumerate() {
            let number = i + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let located = |kind: ErrorKind| AliasError::new(kind).at_line(number, raw);
            let Some((key, value)) = line.split_once(':') else {
                return Err(located(ErrorKind::InvalidHeader(line.to_string())));
            };
            let value = value.trim();

            match key.trim() {
                ALIAS => {
                    if value.is_empty() || value.contains(char::is_whitespace) {
                        return Err(located(ErrorKind::InvalidName(value.to_string())));
                    }
                    name = Some(value.to_string());
                }
                PERMISSION_LEVEL => {
                    let level = value
                        .parse::<u8>()
                        .map_err(|_| located(ErrorKind::InvalidHeader(line.to_string())))?;
                    permission_level = Some(level);
                }
                SILENT => {
                    let flag = value
                        .parse::<bool>()
                        .map_err(|_| located(ErrorKind::InvalidHeader(line.to_string())))?;
                    silent = Some(flag);
                }
                ARGUMENTS => {
                    arguments = ArgumentDeclaration::parse_list(value)
                        .map_err(|e| e.at_line(number, raw))?;
                }
                COMMAND_LIST if value.is_empty() => {
                    body = Some(i + 1);
                    break;
                }
                _ => return Err(located(ErrorKind::InvalidHeader(line.to_string()))),
            }
        }

        let name = name.ok_or(ErrorKind::MissingHeader(ALIAS))?;
        let permission_level = permission_level.ok_or(ErrorKind::MissingHeader(PERMISSION_LEVEL))?;
        let silent = silent.ok_or(ErrorKind::MissingHeader(SILENT))?;
        let body = body.ok_or(ErrorKind::MissingHeader(COMMAND_LIST))?;

        let mut lines: Vec<String> = source.lines().skip(body).map(str::to_string).collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        Ok(AliasFile {
            name,
            permission_level,
            silent,
            arguments,
            lines,
        })
    }

    /// Read and parse a file
    pub fn load(path: impl AsRef<Path>) -> Result<AliasFile> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| {
            ErrorKind::Io(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let file = Self::parse(&source)?;
        debug!("loaded alias '{}' from {}", file.name, path.display());
        Ok(file)
    }

    /// Write the file in its canonical layout
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_string()).map_err(|e| {
            AliasError::from(ErrorKind::Io(format!(
                "cannot write '{}': {}",
                path.display(),
                e
            )))
        })
    }

    /// Compile into a runnable alias. Error lines count from the first
    /// command.
    pub fn compile(&self) -> Result<Alias> {
        Alias::new(&self.name, self.arguments.clone(), &self.lines)
    }
}

impl From<&Alias> for AliasFile {
    fn from(alias: &Alias) -> Self {
        Self {
            name: alias.name().to_string(),
            permission_level: 0,
            silent: false,
            arguments: alias.arguments().to_vec(),
            lines: alias.lines().to_vec(),
        }
    }
}

impl fmt::Display for AliasFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", ALIAS, self.name)?;
        writeln!(f, "{}: {}", PERMISSION_LEVEL, self.permission_level)?;
        writeln!(f, "{}: {}", SILENT, self.silent)?;
        if !self.arguments.is_empty() {
            let declarations: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
            writeln!(f, "{}: {}", ARGUMENTS, declarations.join(" "))?;
        }
        writeln!(f, "{}:", COMMAND_LIST)?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

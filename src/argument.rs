//! Argument declarations
//!
//! Aliases take typed arguments written as `name:spec`, for example
//! `amount:int_range(1,64)` or `mode:selection(fast,slow)`. The type part decides
//! the variable type the argument binds to and validates raw input before
//! the script body runs.

use std::fmt;

use regex::Regex;

use crate::error::{AliasError, ErrorKind, Result};
use crate::types::TypeTag;
use crate::value::Value;

/// The validator part of an argument declaration
#[derive(Debug, Clone)]
pub enum ArgumentSpec {
    Int { min: i32, max: i32, ranged: bool },
    Long { min: i64, max: i64, ranged: bool },
    Float { min: f32, max: f32, ranged: bool },
    Double { min: f64, max: f64, ranged: bool },
    Boolean,
    Word,
    String,
    Regex(Regex),
    Selection(Vec<String>),
}

impl PartialEq for ArgumentSpec {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

/// Parse both bounds of a range, falling back to the type's natural limits
/// for any bound that doesn't parse
fn bounds<T: std::str::FromStr>(params: Option<&str>, natural: (T, T)) -> (T, T) {
    let Some(params) = params else {
        return natural;
    };
    let mut parts = params.splitn(2, ',').map(str::trim);
    let min = parts.next().and_then(|s| s.parse().ok());
    let max = parts.next().and_then(|s| s.parse().ok());
    (min.unwrap_or(natural.0), max.unwrap_or(natural.1))
}

impl ArgumentSpec {
    /// Parse a type keyword such as `int`, `double_range(0,1)` or
    /// `regex([a-z]+)`
    pub fn parse(text: &str) -> Result<ArgumentSpec> {
        let text = text.trim();
        let (keyword, params) = match text.find('(') {
            Some(open) => {
                let Some(inner) = text[open + 1..].strip_suffix(')') else {
                    return Err(ErrorKind::InvalidDeclaration(text.to_string()).into());
                };
                (&text[..open], Some(inner))
            }
            None => (text, None),
        };

        let spec = match (keyword, params) {
            ("int", None) => ArgumentSpec::Int {
                min: i32::MIN,
                max: i32::MAX,
                ranged: false,
            },
            ("int_range", _) => {
                let (min, max) = bounds(params, (i32::MIN, i32::MAX));
                ArgumentSpec::Int { min, max, ranged: true }
            }
            ("long", None) => ArgumentSpec::Long {
                min: i64::MIN,
                max: i64::MAX,
                ranged: false,
            },
            ("long_range", _) => {
                let (min, max) = bounds(params, (i64::MIN, i64::MAX));
                ArgumentSpec::Long { min, max, ranged: true }
            }
            ("float", None) => ArgumentSpec::Float {
                min: f32::MIN,
                max: f32::MAX,
                ranged: false,
            },
            ("float_range", _) => {
                let (min, max) = bounds(params, (f32::MIN, f32::MAX));
                ArgumentSpec::Float { min, max, ranged: true }
            }
            ("double", None) => ArgumentSpec::Double {
                min: f64::MIN,
                max: f64::MAX,
                ranged: false,
            },
            ("double_range", _) => {
                let (min, max) = bounds(params, (f64::MIN, f64::MAX));
                ArgumentSpec::Double { min, max, ranged: true }
            }
            ("boolean", None) => ArgumentSpec::Boolean,
            ("word", None) => ArgumentSpec::Word,
            ("string", None) => ArgumentSpec::String,
            ("regex", Some(pattern)) => {
                let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                    AliasError::new(ErrorKind::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    })
                })?;
                ArgumentSpec::Regex(regex)
            }
            ("selection", Some(options)) => {
                let options: Vec<String> = options
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect();
                if options.is_empty() {
                    return Err(ErrorKind::EmptySelection(text.to_string()).into());
                }
                ArgumentSpec::Selection(options)
            }
            (
                "int" | "long" | "float" | "double" | "boolean" | "word" | "string" | "regex"
                | "selection",
                _,
            ) => return Err(ErrorKind::InvalidDeclaration(text.to_string()).into()),
            _ => return Err(ErrorKind::UnknownArgumentType(keyword.to_string()).into()),
        };
        Ok(spec)
    }

    /// Type of the variable this argument binds to
    pub fn value_type(&self) -> TypeTag {
        match self {
            ArgumentSpec::Int { .. } => TypeTag::Int,
            ArgumentSpec::Long { .. } => TypeTag::Long,
            ArgumentSpec::Float { .. } => TypeTag::Float,
            ArgumentSpec::Double { .. } => TypeTag::Double,
            _ => TypeTag::String,
        }
    }

    /// Whether the argument swallows the remaining input, spaces included
    pub fn is_greedy(&self) -> bool {
        matches!(self, ArgumentSpec::String)
    }

    /// Validate raw input and convert it to a runtime value.
    /// The error is a human-readable reason.
    pub fn bind(&self, raw: &str) -> std::result::Result<Value, String> {
        fn check<T: PartialOrd + Copy + fmt::Display>(n: T, min: T, max: T) -> std::result::Result<(), String> {
            // NaN is outside every range
            if !(min..=max).contains(&n) {
                Err(format!("{} is not between {} and {}", n, min, max))
            } else {
                Ok(())
            }
        }

        match self {
            ArgumentSpec::Int { min, max, .. } => {
                let n: i32 = raw
                    .parse()
                    .map_err(|_| format!("'{}' is not an integer", raw))?;
                check(n, *min, *max)?;
                Ok(Value::Long(n as i64))
            }
            ArgumentSpec::Long { min, max, .. } => {
                let n: i64 = raw
                    .parse()
                    .map_err(|_| format!("'{}' is not a long integer", raw))?;
                check(n, *min, *max)?;
                Ok(Value::Long(n))
            }
            ArgumentSpec::Float { min, max, .. } => {
                let n: f32 = raw
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", raw))?;
                check(n, *min, *max)?;
                Ok(Value::Double(n as f64))
            }
            ArgumentSpec::Double { min, max, .. } => {
                let n: f64 = raw
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", raw))?;
                check(n, *min, *max)?;
                Ok(Value::Double(n))
            }
            ArgumentSpec::Boolean => match raw {
                "true" | "false" => Ok(Value::Str(raw.to_string())),
                _ => Err(format!("'{}' is not true or false", raw)),
            },
            ArgumentSpec::Word => {
                if raw.is_empty() || raw.contains(char::is_whitespace) {
                    Err(format!("'{}' is not a single word", raw))
                } else {
                    Ok(Value::Str(raw.to_string()))
                }
            }
            ArgumentSpec::String => Ok(Value::Str(raw.to_string())),
            ArgumentSpec::Regex(regex) => {
                if regex.is_match(raw) {
                    Ok(Value::Str(raw.to_string()))
                } else {
                    Err(format!("'{}' does not match {}", raw, self))
                }
            }
            ArgumentSpec::Selection(options) => {
                if options.iter().any(|o| o == raw) {
                    Ok(Value::Str(raw.to_string()))
                } else {
                    Err(format!("'{}' is not one of {}", raw, options.join(", ")))
                }
            }
        }
    }
}

impl fmt::Display for ArgumentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentSpec::Int { min, max, ranged: true } => write!(f, "int_range({},{})", min, max),
            ArgumentSpec::Int { .. } => write!(f, "int"),
            ArgumentSpec::Long { min, max, ranged: true } => write!(f, "long_range({},{})", min, max),
            ArgumentSpec::Long { .. } => write!(f, "long"),
            ArgumentSpec::Float { min, max, ranged: true } => write!(f, "float_range({},{})", min, max),
            ArgumentSpec::Float { .. } => write!(f, "float"),
            ArgumentSpec::Double { min, max, ranged: true } => {
                write!(f, "double_range({},{})", min, max)
            }
            ArgumentSpec::Double { .. } => write!(f, "double"),
            ArgumentSpec::Boolean => write!(f, "boolean"),
            ArgumentSpec::Word => write!(f, "word"),
            ArgumentSpec::String => write!(f, "string"),
            ArgumentSpec::Regex(regex) => {
                let pattern = regex.as_str();
                let inner = pattern
                    .strip_prefix("^(?:")
                    .and_then(|p| p.strip_suffix(")$"))
                    .unwrap_or(pattern);
                write!(f, "regex({})", inner)
            }
            ArgumentSpec::Selection(options) => write!(f, "selection({})", options.join(",")),
        }
    }
}

/// A named argument, as declared on an alias
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDeclaration {
    pub name: String,
    pub spec: ArgumentSpec,
}

impl ArgumentDeclaration {
    pub fn new(name: &str, spec: ArgumentSpec) -> Self {
        Self {
            name: name.to_string(),
            spec,
        }
    }

    /// Parse `name:spec`
    pub fn parse(text: &str) -> Result<ArgumentDeclaration> {
        let Some((name, spec)) = text.split_once(':') else {
            return Err(ErrorKind::InvalidDeclaration(text.to_string()).into());
        };
        let name = name.trim();
        if !is_identifier(name) {
            return Err(ErrorKind::InvalidName(name.to_string()).into());
        }
        Ok(ArgumentDeclaration::new(name, ArgumentSpec::parse(spec)?))
    }

    /// Parse a whitespace-separated declaration list. Whitespace inside
    /// parentheses belongs to the declaration.
    pub fn parse_list(text: &str) -> Result<Vec<ArgumentDeclaration>> {
        let mut declarations = Vec::new();
        let mut depth = 0usize;
        let mut start = None;

        for (i, c) in text.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                c if c.is_whitespace() && depth == 0 => {
                    if let Some(s) = start.take() {
                        declarations.push(ArgumentDeclaration::parse(&text[s..i])?);
                    }
                    continue;
                }
                _ => {}
            }
            start.get_or_insert(i);
        }
        if let Some(s) = start {
            declarations.push(ArgumentDeclaration::parse(&text[s..])?);
        }
        Ok(declarations)
    }
}

impl fmt::Display for ArgumentDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.spec)
    }
}

/// Whether `name` is usable as a variable name
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

//! Expression compiler: infix tokens → postfix
//!
//! A shunting-yard pass that also infers the static type of the expression.
//! Parentheses never reach the operator stack; instead every operator's
//! precedence is raised by `3 * depth`, so anything nested deeper always
//! binds tighter than what surrounds it.

use crate::bytecode::{Condition, Expression, PostfixItem};
use crate::error::{AliasError, ErrorKind, Result};
use crate::lexer::Lexer;
use crate::scope::{self, Scope};
use crate::token::{Operator, Span, Token, TokenKind};
use crate::types::TypeTag;
use crate::value::Value;

/// Highest base precedence; one parenthesis level adds this much
const LEVEL_STRIDE: usize = 3;

/// Compile an expression from source text
pub fn compile_expression(
    source: &str,
    forced: Option<TypeTag>,
    scopes: &[Scope],
) -> Result<(TypeTag, Expression)> {
    let tokens = Lexer::new(source).tokenize();
    compile_tokens(&tokens, forced, scopes)
}

/// Compile an already tokenized expression.
///
/// With `forced` set, the result takes that type as long as it is at least as
/// wide as the inferred one; asking for a narrower type is an error.
pub fn compile_tokens(
    tokens: &[Token],
    forced: Option<TypeTag>,
    scopes: &[Scope],
) -> Result<(TypeTag, Expression)> {
    let mut compiler = ExpressionCompiler::new(scopes);
    for token in tokens {
        compiler
            .token(token)
            .map_err(|e| e.at_column(token.span.column))?;
    }
    let (natural, items) = compiler.finish()?;

    let ty = match forced {
        Some(forced) if forced < natural => {
            return Err(AliasError::new(ErrorKind::Narrowing {
                from: natural,
                to: forced,
            })
            .at_column(tokens.first().map_or(1, |t| t.span.column)));
        }
        Some(forced) => forced,
        None => natural,
    };

    Ok((ty, Expression { items, ty }))
}

/// Compile `left <cmp> right`; the comparator must appear exactly once
pub fn compile_condition(tokens: &[Token], scopes: &[Scope]) -> Result<Condition> {
    let mut comparators = tokens.iter().enumerate().filter_map(|(i, t)| match t.kind {
        TokenKind::Comparator(cmp) => Some((i, cmp, t.span)),
        _ => None,
    });

    let Some((index, comparator, span)) = comparators.next() else {
        return Err(AliasError::new(ErrorKind::ExpectedComparator));
    };
    if let Some((_, _, extra)) = comparators.next() {
        return Err(AliasError::new(ErrorKind::MultipleComparators).at_column(extra.column));
    }

    let (left_ty, left) = compile_side(&tokens[..index], span, scopes)?;
    let (right_ty, right) = compile_side(&tokens[index + 1..], span, scopes)?;

    if (left_ty == TypeTag::String || right_ty == TypeTag::String) && !comparator.is_equality() {
        return Err(AliasError::new(ErrorKind::StringComparison(comparator)).at_column(span.column));
    }

    Ok(Condition {
        left,
        comparator,
        right,
    })
}

/// One side of a condition; an empty side is reported at the comparator
fn compile_side(
    tokens: &[Token],
    comparator: Span,
    scopes: &[Scope],
) -> Result<(TypeTag, Expression)> {
    if tokens.is_empty() {
        return Err(AliasError::new(ErrorKind::ExpectedExpression).at_column(comparator.column));
    }
    compile_tokens(tokens, None, scopes)
}

/// Parse a numeric literal into its value and natural type.
///
/// Suffixes pick the type directly (`f` float, `d` double, `l` long).
/// Otherwise a literal whose value is whole (`3`, `2.0`) is an int, or a
/// long when it doesn't fit in 32 bits; a fractional value, or one too large
/// for a long, is a double.
pub fn parse_number(lexeme: &str) -> Result<(Value, TypeTag)> {
    let invalid = || AliasError::new(ErrorKind::InvalidNumber(lexeme.to_string()));

    let (body, suffix) = match lexeme.chars().last() {
        Some(c @ ('f' | 'F' | 'd' | 'D' | 'l' | 'L')) => {
            (&lexeme[..lexeme.len() - 1], Some(c.to_ascii_lowercase()))
        }
        _ => (lexeme, None),
    };

    match suffix {
        Some('f') => {
            let n: f32 = body.parse().map_err(|_| invalid())?;
            Ok((Value::Double(n as f64), TypeTag::Float))
        }
        Some('d') => {
            let n: f64 = body.parse().map_err(|_| invalid())?;
            Ok((Value::Double(n), TypeTag::Double))
        }
        Some(_) => {
            let n: i64 = body.parse().map_err(|_| invalid())?;
            Ok((Value::Long(n), TypeTag::Long))
        }
        None => {
            let n = match body.parse::<i64>() {
                Ok(n) => n,
                Err(_) => {
                    let n: f64 = body.parse().map_err(|_| invalid())?;
                    let in_range = n >= i64::MIN as f64 && n < i64::MAX as f64;
                    if n.trunc() != n || !in_range {
                        return Ok((Value::Double(n), TypeTag::Double));
                    }
                    n as i64
                }
            };
            let ty = if i32::try_from(n).is_ok() {
                TypeTag::Int
            } else {
                TypeTag::Long
            };
            Ok((Value::Long(n), ty))
        }
    }
}

struct PendingOperator {
    op: Operator,
    precedence: usize,
}

/// Shunting-yard state for one expression
struct ExpressionCompiler<'s> {
    scopes: &'s [Scope],
    output: Vec<PostfixItem>,
    operators: Vec<PendingOperator>,
    depth: usize,
    inferred: Option<TypeTag>,
    /// First operator other than `+`, for the string check
    non_additive: Option<Operator>,
    operand_expected: bool,
    last_operator: Option<Operator>,
    last_was_open: bool,
    seen_any: bool,
}

impl<'s> ExpressionCompiler<'s> {
    fn new(scopes: &'s [Scope]) -> Self {
        Self {
            scopes,
            output: Vec::new(),
            operators: Vec::new(),
            depth: 0,
            inferred: None,
            non_additive: None,
            operand_expected: true,
            last_operator: None,
            last_was_open: false,
            seen_any: false,
        }
    }

    fn token(&mut self, token: &Token) -> Result<()> {
        let was_open = std::mem::replace(&mut self.last_was_open, false);
        self.seen_any = true;

        match &token.kind {
            TokenKind::Number(lexeme) => {
                let (value, ty) = parse_number(lexeme)?;
                self.operand(PostfixItem::Constant(value), ty)
            }
            TokenKind::String(text) => {
                self.operand(PostfixItem::Constant(Value::Str(text.clone())), TypeTag::String)
            }
            TokenKind::Ident(name) => {
                let definition = scope::resolve(self.scopes, name)
                    .ok_or_else(|| AliasError::new(ErrorKind::UndeclaredVariable(name.clone())))?;
                self.operand(PostfixItem::Variable(definition.slot), definition.ty)
            }
            TokenKind::Operator(op) => self.operator(*op),
            TokenKind::LeftParen => {
                if !self.operand_expected {
                    return Err(AliasError::new(ErrorKind::OperandAfterOperand));
                }
                self.depth += 1;
                self.last_was_open = true;
                Ok(())
            }
            TokenKind::RightParen => {
                if self.depth == 0 {
                    return Err(AliasError::new(ErrorKind::UnmatchedParenthesis));
                }
                if self.operand_expected {
                    return Err(match (was_open, self.last_operator) {
                        (false, Some(op)) => AliasError::new(ErrorKind::TrailingOperator(op)),
                        _ => AliasError::new(ErrorKind::ExpectedExpression),
                    });
                }
                self.depth -= 1;
                Ok(())
            }
            TokenKind::Comparator(cmp) => Err(AliasError::new(ErrorKind::UnexpectedToken(
                cmp.symbol().to_string(),
            ))),
            TokenKind::Unterminated(_) => Err(AliasError::new(ErrorKind::UnterminatedString)),
            TokenKind::Unknown(text) => {
                Err(AliasError::new(ErrorKind::UnexpectedToken(text.clone())))
            }
        }
    }

    fn operand(&mut self, item: PostfixItem, ty: TypeTag) -> Result<()> {
        if !self.operand_expected {
            return Err(AliasError::new(ErrorKind::OperandAfterOperand));
        }
        self.output.push(item);
        self.inferred = Some(self.inferred.map_or(ty, |t| t.promote(ty)));
        self.operand_expected = false;
        Ok(())
    }

    fn operator(&mut self, op: Operator) -> Result<()> {
        if self.operand_expected {
            return Err(if self.output.is_empty() && self.last_operator.is_none() {
                AliasError::new(ErrorKind::LeadingOperator(op))
            } else {
                AliasError::new(ErrorKind::OperatorAfterOperator)
            });
        }

        let precedence = op.precedence() + LEVEL_STRIDE * self.depth;
        while let Some(top) = self.operators.last() {
            let binds_tighter = top.precedence > precedence
                || (top.precedence == precedence && !op.is_right_associative());
            if !binds_tighter {
                break;
            }
            if let Some(top) = self.operators.pop() {
                self.output.push(PostfixItem::Operator(top.op));
            }
        }
        self.operators.push(PendingOperator { op, precedence });

        if op != Operator::Add {
            self.non_additive.get_or_insert(op);
        }
        self.last_operator = Some(op);
        self.operand_expected = true;
        Ok(())
    }

    fn finish(mut self) -> Result<(TypeTag, Vec<PostfixItem>)> {
        if !self.seen_any {
            return Err(AliasError::new(ErrorKind::ExpectedExpression));
        }
        if self.operand_expected {
            return Err(match self.last_operator {
                Some(op) if !self.last_was_open => AliasError::new(ErrorKind::TrailingOperator(op)),
                _ => AliasError::new(ErrorKind::ExpectedExpression),
            });
        }
        if self.depth != 0 {
            return Err(AliasError::new(ErrorKind::UnmatchedParenthesis));
        }

        while let Some(pending) = self.operators.pop() {
            self.output.push(PostfixItem::Operator(pending.op));
        }

        let ty = self.inferred.unwrap_or(TypeTag::Int);
        if ty == TypeTag::String {
            if let Some(op) = self.non_additive {
                return Err(AliasError::new(ErrorKind::StringOperator(op)));
            }
        }
        Ok((ty, self.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::VariableDefinition;
    use crate::token::Comparator;

    fn scopes() -> Vec<Scope> {
        let mut scope = Scope::new();
        for (slot, (name, ty)) in [("i", TypeTag::Int), ("l", TypeTag::Long), ("s", TypeTag::String)]
            .into_iter()
            .enumerate()
        {
            scope.insert(VariableDefinition {
                name: name.to_string(),
                ty,
                slot,
                argument: None,
            });
        }
        vec![scope]
    }

    fn compile(source: &str) -> Result<(TypeTag, Expression)> {
        compile_expression(source, None, &scopes())
    }

    fn ty(source: &str) -> TypeTag {
        compile(source).unwrap().0
    }

    fn kind(source: &str) -> ErrorKind {
        compile(source).unwrap_err().kind
    }

    fn rpn(source: &str) -> String {
        let (_, expr) = compile(source).unwrap();
        let parts: Vec<String> = expr
            .items
            .iter()
            .map(|item| match item {
                PostfixItem::Constant(v) => v.to_string(),
                PostfixItem::Variable(slot) => format!("${}", slot),
                PostfixItem::Operator(op) => op.to_string(),
            })
            .collect();
        parts.join(" ")
    }

    #[test]
    fn test_precedence() {
        assert_eq!(rpn("1 + 2 * 3"), "1 2 3 * +");
        assert_eq!(rpn("(1 + 2) * 3"), "1 2 + 3 *");
        assert_eq!(rpn("10 - 4 - 3"), "10 4 - 3 -");
        assert_eq!(rpn("2 ^ 3 ^ 2"), "2 3 2 ^ ^");
        assert_eq!(rpn("(1 + 2) * (3 + 4)"), "1 2 + 3 4 + *");
        assert_eq!(rpn("((i))"), "$0");
    }

    #[test]
    fn test_parenthesis_beats_power() {
        assert_eq!(rpn("2 ^ (1 + 1)"), "2 1 1 + ^");
        assert_eq!(rpn("(2 ^ 2) * 3"), "2 2 ^ 3 *");
    }

    #[test]
    fn test_type_inference() {
        assert_eq!(ty("1 + 2"), TypeTag::Int);
        assert_eq!(ty("i + l"), TypeTag::Long);
        assert_eq!(ty("3000000000"), TypeTag::Long);
        assert_eq!(ty("7L"), TypeTag::Long);
        assert_eq!(ty("1.5f * 2"), TypeTag::Float);
        assert_eq!(ty("1.5 + 2f"), TypeTag::Double);
        assert_eq!(ty("99999999999999999999"), TypeTag::Double);
        assert_eq!(ty("s + 1"), TypeTag::String);
        assert_eq!(ty("\"a\" + \"b\""), TypeTag::String);
    }

    #[test]
    fn test_forced_type() {
        let (ty, expr) = compile_expression("1 + 2", Some(TypeTag::Double), &scopes()).unwrap();
        assert_eq!(ty, TypeTag::Double);
        assert_eq!(expr.ty, TypeTag::Double);

        let err = compile_expression("1.5", Some(TypeTag::Int), &scopes()).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Narrowing {
                from: TypeTag::Double,
                to: TypeTag::Int
            }
        );
    }

    #[test]
    fn test_string_only_concatenates() {
        assert_eq!(kind("\"a\" - \"b\""), ErrorKind::StringOperator(Operator::Subtract));
        assert_eq!(kind("s * 2"), ErrorKind::StringOperator(Operator::Multiply));
        assert_eq!(kind("s + 2 ^ 2"), ErrorKind::StringOperator(Operator::Power));
    }

    #[test]
    fn test_alternation_errors() {
        assert_eq!(kind("1 2"), ErrorKind::OperandAfterOperand);
        assert_eq!(kind("i (1)"), ErrorKind::OperandAfterOperand);
        assert_eq!(kind("1 + * 2"), ErrorKind::OperatorAfterOperator);
        assert_eq!(kind("* 2"), ErrorKind::LeadingOperator(Operator::Multiply));
        assert_eq!(kind("1 +"), ErrorKind::TrailingOperator(Operator::Add));
        assert_eq!(kind("(1 +)"), ErrorKind::TrailingOperator(Operator::Add));
        assert_eq!(kind("()"), ErrorKind::ExpectedExpression);
        assert_eq!(kind(""), ErrorKind::ExpectedExpression);
    }

    #[test]
    fn test_parenthesis_errors() {
        assert_eq!(kind("(1 + 2"), ErrorKind::UnmatchedParenthesis);
        assert_eq!(kind("1 + 2)"), ErrorKind::UnmatchedParenthesis);
    }

    #[test]
    fn test_undeclared_and_malformed() {
        assert_eq!(kind("i + nope"), ErrorKind::UndeclaredVariable("nope".to_string()));
        assert_eq!(kind("\"open"), ErrorKind::UnterminatedString);
        assert_eq!(kind("1 @ 2"), ErrorKind::UnexpectedToken("@".to_string()));
    }

    #[test]
    fn test_error_column() {
        let err = compile("i + nope").unwrap_err();
        assert_eq!(err.column, Some(5));
    }

    #[test]
    fn test_negative_literals() {
        assert_eq!(rpn("-5 + 2"), "-5 2 +");
        assert_eq!(rpn("3 - -5"), "3 -5 -");
        assert_eq!(kind("- i"), ErrorKind::LeadingOperator(Operator::Subtract));
    }

    #[test]
    fn test_condition() {
        let tokens = Lexer::new("i + 1 >= l * 2").tokenize();
        let condition = compile_condition(&tokens, &scopes()).unwrap();
        assert_eq!(condition.comparator, Comparator::GreaterEqual);
        assert_eq!(condition.left.ty, TypeTag::Int);
        assert_eq!(condition.right.ty, TypeTag::Long);

        let tokens = Lexer::new("s < \"b\"").tokenize();
        assert_eq!(
            compile_condition(&tokens, &scopes()).unwrap_err().kind,
            ErrorKind::StringComparison(Comparator::Less)
        );

        let tokens = Lexer::new("i + 1").tokenize();
        assert_eq!(
            compile_condition(&tokens, &scopes()).unwrap_err().kind,
            ErrorKind::ExpectedComparator
        );

        let tokens = Lexer::new("i < 1 < 2").tokenize();
        assert_eq!(
            compile_condition(&tokens, &scopes()).unwrap_err().kind,
            ErrorKind::MultipleComparators
        );

        let tokens = Lexer::new("< 2").tokenize();
        assert_eq!(
            compile_condition(&tokens, &scopes()).unwrap_err().kind,
            ErrorKind::ExpectedExpression
        );
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42").unwrap(), (Value::Long(42), TypeTag::Int));
        assert_eq!(parse_number("-2147483649").unwrap().1, TypeTag::Long);
        assert_eq!(parse_number("2.0").unwrap(), (Value::Long(2), TypeTag::Int));
        assert_eq!(parse_number("2.5").unwrap(), (Value::Double(2.5), TypeTag::Double));
        assert_eq!(parse_number("5000000000.0").unwrap().1, TypeTag::Long);
        assert_eq!(parse_number("1e300").unwrap().1, TypeTag::Double);
        assert_eq!(parse_number("0.5f").unwrap().1, TypeTag::Float);
        assert_eq!(parse_number("3D").unwrap(), (Value::Double(3.0), TypeTag::Double));
        assert!(parse_number("1.5L").is_err());
    }
}

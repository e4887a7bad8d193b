//! Lexer for alias script lines
//!
//! Converts one line of source into a lazy stream of tokens. Malformed input
//! is not rejected here; it comes out as `Unknown`/`Unterminated` tokens and
//! the expression compiler reports it.

use crate::token::{Comparator, Operator, Span, Token, TokenKind};

/// The lexer state
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    column: usize,
    /// Whether the next token sits where an operand is expected, which lets
    /// `-` glue onto a following numeric literal.
    operand_expected: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer over one line
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            column: 1,
            operand_expected: true,
        }
    }

    /// Tokenize the entire line
    pub fn tokenize(self) -> Vec<Token> {
        self.collect()
    }

    /// Get the next token
    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace();

        let &(start_pos, ch) = self.chars.peek()?;
        let start_column = self.column;

        let kind = match ch {
            '(' => {
                self.advance();
                TokenKind::LeftParen
            }
            ')' => {
                self.advance();
                TokenKind::RightParen
            }

            '-' if self.operand_expected && self.digit_follows() => self.scan_number(),

            c if Operator::from_char(c).is_some() => {
                self.advance();
                match Operator::from_char(c) {
                    Some(op) => TokenKind::Operator(op),
                    None => TokenKind::Unknown(c.to_string()),
                }
            }

            '=' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                }
                TokenKind::Comparator(Comparator::Equal)
            }
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::Comparator(Comparator::NotEqual)
                } else {
                    TokenKind::Unknown("!".to_string())
                }
            }
            '<' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::Comparator(Comparator::LessEqual)
                } else {
                    TokenKind::Comparator(Comparator::Less)
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::Comparator(Comparator::GreaterEqual)
                } else {
                    TokenKind::Comparator(Comparator::Greater)
                }
            }

            '"' => self.scan_string(),

            c if c.is_ascii_digit() => self.scan_number(),

            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),

            other => {
                self.advance();
                TokenKind::Unknown(other.to_string())
            }
        };

        self.operand_expected = matches!(
            kind,
            TokenKind::Operator(_) | TokenKind::Comparator(_) | TokenKind::LeftParen
        );

        let lexeme = self.source[start_pos..self.current_pos].to_string();
        Some(Token::new(kind, Span::new(start_column), lexeme))
    }

    /// Advance and return the current character
    fn advance(&mut self) -> Option<char> {
        let (pos, ch) = self.chars.next()?;
        self.current_pos = pos + ch.len_utf8();
        self.column += 1;
        Some(ch)
    }

    /// Peek at the next character without advancing
    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    /// Whether the character after the current one is an ASCII digit
    fn digit_follows(&self) -> bool {
        self.source[self.current_pos..]
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    /// Scan a string literal; `\"` does not terminate it
    fn scan_string(&mut self) -> TokenKind {
        // Consume opening quote
        self.advance();

        let mut value = String::new();
        while let Some(c) = self.advance() {
            match c {
                '"' => return TokenKind::String(value),
                '\\' => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                    None => break,
                },
                other => value.push(other),
            }
        }

        TokenKind::Unterminated(value)
    }

    /// Scan a number literal: optional sign, digits, optional fraction and
    /// an optional type suffix
    fn scan_number(&mut self) -> TokenKind {
        let start = self.current_pos;

        if self.peek_char() == Some('-') {
            self.advance();
        }
        self.consume_digits();

        if self.peek_char() == Some('.') && self.digit_follows() {
            self.advance();
            self.consume_digits();
        }

        if matches!(
            self.peek_char(),
            Some('f' | 'F' | 'd' | 'D' | 'l' | 'L')
        ) {
            self.advance();
        }

        // A literal running straight into a word is malformed
        if self
            .peek_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            while self
                .peek_char()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                self.advance();
            }
            return TokenKind::Unknown(self.source[start..self.current_pos].to_string());
        }

        TokenKind::Number(self.source[start..self.current_pos].to_string())
    }

    fn consume_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Scan an identifier
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.current_pos;

        while self
            .peek_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        TokenKind::Ident(self.source[start..self.current_pos].to_string())
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).map(|t| t.kind).collect()
    }

    fn num(s: &str) -> TokenKind {
        TokenKind::Number(s.to_string())
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("+ - * / % ^ ( )");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Operator(Operator::Add),
                TokenKind::Operator(Operator::Subtract),
                TokenKind::Operator(Operator::Multiply),
                TokenKind::Operator(Operator::Divide),
                TokenKind::Operator(Operator::Modulo),
                TokenKind::Operator(Operator::Power),
                TokenKind::LeftParen,
                TokenKind::RightParen,
            ]
        );
    }

    #[test]
    fn test_comparators() {
        let tokens = tokenize("= == != < <= > >=");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Comparator(Comparator::Equal),
                TokenKind::Comparator(Comparator::Equal),
                TokenKind::Comparator(Comparator::NotEqual),
                TokenKind::Comparator(Comparator::Less),
                TokenKind::Comparator(Comparator::LessEqual),
                TokenKind::Comparator(Comparator::Greater),
                TokenKind::Comparator(Comparator::GreaterEqual),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("42 3.14 2f 7L 1.5d");
        assert_eq!(
            tokens,
            vec![num("42"), num("3.14"), num("2f"), num("7L"), num("1.5d")]
        );
    }

    #[test]
    fn test_negative_literal_only_in_operand_position() {
        assert_eq!(
            tokenize("x -5"),
            vec![
                TokenKind::Ident("x".to_string()),
                TokenKind::Operator(Operator::Subtract),
                num("5"),
            ]
        );
        assert_eq!(
            tokenize("3 - -5"),
            vec![num("3"), TokenKind::Operator(Operator::Subtract), num("-5")]
        );
        assert_eq!(tokenize("(-2)")[1], num("-2"));
    }

    #[test]
    fn test_strings() {
        let tokens = tokenize(r#""hello" "say \"hi\"""#);
        assert_eq!(
            tokens,
            vec![
                TokenKind::String("hello".to_string()),
                TokenKind::String("say \"hi\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_malformed_input_is_tokenized() {
        assert_eq!(
            tokenize(r#""open"#),
            vec![TokenKind::Unterminated("open".to_string())]
        );
        assert_eq!(tokenize("@")[0], TokenKind::Unknown("@".to_string()));
        assert_eq!(tokenize("12abc")[0], TokenKind::Unknown("12abc".to_string()));
    }

    #[test]
    fn test_columns() {
        let tokens: Vec<_> = Lexer::new("a  +  bb").collect();
        let columns: Vec<_> = tokens.iter().map(|t| t.span.column).collect();
        assert_eq!(columns, vec![1, 4, 7]);
        assert_eq!(tokens[2].lexeme, "bb");
    }
}

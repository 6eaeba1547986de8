//! FEEL lexer — tokenizes input strings
//!
//! Converts FEEL expression/unary-test source into a stream of tokens
//! (§4.1). Hand-rolled char-by-char scanning, not a generated lexer —
//! the grammar is small and irregular enough (multi-word keywords,
//! backtick identifiers, non-nesting block comments) that a direct scan
//! reads more clearly than a table-driven one.

use crate::error::{Error, Result};
use crate::token::{Token, TokenType};

#[derive(Clone)]
pub struct Lexer {
    #[allow(dead_code)]
    input: String,
    position: usize,
    line: usize,
    column: usize,
    chars: Vec<char>,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: String) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input,
            position: 0,
            line: 1,
            column: 1,
            chars,
            current_char,
        }
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
        self.current_char = self.chars.get(self.position).copied();
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Line comments (`//`) and block comments (`/* */`, non-nesting — §4.1).
    fn skip_comment(&mut self) -> Result<()> {
        if self.current_char == Some('/') && self.peek() == Some('/') {
            self.advance();
            self.advance();
            while let Some(c) = self.current_char {
                if c == '\n' {
                    self.advance();
                    break;
                }
                self.advance();
            }
            Ok(())
        } else if self.current_char == Some('/') && self.peek() == Some('*') {
            self.advance();
            self.advance();
            let mut found_end = false;
            while let Some(c) = self.current_char {
                if c == '*' && self.peek() == Some('/') {
                    self.advance();
                    self.advance();
                    found_end = true;
                    break;
                }
                self.advance();
            }
            if !found_end {
                return Err(Error::ParseError("unterminated block comment".into()));
            }
            Ok(())
        } else {
            Ok(())
        }
    }

    fn read_identifier(&mut self) -> String {
        let start_pos = self.position;
        while let Some(c) = self.current_char {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        self.chars[start_pos..self.position].iter().collect()
    }

    /// `` `an identifier with any character` `` — backtick-delimited, with
    /// a doubled backtick as the only escape (§4.1).
    fn read_delimited_identifier(&mut self) -> Result<String> {
        self.advance(); // opening backtick
        let mut value = String::new();
        while let Some(c) = self.current_char {
            if c == '`' {
                if self.peek() == Some('`') {
                    value.push('`');
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Ok(value);
                }
            } else {
                value.push(c);
                self.advance();
            }
        }
        Err(Error::ParseError("unterminated delimited identifier".into()))
    }

    /// Double-quoted string literal with `\"`, `\\`, `\n`, `\t`, `\r` and
    /// `\uXXXX` escapes — scanned in one pass, unlike the protect/
    /// substitute/restore approach some FEEL engines use for the `\"` case,
    /// since a direct escape switch is equivalent and simpler here.
    fn read_string(&mut self) -> Result<String> {
        self.advance(); // opening quote
        let mut value = String::new();
        while let Some(c) = self.current_char {
            match c {
                '"' => {
                    self.advance();
                    return Ok(value);
                }
                '\\' => {
                    self.advance();
                    let Some(escaped) = self.current_char else {
                        return Err(Error::ParseError("incomplete escape sequence".into()));
                    };
                    match escaped {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'u' => {
                            self.advance();
                            let mut hex = String::new();
                            for _ in 0..4 {
                                match self.current_char {
                                    Some(h) if h.is_ascii_hexdigit() => {
                                        hex.push(h);
                                        self.advance();
                                    }
                                    _ => return Err(Error::ParseError("invalid unicode escape".into())),
                                }
                            }
                            let code = u32::from_str_radix(&hex, 16)
                                .map_err(|_| Error::ParseError("invalid unicode code point".into()))?;
                            value.push(
                                char::from_u32(code)
                                    .ok_or_else(|| Error::ParseError("invalid unicode character".into()))?,
                            );
                            continue;
                        }
                        other => value.push(other),
                    }
                    self.advance();
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Err(Error::ParseError("unterminated string literal".into()))
    }

    /// FEEL numbers have no scientific notation and no type suffix: digits,
    /// an optional `.digits` fraction (§4.1).
    fn read_number(&mut self) -> String {
        let start_pos = self.position;
        while let Some(c) = self.current_char {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        if self.current_char == Some('.') {
            if let Some(next) = self.peek() {
                if next.is_ascii_digit() {
                    self.advance();
                    while let Some(c) = self.current_char {
                        if c.is_ascii_digit() {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
            }
        }
        self.chars[start_pos..self.position].iter().collect()
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            if self.current_char == Some('/') && (self.peek() == Some('/') || self.peek() == Some('*')) {
                if let Err(e) = self.skip_comment() {
                    return Token::error(format!("comment error: {e}"), self.position, self.line, self.column);
                }
                continue;
            }
            break;
        }

        let position = self.position;
        let line = self.line;
        let column = self.column;

        let Some(c) = self.current_char else {
            return Token::eof(position, line, column);
        };

        macro_rules! single {
            ($tt:expr, $s:expr) => {{
                self.advance();
                Token::new($tt, $s.into(), position, line, column)
            }};
        }

        match c {
            '.' => {
                self.advance();
                if self.current_char == Some('.') {
                    self.advance();
                    Token::new(TokenType::DotDot, "..".into(), position, line, column)
                } else {
                    Token::new(TokenType::Dot, ".".into(), position, line, column)
                }
            }
            '[' => single!(TokenType::OpenBracket, "["),
            ']' => single!(TokenType::CloseBracket, "]"),
            '(' => single!(TokenType::OpenParen, "("),
            ')' => single!(TokenType::CloseParen, ")"),
            '{' => single!(TokenType::OpenBrace, "{"),
            '}' => single!(TokenType::CloseBrace, "}"),
            ',' => single!(TokenType::Comma, ","),
            ':' => single!(TokenType::Colon, ":"),
            '+' => single!(TokenType::Plus, "+"),
            '-' => single!(TokenType::Minus, "-"),
            '/' => single!(TokenType::Slash, "/"),
            '?' => single!(TokenType::QuestionMark, "?"),
            '*' => {
                self.advance();
                if self.current_char == Some('*') {
                    self.advance();
                    Token::new(TokenType::StarStar, "**".into(), position, line, column)
                } else {
                    Token::new(TokenType::Star, "*".into(), position, line, column)
                }
            }
            '=' => single!(TokenType::Equal, "="),
            '"' => match self.read_string() {
                Ok(value) => Token::new(TokenType::StringLiteral, value, position, line, column),
                Err(e) => Token::error(format!("string error: {e}"), position, line, column),
            },
            '`' => match self.read_delimited_identifier() {
                Ok(value) => Token::new(TokenType::DelimitedIdentifier, value, position, line, column),
                Err(e) => Token::error(format!("delimited identifier error: {e}"), position, line, column),
            },
            '<' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::new(TokenType::LessThanOrEqual, "<=".into(), position, line, column)
                } else {
                    Token::new(TokenType::LessThan, "<".into(), position, line, column)
                }
            }
            '>' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::new(TokenType::GreaterThanOrEqual, ">=".into(), position, line, column)
                } else {
                    Token::new(TokenType::GreaterThan, ">".into(), position, line, column)
                }
            }
            '!' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::new(TokenType::NotEqual, "!=".into(), position, line, column)
                } else {
                    Token::error("unexpected '!' character".into(), position, line, column)
                }
            }
            _ if c.is_ascii_digit() => {
                let value = self.read_number();
                Token::new(TokenType::NumberLiteral, value, position, line, column)
            }
            _ if c.is_alphabetic() || c == '_' => {
                let ident = self.read_identifier();
                let token_type = match ident.as_str() {
                    "true" => TokenType::BooleanLiteral,
                    "false" => TokenType::BooleanLiteral,
                    "null" => TokenType::NullLiteral,
                    "if" => TokenType::If,
                    "then" => TokenType::Then,
                    "else" => TokenType::Else,
                    "for" => TokenType::For,
                    "in" => TokenType::In,
                    "return" => TokenType::Return,
                    "some" => TokenType::Some,
                    "every" => TokenType::Every,
                    "satisfies" => TokenType::Satisfies,
                    "and" => TokenType::And,
                    "or" => TokenType::Or,
                    "not" => TokenType::Not,
                    "between" => TokenType::Between,
                    "instance" => TokenType::InstanceOf,
                    "function" => TokenType::Function,
                    _ => TokenType::Identifier,
                };
                Token::new(token_type, ident, position, line, column)
            }
            _ => Token::error(format!("unexpected character: {c}"), position, line, column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input.to_string());
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    #[test]
    fn test_identifiers() {
        let tokens = tokenize("patient name _temp");
        assert_eq!(tokens[0].token_type, TokenType::Identifier);
        assert_eq!(tokens[0].value, "patient");
        assert_eq!(tokens[2].value, "_temp");
    }

    #[test]
    fn test_string_literal_and_escapes() {
        let tokens = tokenize(r#""hello" "a\"b" "line\nbreak""#);
        assert_eq!(tokens[0].token_type, TokenType::StringLiteral);
        assert_eq!(tokens[0].value, "hello");
        assert_eq!(tokens[1].value, "a\"b");
        assert_eq!(tokens[2].value, "line\nbreak");
    }

    #[test]
    fn test_numbers_no_scientific_notation() {
        let tokens = tokenize("123 45.67");
        assert_eq!(tokens[0].token_type, TokenType::NumberLiteral);
        assert_eq!(tokens[0].value, "123");
        assert_eq!(tokens[1].value, "45.67");
    }

    #[test]
    fn test_double_star_and_dotdot() {
        let tokens = tokenize("2**3 1..5");
        assert_eq!(tokens[1].token_type, TokenType::StarStar);
        assert_eq!(tokens[4].token_type, TokenType::DotDot);
    }

    #[test]
    fn test_delimited_identifier() {
        let tokens = tokenize("`a name with spaces`");
        assert_eq!(tokens[0].token_type, TokenType::DelimitedIdentifier);
        assert_eq!(tokens[0].value, "a name with spaces");
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = tokenize("a // line comment\n/* block */ b");
        assert_eq!(tokens[0].value, "a");
        assert_eq!(tokens[1].value, "b");
    }

    #[test]
    fn test_question_mark_input_token() {
        let tokens = tokenize("? > 5");
        assert_eq!(tokens[0].token_type, TokenType::QuestionMark);
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize("if then else for in return some every satisfies and or not between function");
        let expected = [
            TokenType::If, TokenType::Then, TokenType::Else, TokenType::For, TokenType::In,
            TokenType::Return, TokenType::Some, TokenType::Every, TokenType::Satisfies,
            TokenType::And, TokenType::Or, TokenType::Not, TokenType::Between, TokenType::Function,
        ];
        for (tok, exp) in tokens.iter().zip(expected.iter()) {
            assert_eq!(&tok.token_type, exp);
        }
    }

    #[test]
    fn test_null_and_boolean_literals() {
        let tokens = tokenize("null true false");
        assert_eq!(tokens[0].token_type, TokenType::NullLiteral);
        assert_eq!(tokens[1].token_type, TokenType::BooleanLiteral);
        assert_eq!(tokens[2].token_type, TokenType::BooleanLiteral);
    }
}

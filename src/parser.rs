//! FEEL parser — converts a token stream into an [`Expr`] tree.
//!
//! Recursive descent, organized by precedence level (§4.2), lowest to
//! highest:
//! 1. or
//! 2. and
//! 3. comparison (=, !=, <, <=, >, >=, between, instance of, in) — non-chainable
//! 4. range (`..`)
//! 5. additive (+, -)
//! 6. multiplicative (*, /)
//! 7. exponentiation (**, right-associative)
//! 8. unary minus
//! 9. postfix (path `.`, filter `[ ]`, invocation `( )`)
//! 10. primary (literals, lists, contexts, ranges, if/for/some/every,
//!     function definitions, references, the `?` input marker)
//!
//! `if`/`for`/`some`/`every`/`function` are recognized inside primary
//! rather than only at the top, so they can appear nested — as a
//! function argument, inside a list, inside parentheses — the way the
//! grammar allows.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::token::{Token, TokenType};

const MAX_RECURSION_DEPTH: usize = 200;

pub struct Parser {
    lexer: Lexer,
    current_token: Option<Token>,
    recursion_depth: usize,
}

enum BracketResult {
    List(Vec<Expr>),
    Range(RangeEndpoint, RangeEndpoint),
    Paren(Expr),
}

impl Parser {
    pub fn new(input: String) -> Self {
        let mut parser = Self { lexer: Lexer::new(input), current_token: None, recursion_depth: 0 };
        parser.advance();
        parser
    }

    fn advance(&mut self) {
        self.current_token = Some(self.lexer.next_token());
    }

    fn current_token(&self) -> Option<&Token> {
        self.current_token.as_ref()
    }

    fn current_token_is(&self, token_type: TokenType) -> bool {
        self.current_token().map(|t| t.token_type == token_type).unwrap_or(false)
    }

    /// Look `n` tokens ahead of the current one without consuming input,
    /// by scanning a cloned lexer. Used only for the handful of
    /// multi-token lookaheads below (named args, multi-word builtin
    /// names, "instance of").
    fn peek_ahead(&self, n: usize) -> Token {
        let mut lexer = self.lexer.clone();
        let mut tok = Token::eof(0, 0, 0);
        for _ in 0..n {
            tok = lexer.next_token();
        }
        tok
    }

    fn expect(&mut self, token_type: TokenType) -> Result<Token> {
        match self.current_token.take() {
            Some(token) if token.token_type == token_type => {
                self.advance();
                Ok(token)
            }
            Some(token) => Err(Error::ParseError(format!(
                "expected {:?}, got {:?} at line {}, column {}",
                token_type, token.token_type, token.line, token.column
            ))),
            None => Err(Error::ParseError(format!("expected {token_type:?}, but reached end of input"))),
        }
    }

    fn check_recursion_depth(&mut self) -> Result<()> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            return Err(Error::ParseError(format!("expression too deeply nested (max depth: {MAX_RECURSION_DEPTH})")));
        }
        Ok(())
    }

    fn decrement_recursion_depth(&mut self) {
        self.recursion_depth -= 1;
    }

    /// Parse a full expression, requiring all input to be consumed.
    pub fn parse(&mut self) -> Result<Expr> {
        let expr = self.parse_expression()?;
        if !self.current_token_is(TokenType::Eof) {
            let token = self.current_token().unwrap();
            return Err(Error::ParseError(format!(
                "unexpected token {:?} at line {}, column {}",
                token.token_type, token.line, token.column
            )));
        }
        Ok(expr)
    }

    /// Parse a full unary-test list, requiring all input to be consumed.
    pub fn parse_unary_tests(&mut self) -> Result<Expr> {
        let expr = self.parse_unary_tests_inner()?;
        if !self.current_token_is(TokenType::Eof) {
            let token = self.current_token().unwrap();
            return Err(Error::ParseError(format!(
                "unexpected token {:?} at line {}, column {}",
                token.token_type, token.line, token.column
            )));
        }
        Ok(expr)
    }

    fn parse_unary_tests_inner(&mut self) -> Result<Expr> {
        if self.current_token_is(TokenType::Minus) && self.peek_ahead(1).token_type == TokenType::Eof {
            self.advance();
            return Ok(Expr::MatchAny);
        }
        if self.current_token_is(TokenType::Not) {
            self.advance();
            self.expect(TokenType::OpenParen)?;
            let tests = self.parse_positive_unary_test_list()?;
            self.expect(TokenType::CloseParen)?;
            return Ok(Expr::Negation(tests));
        }
        let mut tests = self.parse_positive_unary_test_list()?;
        if tests.len() == 1 {
            Ok(tests.remove(0))
        } else {
            Ok(Expr::AtLeastOne(tests))
        }
    }

    fn parse_positive_unary_test_list(&mut self) -> Result<Vec<Expr>> {
        let mut tests = vec![self.parse_positive_unary_test()?];
        while self.current_token_is(TokenType::Comma) {
            self.advance();
            tests.push(self.parse_positive_unary_test()?);
        }
        Ok(tests)
    }

    fn parse_positive_unary_test(&mut self) -> Result<Expr> {
        match self.current_token().map(|t| t.token_type.clone()) {
            Some(TokenType::LessThan) => {
                self.advance();
                Ok(Expr::InputLessThan(Box::new(self.parse_expression()?)))
            }
            Some(TokenType::LessThanOrEqual) => {
                self.advance();
                Ok(Expr::InputLessOrEqual(Box::new(self.parse_expression()?)))
            }
            Some(TokenType::GreaterThan) => {
                self.advance();
                Ok(Expr::InputGreaterThan(Box::new(self.parse_expression()?)))
            }
            Some(TokenType::GreaterThanOrEqual) => {
                self.advance();
                Ok(Expr::InputGreaterOrEqual(Box::new(self.parse_expression()?)))
            }
            Some(TokenType::OpenBracket) | Some(TokenType::OpenParen) => match self.parse_bracketed()? {
                BracketResult::Range(lower, upper) => Ok(Expr::InputInRange { lower, upper }),
                BracketResult::List(items) => Ok(Expr::InputEqualTo(Box::new(Expr::ListLit(items)))),
                BracketResult::Paren(e) => Ok(Expr::InputEqualTo(Box::new(e))),
            },
            // `]` as a left opener is the reversed-bracket, open-lower range
            // notation (§4.2) — only valid for ranges, never for a list or a
            // parenthesized expression, so it gets its own branch rather than
            // going through `parse_bracketed`.
            Some(TokenType::CloseBracket) => {
                self.advance();
                let lower_expr = self.parse_expression()?;
                self.expect(TokenType::DotDot)?;
                let upper_expr = self.parse_expression()?;
                let upper_closed = self.expect_range_closer()?;
                let lower = RangeEndpoint { expr: Some(Box::new(lower_expr)), closed: false };
                let upper = RangeEndpoint { expr: Some(Box::new(upper_expr)), closed: upper_closed };
                Ok(Expr::InputInRange { lower, upper })
            }
            _ => {
                let e = self.parse_expression()?;
                if self.current_token_is(TokenType::DotDot) {
                    self.advance();
                    let upper = self.parse_expression()?;
                    let lower = RangeEndpoint { expr: Some(Box::new(e)), closed: true };
                    let upper = RangeEndpoint { expr: Some(Box::new(upper)), closed: true };
                    Ok(Expr::InputInRange { lower, upper })
                } else {
                    Ok(Expr::InputEqualTo(Box::new(e)))
                }
            }
        }
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.check_recursion_depth()?;
        let result = self.parse_or_expression();
        self.decrement_recursion_depth();
        result
    }

    fn parse_or_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expression()?;
        while self.current_token_is(TokenType::Or) {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison_expression()?;
        while self.current_token_is(TokenType::And) {
            self.advance();
            let right = self.parse_comparison_expression()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn current_cmp_op(&self) -> Option<CmpOp> {
        match self.current_token().map(|t| t.token_type.clone()) {
            Some(TokenType::Equal) => Some(CmpOp::Eq),
            Some(TokenType::NotEqual) => Some(CmpOp::Ne),
            Some(TokenType::LessThan) => Some(CmpOp::Lt),
            Some(TokenType::LessThanOrEqual) => Some(CmpOp::Le),
            Some(TokenType::GreaterThan) => Some(CmpOp::Gt),
            Some(TokenType::GreaterThanOrEqual) => Some(CmpOp::Ge),
            _ => None,
        }
    }

    /// Comparisons, `between`, `instance of` and `in` all bind at the same
    /// level and do not chain (§4.2 "non-chainable").
    fn parse_comparison_expression(&mut self) -> Result<Expr> {
        let left = self.parse_range_expression()?;

        if self.current_token_is(TokenType::Between) {
            self.advance();
            let lower = self.parse_range_expression()?;
            self.expect(TokenType::And)?;
            let upper = self.parse_range_expression()?;
            return Ok(Expr::Between { value: Box::new(left), lower: Box::new(lower), upper: Box::new(upper) });
        }

        if self.current_token_is(TokenType::InstanceOf) {
            self.advance();
            match self.current_token().map(|t| t.value.clone()) {
                Some(ref v) if v == "of" => self.advance(),
                _ => return Err(Error::ParseError("expected 'of' after 'instance'".into())),
            }
            let type_name = self.parse_type_name()?;
            return Ok(Expr::InstanceOf { value: Box::new(left), type_name });
        }

        if self.current_token_is(TokenType::In) {
            self.advance();
            let tests = self.parse_in_tests()?;
            return Ok(Expr::In { value: Box::new(left), tests: Box::new(tests) });
        }

        if let Some(op) = self.current_cmp_op() {
            self.advance();
            let right = self.parse_range_expression()?;
            return Ok(Expr::Compare { op, left: Box::new(left), right: Box::new(right) });
        }

        Ok(left)
    }

    /// `in`'s right-hand side is a positive unary test, or a parenthesised
    /// disjunction of them (§4.3.7) — `5 in (> 0, <10)` as well as the
    /// paren-free `5 in > 0, <10`. The parenthesised form needs its own
    /// branch here rather than falling through to `parse_positive_unary_test`,
    /// since that function's own `(` handling goes through `parse_bracketed`,
    /// which expects a full expression first and can't start with a bare
    /// comparison operator.
    fn parse_in_tests(&mut self) -> Result<Expr> {
        if self.current_token_is(TokenType::OpenParen) {
            self.advance();
            let mut tests = self.parse_positive_unary_test_list()?;
            self.expect(TokenType::CloseParen)?;
            return if tests.len() == 1 { Ok(tests.remove(0)) } else { Ok(Expr::AtLeastOne(tests)) };
        }

        let mut tests = vec![self.parse_positive_unary_test()?];
        while self.current_token_is(TokenType::Comma) {
            self.advance();
            tests.push(self.parse_positive_unary_test()?);
        }
        if tests.len() == 1 {
            Ok(tests.remove(0))
        } else {
            Ok(Expr::AtLeastOne(tests))
        }
    }

    /// Greedily joins consecutive name-word tokens into a type name
    /// (`"date and time"`, `"years and months duration"`, …) — the
    /// fixed vocabulary of type names makes this safe even though it
    /// wouldn't generalize to arbitrary identifiers.
    fn parse_type_name(&mut self) -> Result<String> {
        let mut parts = Vec::new();
        loop {
            match self.current_token().map(|t| t.token_type.clone()) {
                Some(TokenType::Identifier) | Some(TokenType::And) => {
                    parts.push(self.current_token().unwrap().value.clone());
                    self.advance();
                }
                _ => break,
            }
        }
        if parts.is_empty() {
            return Err(Error::ParseError("expected type name".into()));
        }
        Ok(parts.join(" "))
    }

    fn parse_range_expression(&mut self) -> Result<Expr> {
        let first = self.parse_additive_expression()?;
        if self.current_token_is(TokenType::DotDot) {
            self.advance();
            let upper = self.parse_additive_expression()?;
            Ok(Expr::ConstRange {
                lower: RangeEndpoint { expr: Some(Box::new(first)), closed: true },
                upper: RangeEndpoint { expr: Some(Box::new(upper)), closed: true },
            })
        } else {
            Ok(first)
        }
    }

    fn parse_additive_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expression()?;
        loop {
            let op = match self.current_token().map(|t| t.token_type.clone()) {
                Some(TokenType::Plus) => ArithOp::Add,
                Some(TokenType::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = Expr::Arith { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_exponentiation_expression()?;
        loop {
            let op = match self.current_token().map(|t| t.token_type.clone()) {
                Some(TokenType::Star) => ArithOp::Mul,
                Some(TokenType::Slash) => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_exponentiation_expression()?;
            left = Expr::Arith { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    /// Right-associative: `2 ** 3 ** 2` is `2 ** (3 ** 2)`.
    fn parse_exponentiation_expression(&mut self) -> Result<Expr> {
        let base = self.parse_unary_expression()?;
        if self.current_token_is(TokenType::StarStar) {
            self.advance();
            let exp = self.parse_exponentiation_expression()?;
            Ok(Expr::Arith { op: ArithOp::Pow, left: Box::new(base), right: Box::new(exp) })
        } else {
            Ok(base)
        }
    }

    fn parse_unary_expression(&mut self) -> Result<Expr> {
        if self.current_token_is(TokenType::Minus) {
            self.advance();
            let operand = self.parse_unary_expression()?;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current_token().map(|t| t.token_type.clone()) {
                Some(TokenType::Dot) => {
                    self.advance();
                    let name = self.parse_simple_name()?;
                    if self.current_token_is(TokenType::OpenParen) {
                        self.advance();
                        let args = self.parse_args()?;
                        self.expect(TokenType::CloseParen)?;
                        expr = Expr::QualifiedFunctionInvocation { target: Box::new(expr), name, args };
                    } else {
                        expr = Expr::PathExpression { base: Box::new(expr), name };
                    }
                }
                Some(TokenType::OpenBracket) => {
                    self.advance();
                    let predicate = self.parse_expression()?;
                    self.expect(TokenType::CloseBracket)?;
                    expr = Expr::Filter { base: Box::new(expr), predicate: Box::new(predicate) };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_simple_name(&mut self) -> Result<String> {
        match self.current_token().map(|t| t.token_type.clone()) {
            Some(TokenType::Identifier) => Ok(self.expect(TokenType::Identifier)?.value),
            Some(TokenType::DelimitedIdentifier) => Ok(self.expect(TokenType::DelimitedIdentifier)?.value),
            other => Err(Error::ParseError(format!("expected name, got {other:?}"))),
        }
    }

    fn parse_args(&mut self) -> Result<Args> {
        if self.current_token_is(TokenType::CloseParen) {
            return Ok(Args::Positional(vec![]));
        }
        if self.current_token_is(TokenType::Identifier) && self.peek_ahead(1).token_type == TokenType::Colon {
            let mut named = Vec::new();
            loop {
                let name = self.expect(TokenType::Identifier)?.value;
                self.expect(TokenType::Colon)?;
                let value = self.parse_expression()?;
                named.push((name, value));
                if self.current_token_is(TokenType::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            Ok(Args::Named(named))
        } else {
            let mut items = vec![self.parse_expression()?];
            while self.current_token_is(TokenType::Comma) {
                self.advance();
                items.push(self.parse_expression()?);
            }
            Ok(Args::Positional(items))
        }
    }

    /// `[` … `]`, `(` … `)` — shared between list literals, ranges and
    /// parenthesized expressions, since all three share an opening
    /// bracket and only diverge once `..` or `,` or the closer shows up.
    fn parse_bracketed(&mut self) -> Result<BracketResult> {
        let lower_closed = self.current_token_is(TokenType::OpenBracket);
        self.advance();

        if lower_closed && self.current_token_is(TokenType::CloseBracket) {
            self.advance();
            return Ok(BracketResult::List(vec![]));
        }

        let first = self.parse_expression()?;

        if self.current_token_is(TokenType::DotDot) {
            self.advance();
            let upper_expr = self.parse_expression()?;
            let upper_closed = self.expect_range_closer()?;
            let lower = RangeEndpoint { expr: Some(Box::new(first)), closed: lower_closed };
            let upper = RangeEndpoint { expr: Some(Box::new(upper_expr)), closed: upper_closed };
            return Ok(BracketResult::Range(lower, upper));
        }

        if lower_closed {
            let mut items = vec![first];
            while self.current_token_is(TokenType::Comma) {
                self.advance();
                items.push(self.parse_expression()?);
            }
            self.expect(TokenType::CloseBracket)?;
            Ok(BracketResult::List(items))
        } else {
            self.expect(TokenType::CloseParen)?;
            Ok(BracketResult::Paren(first))
        }
    }

    fn expect_range_closer(&mut self) -> Result<bool> {
        match self.current_token().map(|t| t.token_type.clone()) {
            Some(TokenType::CloseBracket) => {
                self.advance();
                Ok(true)
            }
            Some(TokenType::CloseParen) => {
                self.advance();
                Ok(false)
            }
            // `[` as a right closer is the reversed-bracket, open-upper
            // range notation (§4.2), paired with a `]` opener above.
            Some(TokenType::OpenBracket) => {
                self.advance();
                Ok(false)
            }
            other => Err(Error::ParseError(format!("expected ']', ')' or '[' to close range, got {other:?}"))),
        }
    }

    fn parse_context_literal(&mut self) -> Result<Expr> {
        self.expect(TokenType::OpenBrace)?;
        let mut entries = Vec::new();
        if !self.current_token_is(TokenType::CloseBrace) {
            loop {
                let key = self.parse_context_key()?;
                self.expect(TokenType::Colon)?;
                let value = self.parse_expression()?;
                entries.push((key, value));
                if self.current_token_is(TokenType::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenType::CloseBrace)?;
        Ok(Expr::ContextLit(entries))
    }

    /// Context keys may be a string, a backtick-delimited identifier, or
    /// a bare name that can itself contain spaces (`Employment Status`) —
    /// joined here at the token level up to the `:` (§4.1).
    fn parse_context_key(&mut self) -> Result<String> {
        match self.current_token().map(|t| t.token_type.clone()) {
            Some(TokenType::StringLiteral) => Ok(self.expect(TokenType::StringLiteral)?.value),
            Some(TokenType::DelimitedIdentifier) => Ok(self.expect(TokenType::DelimitedIdentifier)?.value),
            _ => {
                let mut parts = Vec::new();
                loop {
                    match self.current_token().map(|t| t.token_type.clone()) {
                        Some(TokenType::Identifier) | Some(TokenType::And) | Some(TokenType::Or) => {
                            parts.push(self.current_token().unwrap().value.clone());
                            self.advance();
                        }
                        _ => break,
                    }
                }
                if parts.is_empty() {
                    return Err(Error::ParseError("expected context key".into()));
                }
                Ok(parts.join(" "))
            }
        }
    }

    fn parse_if_expression(&mut self) -> Result<Expr> {
        self.expect(TokenType::If)?;
        let cond = self.parse_expression()?;
        self.expect(TokenType::Then)?;
        let then_branch = self.parse_expression()?;
        self.expect(TokenType::Else)?;
        let else_branch = self.parse_expression()?;
        Ok(Expr::If { cond: Box::new(cond), then_branch: Box::new(then_branch), else_branch: Box::new(else_branch) })
    }

    fn parse_iterators(&mut self) -> Result<Vec<Iterator>> {
        let mut iterators = Vec::new();
        loop {
            let name = self.parse_simple_name()?;
            self.expect(TokenType::In)?;
            let source = self.parse_expression()?;
            iterators.push(Iterator { name, source });
            if self.current_token_is(TokenType::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(iterators)
    }

    fn parse_for_expression(&mut self) -> Result<Expr> {
        self.expect(TokenType::For)?;
        let iterators = self.parse_iterators()?;
        self.expect(TokenType::Return)?;
        let body = self.parse_expression()?;
        Ok(Expr::For { iterators, body: Box::new(body) })
    }

    fn parse_quantified_expression(&mut self, kind: QuantKind) -> Result<Expr> {
        self.advance(); // 'some' / 'every'
        let iterators = self.parse_iterators()?;
        self.expect(TokenType::Satisfies)?;
        let condition = self.parse_expression()?;
        Ok(Expr::Quantified { kind, iterators, condition: Box::new(condition) })
    }

    fn parse_function_definition(&mut self) -> Result<Expr> {
        self.expect(TokenType::Function)?;
        self.expect(TokenType::OpenParen)?;
        let mut params = Vec::new();
        if !self.current_token_is(TokenType::CloseParen) {
            loop {
                params.push(self.parse_simple_name()?);
                if self.current_token_is(TokenType::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenType::CloseParen)?;
        let body = self.parse_expression()?;
        Ok(Expr::FunctionDefinition { params, body: Box::new(body) })
    }

    /// Recognizes the fixed set of reserved-word-containing builtin names
    /// (`date and time`, `years and months duration`, `string length`,
    /// `upper case`, `lower case`, `list contains`, `get or else`) as a
    /// call, only when immediately followed by `(` — otherwise falls
    /// through so e.g. a bare reference named `date` still works.
    fn try_match_builtin_call_name(&mut self) -> Option<String> {
        let first = self.current_token()?;
        if first.token_type != TokenType::Identifier {
            return None;
        }
        let word = first.value.as_str();
        let (len, name): (usize, &str) = match word {
            "date" => {
                let t1 = self.peek_ahead(1);
                let t2 = self.peek_ahead(2);
                if t1.token_type == TokenType::And && t2.value == "time" {
                    (3, "date and time")
                } else {
                    return None;
                }
            }
            "years" => {
                let t1 = self.peek_ahead(1);
                let t2 = self.peek_ahead(2);
                let t3 = self.peek_ahead(3);
                if t1.token_type == TokenType::And && t2.value == "months" && t3.value == "duration" {
                    (4, "years and months duration")
                } else {
                    return None;
                }
            }
            "string" => {
                if self.peek_ahead(1).value == "length" {
                    (2, "string length")
                } else {
                    return None;
                }
            }
            "upper" => {
                if self.peek_ahead(1).value == "case" {
                    (2, "upper case")
                } else {
                    return None;
                }
            }
            "lower" => {
                if self.peek_ahead(1).value == "case" {
                    (2, "lower case")
                } else {
                    return None;
                }
            }
            "list" => {
                if self.peek_ahead(1).value == "contains" {
                    (2, "list contains")
                } else {
                    return None;
                }
            }
            "get" => {
                let t1 = self.peek_ahead(1);
                let t2 = self.peek_ahead(2);
                if t1.token_type == TokenType::Or && t2.value == "else" {
                    (3, "get or else")
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        if self.peek_ahead(len).token_type != TokenType::OpenParen {
            return None;
        }
        for _ in 0..len {
            self.advance();
        }
        Some(name.to_string())
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        self.check_recursion_depth()?;
        let result = self.parse_primary_inner();
        self.decrement_recursion_depth();
        result
    }

    fn parse_primary_inner(&mut self) -> Result<Expr> {
        match self.current_token().map(|t| t.token_type.clone()) {
            Some(TokenType::NullLiteral) => {
                self.advance();
                Ok(Expr::NullLit)
            }
            Some(TokenType::BooleanLiteral) => {
                let v = self.expect(TokenType::BooleanLiteral)?.value;
                Ok(Expr::BoolLit(v == "true"))
            }
            Some(TokenType::NumberLiteral) => {
                let v = self.expect(TokenType::NumberLiteral)?.value;
                let d = Decimal::from_str(&v).map_err(|_| Error::ParseError(format!("invalid number literal: {v}")))?;
                Ok(Expr::NumberLit(d))
            }
            Some(TokenType::StringLiteral) => {
                let v = self.expect(TokenType::StringLiteral)?.value;
                Ok(Expr::StringLit(v))
            }
            Some(TokenType::QuestionMark) => {
                self.advance();
                Ok(Expr::Input)
            }
            Some(TokenType::OpenBracket) | Some(TokenType::OpenParen) => match self.parse_bracketed()? {
                BracketResult::List(items) => Ok(Expr::ListLit(items)),
                BracketResult::Range(lower, upper) => Ok(Expr::ConstRange { lower, upper }),
                BracketResult::Paren(e) => Ok(e),
            },
            Some(TokenType::OpenBrace) => self.parse_context_literal(),
            Some(TokenType::If) => self.parse_if_expression(),
            Some(TokenType::For) => self.parse_for_expression(),
            Some(TokenType::Some) => self.parse_quantified_expression(QuantKind::Some),
            Some(TokenType::Every) => self.parse_quantified_expression(QuantKind::Every),
            Some(TokenType::Function) => self.parse_function_definition(),
            Some(TokenType::Not) => {
                self.advance();
                self.expect(TokenType::OpenParen)?;
                let arg = self.parse_expression()?;
                self.expect(TokenType::CloseParen)?;
                Ok(Expr::FunctionInvocation { name: "not".into(), args: Args::Positional(vec![arg]) })
            }
            Some(TokenType::Identifier) => {
                if let Some(name) = self.try_match_builtin_call_name() {
                    self.expect(TokenType::OpenParen)?;
                    let args = self.parse_args()?;
                    self.expect(TokenType::CloseParen)?;
                    return Ok(Expr::FunctionInvocation { name, args });
                }
                let name = self.expect(TokenType::Identifier)?.value;
                if self.current_token_is(TokenType::OpenParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(TokenType::CloseParen)?;
                    Ok(Expr::FunctionInvocation { name, args })
                } else {
                    Ok(Expr::Ref(vec![name]))
                }
            }
            Some(TokenType::DelimitedIdentifier) => {
                let name = self.expect(TokenType::DelimitedIdentifier)?.value;
                if self.current_token_is(TokenType::OpenParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(TokenType::CloseParen)?;
                    Ok(Expr::FunctionInvocation { name, args })
                } else {
                    Ok(Expr::Ref(vec![name]))
                }
            }
            other => Err(Error::ParseError(format!("unexpected token in expression: {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Expr {
        Parser::new(input.to_string()).parse().unwrap()
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let expr = parse("1 + 2 * 3");
        match expr {
            Expr::Arith { op: ArithOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Arith { op: ArithOp::Mul, .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_right_associative_exponentiation() {
        let expr = parse("2 ** 3 ** 2");
        match expr {
            Expr::Arith { op: ArithOp::Pow, right, .. } => {
                assert!(matches!(*right, Expr::Arith { op: ArithOp::Pow, .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_if_then_else() {
        let expr = parse("if a then 1 else 2");
        assert!(matches!(expr, Expr::If { .. }));
    }

    #[test]
    fn parses_for_expression() {
        let expr = parse("for x in [1,2,3] return x * 2");
        assert!(matches!(expr, Expr::For { .. }));
    }

    #[test]
    fn parses_some_every() {
        assert!(matches!(parse("some x in [1,2] satisfies x > 1"), Expr::Quantified { kind: QuantKind::Some, .. }));
        assert!(matches!(parse("every x in [1,2] satisfies x > 0"), Expr::Quantified { kind: QuantKind::Every, .. }));
    }

    #[test]
    fn parses_path_and_filter() {
        let expr = parse("a.b[c > 1]");
        assert!(matches!(expr, Expr::Filter { .. }));
    }

    #[test]
    fn parses_range_literal() {
        let expr = parse("[1..10]");
        assert!(matches!(expr, Expr::ConstRange { .. }));
    }

    #[test]
    fn parses_context_literal_with_spaced_key() {
        let expr = parse("{ Employment Status : \"active\" }");
        match expr {
            Expr::ContextLit(entries) => assert_eq!(entries[0].0, "Employment Status"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_multiword_builtin_call() {
        let expr = parse("string length(\"abc\")");
        match expr {
            Expr::FunctionInvocation { name, .. } => assert_eq!(name, "string length"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_between_and_instance_of() {
        assert!(matches!(parse("5 between 1 and 10"), Expr::Between { .. }));
        assert!(matches!(parse("5 instance of number"), Expr::InstanceOf { .. }));
    }

    #[test]
    fn unary_tests_parse_comparisons_and_disjunction() {
        let mut p = Parser::new("<10, >100".to_string());
        assert!(matches!(p.parse_unary_tests().unwrap(), Expr::AtLeastOne(_)));
    }

    #[test]
    fn unary_tests_parse_bare_dash_as_match_any() {
        let mut p = Parser::new("-".to_string());
        assert!(matches!(p.parse_unary_tests().unwrap(), Expr::MatchAny));
    }

    #[test]
    fn unary_tests_parse_negation() {
        let mut p = Parser::new("not(1, 2)".to_string());
        assert!(matches!(p.parse_unary_tests().unwrap(), Expr::Negation(_)));
    }
}

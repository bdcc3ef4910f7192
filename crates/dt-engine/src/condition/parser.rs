//! Recursive-descent parser for condition expressions.
//!
//! ```text
//! expr        := orExpr
//! orExpr      := andExpr ( "||" andExpr )*
//! andExpr     := comparison ( "&&" comparison )*
//! comparison  := operand ( ("=="|"!="|"<"|"<="|">"|">=") operand )?
//! operand     := "(" expr ")" | reference | literal
//! reference   := IDENT ("." IDENT)+
//! literal     := NUMBER | STRING | "true" | "false"
//! ```

use super::ast::{BinaryOp, Expr, Reference};
use super::lexer::{Lexer, Token, TokenKind};
use super::ParseError;
use dt_core::Scalar;

/// Default bound on parenthesis nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

pub(crate) struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
    max_depth: usize,
}

/// Parses `source` into an expression tree.
pub fn parse_expression(source: &str, max_depth: usize) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
        max_depth,
    };
    parser.parse_program()
}

impl Parser {
    fn parse_program(&mut self) -> Result<Expr, ParseError> {
        if self.peek().kind == TokenKind::Eof {
            return Err(ParseError::new("empty condition", 0));
        }
        let expr = self.parse_or()?;
        let trailing = self.peek();
        if trailing.kind != TokenKind::Eof {
            return Err(ParseError::new(
                format!("unexpected {}", trailing.kind.describe()),
                trailing.position,
            ));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut operands = vec![self.parse_and()?];
        while self.peek().kind == TokenKind::OrOr {
            self.advance();
            operands.push(self.parse_and()?);
        }
        Ok(Expr::logical(BinaryOp::Or, operands))
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut operands = vec![self.parse_comparison()?];
        while self.peek().kind == TokenKind::AndAnd {
            self.advance();
            operands.push(self.parse_comparison()?);
        }
        Ok(Expr::logical(BinaryOp::And, operands))
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;
        let Some(op) = comparison_op(&self.peek().kind) else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_operand()?;

        let next = self.peek();
        if comparison_op(&next.kind).is_some() {
            return Err(ParseError::new(
                "comparison operators cannot be chained; use parentheses",
                next.position,
            ));
        }
        Ok(Expr::binary(op, left, right))
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::LParen => {
                if self.depth >= self.max_depth {
                    return Err(ParseError::new(
                        format!("expression nested deeper than {} levels", self.max_depth),
                        token.position,
                    ));
                }
                self.depth += 1;
                let inner = self.parse_or()?;
                self.depth -= 1;
                self.expect_close(token.position)?;
                Ok(inner)
            }
            TokenKind::Ident(namespace) => self.parse_reference(namespace, token.position),
            TokenKind::Number(n) => Ok(Expr::Literal {
                value: Scalar::Number(n),
            }),
            TokenKind::Str(s) => Ok(Expr::Literal {
                value: Scalar::String(s),
            }),
            TokenKind::True => Ok(Expr::Literal {
                value: Scalar::Bool(true),
            }),
            TokenKind::False => Ok(Expr::Literal {
                value: Scalar::Bool(false),
            }),
            other => Err(ParseError::new(
                format!("expected operand, found {}", other.describe()),
                token.position,
            )),
        }
    }

    fn parse_reference(&mut self, namespace: String, position: usize) -> Result<Expr, ParseError> {
        let mut segments: Vec<String> = Vec::new();
        while self.peek().kind == TokenKind::Dot {
            self.advance();
            let token = self.advance();
            match token.kind {
                TokenKind::Ident(segment) => segments.push(segment),
                // Keywords are legal field names after a dot.
                TokenKind::True => segments.push("true".to_string()),
                TokenKind::False => segments.push("false".to_string()),
                other => {
                    return Err(ParseError::new(
                        format!("expected field name after '.', found {}", other.describe()),
                        token.position,
                    ))
                }
            }
        }

        if segments.is_empty() {
            return Err(ParseError::new(
                format!(
                    "bare identifier '{}'; references must be qualified, e.g. '{}.field'",
                    namespace, namespace
                ),
                position,
            ));
        }

        Ok(Expr::Reference(Reference {
            namespace,
            field: segments.join("."),
            position,
        }))
    }

    fn expect_close(&mut self, open_position: usize) -> Result<(), ParseError> {
        let token = self.advance();
        if token.kind == TokenKind::RParen {
            return Ok(());
        }
        Err(ParseError::new(
            format!(
                "expected ')' to close '(' at position {}, found {}",
                open_position,
                token.kind.describe()
            ),
            token.position,
        ))
    }

    fn peek(&self) -> &Token {
        // The token stream always ends with Eof and the cursor never moves past it.
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }
}

fn comparison_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::EqEq => Some(BinaryOp::Eq),
        TokenKind::NotEq => Some(BinaryOp::Ne),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::Le => Some(BinaryOp::Le),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::Ge => Some(BinaryOp::Ge),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Expr, ParseError> {
        parse_expression(source, DEFAULT_MAX_DEPTH)
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a.x > 1 || b.y < 2 && c.z == 'q'").unwrap();
        assert_eq!(
            expr.to_string(),
            r#"((a.x > 1) || ((b.y < 2) && (c.z == "q")))"#
        );
    }

    #[test]
    fn test_logical_chains_are_flat() {
        let expr = parse("a.x || a.y || a.z").unwrap();
        assert_eq!(expr.to_string(), "(a.x || a.y || a.z)");
        match expr {
            Expr::Logical { op, operands } => {
                assert_eq!(op, BinaryOp::Or);
                assert_eq!(operands.len(), 3);
            }
            other => panic!("expected a logical chain, got {:?}", other),
        }
    }

    #[test]
    fn test_long_chains_parse_without_deep_nesting() {
        let source = format!("{}true", "true || ".repeat(200_000));
        let expr = parse(&source).unwrap();
        match &expr {
            Expr::Logical { operands, .. } => assert_eq!(operands.len(), 200_001),
            other => panic!("expected a logical chain, got {:?}", other),
        }
        drop(expr);

        let mixed = format!("{}1 < 2", "host.a > 1 && host.b < 2 || ".repeat(50_000));
        assert!(parse(&mixed).is_ok());
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = parse("(a.x || a.y) && a.z").unwrap();
        assert_eq!(expr.to_string(), "((a.x || a.y) && a.z)");
    }

    #[test]
    fn test_reference_splits_on_first_dot() {
        let expr = parse("host.net.rx_bytes > 0").unwrap();
        let refs = expr.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].namespace, "host");
        assert_eq!(refs[0].field, "net.rx_bytes");
        assert_eq!(refs[0].position, 0);
    }

    #[test]
    fn test_bare_literals_and_references() {
        assert!(parse("true").is_ok());
        assert!(parse("host.is_maintenance").is_ok());
        assert!(parse("'x'").is_ok());
        assert!(parse("((1 < 2))").is_ok());
    }

    #[test]
    fn test_rejects_bare_identifier() {
        let err = parse("sys_load > 1").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("bare identifier"));
    }

    #[test]
    fn test_rejects_malformed() {
        for source in [
            "",
            "   ",
            "host.",
            "host.sys_load >",
            "&& host.a",
            "(host.a > 1",
            "host.a > 1)",
            "1 < 2 < 3",
            "host.a host.b",
            "host..a",
            "() ",
        ] {
            assert!(parse(source).is_err(), "expected parse failure for {:?}", source);
        }
    }

    #[test]
    fn test_error_positions() {
        assert_eq!(parse("").unwrap_err().position, 0);
        assert_eq!(parse("host.a > 1)").unwrap_err().position, 10);
        assert_eq!(parse("(host.a > 1").unwrap_err().position, 11);
        assert_eq!(parse("1 < 2 < 3").unwrap_err().position, 6);
    }

    #[test]
    fn test_depth_limit() {
        let nested = format!("{}1 < 2{}", "(".repeat(5), ")".repeat(5));
        assert!(parse_expression(&nested, 5).is_ok());
        assert!(parse_expression(&nested, 4).is_err());

        let deep = format!("{}true{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(parse(&deep).is_err());
    }
}

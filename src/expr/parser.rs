//! Expression parser.
//!
//! Recursive-descent primaries with a Pratt loop (binding powers) for the
//! binary operators. The parser is depth-limited so hostile input degrades
//! into a `ParseError` instead of exhausting the stack; the compiler turns
//! any error into the no-op accessor.

use crate::error::{ParseError, ParseResult};
use crate::value::Value;

use super::ast::{lookup_global, BinaryOp, Expr, TemplatePart, UnaryOp};
use super::token::{tokenize, RawPart, Token, TokenKind};

const MAX_DEPTH: usize = 64;

/// Parses a complete expression; trailing input is an error.
pub(crate) fn parse(src: &str) -> ParseResult<Expr> {
    if src.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let expr = parser.expression(0)?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(ParseError::TrailingInput { offset: tok.offset }),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

/// Left/right binding powers for infix operators.
fn binding_power(kind: &TokenKind) -> Option<(u8, u8, BinaryOp)> {
    let entry = match kind {
        TokenKind::OrOr => (1, 2, BinaryOp::Or),
        TokenKind::AndAnd => (3, 4, BinaryOp::And),
        TokenKind::EqEq => (5, 6, BinaryOp::LooseEq),
        TokenKind::NotEq => (5, 6, BinaryOp::LooseNe),
        TokenKind::EqEqEq => (5, 6, BinaryOp::StrictEq),
        TokenKind::NotEqEq => (5, 6, BinaryOp::StrictNe),
        TokenKind::Lt => (7, 8, BinaryOp::Lt),
        TokenKind::LtEq => (7, 8, BinaryOp::LtEq),
        TokenKind::Gt => (7, 8, BinaryOp::Gt),
        TokenKind::GtEq => (7, 8, BinaryOp::GtEq),
        TokenKind::Plus => (9, 10, BinaryOp::Add),
        TokenKind::Minus => (9, 10, BinaryOp::Sub),
        TokenKind::Star => (11, 12, BinaryOp::Mul),
        TokenKind::Slash => (11, 12, BinaryOp::Div),
        TokenKind::Percent => (11, 12, BinaryOp::Rem),
        _ => return None,
    };
    Some(entry)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.expected(what))
        }
    }

    fn expected(&self, what: &str) -> ParseError {
        match self.peek() {
            Some(tok) => ParseError::UnexpectedToken {
                expected: what.to_string(),
                offset: tok.offset,
            },
            None => ParseError::UnexpectedEnd,
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::NestingTooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Pratt loop over binary operators.
    fn expression(&mut self, min_bp: u8) -> ParseResult<Expr> {
        self.enter()?;
        let mut lhs = self.unary()?;
        while let Some((lbp, rbp, op)) = self.peek().and_then(|t| binding_power(&t.kind)) {
            if lbp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(rbp)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.leave();
        Ok(lhs)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Bang) => Some(UnaryOp::Not),
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::Plus) => Some(UnaryOp::Plus),
            Some(TokenKind::Typeof) => Some(UnaryOp::TypeOf),
            Some(TokenKind::Void) => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            self.enter()?;
            let operand = self.unary()?;
            self.leave();
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        if self.eat(&TokenKind::New) {
            self.enter()?;
            let operand = self.unary()?;
            self.leave();
            // `new X(args)` evaluates as the equivalent call.
            return Ok(match operand {
                Expr::Call { callee, args } => Expr::New { callee, args },
                other => Expr::New {
                    callee: Box::new(other),
                    args: Vec::new(),
                },
            });
        }
        self.postfix()
    }

    /// Member access, computed indices, and calls bind tightest.
    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let name = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: name,
                };
            } else if self.eat(&TokenKind::LBracket) {
                self.enter()?;
                let index = self.expression(0)?;
                self.leave();
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(&TokenKind::LParen) {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Property names after `.` may be any identifier, including words that
    /// are keywords or whitelisted globals in root position.
    fn property_name(&mut self) -> ParseResult<String> {
        match self.bump().map(|t| t.kind) {
            Some(TokenKind::Ident(name)) => Ok(name),
            Some(TokenKind::New) => Ok("new".to_string()),
            Some(TokenKind::Typeof) => Ok("typeof".to_string()),
            Some(TokenKind::Void) => Ok("void".to_string()),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.expected("property name"))
            }
        }
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            self.enter()?;
            args.push(self.expression(0)?);
            self.leave();
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(args);
        }
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let Some(tok) = self.bump() else {
            return Err(ParseError::UnexpectedEnd);
        };
        match tok.kind {
            TokenKind::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::Template(parts) => self.template(parts),
            TokenKind::Ident(name) => {
                Ok(lookup_global(&name).unwrap_or(Expr::Ident(name)))
            }
            TokenKind::LParen => {
                self.enter()?;
                let inner = self.expression(0)?;
                self.leave();
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.array_literal(),
            TokenKind::LBrace => self.object_literal(),
            _ => {
                self.pos -= 1;
                Err(self.expected("expression"))
            }
        }
    }

    fn array_literal(&mut self) -> ParseResult<Expr> {
        let mut items = Vec::new();
        if self.eat(&TokenKind::RBracket) {
            return Ok(Expr::ArrayLit(items));
        }
        loop {
            self.enter()?;
            items.push(self.expression(0)?);
            self.leave();
            if self.eat(&TokenKind::Comma) {
                // Trailing comma.
                if self.eat(&TokenKind::RBracket) {
                    return Ok(Expr::ArrayLit(items));
                }
                continue;
            }
            self.expect(&TokenKind::RBracket, "']'")?;
            return Ok(Expr::ArrayLit(items));
        }
    }

    /// Object-literal keys are plain data: identifiers, strings, and numbers
    /// are all accepted verbatim and never treated as scope reads.
    fn object_literal(&mut self) -> ParseResult<Expr> {
        let mut entries = Vec::new();
        if self.eat(&TokenKind::RBrace) {
            return Ok(Expr::ObjectLit(entries));
        }
        loop {
            let key = match self.bump().map(|t| t.kind) {
                Some(TokenKind::Ident(name)) => name,
                Some(TokenKind::Str(s)) => s,
                Some(TokenKind::Number(n)) => format!("{}", Value::Number(n)),
                Some(TokenKind::New) => "new".to_string(),
                Some(TokenKind::Typeof) => "typeof".to_string(),
                Some(TokenKind::Void) => "void".to_string(),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.expected("object key"));
                }
            };
            self.expect(&TokenKind::Colon, "':'")?;
            self.enter()?;
            let value = self.expression(0)?;
            self.leave();
            entries.push((key, value));
            if self.eat(&TokenKind::Comma) {
                if self.eat(&TokenKind::RBrace) {
                    return Ok(Expr::ObjectLit(entries));
                }
                continue;
            }
            self.expect(&TokenKind::RBrace, "'}'")?;
            return Ok(Expr::ObjectLit(entries));
        }
    }

    fn template(&mut self, parts: Vec<RawPart>) -> ParseResult<Expr> {
        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                RawPart::Text(text) => out.push(TemplatePart::Text(text)),
                RawPart::Expr(raw) => {
                    // Interpolations are parsed recursively from their raw
                    // source; a bad interpolation fails the whole expression.
                    let inner = parse(&raw)?;
                    out.push(TemplatePart::Expr(Box::new(inner)));
                }
            }
        }
        Ok(Expr::Template(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::Global;

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * c").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => assert!(matches!(
                *rhs,
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("expected add at root, got {other:?}"),
        }
    }

    #[test]
    fn test_logical_binds_loosest() {
        let expr = parse("a == 1 && b < 2 || c").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Or, .. }));
    }

    #[test]
    fn test_member_chain() {
        let expr = parse("a.b.c").unwrap();
        match expr {
            Expr::Member { object, property } => {
                assert_eq!(property, "c");
                assert!(matches!(*object, Expr::Member { .. }));
            }
            other => panic!("expected member, got {other:?}"),
        }
    }

    #[test]
    fn test_computed_index() {
        let expr = parse("a[b]").unwrap();
        match expr {
            Expr::Index { index, .. } => assert!(matches!(*index, Expr::Ident(_))),
            other => panic!("expected index, got {other:?}"),
        }
    }

    #[test]
    fn test_whitelisted_root_identifier() {
        let expr = parse("Math.PI").unwrap();
        match expr {
            Expr::Member { object, property } => {
                assert_eq!(property, "PI");
                assert_eq!(*object, Expr::Global(Global::Math));
            }
            other => panic!("expected member on Math, got {other:?}"),
        }
    }

    #[test]
    fn test_member_property_is_not_whitelisted() {
        // `a.Math` is a plain property named Math, not the global.
        let expr = parse("a.Math").unwrap();
        match expr {
            Expr::Member { object, property } => {
                assert_eq!(property, "Math");
                assert_eq!(*object, Expr::Ident("a".to_string()));
            }
            other => panic!("expected member, got {other:?}"),
        }
    }

    #[test]
    fn test_object_literal_keys_stay_verbatim() {
        let expr = parse("{a: b, 'x y': 1, 2: c}").unwrap();
        match expr {
            Expr::ObjectLit(entries) => {
                assert_eq!(entries[0].0, "a");
                assert_eq!(entries[1].0, "x y");
                assert_eq!(entries[2].0, "2");
                assert!(matches!(entries[0].1, Expr::Ident(_)));
            }
            other => panic!("expected object literal, got {other:?}"),
        }
    }

    #[test]
    fn test_new_date() {
        let expr = parse("new Date()").unwrap();
        match expr {
            Expr::New { callee, args } => {
                assert_eq!(*callee, Expr::Global(Global::Date));
                assert!(args.is_empty());
            }
            other => panic!("expected new, got {other:?}"),
        }
    }

    #[test]
    fn test_call_arguments() {
        let expr = parse("Math.max(a, b, 3)").unwrap();
        match expr {
            Expr::Call { args, .. } => assert_eq!(args.len(), 3),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_input_rejected() {
        assert!(matches!(
            parse("a b"),
            Err(ParseError::TrailingInput { .. })
        ));
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_depth_limit() {
        let src = format!("{}a{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(
            parse(&src),
            Err(ParseError::NestingTooDeep { limit: MAX_DEPTH })
        );
    }

    #[test]
    fn test_template_interpolation_parses() {
        let expr = parse("`v: ${a + 1}`").unwrap();
        match expr {
            Expr::Template(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[1], TemplatePart::Expr(_)));
            }
            other => panic!("expected template, got {other:?}"),
        }
    }
}

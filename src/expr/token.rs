//! Expression tokenizer.
//!
//! A hand-rolled cursor over the source text. Strings come out of the
//! tokenizer fully unescaped, so identifier-looking substrings inside them
//! can never be mistaken for scope reads later. Backtick templates are
//! tokenized into raw text/expression parts; the parser recursively parses
//! each interpolation.

use crate::error::{ParseError, ParseResult};

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Raw piece of a backtick template.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawPart {
    /// Unescaped literal text.
    Text(String),
    /// Source text of a `${...}` interpolation, unparsed.
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Str(String),
    Template(Vec<RawPart>),
    Ident(String),
    New,
    Typeof,
    Void,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut it = self.src[self.pos..].chars();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

/// Tokenizes an expression.
pub(crate) fn tokenize(src: &str) -> ParseResult<Vec<Token>> {
    let mut cur = Cursor { src, pos: 0 };
    let mut tokens = Vec::new();

    while let Some(ch) = cur.peek() {
        let offset = cur.pos;
        if ch.is_whitespace() {
            cur.bump();
            continue;
        }

        let kind = match ch {
            '0'..='9' => number(&mut cur)?,
            '.' => {
                if cur.peek2().is_some_and(|c| c.is_ascii_digit()) {
                    number(&mut cur)?
                } else {
                    cur.bump();
                    TokenKind::Dot
                }
            }
            '\'' | '"' => {
                cur.bump();
                TokenKind::Str(quoted_string(&mut cur, ch, offset)?)
            }
            '`' => {
                cur.bump();
                TokenKind::Template(template(&mut cur, offset)?)
            }
            c if is_ident_start(c) => {
                let start = cur.pos;
                while cur.peek().is_some_and(is_ident_continue) {
                    cur.bump();
                }
                keyword_or_ident(&src[start..cur.pos])
            }
            '+' => {
                cur.bump();
                TokenKind::Plus
            }
            '-' => {
                cur.bump();
                TokenKind::Minus
            }
            '*' => {
                cur.bump();
                TokenKind::Star
            }
            '/' => {
                cur.bump();
                TokenKind::Slash
            }
            '%' => {
                cur.bump();
                TokenKind::Percent
            }
            '(' => {
                cur.bump();
                TokenKind::LParen
            }
            ')' => {
                cur.bump();
                TokenKind::RParen
            }
            '[' => {
                cur.bump();
                TokenKind::LBracket
            }
            ']' => {
                cur.bump();
                TokenKind::RBracket
            }
            '{' => {
                cur.bump();
                TokenKind::LBrace
            }
            '}' => {
                cur.bump();
                TokenKind::RBrace
            }
            ',' => {
                cur.bump();
                TokenKind::Comma
            }
            ':' => {
                cur.bump();
                TokenKind::Colon
            }
            '=' => {
                cur.bump();
                if cur.eat('=') {
                    if cur.eat('=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else {
                    // Assignment is unsupported inside expressions.
                    return Err(ParseError::UnexpectedChar { ch: '=', offset });
                }
            }
            '!' => {
                cur.bump();
                if cur.eat('=') {
                    if cur.eat('=') {
                        TokenKind::NotEqEq
                    } else {
                        TokenKind::NotEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                cur.bump();
                if cur.eat('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                cur.bump();
                if cur.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                cur.bump();
                if cur.eat('&') {
                    TokenKind::AndAnd
                } else {
                    return Err(ParseError::UnexpectedChar { ch: '&', offset });
                }
            }
            '|' => {
                cur.bump();
                if cur.eat('|') {
                    TokenKind::OrOr
                } else {
                    return Err(ParseError::UnexpectedChar { ch: '|', offset });
                }
            }
            other => return Err(ParseError::UnexpectedChar { ch: other, offset }),
        };

        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

fn keyword_or_ident(word: &str) -> TokenKind {
    match word {
        "new" => TokenKind::New,
        "typeof" => TokenKind::Typeof,
        "void" => TokenKind::Void,
        other => TokenKind::Ident(other.to_string()),
    }
}

fn number(cur: &mut Cursor<'_>) -> ParseResult<TokenKind> {
    let start = cur.pos;

    // Hex literal.
    if cur.peek() == Some('0') && matches!(cur.peek2(), Some('x' | 'X')) {
        cur.bump();
        cur.bump();
        let digits_start = cur.pos;
        while cur.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            cur.bump();
        }
        if cur.pos == digits_start {
            return Err(ParseError::UnexpectedChar {
                ch: cur.peek().unwrap_or('\0'),
                offset: cur.pos,
            });
        }
        let value = i64::from_str_radix(&cur.src[digits_start..cur.pos], 16)
            .map(|v| v as f64)
            .unwrap_or(f64::INFINITY);
        return Ok(TokenKind::Number(value));
    }

    while cur.peek().is_some_and(|c| c.is_ascii_digit()) {
        cur.bump();
    }
    if cur.peek() == Some('.') && cur.peek2().is_some_and(|c| c.is_ascii_digit()) {
        cur.bump();
        while cur.peek().is_some_and(|c| c.is_ascii_digit()) {
            cur.bump();
        }
    } else if cur.peek() == Some('.') && cur.pos > start {
        // Trailing dot as in `1.` is part of the number.
        cur.bump();
    }
    if matches!(cur.peek(), Some('e' | 'E')) {
        let mark = cur.pos;
        cur.bump();
        if matches!(cur.peek(), Some('+' | '-')) {
            cur.bump();
        }
        if cur.peek().is_some_and(|c| c.is_ascii_digit()) {
            while cur.peek().is_some_and(|c| c.is_ascii_digit()) {
                cur.bump();
            }
        } else {
            // Not an exponent after all (e.g. `1e` followed by an ident).
            cur.pos = mark;
        }
    }

    let text = &cur.src[start..cur.pos];
    let value = text
        .trim_end_matches('.')
        .parse::<f64>()
        .map_err(|_| ParseError::UnexpectedChar {
            ch: text.chars().next().unwrap_or('\0'),
            offset: start,
        })?;
    Ok(TokenKind::Number(value))
}

fn quoted_string(cur: &mut Cursor<'_>, quote: char, start: usize) -> ParseResult<String> {
    let mut out = String::new();
    loop {
        match cur.bump() {
            None => return Err(ParseError::UnterminatedString { offset: start }),
            Some(c) if c == quote => return Ok(out),
            Some('\\') => out.push(escape(cur, start)?),
            Some(c) => out.push(c),
        }
    }
}

fn escape(cur: &mut Cursor<'_>, start: usize) -> ParseResult<char> {
    let Some(c) = cur.bump() else {
        return Err(ParseError::UnterminatedString { offset: start });
    };
    let ch = match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        '0' => '\0',
        'u' => {
            let mut code = 0u32;
            for _ in 0..4 {
                let Some(d) = cur.bump().and_then(|c| c.to_digit(16)) else {
                    return Err(ParseError::UnterminatedString { offset: start });
                };
                code = code * 16 + d;
            }
            char::from_u32(code).unwrap_or('\u{fffd}')
        }
        'x' => {
            let mut code = 0u32;
            for _ in 0..2 {
                let Some(d) = cur.bump().and_then(|c| c.to_digit(16)) else {
                    return Err(ParseError::UnterminatedString { offset: start });
                };
                code = code * 16 + d;
            }
            char::from_u32(code).unwrap_or('\u{fffd}')
        }
        // Unknown escapes keep the escaped character.
        other => other,
    };
    Ok(ch)
}

/// Tokenizes template contents after the opening backtick.
fn template(cur: &mut Cursor<'_>, start: usize) -> ParseResult<Vec<RawPart>> {
    let mut parts = Vec::new();
    let mut text = String::new();
    loop {
        match cur.bump() {
            None => return Err(ParseError::UnterminatedString { offset: start }),
            Some('`') => {
                if !text.is_empty() {
                    parts.push(RawPart::Text(text));
                }
                return Ok(parts);
            }
            Some('\\') => text.push(escape(cur, start)?),
            Some('$') if cur.peek() == Some('{') => {
                cur.bump();
                if !text.is_empty() {
                    parts.push(RawPart::Text(std::mem::take(&mut text)));
                }
                parts.push(RawPart::Expr(interpolation(cur, start)?));
            }
            Some(c) => text.push(c),
        }
    }
}

/// Captures the raw source of one `${...}` interpolation, honoring nested
/// braces and string literals inside it.
fn interpolation(cur: &mut Cursor<'_>, start: usize) -> ParseResult<String> {
    let from = cur.pos;
    let mut depth = 1usize;
    loop {
        let Some(c) = cur.bump() else {
            return Err(ParseError::UnterminatedInterpolation { offset: start });
        };
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(cur.src[from..cur.pos - 1].to_string());
                }
            }
            '\'' | '"' | '`' => {
                // Skip over a nested string so its braces do not count.
                loop {
                    let Some(inner) = cur.bump() else {
                        return Err(ParseError::UnterminatedInterpolation { offset: start });
                    };
                    if inner == '\\' {
                        cur.bump();
                    } else if inner == c {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
}

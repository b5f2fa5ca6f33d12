//! The S-expression lexer. Per the spec this piece is "trivial" and
//! deliberately out of the interesting design surface, but it still has to
//! exist for the compiler to have anything to compile: comments begin with
//! `;` and run to end of line; string literals use double quotes with
//! standard escape processing; single-quoted literals must decode to
//! exactly one byte and yield a `Byte`; integer literals are decimal or
//! `0x`-prefixed hex, with an optional `u8` suffix marking a byte constant.

use crate::error::{CompileError, CompileResult};
use crate::location::Location;

/// A node of the parsed source tree, tagged by what kind of literal or
/// structural form it is. This is the typed replacement for the original
/// implementation's convention of tagging raw lists with a leading string
/// atom (`['val', n]`, `['str', s]`, ...): here every literal already has
/// its own variant, so nothing downstream ever compares a node's head
/// against a string to find out what it is.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    /// A bare identifier: a variable name, a type-head word (`int`,
    /// `ptr`, ...), or a special form keyword (`do`, `if`, ...).
    Atom(String),
    /// A signed 64-bit integer literal.
    Int(i64),
    /// An 8-bit unsigned literal (`u8` suffix, or a one-character
    /// single-quoted literal).
    Byte(u8),
    /// A double-quoted string literal.
    Str(String),
    /// A parenthesized list of sub-expressions.
    List(Vec<Spanned<Sexpr>>),
}

/// A node tagged with the source location it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub location: Location,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(location: Location, node: T) -> Self {
        Spanned { location, node }
    }
}

struct Lexer {
    chars: Vec<char>,
    idx: usize,
    line: usize,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Lexer {
            chars: text.chars().collect(),
            idx: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn loc(&self) -> Location {
        Location::new(self.line)
    }

    fn at_end(&self) -> bool {
        self.idx >= self.chars.len()
    }

    /// Skip whitespace and `;`-to-end-of-line comments.
    fn skip_space(&mut self) {
        loop {
            let save = self.idx;
            while self.peek().is_some_and(|c| c.is_whitespace()) {
                self.bump();
            }
            if self.peek() == Some(';') {
                while self.peek().is_some() && self.peek() != Some('\n') {
                    self.bump();
                }
            }
            if self.idx == save {
                break;
            }
        }
    }

    fn parse_expr(&mut self) -> CompileResult<Spanned<Sexpr>> {
        self.skip_space();
        let loc = self.loc();
        if self.at_end() {
            return Err(CompileError::syntax(loc, "empty program"));
        }
        match self.peek().unwrap() {
            '(' => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_space();
                    if self.at_end() {
                        return Err(CompileError::syntax(loc, "unbalanced parenthesis"));
                    }
                    if self.peek() == Some(')') {
                        self.bump();
                        break;
                    }
                    items.push(self.parse_expr()?);
                }
                Ok(Spanned::new(loc, Sexpr::List(items)))
            }
            ')' => Err(CompileError::syntax(loc, "bad parenthesis")),
            '"' | '\'' => self.parse_quotes(),
            _ => {
                let start = self.idx;
                while !self.at_end() && !self.peek().unwrap().is_whitespace() && !"()".contains(self.peek().unwrap())
                {
                    self.bump();
                }
                if self.idx == start {
                    return Err(CompileError::syntax(loc, "empty program"));
                }
                let text: String = self.chars[start..self.idx].iter().collect();
                Ok(Spanned::new(loc, parse_value(&text, loc)?))
            }
        }
    }

    fn parse_quotes(&mut self) -> CompileResult<Spanned<Sexpr>> {
        let loc = self.loc();
        let term = self.peek().unwrap();
        self.bump();
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(CompileError::syntax(loc, "unbalanced parenthesis")),
                Some(c) if c == term => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    let escaped = self
                        .bump()
                        .ok_or_else(|| CompileError::syntax(loc, "bad string"))?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        other => other,
                    });
                }
                Some(c) => {
                    self.bump();
                    out.push(c);
                }
            }
        }
        if term == '"' {
            Ok(Spanned::new(loc, Sexpr::Str(out)))
        } else {
            let mut chars = out.chars();
            let c = chars
                .next()
                .ok_or_else(|| CompileError::syntax(loc, "bad char"))?;
            if chars.next().is_some() {
                return Err(CompileError::syntax(loc, "bad char"));
            }
            let v = c as u32;
            if v >= 256 {
                return Err(CompileError::value(loc, "bad integer range"));
            }
            Ok(Spanned::new(loc, Sexpr::Byte(v as u8)))
        }
    }
}

fn try_int(s: &str) -> Option<i64> {
    let (body, base) = if s.len() > 2 && (s.starts_with("0x") || s.starts_with("0X")) {
        (&s[2..], 16)
    } else {
        (s, 10)
    };
    i64::from_str_radix(body, base).ok()
}

/// Parse a single bare token into a constant or a name atom.
fn parse_value(s: &str, loc: Location) -> CompileResult<Sexpr> {
    if let Some(v) = try_int(s) {
        return Ok(Sexpr::Int(v));
    }

    if let Some(prefix) = s.strip_suffix("u8") {
        if let Some(v) = try_int(prefix) {
            if !(0..256).contains(&v) {
                return Err(CompileError::value(loc, "bad integer range"));
            }
            return Ok(Sexpr::Byte(v as u8));
        }
    }

    if s.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(CompileError::name(loc, "bad name"));
    }
    Ok(Sexpr::Atom(s.to_string()))
}

/// Parse the whole program as the implicit body of `main`:
/// `(def (main int) () (do <source>))`.
pub fn parse_main(text: &str) -> CompileResult<Spanned<Sexpr>> {
    let mut lexer = Lexer::new(text);
    let mut body = Vec::new();
    loop {
        lexer.skip_space();
        if lexer.at_end() {
            break;
        }
        if lexer.peek() == Some(')') {
            return Err(CompileError::syntax(lexer.loc(), "bad parenthesis"));
        }
        body.push(lexer.parse_expr()?);
    }
    lexer.skip_space();
    if !lexer.at_end() {
        return Err(CompileError::syntax(lexer.loc(), "trailing garbage"));
    }

    let root_loc = Location::new(1);
    let sig = Spanned::new(
        root_loc,
        Sexpr::List(vec![Spanned::new(root_loc, Sexpr::Atom("main".into()))
            .with_tail(Sexpr::Atom("int".into()))]),
    );
    let do_block = Spanned::new(root_loc, Sexpr::List({
        let mut v = vec![Spanned::new(root_loc, Sexpr::Atom("do".into()))];
        v.extend(body);
        v
    }));
    Ok(Spanned::new(
        root_loc,
        Sexpr::List(vec![
            Spanned::new(root_loc, Sexpr::Atom("def".into())),
            sig,
            Spanned::new(root_loc, Sexpr::List(vec![])),
            do_block,
        ]),
    ))
}

impl Spanned<Sexpr> {
    /// Helper used only when synthesizing the implicit `(main int)`
    /// signature list out of two atoms rather than lexing it.
    fn with_tail(self, tail: Sexpr) -> Spanned<Sexpr> {
        let loc = self.location;
        Spanned::new(loc, Sexpr::List(vec![self, Spanned::new(loc, tail)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_one(s: &str) -> Sexpr {
        let mut lexer = Lexer::new(s);
        lexer.parse_expr().unwrap().node
    }

    #[test]
    fn parses_nested_lists() {
        let node = lex_one("(+ (- 1 2) 3)");
        match node {
            Sexpr::List(items) => assert_eq!(items.len(), 3),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn parses_hex_and_u8() {
        assert_eq!(lex_one("0x10"), Sexpr::Int(16));
        assert_eq!(lex_one("124u8"), Sexpr::Byte(124));
    }

    #[test]
    fn rejects_leading_digit_names() {
        let mut lexer = Lexer::new("1abc");
        assert!(lexer.parse_expr().is_err());
    }

    #[test]
    fn single_quote_is_a_byte() {
        assert_eq!(lex_one("'a'"), Sexpr::Byte(b'a'));
    }

    #[test]
    fn comments_are_skipped() {
        let node = lex_one("(+ 1 ; comment\n 2)");
        match node {
            Sexpr::List(items) => assert_eq!(items.len(), 3),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse_main("1 2) 3").is_err());
    }
}

//! Lowering from the untyped `Sexpr` tree into `Expr`, a tagged union with
//! one variant per expression form. This is where every "what kind of
//! expression is this list" decision is made, once, up front: everything
//! downstream (the IR generator) matches on `Expr` directly instead of
//! re-inspecting a list's head atom and re-checking its arity.

use crate::error::CompileError;
use crate::error::CompileResult as Result;
use crate::location::Location;
use crate::sexpr::{Sexpr, Spanned};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Eager (non-short-circuiting) boolean and/or.
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// `do`, `then`, and `else` are interchangeable spellings of the same
/// sequential-block form; the name is kept only so a textual dump can
/// echo back the keyword the author wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Do,
    Then,
    Else,
}

/// A type expression, kept in its raw atom-list form. The IR layer is the
/// one that knows how to validate and interpret these (`int`, `byte`,
/// `(ptr T)`, `void`).
pub type TypeExpr = Vec<Spanned<Sexpr>>;

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub rtype: TypeExpr,
    pub args: Vec<(String, TypeExpr)>,
    pub body: Box<Spanned<Expr>>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Var(String),
    ConstInt(i64),
    ConstByte(u8),
    ConstStr(String),
    BinOp(BinOp, Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    UnOp(UnOp, Box<Spanned<Expr>>),
    Scope(ScopeKind, Vec<Spanned<Expr>>),
    NewVar(String, Box<Spanned<Expr>>),
    Set(String, Box<Spanned<Expr>>),
    If(Box<Spanned<Expr>>, Box<Spanned<Expr>>, Option<Box<Spanned<Expr>>>),
    Loop(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    Break,
    Continue,
    Call(String, Vec<Spanned<Expr>>),
    Syscall(i64, Vec<Spanned<Expr>>),
    Return(Option<Box<Spanned<Expr>>>),
    /// `(ptr T)` in expression position: the null pointer of type `ptr T`.
    /// The same syntax is also used as a type expression; which reading
    /// applies depends on where the surrounding form consumes it.
    NullPtr(TypeExpr),
    Cast(TypeExpr, Box<Spanned<Expr>>),
    Peek(Box<Spanned<Expr>>),
    Poke(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    Ref(String),
    Debug,
    Def(FuncDef),
}

fn err_shape(loc: Location, msg: impl Into<String>) -> CompileError {
    CompileError::shape(loc, msg)
}

/// Lower a parsed source tree into the top-level `Expr`. `sx` is expected to
/// be the synthetic `(def (main int) () (do ...))` wrapper produced by
/// `sexpr::parse_main`.
pub fn lower_program(sx: &Spanned<Sexpr>) -> Result<Spanned<Expr>> {
    lower(sx)
}

fn as_list(sx: &Spanned<Sexpr>) -> Result<&[Spanned<Sexpr>]> {
    match &sx.node {
        Sexpr::List(items) => Ok(items),
        _ => Err(err_shape(sx.location, "expected a list")),
    }
}

fn as_atom(sx: &Spanned<Sexpr>) -> Result<&str> {
    match &sx.node {
        Sexpr::Atom(s) => Ok(s.as_str()),
        _ => Err(err_shape(sx.location, "expected a name")),
    }
}

fn lower(sx: &Spanned<Sexpr>) -> Result<Spanned<Expr>> {
    let loc = sx.location;
    match &sx.node {
        Sexpr::Int(v) => Ok(Spanned::new(loc, Expr::ConstInt(*v))),
        Sexpr::Byte(v) => Ok(Spanned::new(loc, Expr::ConstByte(*v))),
        Sexpr::Str(s) => Ok(Spanned::new(loc, Expr::ConstStr(s.clone()))),
        Sexpr::Atom(name) => Ok(Spanned::new(loc, Expr::Var(name.clone()))),
        Sexpr::List(items) => lower_list(loc, items),
    }
}

fn lower_list(loc: Location, items: &[Spanned<Sexpr>]) -> Result<Spanned<Expr>> {
    if items.is_empty() {
        return Err(err_shape(loc, "empty list"));
    }
    let head = as_atom(&items[0])?;
    let rest = &items[1..];

    let expr = match head {
        "do" => Expr::Scope(ScopeKind::Do, lower_each(rest)?),
        "then" => Expr::Scope(ScopeKind::Then, lower_each(rest)?),
        "else" => Expr::Scope(ScopeKind::Else, lower_each(rest)?),

        "var" => {
            expect_len(loc, rest, 2, "var")?;
            Expr::NewVar(as_atom(&rest[0])?.to_string(), Box::new(lower(&rest[1])?))
        }
        "set" => {
            expect_len(loc, rest, 2, "set")?;
            Expr::Set(as_atom(&rest[0])?.to_string(), Box::new(lower(&rest[1])?))
        }

        "if" | "?" => {
            if rest.len() != 2 && rest.len() != 3 {
                return Err(err_shape(loc, "bad if"));
            }
            let cond = Box::new(lower(&rest[0])?);
            let then = Box::new(lower(&rest[1])?);
            let els = if rest.len() == 3 {
                Some(Box::new(lower(&rest[2])?))
            } else {
                None
            };
            Expr::If(cond, then, els)
        }

        "loop" => {
            expect_len(loc, rest, 2, "loop")?;
            Expr::Loop(Box::new(lower(&rest[0])?), Box::new(lower(&rest[1])?))
        }
        "break" => {
            expect_len(loc, rest, 0, "break")?;
            Expr::Break
        }
        "continue" => {
            expect_len(loc, rest, 0, "continue")?;
            Expr::Continue
        }

        "return" => {
            if rest.len() > 1 {
                return Err(err_shape(loc, "bad return"));
            }
            Expr::Return(match rest.first() {
                Some(e) => Some(Box::new(lower(e)?)),
                None => None,
            })
        }

        "syscall" => {
            if rest.is_empty() {
                return Err(err_shape(loc, "bad syscall"));
            }
            let num = match &rest[0].node {
                Sexpr::Int(n) if *n >= 0 => *n,
                _ => return Err(CompileError::value(rest[0].location, "bad syscall number")),
            };
            Expr::Syscall(num, lower_each(&rest[1..])?)
        }

        "ptr" => Expr::NullPtr(items.to_vec()),
        "cast" => {
            expect_len(loc, rest, 2, "cast")?;
            Expr::Cast(type_expr(&rest[0])?, Box::new(lower(&rest[1])?))
        }
        "peek" => {
            expect_len(loc, rest, 1, "peek")?;
            Expr::Peek(Box::new(lower(&rest[0])?))
        }
        "poke" => {
            expect_len(loc, rest, 2, "poke")?;
            Expr::Poke(Box::new(lower(&rest[0])?), Box::new(lower(&rest[1])?))
        }
        "ref" => {
            expect_len(loc, rest, 1, "ref")?;
            Expr::Ref(as_atom(&rest[0])?.to_string())
        }
        "debug" => {
            expect_len(loc, rest, 0, "debug")?;
            Expr::Debug
        }

        "def" => Expr::Def(lower_def(loc, rest)?),

        "call" => {
            if rest.is_empty() {
                return Err(err_shape(loc, "bad call"));
            }
            Expr::Call(as_atom(&rest[0])?.to_string(), lower_each(&rest[1..])?)
        }

        "%" | "*" | "+" | "-" | "/" | "and" | "or" | "eq" | "ge" | "gt" | "le" | "lt" | "ne"
            if rest.len() == 2 =>
        {
            Expr::BinOp(binop(head), Box::new(lower(&rest[0])?), Box::new(lower(&rest[1])?))
        }
        "-" if rest.len() == 1 => Expr::UnOp(UnOp::Neg, Box::new(lower(&rest[0])?)),
        "not" if rest.len() == 1 => Expr::UnOp(UnOp::Not, Box::new(lower(&rest[0])?)),

        _ => return Err(err_shape(loc, "unknown expression")),
    };
    Ok(Spanned::new(loc, expr))
}

fn binop(word: &str) -> BinOp {
    match word {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" => BinOp::Mod,
        "and" => BinOp::And,
        "or" => BinOp::Or,
        "eq" => BinOp::Eq,
        "ne" => BinOp::Ne,
        "lt" => BinOp::Lt,
        "le" => BinOp::Le,
        "gt" => BinOp::Gt,
        "ge" => BinOp::Ge,
        _ => unreachable!("binop dispatch table out of sync"),
    }
}

fn expect_len(loc: Location, items: &[Spanned<Sexpr>], n: usize, form: &str) -> Result<()> {
    if items.len() != n {
        Err(err_shape(loc, format!("bad {form}")))
    } else {
        Ok(())
    }
}

fn lower_each(items: &[Spanned<Sexpr>]) -> Result<Vec<Spanned<Expr>>> {
    items.iter().map(lower).collect()
}

fn type_expr(sx: &Spanned<Sexpr>) -> Result<TypeExpr> {
    match &sx.node {
        Sexpr::Atom(_) => Ok(vec![sx.clone()]),
        Sexpr::List(items) => Ok(items.to_vec()),
        _ => Err(err_shape(sx.location, "bad type")),
    }
}

/// `(def (name T) (arg0 T0 arg1 T1 ...) body)`: unlike a standalone type
/// expression, the signature's element and argument types are flattened
/// as trailing bare atoms in the same list rather than nested sub-lists,
/// except when a type is itself a compound form like `(ptr T)`.
fn lower_def(loc: Location, rest: &[Spanned<Sexpr>]) -> Result<FuncDef> {
    if rest.len() != 3 {
        return Err(err_shape(loc, "bad def"));
    }
    let sig = as_list(&rest[0])?;
    if sig.is_empty() {
        return Err(err_shape(rest[0].location, "bad def signature"));
    }
    let name = as_atom(&sig[0])?.to_string();
    let rtype = flatten_type_tail(&sig[1..]);

    let arg_items = as_list(&rest[1])?;
    let args = lower_arg_list(arg_items)?;

    let body = Box::new(lower(&rest[2])?);
    Ok(FuncDef {
        name,
        rtype,
        args,
        body,
    })
}

/// The remaining elements of a signature or argument list, after the name,
/// form a single type expression: if there is exactly one element and it is
/// itself a list (e.g. `(ptr int)`), that nested list *is* the type; more
/// than one trailing atom (e.g. bare `int` by itself) is the ordinary case.
fn flatten_type_tail(tail: &[Spanned<Sexpr>]) -> TypeExpr {
    if tail.len() == 1 {
        if let Sexpr::List(items) = &tail[0].node {
            return items.to_vec();
        }
    }
    tail.to_vec()
}

fn lower_arg_list(items: &[Spanned<Sexpr>]) -> Result<Vec<(String, TypeExpr)>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < items.len() {
        let name = as_atom(&items[i])?.to_string();
        if i + 1 >= items.len() {
            return Err(err_shape(items[i].location, "missing argument type"));
        }
        // One trailing element per argument: a bare type atom, or a
        // nested compound type like `(ptr int)`.
        let j = i + 2;
        let ty = flatten_type_tail(&items[i + 1..j]);
        out.push((name, ty));
        i = j;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::parse_main;

    fn lower_source(src: &str) -> Spanned<Expr> {
        let sx = parse_main(src).unwrap();
        lower_program(&sx).unwrap()
    }

    #[test]
    fn wraps_source_in_implicit_main() {
        let expr = lower_source("1");
        match expr.node {
            Expr::Def(FuncDef { name, .. }) => assert_eq!(name, "main"),
            _ => panic!("expected implicit main def"),
        }
    }

    #[test]
    fn binop_parses_with_two_args() {
        let expr = lower_source("(+ (- 1 2) 3)");
        if let Expr::Def(FuncDef { body, .. }) = expr.node {
            if let Expr::Scope(ScopeKind::Do, items) = body.node {
                match &items[0].node {
                    Expr::BinOp(BinOp::Add, lhs, _) => {
                        assert!(matches!(lhs.node, Expr::BinOp(BinOp::Sub, _, _)));
                    }
                    _ => panic!("expected binop"),
                }
            }
        }
    }

    #[test]
    fn unary_minus_disambiguates_by_arity() {
        let expr = lower_source("(- 5)");
        if let Expr::Def(FuncDef { body, .. }) = expr.node {
            if let Expr::Scope(_, items) = body.node {
                assert!(matches!(items[0].node, Expr::UnOp(UnOp::Neg, _)));
            }
        }
    }

    #[test]
    fn def_flattens_signature_and_arg_types() {
        let sx = parse_main("(def (add int) (a int b int) (+ a b))").unwrap();
        let expr = lower_program(&sx).unwrap();
        if let Expr::Def(FuncDef { body, .. }) = expr.node {
            if let Expr::Scope(_, items) = body.node {
                if let Expr::Def(inner) = &items[0].node {
                    assert_eq!(inner.name, "add");
                    assert_eq!(inner.args.len(), 2);
                    assert_eq!(inner.args[0].0, "a");
                }
            }
        }
    }

    #[test]
    fn call_form_names_the_callee_explicitly() {
        let expr = lower_source("(call foo 1 2)");
        if let Expr::Def(FuncDef { body, .. }) = expr.node {
            if let Expr::Scope(_, items) = body.node {
                assert!(matches!(&items[0].node, Expr::Call(name, args) if name == "foo" && args.len() == 2));
            }
        }
    }

    #[test]
    fn unknown_form_is_a_shape_error() {
        let sx = parse_main("(foo 1 2)").unwrap();
        assert!(lower_program(&sx).is_err());
    }

    #[test]
    fn break_rejects_extra_arguments() {
        let sx = parse_main("(break 1)").unwrap();
        assert!(lower_program(&sx).is_err());
    }
}

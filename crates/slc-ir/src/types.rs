//! Canonical value types and the type validator.

use std::fmt;
use slc_reader::{CompileError, CompileResult, Sexpr, Spanned};

/// A canonical type tuple: `void`, `int` (64-bit signed), `byte` (8-bit
/// unsigned), or `ptr T` for a non-`void` `T`. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Int,
    Byte,
    Ptr(Box<Type>),
}

impl Type {
    pub fn ptr(inner: Type) -> Type {
        Type::Ptr(Box::new(inner))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int => write!(f, "int"),
            Type::Byte => write!(f, "byte"),
            Type::Ptr(inner) => write!(f, "(ptr {inner})"),
        }
    }
}

/// Validate a raw type expression (head atom + tail) into a canonical
/// `Type`, or fail with a *type* error. `ptr` requires a non-empty,
/// non-`void` tail; `void`/`int`/`byte` forbid a tail; any other head is
/// rejected.
pub fn validate_type(expr: &[Spanned<Sexpr>]) -> CompileResult<Type> {
    let (head, tail) = expr
        .split_first()
        .ok_or_else(|| CompileError::ty(slc_reader::Location::COMMAND_LINE, "type missing"))?;
    let loc = head.location;
    let head_name = match &head.node {
        Sexpr::Atom(s) => s.as_str(),
        _ => return Err(CompileError::ty(loc, "unknown type")),
    };

    match head_name {
        "ptr" => {
            if tail.is_empty() {
                return Err(CompileError::ty(loc, "bad pointer element"));
            }
            let inner = validate_type(tail)?;
            if inner.is_void() {
                return Err(CompileError::ty(loc, "bad pointer element"));
            }
            Ok(Type::ptr(inner))
        }
        "void" => reject_tail(loc, tail, Type::Void),
        "int" => reject_tail(loc, tail, Type::Int),
        "byte" => reject_tail(loc, tail, Type::Byte),
        _ => Err(CompileError::ty(loc, "unknown type")),
    }
}

fn reject_tail(
    loc: slc_reader::Location,
    tail: &[Spanned<Sexpr>],
    ty: Type,
) -> CompileResult<Type> {
    if tail.is_empty() {
        Ok(ty)
    } else {
        Err(CompileError::ty(loc, "bad scalar type"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slc_reader::parse_main;
    use slc_reader::ast::{Expr, FuncDef};

    fn type_of(src: &str) -> CompileResult<Type> {
        // Parse a standalone type expression by compiling it as the
        // return type of a throwaway function signature.
        let program = format!("(def (f {src}) () 0)");
        let sx = parse_main(&program).unwrap();
        let top = slc_reader::lower_program(&sx).unwrap();
        if let Expr::Def(FuncDef { body, .. }) = top.node {
            if let Expr::Scope(_, items) = body.node {
                if let Expr::Def(inner) = &items[0].node {
                    return validate_type(&inner.rtype);
                }
            }
        }
        panic!("failed to extract type expression");
    }

    #[test]
    fn validates_scalar_types() {
        assert_eq!(type_of("int").unwrap(), Type::Int);
        assert_eq!(type_of("byte").unwrap(), Type::Byte);
        assert_eq!(type_of("void").unwrap(), Type::Void);
    }

    #[test]
    fn validates_nested_pointers() {
        assert_eq!(
            type_of("(ptr (ptr int))").unwrap(),
            Type::ptr(Type::ptr(Type::Int))
        );
    }

    #[test]
    fn rejects_pointer_to_void() {
        assert!(type_of("(ptr void)").is_err());
    }

    #[test]
    fn rejects_unknown_head() {
        assert!(type_of("fish").is_err());
    }

    #[test]
    fn type_round_trips_through_validation() {
        let t = type_of("(ptr byte)").unwrap();
        assert_eq!(t, Type::ptr(Type::Byte));
    }
}

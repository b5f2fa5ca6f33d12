//! Canonical types, the per-function virtual-stack manager, the scope
//! chain, and the IR instruction set. This crate has no notion of
//! *compiling* an expression; `slc-compile` is the dispatcher that walks
//! parsed expressions and drives these pieces.

pub mod func_ctx;
pub mod opcode;
pub mod program;
pub mod scope;
pub mod types;

pub use func_ctx::{FuncRef, FunctionCtx};
pub use opcode::{BinOp, ConstValue, Inst, Label, UnOp};
pub use program::Program;
pub use scope::{FuncBinding, Scope, VarBinding};
pub use types::{validate_type, Type};

//! The IR instruction set: a flat, append-only, three-address form with
//! one variant per opcode in the spec's opcode table. Operand fields are
//! data-stack slot indices except where noted.

use slc_entity::entity_impl;
pub use slc_reader::ast::{BinOp, UnOp};

/// A label id local to one function. Labels are allocated unresolved and
/// bound to an instruction index later via `FunctionCtx::set_label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);
entity_impl!(Label);

/// The literal carried by a `const` instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Byte(u8),
    /// A string literal; the codegen deduplicates by exact byte identity
    /// and appends the NUL-terminated UTF-8 bytes to the string pool.
    Str(String),
}

/// `ret`'s operand: either a data-stack slot, or no value (void return).
pub type RetSlot = Option<i32>;

#[derive(Debug, Clone)]
pub enum Inst {
    Const { value: ConstValue, dst: i32 },
    Mov { src: i32, dst: i32 },
    BinOp { op: BinOp, a1: i32, a2: i32, dst: i32 },
    /// Reserved: the IR representation supports byte-width binops, but
    /// the code generator always widens operands to 64 bits and never
    /// emits this opcode.
    BinOp8 { op: BinOp, a1: i32, a2: i32, dst: i32 },
    UnOp { op: UnOp, a1: i32, dst: i32 },
    /// Reserved, like `BinOp8`.
    UnOp8 { op: UnOp, a1: i32, dst: i32 },
    Jmpf { cond: i32, label: Label },
    Jmp { label: Label },
    Ret { a1: RetSlot },
    Call { func: crate::func_ctx::FuncRef, arg_start: i32, level_cur: u32, level_new: u32 },
    GetEnv { level_var: u32, var: i32, dst: i32 },
    SetEnv { level_var: u32, var: i32, src: i32 },
    RefVar { var: i32, dst: i32 },
    RefEnv { level_var: u32, var: i32, dst: i32 },
    /// `a1 + a2 * scale`, `scale` signed to express pointer subtraction.
    Lea { a1: i32, a2: i32, scale: i32, dst: i32 },
    Peek { var: i32, dst: i32 },
    Peek8 { var: i32, dst: i32 },
    Poke { ptr: i32, val: i32 },
    Poke8 { ptr: i32, val: i32 },
    /// In-place mask of `var` to its low byte.
    Cast8 { var: i32 },
    Syscall { dst: i32, num: i64, args: Vec<i32> },
    Debug,
}

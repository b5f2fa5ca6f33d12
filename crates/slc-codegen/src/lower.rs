//! Walks one function's IR instruction list and emits its machine code,
//! recording the instruction-index -> code-offset map the assembler
//! needs to resolve its own jump targets afterward.

use slc_ir::{FunctionCtx, Inst};

use crate::assembler::Assembler;

/// Emit every function in `program`, in `FuncRef` order (index 0 is
/// always `main`), padding each to `alignment` bytes. Returns nothing;
/// callers read the code back out of `asm.buf` once every function (and
/// the caller's own entry stub) has been appended.
pub fn emit_functions(asm: &mut Assembler, funcs: &[&FunctionCtx], alignment: usize) {
    for func in funcs {
        asm.pad_to(alignment);
        asm.func2off.push(asm.offset());
        emit_one(asm, func);
    }
}

fn emit_one(asm: &mut Assembler, func: &FunctionCtx) {
    let mut pos2off = Vec::with_capacity(func.code.len());
    for inst in &func.code {
        let offset = asm.offset();
        log::trace!("{offset:#06x}: {inst:?}");
        pos2off.push(offset);
        emit_inst(asm, inst);
    }
    let labels = func.label_targets();
    asm.resolve_jumps(&pos2off, &labels);
}

fn emit_inst(asm: &mut Assembler, inst: &Inst) {
    match inst.clone() {
        Inst::Const { value, dst } => match value {
            slc_ir::ConstValue::Int(v) => asm.const_int(v, dst),
            slc_ir::ConstValue::Byte(v) => asm.const_int(v as i64, dst),
            slc_ir::ConstValue::Str(s) => asm.const_str(&s, dst),
        },
        Inst::Mov { src, dst } => asm.mov(src, dst),
        Inst::BinOp { op, a1, a2, dst } | Inst::BinOp8 { op, a1, a2, dst } => asm.binop(op, a1, a2, dst),
        Inst::UnOp { op, a1, dst } | Inst::UnOp8 { op, a1, dst } => asm.unop(op, a1, dst),
        Inst::Jmpf { cond, label } => asm.jmpf(cond, label),
        Inst::Jmp { label } => asm.jmp(label),
        Inst::Ret { a1 } => asm.ret(a1),
        Inst::Call { func, arg_start, level_cur, level_new } => {
            asm.call_func(func, arg_start, level_cur, level_new)
        }
        Inst::GetEnv { level_var, var, dst } => asm.get_env(level_var, var, dst),
        Inst::SetEnv { level_var, var, src } => asm.set_env(level_var, var, src),
        Inst::RefVar { var, dst } => asm.ref_var(var, dst),
        Inst::RefEnv { level_var, var, dst } => asm.ref_env(level_var, var, dst),
        Inst::Lea { a1, a2, scale, dst } => asm.lea(a1, a2, scale, dst),
        Inst::Peek { var, dst } => asm.peek(var, dst),
        Inst::Peek8 { var, dst } => asm.peek8(var, dst),
        Inst::Poke { ptr, val } => asm.poke(ptr, val),
        Inst::Poke8 { ptr, val } => asm.poke8(ptr, val),
        Inst::Cast8 { var } => asm.cast8(var),
        Inst::Syscall { dst, num, args } => asm.call_syscall(dst, num, &args),
        Inst::Debug => asm.debug(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slc_ir::Type;

    #[test]
    fn emitting_an_empty_function_only_produces_padding_and_ret() {
        let mut f = FunctionCtx::new(1, Type::Int, None);
        f.code.push(Inst::Ret { a1: None });
        let mut asm = Assembler::new();
        emit_functions(&mut asm, &[&f], 16);
        assert_eq!(asm.func2off, vec![0]);
        assert!(asm.buf.contains(&0xc3));
    }
}

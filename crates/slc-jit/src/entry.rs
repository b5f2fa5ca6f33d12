//! The C-callable entry stub: `int64_t (*)(void *stack)`. Bridges the
//! host calling convention (stack pointer in the platform's first
//! integer argument register) to the generated code's convention
//! (stack pointer pinned in `rbx`).

use slc_codegen::Assembler;
use slc_ir::FuncRef;

pub fn emit_entry(asm: &mut Assembler) {
    asm.raw(&[0x53]); // push rbx
    if cfg!(windows) {
        asm.raw(&[0x48, 0x89, 0xcb]); // mov rbx, rcx
    } else {
        asm.raw(&[0x48, 0x89, 0xfb]); // mov rbx, rdi
    }
    asm.call_func(FuncRef::new(0), 0, 1, 1);
    asm.raw(&[0x48, 0x8b, 0x03]); // mov rax, [rbx]
    asm.raw(&[0x5b]); // pop rbx
    asm.raw(&[0xc3]); // ret
}

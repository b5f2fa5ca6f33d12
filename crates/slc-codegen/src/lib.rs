//! x86-64 code generation: lowers a compiled `slc_ir::Program` into a
//! relocatable byte buffer. This crate knows nothing about ELF or
//! mmap-based execution; `slc-object` and `slc-jit` each build their own
//! entry stub around the function bodies emitted here.

pub mod assembler;
pub mod lower;
pub mod registers;

pub use assembler::Assembler;
pub use lower::emit_functions;

use slc_ir::Program;

/// The default instruction alignment padding between functions, in
/// bytes; matches the default command-line `--alignment` value.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// A fully assembled program: its code (including whatever entry stub
/// the caller spliced in before calling this) plus the appended string
/// pool, and the byte offset of each function's first instruction.
pub struct CompiledProgram {
    pub code: Vec<u8>,
    pub func_offsets: Vec<usize>,
}

/// Emit every function in `program` at `alignment`-byte boundaries into
/// `asm`, then resolve calls and string references. `asm` must already
/// contain whatever entry stub the caller wants to run before `main`.
pub fn compile_into(asm: &mut Assembler, program: &Program, alignment: usize) -> CompiledProgram {
    let funcs: Vec<_> = program.funcs.values().collect();
    emit_functions(asm, &funcs, alignment);
    asm.pad_to(alignment);
    let mut strings = Vec::new();
    asm.finish(&mut strings);
    let mut code = std::mem::take(&mut asm.buf);
    code.extend_from_slice(&strings);
    CompiledProgram {
        code,
        func_offsets: asm.func2off.clone(),
    }
}

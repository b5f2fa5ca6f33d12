//! Runs a compiled program directly, without writing an executable file:
//! assemble into a buffer, copy it into an executable mapping, and call
//! straight into it.

pub mod entry;
pub mod memory;

use anyhow::Result;
use slc_codegen::Assembler;
use slc_ir::Program;

use memory::{DataStack, ExecutableMemory, DATA_STACK_SIZE};

/// A JIT-compiled program, holding the live mappings it was called
/// through. Dropping it releases both.
pub struct JitProgram {
    code: ExecutableMemory,
    stack: DataStack,
}

impl JitProgram {
    /// Assemble `program` and map it executable.
    pub fn compile(program: &Program, alignment: usize) -> Result<Self> {
        let mut asm = Assembler::new();
        entry::emit_entry(&mut asm);
        let compiled = slc_codegen::compile_into(&mut asm, program, alignment);
        log::debug!("jit: {} bytes of code, {} functions", compiled.code.len(), compiled.func_offsets.len());

        let code = ExecutableMemory::new(&compiled.code)?;
        let stack = DataStack::new(DATA_STACK_SIZE)?;
        log::debug!("jit: mapped {} bytes executable, {DATA_STACK_SIZE:#x} bytes data stack", compiled.code.len());
        Ok(JitProgram { code, stack })
    }

    /// Call into `main`, returning its result.
    pub fn run(&self) -> i64 {
        let entry = self.code.entry_fn();
        entry(self.stack.base_ptr())
    }
}

/// Compile and immediately run `program`, returning `main`'s result.
pub fn run(program: &Program, alignment: usize) -> Result<i64> {
    Ok(JitProgram::compile(program, alignment)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_program() {
        let program = slc_compile::compile_source("1").unwrap();
        let compiled = JitProgram::compile(&program, 16);
        assert!(compiled.is_ok());
    }

    #[test]
    fn compiles_a_recursive_function() {
        let source =
            "(do (def (fib int) (n int) (if (lt n 2) n (+ (call fib (- n 1)) (call fib (- n 2))))) (call fib 10))";
        let program = slc_compile::compile_source(source).unwrap();
        assert!(JitProgram::compile(&program, 16).is_ok());
    }
}

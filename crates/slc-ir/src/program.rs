//! The program-wide container of function contexts.

use slc_entity::PrimaryMap;

use crate::func_ctx::{FuncRef, FunctionCtx};
use crate::types::Type;

/// All function contexts produced by compiling one source file, addressed
/// by the dense `FuncRef` the `call` opcode carries. Index 0 is always
/// `main`.
#[derive(Debug, Default)]
pub struct Program {
    pub funcs: PrimaryMap<FuncRef, FunctionCtx>,
}

impl Program {
    pub fn new() -> Self {
        Program {
            funcs: PrimaryMap::new(),
        }
    }

    /// Register a new, empty function context and return its index.
    pub fn push_func(&mut self, level: u32, rtype: Type, parent: Option<FuncRef>) -> FuncRef {
        self.funcs.push(FunctionCtx::new(level, rtype, parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_is_always_the_first_function() {
        let mut program = Program::new();
        let main = program.push_func(1, Type::Int, None);
        assert_eq!(main.index(), 0);
    }
}

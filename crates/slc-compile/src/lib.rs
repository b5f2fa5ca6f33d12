//! Type validation and IR generation: walks a parsed `Expr` tree and
//! drives `slc_ir::FunctionCtx`/`Scope` to produce a `Program`.

pub mod compiler;

pub use compiler::compile_program;

use slc_ir::Program;
use slc_reader::CompileResult;

/// Parse and compile a full source file straight through to IR.
pub fn compile_source(source: &str) -> CompileResult<Program> {
    let top = slc_reader::parse(source)?;
    compile_program(&top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slc_ir::{Inst, Type};

    fn main_code(source: &str) -> Vec<Inst> {
        let program = compile_source(source).unwrap();
        program.funcs[slc_ir::FuncRef::new(0)].code.clone()
    }

    #[test]
    fn trivial_constant_program_compiles() {
        let code = main_code("1");
        assert!(matches!(code.last(), Some(Inst::Ret { a1: Some(_) })));
    }

    #[test]
    fn stack_returns_to_nvar_after_statement() {
        let program = compile_source("(do (+ 1 2) (+ 3 4))").unwrap();
        let f = &program.funcs[slc_ir::FuncRef::new(0)];
        assert_eq!(f.stack, f.nvar);
    }

    #[test]
    fn arithmetic_nests_without_clobbering_slots() {
        let code = main_code("(+ (- 1 2) 3)");
        let binops: Vec<_> = code
            .iter()
            .filter(|i| matches!(i, Inst::BinOp { .. }))
            .collect();
        assert_eq!(binops.len(), 2);
    }

    #[test]
    fn if_without_else_is_void() {
        let program = compile_source("(if 1 2)").unwrap();
        let f = &program.funcs[slc_ir::FuncRef::new(0)];
        assert!(matches!(f.code.last(), Some(Inst::Ret { a1: None })));
    }

    #[test]
    fn matching_branches_of_if_unify_to_one_type() {
        let program = compile_source("(if 1 2 3)").unwrap();
        let f = &program.funcs[slc_ir::FuncRef::new(0)];
        assert!(matches!(f.code.last(), Some(Inst::Ret { a1: Some(_) })));
    }

    #[test]
    fn mismatched_branch_types_are_rejected() {
        assert!(compile_source("(if 1 2 (cast byte 3))").is_err());
    }

    #[test]
    fn break_outside_loop_is_a_scope_error() {
        let err = compile_source("(break)").unwrap_err();
        assert_eq!(err.kind, slc_reader::ErrorKind::Scope);
    }

    #[test]
    fn recursive_function_compiles() {
        let source =
            "(do (def (fib int) (n int) (if (lt n 2) n (+ (call fib (- n 1)) (call fib (- n 2))))) (call fib 10))";
        assert!(compile_source(source).is_ok());
    }

    #[test]
    fn pointer_arithmetic_scales_by_element_size() {
        let source = "(do (var p (cast (ptr int) (ptr int))) (+ p 1))";
        let program = compile_source(source).unwrap();
        let f = &program.funcs[slc_ir::FuncRef::new(0)];
        assert!(f.code.iter().any(|i| matches!(i, Inst::Lea { scale: 8, .. })));
    }

    #[test]
    fn byte_pointer_arithmetic_does_not_scale() {
        let source = "(do (var p (cast (ptr byte) (ptr byte))) (+ p 1))";
        let program = compile_source(source).unwrap();
        let f = &program.funcs[slc_ir::FuncRef::new(0)];
        assert!(f.code.iter().any(|i| matches!(i, Inst::Lea { scale: 1, .. })));
    }

    #[test]
    fn call_arguments_are_contiguous_before_the_call() {
        let source = "(do (def (add int) (a int b int) (+ a b)) (call add 1 2))";
        let program = compile_source(source).unwrap();
        let f = &program.funcs[slc_ir::FuncRef::new(0)];
        let call = f.code.iter().find_map(|i| match i {
            Inst::Call { arg_start, .. } => Some(*arg_start),
            _ => None,
        });
        assert!(call.is_some());
    }

    #[test]
    fn syscall_returns_int() {
        let program = compile_source("(syscall 0 1 2 3)").unwrap();
        let f = &program.funcs[slc_ir::FuncRef::new(0)];
        assert!(matches!(f.rtype, Type::Void));
        assert!(f.code.iter().any(|i| matches!(i, Inst::Syscall { .. })));
    }

    #[test]
    fn negative_syscall_number_is_rejected() {
        assert!(compile_source("(syscall -1)").is_err());
    }

    #[test]
    fn loop_break_and_continue_compile() {
        let source = "(do (var i 0) (loop (lt i 10) (do (set i (+ i 1)) (if (eq i 5) (break)))))";
        assert!(compile_source(source).is_ok());
    }

    #[test]
    fn undefined_variable_is_a_name_error() {
        let err = compile_source("missing").unwrap_err();
        assert_eq!(err.kind, slc_reader::ErrorKind::Name);
    }

    #[test]
    fn nested_function_reads_enclosing_local_through_getenv() {
        let source = "(do (var x 5) (def (peek_x int) () x) (call peek_x))";
        let program = compile_source(source).unwrap();
        let main = &program.funcs[slc_ir::FuncRef::new(0)];
        let nested = &program.funcs[slc_ir::FuncRef::new(1)];
        assert!(nested.code.iter().any(|i| matches!(i, Inst::GetEnv { .. })));
        assert_eq!(main.level, 1);
        assert_eq!(nested.level, 2);
    }
}

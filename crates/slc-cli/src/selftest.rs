//! The no-arguments fallback: a handful of source snippets are compiled
//! and checked against their expected IR shape, as a quick smoke test
//! that the toolchain is wired together correctly.

use slc_ir::{ConstValue, Inst};

use crate::ir_dump;

fn main_code(source: &str) -> Vec<Inst> {
    let program = slc_compile::compile_source(source).expect("self-test source failed to compile");
    program.funcs[slc_ir::FuncRef::new(0)].code.clone()
}

pub fn run() {
    let code = main_code("1");
    assert!(matches!(&code[..], [Inst::Const { value: ConstValue::Int(1), dst: 0 }, Inst::Ret { a1: Some(0) }]));

    let code = main_code("(+ (- 1 2) 3)");
    assert_eq!(code.len(), 6, "expected const/const/binop/const/binop/ret");
    assert!(matches!(code[2], Inst::BinOp { op: slc_ir::BinOp::Sub, .. }));
    assert!(matches!(code[4], Inst::BinOp { op: slc_ir::BinOp::Add, .. }));

    let program = slc_compile::compile_source("(if 1 2 3)").expect("self-test source failed to compile");
    let dump = ir_dump::dump(&program);
    assert!(dump.contains("jmpf 0 L"));
    assert!(dump.contains("jmp L"));

    let source =
        "(do (def (fib int) (n int) (if (lt n 2) n (+ (call fib (- n 1)) (call fib (- n 2))))) (call fib 10))";
    slc_compile::compile_source(source).expect("recursive self-test source failed to compile");

    println!("self-test passed");
}

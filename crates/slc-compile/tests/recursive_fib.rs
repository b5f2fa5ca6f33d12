use slc_ir::{FuncRef, Inst};

#[test]
fn fib_compiles_with_a_call_back_into_itself() {
    let source =
        "(do (def (fib int) (n int) (if (lt n 2) n (+ (call fib (- n 1)) (call fib (- n 2))))) (call fib 10))";
    let program = slc_compile::compile_source(source).unwrap();

    let fib = FuncRef::new(1);
    let calls = program.funcs[fib]
        .code
        .iter()
        .filter(|inst| matches!(inst, Inst::Call { func, .. } if *func == fib))
        .count();
    assert_eq!(calls, 2, "fib should call itself twice in its recursive branch");
}

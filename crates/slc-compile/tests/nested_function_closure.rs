use slc_ir::{FuncRef, Inst};

#[test]
fn inner_function_reads_an_outer_local_through_get_env() {
    let source = "(do (var x 10) (def (bump int) () (set x (+ x 1))) (call bump) x)";
    let program = slc_compile::compile_source(source).unwrap();

    let bump = FuncRef::new(1);
    assert!(
        program.funcs[bump]
            .code
            .iter()
            .any(|inst| matches!(inst, Inst::GetEnv { .. })),
        "bump should read the enclosing function's `x` through the environment chain"
    );
    assert!(
        program.funcs[bump]
            .code
            .iter()
            .any(|inst| matches!(inst, Inst::SetEnv { .. })),
        "bump should write back to the enclosing function's `x`"
    );
}

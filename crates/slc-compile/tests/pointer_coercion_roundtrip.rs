use slc_ir::Inst;

#[test]
fn ref_poke_and_peek_round_trip_through_a_pointer() {
    let source = "(do (var x 5) (var p (ref x)) (poke p 9) (peek p))";
    let program = slc_compile::compile_source(source).unwrap();
    let main = slc_ir::FuncRef::new(0);
    let code = &program.funcs[main].code;

    assert!(code.iter().any(|inst| matches!(inst, Inst::RefVar { .. })));
    assert!(code.iter().any(|inst| matches!(inst, Inst::Poke { .. })));
    assert!(code.iter().any(|inst| matches!(inst, Inst::Peek { .. })));
}

#[test]
fn cast_between_pointer_and_int_is_a_bare_reinterpretation() {
    let source = "(do (var p (ptr int)) (cast int p))";
    let program = slc_compile::compile_source(source).unwrap();
    let main = slc_ir::FuncRef::new(0);
    // `int <- ptr` is a type-level coercion only: no Cast8 (that's
    // reserved for the byte-widening cast) should be emitted.
    assert!(!program.funcs[main].code.iter().any(|inst| matches!(inst, Inst::Cast8 { .. })));
}

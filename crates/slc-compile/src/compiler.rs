//! The expression compiler: an exhaustive match over `Expr` that drives
//! `FunctionCtx`/`Scope` and appends IR instructions. Two entry points,
//! differing only in what happens to temporaries after dispatch:
//! `compile_expr` is the statement-level wrapper, `compile_expr_tmp` is
//! the inner dispatcher that leaves them live.

use slc_ir::{validate_type, ConstValue, FuncBinding, FuncRef, Inst, Program, Type};
use slc_reader::ast::{BinOp, Expr, FuncDef, ScopeKind, TypeExpr, UnOp};
use slc_reader::{CompileError, CompileResult, Location, Spanned};

/// Compile a fully parsed source file into its program: a `main`
/// function (index 0) plus every function nested within it.
pub fn compile_program(top: &Spanned<Expr>) -> CompileResult<Program> {
    let def = match &top.node {
        Expr::Def(def) => def,
        _ => return Err(CompileError::shape(top.location, "expected top-level definition")),
    };
    let rtype = validate_type(&def.rtype)?;
    let mut program = Program::new();
    let main_ref = program.push_func(1, rtype, None);
    compile_def(&mut program, main_ref, def)?;
    Ok(program)
}

/// Bind arguments as locals, compile the body, and check its type
/// against the function's declared return type, emitting the trailing
/// `ret`.
fn compile_def(program: &mut Program, cur: FuncRef, def: &FuncDef) -> CompileResult<()> {
    for (name, ty_expr) in &def.args {
        let loc = arg_loc(ty_expr, def.body.location);
        let ty = validate_type(ty_expr)?;
        if ty.is_void() {
            return Err(CompileError::ty(loc, "bad argument type"));
        }
        program.funcs[cur].add_var(loc, name, ty)?;
    }
    debug_assert_eq!(program.funcs[cur].stack, def.args.len() as i32);

    let (body_ty, var) = compile_expr(program, cur, &def.body, false)?;
    let rtype = program.funcs[cur].rtype.clone();
    if !rtype.is_void() && rtype != body_ty {
        return Err(CompileError::ty(def.body.location, "bad body type"));
    }
    let ret_slot = if rtype.is_void() { None } else { Some(var) };
    program.funcs[cur].code.push(Inst::Ret { a1: ret_slot });
    Ok(())
}

fn arg_loc(ty_expr: &TypeExpr, fallback: Location) -> Location {
    ty_expr.first().map(|s| s.location).unwrap_or(fallback)
}

/// Register `(name, arg_types)` in the current scope before the body is
/// compiled, so mutually recursive adjacent definitions can see each
/// other.
fn pre_scan_func(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    def: &FuncDef,
) -> CompileResult<FuncRef> {
    let rtype = validate_type(&def.rtype)?;
    let mut arg_types = Vec::with_capacity(def.args.len());
    for (_, ty_expr) in &def.args {
        arg_types.push(validate_type(ty_expr)?);
    }
    let level = program.funcs[cur].level + 1;
    let func_ref = program.push_func(level, rtype.clone(), Some(cur));
    program.funcs[cur].define_func(loc, &def.name, arg_types, FuncBinding { rtype, func: func_ref })?;
    log::debug!("pre-scanned `{}` at level {level} as {func_ref:?}", def.name);
    Ok(func_ref)
}

/// The statement-level wrapper: asserts the stack discipline invariant
/// when `allow_var`, then discards (`allow_var`) or rewinds (otherwise)
/// any temporaries left behind by the dispatch.
fn compile_expr(
    program: &mut Program,
    cur: FuncRef,
    node: &Spanned<Expr>,
    allow_var: bool,
) -> CompileResult<(Type, i32)> {
    if allow_var {
        debug_assert_eq!(program.funcs[cur].stack, program.funcs[cur].nvar);
    }
    let save = program.funcs[cur].stack;
    let (tp, var) = compile_expr_tmp(program, cur, node, allow_var)?;
    debug_assert!(var < program.funcs[cur].stack);
    if allow_var {
        program.funcs[cur].stack = program.funcs[cur].nvar;
    } else {
        program.funcs[cur].stack = save;
    }
    debug_assert!(var <= program.funcs[cur].stack);
    Ok((tp, var))
}

fn compile_expr_tmp(
    program: &mut Program,
    cur: FuncRef,
    node: &Spanned<Expr>,
    allow_var: bool,
) -> CompileResult<(Type, i32)> {
    let loc = node.location;
    match &node.node {
        Expr::Var(name) => compile_getvar(program, cur, loc, name),
        Expr::ConstInt(v) => compile_const(program, cur, ConstValue::Int(*v), Type::Int),
        Expr::ConstByte(v) => compile_const(program, cur, ConstValue::Byte(*v), Type::Byte),
        Expr::ConstStr(s) => compile_const(program, cur, ConstValue::Str(s.clone()), Type::ptr(Type::Byte)),
        Expr::BinOp(op, lhs, rhs) => compile_binop(program, cur, loc, *op, lhs, rhs),
        Expr::UnOp(op, arg) => compile_unop(program, cur, loc, *op, arg),
        Expr::Scope(_kind, items) => compile_scope(program, cur, items),
        Expr::NewVar(name, init) => {
            if !allow_var {
                return Err(CompileError::scope(loc, "variable declaration not allowed here"));
            }
            compile_newvar(program, cur, loc, name, init)
        }
        Expr::Set(name, rhs) => compile_setvar(program, cur, loc, name, rhs),
        Expr::If(cond, yes, no) => compile_cond(program, cur, loc, cond, yes, no.as_deref()),
        Expr::Loop(cond, body) => compile_loop(program, cur, loc, cond, body),
        Expr::Break => match program.funcs[cur].current_loop_end() {
            Some(label) => {
                program.funcs[cur].code.push(Inst::Jmp { label });
                Ok((Type::Void, -1))
            }
            None => Err(CompileError::scope(loc, "`break` outside a loop")),
        },
        Expr::Continue => match program.funcs[cur].current_loop_start() {
            Some(label) => {
                program.funcs[cur].code.push(Inst::Jmp { label });
                Ok((Type::Void, -1))
            }
            None => Err(CompileError::scope(loc, "`continue` outside a loop")),
        },
        Expr::Call(name, args) => compile_call(program, cur, loc, name, args),
        Expr::Syscall(num, args) => compile_syscall(program, cur, loc, *num, args),
        Expr::Return(kid) => compile_return(program, cur, loc, kid.as_deref()),
        Expr::NullPtr(type_expr) => compile_nullptr(program, cur, type_expr),
        Expr::Cast(type_expr, value) => compile_cast(program, cur, loc, type_expr, value),
        Expr::Peek(ptr) => compile_peek(program, cur, loc, ptr),
        Expr::Poke(ptr, value) => compile_poke(program, cur, loc, ptr, value),
        Expr::Ref(name) => compile_ref(program, cur, loc, name),
        Expr::Debug => {
            program.funcs[cur].code.push(Inst::Debug);
            Ok((Type::Void, -1))
        }
        // `def` is only meaningful as an immediate child of a scope,
        // where `compile_scope` intercepts it before reaching here.
        Expr::Def(_) => Err(CompileError::shape(loc, "unknown expression")),
    }
}

fn move_to(program: &mut Program, cur: FuncRef, var: i32, dst: i32) -> i32 {
    if dst != var {
        program.funcs[cur].code.push(Inst::Mov { src: var, dst });
    }
    dst
}

fn compile_getvar(program: &mut Program, cur: FuncRef, loc: Location, name: &str) -> CompileResult<(Type, i32)> {
    let (flevel, tp, var) = program.funcs[cur].get_var(program, loc, name)?;
    if flevel == program.funcs[cur].level {
        Ok((tp, var))
    } else {
        let dst = program.funcs[cur].tmp();
        program.funcs[cur].code.push(Inst::GetEnv { level_var: flevel, var, dst });
        Ok((tp, dst))
    }
}

fn compile_const(program: &mut Program, cur: FuncRef, value: ConstValue, ty: Type) -> CompileResult<(Type, i32)> {
    let dst = program.funcs[cur].tmp();
    program.funcs[cur].code.push(Inst::Const { value, dst });
    Ok((ty, dst))
}

fn type_kind(t: &Type) -> &'static str {
    match t {
        Type::Void => "void",
        Type::Int => "int",
        Type::Byte => "byte",
        Type::Ptr(_) => "ptr",
    }
}

fn compile_binop(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    op: BinOp,
    lhs: &Spanned<Expr>,
    rhs: &Spanned<Expr>,
) -> CompileResult<(Type, i32)> {
    let save = program.funcs[cur].stack;
    let (mut t1, mut a1) = compile_expr_tmp(program, cur, lhs, false)?;
    let (mut t2, mut a2) = compile_expr_tmp(program, cur, rhs, false)?;
    program.funcs[cur].stack = save;

    if op == BinOp::Add && t1 == Type::Int && matches!(t2, Type::Ptr(_)) {
        std::mem::swap(&mut t1, &mut t2);
        std::mem::swap(&mut a1, &mut a2);
    }
    if matches!(op, BinOp::Add | BinOp::Sub) && matches!(t1, Type::Ptr(_)) && t2 == Type::Int {
        let base_scale = if t1 == Type::ptr(Type::Byte) { 1 } else { 8 };
        let scale = if op == BinOp::Sub { -base_scale } else { base_scale };
        let dst = program.funcs[cur].tmp();
        program.funcs[cur].code.push(Inst::Lea { a1, a2, scale, dst });
        return Ok((t1, dst));
    }
    if op == BinOp::Sub && matches!(t1, Type::Ptr(_)) && matches!(t2, Type::Ptr(_)) {
        if t1 != t2 {
            return Err(CompileError::ty(loc, "comparison of different pointer types"));
        }
        if t1 != Type::ptr(Type::Byte) {
            return Err(CompileError::ty(loc, "unsupported pointer subtraction"));
        }
        let dst = program.funcs[cur].tmp();
        program.funcs[cur].code.push(Inst::BinOp { op: BinOp::Sub, a1, a2, dst });
        return Ok((Type::Int, dst));
    }

    let is_cmp = matches!(
        op,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
    );
    let ints_ok = t1 == t2 && matches!(t1, Type::Int | Type::Byte);
    let ptr_cmp_ok = t1 == t2 && matches!(t1, Type::Ptr(_)) && is_cmp;
    if !(ints_ok || ptr_cmp_ok) {
        return Err(CompileError::ty(loc, "bad binop types"));
    }
    let rtype = if is_cmp { Type::Int } else { t1.clone() };
    let dst = program.funcs[cur].tmp();
    if t1 == Type::Byte && t2 == Type::Byte {
        program.funcs[cur].code.push(Inst::BinOp8 { op, a1, a2, dst });
    } else {
        program.funcs[cur].code.push(Inst::BinOp { op, a1, a2, dst });
    }
    Ok((rtype, dst))
}

fn compile_unop(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    op: UnOp,
    arg: &Spanned<Expr>,
) -> CompileResult<(Type, i32)> {
    let (t1, a1) = compile_expr(program, cur, arg, false)?;
    let mut rtype = t1.clone();
    let is_byte = match op {
        UnOp::Neg => {
            if !matches!(t1, Type::Int | Type::Byte) {
                return Err(CompileError::ty(loc, "bad unop types"));
            }
            t1 == Type::Byte
        }
        UnOp::Not => {
            if !matches!(t1, Type::Int | Type::Byte | Type::Ptr(_)) {
                return Err(CompileError::ty(loc, "bad unop types"));
            }
            rtype = Type::Int;
            false
        }
    };
    let dst = program.funcs[cur].tmp();
    if is_byte {
        program.funcs[cur].code.push(Inst::UnOp8 { op, a1, dst });
    } else {
        program.funcs[cur].code.push(Inst::UnOp { op, a1, dst });
    }
    Ok((rtype, dst))
}

/// Children are split into groups terminated by each `var` form; within
/// a group every adjacent `def` is pre-scanned before any child in the
/// group is compiled, so adjacent functions can call each other.
fn compile_scope(program: &mut Program, cur: FuncRef, items: &[Spanned<Expr>]) -> CompileResult<(Type, i32)> {
    program.funcs[cur].scope_enter();
    log::debug!("{cur:?}: entered scope at stack={}", program.funcs[cur].stack);
    let mut result: (Type, i32) = (Type::Void, -1);

    let mut start = 0;
    while start < items.len() {
        let mut end = start;
        while end < items.len() && !matches!(items[end].node, Expr::NewVar(..)) {
            end += 1;
        }
        if end < items.len() {
            end += 1; // include the `var` form itself in this group
        }
        let group = &items[start..end];

        let mut pending = Vec::new();
        for kid in group {
            if let Expr::Def(def) = &kid.node {
                pending.push(pre_scan_func(program, cur, kid.location, def)?);
            }
        }

        let mut pending_iter = pending.into_iter();
        for kid in group {
            match &kid.node {
                Expr::Def(def) => {
                    let target = pending_iter
                        .next()
                        .expect("pre-scan produced one entry per adjacent def");
                    compile_def(program, target, def)?;
                    result = (Type::Void, -1);
                }
                _ => {
                    result = compile_expr(program, cur, kid, true)?;
                }
            }
        }
        start = end;
    }

    program.funcs[cur].scope_leave();

    let (tp, mut var) = result;
    if var >= program.funcs[cur].stack {
        let dst = program.funcs[cur].tmp();
        var = move_to(program, cur, var, dst);
    }
    Ok((tp, var))
}

fn compile_newvar(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    name: &str,
    init: &Spanned<Expr>,
) -> CompileResult<(Type, i32)> {
    let (tp, var) = compile_expr(program, cur, init, false)?;
    if var < 0 {
        return Err(CompileError::ty(loc, "bad variable init type"));
    }
    let dst = program.funcs[cur].add_var(loc, name, tp.clone())?;
    let result = move_to(program, cur, var, dst);
    Ok((tp, result))
}

fn compile_setvar(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    name: &str,
    rhs: &Spanned<Expr>,
) -> CompileResult<(Type, i32)> {
    let (flevel, dst_tp, dst_slot) = program.funcs[cur].get_var(program, loc, name)?;
    let (tp, var) = compile_expr(program, cur, rhs, false)?;
    if dst_tp != tp {
        return Err(CompileError::ty(loc, "bad variable set type"));
    }
    if flevel == program.funcs[cur].level {
        let result = move_to(program, cur, var, dst_slot);
        Ok((dst_tp, result))
    } else {
        program.funcs[cur].code.push(Inst::SetEnv { level_var: flevel, var: dst_slot, src: var });
        let tmp_slot = program.funcs[cur].tmp();
        let result = move_to(program, cur, var, tmp_slot);
        Ok((dst_tp, result))
    }
}

fn compile_cond(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    cond: &Spanned<Expr>,
    yes: &Spanned<Expr>,
    no: Option<&Spanned<Expr>>,
) -> CompileResult<(Type, i32)> {
    let l_true = program.funcs[cur].new_label();
    let l_false = program.funcs[cur].new_label();
    program.funcs[cur].scope_enter();

    let (cond_ty, cond_var) = compile_expr(program, cur, cond, true)?;
    if cond_ty.is_void() {
        return Err(CompileError::ty(loc, "expect boolean condition"));
    }
    program.funcs[cur].code.push(Inst::Jmpf { cond: cond_var, label: l_false });

    let (t1, a1) = compile_expr(program, cur, yes, false)?;
    if a1 >= 0 {
        let target = program.funcs[cur].stack;
        move_to(program, cur, a1, target);
    }

    let (mut t2, mut a2) = (Type::Void, -1);
    if no.is_some() {
        program.funcs[cur].code.push(Inst::Jmp { label: l_true });
    }
    program.funcs[cur].set_label(l_false);
    if let Some(no_expr) = no {
        let (nt, nv) = compile_expr(program, cur, no_expr, false)?;
        t2 = nt;
        a2 = nv;
        if a2 >= 0 {
            let target = program.funcs[cur].stack;
            move_to(program, cur, a2, target);
        }
    }
    program.funcs[cur].set_label(l_true);
    program.funcs[cur].scope_leave();

    if a1 < 0 || a2 < 0 || t1 != t2 {
        Ok((Type::Void, -1))
    } else {
        let dst = program.funcs[cur].tmp();
        Ok((t1, dst))
    }
}

fn compile_loop(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    cond: &Spanned<Expr>,
    body: &Spanned<Expr>,
) -> CompileResult<(Type, i32)> {
    let loop_start = program.funcs[cur].new_label();
    let loop_end = program.funcs[cur].new_label();
    program.funcs[cur].set_loop_labels(loop_start, loop_end);

    program.funcs[cur].scope_enter();
    program.funcs[cur].set_label(loop_start);
    let (_, cond_var) = compile_expr(program, cur, cond, true)?;
    if cond_var < 0 {
        return Err(CompileError::ty(loc, "bad condition type"));
    }
    program.funcs[cur].code.push(Inst::Jmpf { cond: cond_var, label: loop_end });
    compile_expr(program, cur, body, false)?;
    program.funcs[cur].code.push(Inst::Jmp { label: loop_start });
    program.funcs[cur].set_label(loop_end);
    program.funcs[cur].scope_leave();

    Ok((Type::Void, -1))
}

fn compile_call(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    name: &str,
    args: &[Spanned<Expr>],
) -> CompileResult<(Type, i32)> {
    let mut arg_types = Vec::with_capacity(args.len());
    for kid in args {
        let (tp, var) = compile_expr(program, cur, kid, false)?;
        arg_types.push(tp);
        let dst = program.funcs[cur].tmp();
        move_to(program, cur, var, dst);
    }
    program.funcs[cur].stack -= args.len() as i32;
    let arg_start = program.funcs[cur].stack;

    let (rtype, func_ref) = program.funcs[cur].get_func(program, loc, name, &arg_types)?;
    let callee_level = program.funcs[func_ref].level;
    let caller_level = program.funcs[cur].level;
    program.funcs[cur].code.push(Inst::Call {
        func: func_ref,
        arg_start,
        level_cur: caller_level,
        level_new: callee_level,
    });

    let dst = if rtype.is_void() { -1 } else { program.funcs[cur].tmp() };
    Ok((rtype, dst))
}

fn compile_syscall(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    num: i64,
    args: &[Spanned<Expr>],
) -> CompileResult<(Type, i32)> {
    let save = program.funcs[cur].stack;
    let mut sys_vars = Vec::with_capacity(args.len());
    for kid in args {
        let (arg_tp, var) = compile_expr_tmp(program, cur, kid, false)?;
        if arg_tp.is_void() {
            return Err(CompileError::ty(loc, "bad syscall argument type"));
        }
        sys_vars.push(var);
    }
    program.funcs[cur].stack = save;
    let dst_slot = program.funcs[cur].stack;
    program.funcs[cur].code.push(Inst::Syscall { dst: dst_slot, num, args: sys_vars });
    let dst = program.funcs[cur].tmp();
    Ok((Type::Int, dst))
}

fn compile_return(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    kid: Option<&Spanned<Expr>>,
) -> CompileResult<(Type, i32)> {
    let (tp, var) = match kid {
        Some(e) => compile_expr_tmp(program, cur, e, false)?,
        None => (Type::Void, -1),
    };
    let rtype = program.funcs[cur].rtype.clone();
    if tp != rtype {
        return Err(CompileError::ty(loc, "bad return type"));
    }
    let ret_slot = if var < 0 { None } else { Some(var) };
    program.funcs[cur].code.push(Inst::Ret { a1: ret_slot });
    Ok((tp, var))
}

fn compile_nullptr(program: &mut Program, cur: FuncRef, type_expr: &TypeExpr) -> CompileResult<(Type, i32)> {
    let tp = validate_type(type_expr)?;
    let dst = program.funcs[cur].tmp();
    program.funcs[cur].code.push(Inst::Const { value: ConstValue::Int(0), dst });
    Ok((tp, dst))
}

fn compile_cast(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    type_expr: &TypeExpr,
    value: &Spanned<Expr>,
) -> CompileResult<(Type, i32)> {
    let tp = validate_type(type_expr)?;
    let (val_tp, var) = compile_expr_tmp(program, cur, value, false)?;
    match (type_kind(&tp), type_kind(&val_tp)) {
        ("int", "ptr") | ("ptr", "int") | ("ptr", "ptr") | ("int", "byte") | ("int", "int") | ("byte", "byte") => {
            Ok((tp, var))
        }
        ("byte", "int") => {
            program.funcs[cur].code.push(Inst::Cast8 { var });
            Ok((tp, var))
        }
        _ => Err(CompileError::ty(loc, "bad cast")),
    }
}

fn compile_peek(program: &mut Program, cur: FuncRef, loc: Location, ptr: &Spanned<Expr>) -> CompileResult<(Type, i32)> {
    let (tp, var) = compile_expr(program, cur, ptr, false)?;
    let inner = match tp {
        Type::Ptr(inner) => *inner,
        _ => return Err(CompileError::ty(loc, "not a pointer")),
    };
    let dst_slot = program.funcs[cur].stack;
    if inner == Type::Byte {
        program.funcs[cur].code.push(Inst::Peek8 { var, dst: dst_slot });
    } else {
        program.funcs[cur].code.push(Inst::Peek { var, dst: dst_slot });
    }
    let dst = program.funcs[cur].tmp();
    Ok((inner, dst))
}

fn compile_poke(
    program: &mut Program,
    cur: FuncRef,
    loc: Location,
    ptr: &Spanned<Expr>,
    value: &Spanned<Expr>,
) -> CompileResult<(Type, i32)> {
    let save = program.funcs[cur].stack;
    let (t2, var_val) = compile_expr_tmp(program, cur, value, false)?;
    let (t1, var_ptr) = compile_expr_tmp(program, cur, ptr, false)?;
    if t1 != Type::ptr(t2.clone()) {
        return Err(CompileError::ty(loc, "pointer type mismatch"));
    }
    program.funcs[cur].stack = save;
    if t2 == Type::Byte {
        program.funcs[cur].code.push(Inst::Poke8 { ptr: var_ptr, val: var_val });
    } else {
        program.funcs[cur].code.push(Inst::Poke { ptr: var_ptr, val: var_val });
    }
    let dst = program.funcs[cur].tmp();
    let result = move_to(program, cur, var_val, dst);
    Ok((t2, result))
}

fn compile_ref(program: &mut Program, cur: FuncRef, loc: Location, name: &str) -> CompileResult<(Type, i32)> {
    let (flevel, var_tp, var) = program.funcs[cur].get_var(program, loc, name)?;
    let dst = program.funcs[cur].tmp();
    if flevel == program.funcs[cur].level {
        program.funcs[cur].code.push(Inst::RefVar { var, dst });
    } else {
        program.funcs[cur].code.push(Inst::RefEnv { level_var: flevel, var, dst });
    }
    Ok((Type::ptr(var_tp), dst))
}

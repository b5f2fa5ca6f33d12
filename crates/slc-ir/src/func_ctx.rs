//! Per-function virtual-stack manager: the home of `level`, `stack`,
//! `nvar`, the scope chain, the IR instruction sink, and the label table.

use slc_entity::entity_impl;
use slc_reader::{CompileError, CompileResult, Location};

use crate::opcode::{Inst, Label};
use crate::program::Program;
use crate::scope::{FuncBinding, Scope, VarBinding};
use crate::types::Type;

/// A dense index into the program-wide `funcs` list. Index 0 is always
/// `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncRef(u32);
entity_impl!(FuncRef);

/// A compiled function: its virtual stack, scope chain, and emitted code.
///
/// Function contexts are created eagerly during scope pre-scan and live
/// for the whole compilation; `code` is append-only and labels are bound
/// once resolved. `parent` replaces the lexical-parent pointer of the
/// original model with an index into the program's owning vector, since
/// name resolution must walk the *actual* ancestor scope chain, not just
/// know its nesting depth.
#[derive(Debug)]
pub struct FunctionCtx {
    pub level: u32,
    pub rtype: Type,
    pub scope: Option<Box<Scope>>,
    pub code: Vec<Inst>,
    labels: Vec<Option<usize>>,
    pub nvar: i32,
    pub stack: i32,
    pub parent: Option<FuncRef>,
}

impl FunctionCtx {
    pub fn new(level: u32, rtype: Type, parent: Option<FuncRef>) -> Self {
        FunctionCtx {
            level,
            rtype,
            scope: Some(Box::new(Scope::new_root())),
            code: Vec::new(),
            labels: Vec::new(),
            nvar: 0,
            stack: 0,
            parent,
        }
    }

    pub fn scope_enter(&mut self) {
        let prev = self.scope.take().expect("scope chain never empty");
        self.scope = Some(Box::new(Scope::enter(prev, self.stack)));
    }

    pub fn scope_leave(&mut self) {
        let scope = self.scope.take().expect("scope chain never empty");
        self.stack = scope.save;
        self.nvar -= scope.nlocal as i32;
        self.scope = scope.prev;
    }

    fn scope_mut(&mut self) -> &mut Scope {
        self.scope.as_mut().expect("scope chain never empty")
    }

    fn scope_ref(&self) -> &Scope {
        self.scope.as_ref().expect("scope chain never empty")
    }

    /// Mark the current scope as the body of a loop, so that a *child*
    /// scope entered right after this inherits these labels (and any
    /// `break`/`continue` within the loop's own body resolve to them,
    /// not an outer enclosing loop).
    pub fn set_loop_labels(&mut self, start: Label, end: Label) {
        let scope = self.scope_mut();
        scope.loop_start = Some(start);
        scope.loop_end = Some(end);
    }

    pub fn current_loop_start(&self) -> Option<Label> {
        self.scope_ref().loop_start
    }

    pub fn current_loop_end(&self) -> Option<Label> {
        self.scope_ref().loop_end
    }

    /// Declare a new local. Requires `stack == nvar` (statement boundary);
    /// rejects a name already bound in the *current* scope.
    pub fn add_var(&mut self, loc: Location, name: &str, ty: Type) -> CompileResult<i32> {
        debug_assert_eq!(self.stack, self.nvar, "add_var outside a statement boundary");
        let slot = self.nvar;
        self.scope_mut()
            .define_var(name, VarBinding { ty, slot })
            .map_err(|_| CompileError::name(loc, "duplicate variable"))?;
        self.nvar += 1;
        self.stack += 1;
        Ok(slot)
    }

    /// Register `(name, arg_types)` as callable from the current scope,
    /// rejecting a duplicate signature.
    pub fn define_func(
        &mut self,
        loc: Location,
        name: &str,
        arg_types: Vec<Type>,
        binding: FuncBinding,
    ) -> CompileResult<()> {
        self.scope_mut()
            .define_func(name, arg_types, binding)
            .map_err(|_| CompileError::name(loc, "duplicate function"))
    }

    /// Allocate a fresh temporary at the current stack top.
    pub fn tmp(&mut self) -> i32 {
        let slot = self.stack;
        self.stack += 1;
        slot
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label::new(self.labels.len() - 1)
    }

    pub fn set_label(&mut self, label: Label) {
        self.labels[label.index()] = Some(self.code.len());
    }

    /// Resolved instruction index for every label, in id order. Panics if
    /// a label was allocated but never bound — a compiler bug, not a
    /// user-facing error (see testable property "label binding").
    pub fn label_targets(&self) -> Vec<usize> {
        self.labels
            .iter()
            .map(|slot| slot.expect("label allocated but never bound"))
            .collect()
    }

    fn lookup_var_local(&self, name: &str) -> Option<&VarBinding> {
        let mut scope = self.scope_ref();
        loop {
            if let Some(binding) = scope.lookup_var(name) {
                return Some(binding);
            }
            match &scope.prev {
                Some(prev) => scope = prev,
                None => return None,
            }
        }
    }

    fn lookup_func_local(&self, name: &str, arg_types: &[Type]) -> Option<&FuncBinding> {
        let mut scope = self.scope_ref();
        loop {
            if let Some(binding) = scope.lookup_func(name, arg_types) {
                return Some(binding);
            }
            match &scope.prev {
                Some(prev) => scope = prev,
                None => return None,
            }
        }
    }

    /// Resolve a variable name, walking this function's scope chain and
    /// then recursively the enclosing function contexts. Returns the
    /// *owning* function's level alongside the type and slot.
    pub fn get_var(
        &self,
        program: &Program,
        loc: Location,
        name: &str,
    ) -> CompileResult<(u32, Type, i32)> {
        if let Some(binding) = self.lookup_var_local(name) {
            return Ok((self.level, binding.ty.clone(), binding.slot));
        }
        match self.parent {
            Some(parent) => program.funcs[parent].get_var(program, loc, name),
            None => Err(CompileError::name(loc, format!("undefined identifier: {name}"))),
        }
    }

    /// Resolve `(name, arg_types)` to a function, walking scopes the same
    /// way as `get_var`.
    pub fn get_func(
        &self,
        program: &Program,
        loc: Location,
        name: &str,
        arg_types: &[Type],
    ) -> CompileResult<(Type, FuncRef)> {
        if let Some(binding) = self.lookup_func_local(name, arg_types) {
            return Ok((binding.rtype.clone(), binding.func));
        }
        match self.parent {
            Some(parent) => program.funcs[parent].get_func(program, loc, name, arg_types),
            None => Err(CompileError::name(loc, format!("undefined function: {name}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_var_assigns_contiguous_slots() {
        let mut f = FunctionCtx::new(1, Type::Void, None);
        let loc = Location::new(1);
        let a = f.add_var(loc, "a", Type::Int).unwrap();
        let b = f.add_var(loc, "b", Type::Int).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(f.stack, f.nvar);
    }

    #[test]
    fn scope_leave_restores_stack_and_nvar() {
        let mut f = FunctionCtx::new(1, Type::Void, None);
        let loc = Location::new(1);
        f.add_var(loc, "outer", Type::Int).unwrap();
        f.scope_enter();
        f.add_var(loc, "inner", Type::Int).unwrap();
        assert_eq!(f.nvar, 2);
        f.scope_leave();
        assert_eq!(f.nvar, 1);
        assert_eq!(f.stack, 1);
    }

    #[test]
    fn tmp_does_not_advance_nvar() {
        let mut f = FunctionCtx::new(1, Type::Void, None);
        let before = f.nvar;
        f.tmp();
        assert_eq!(f.nvar, before);
        assert_eq!(f.stack, before + 1);
    }

    #[test]
    fn duplicate_name_in_same_scope_is_rejected() {
        let mut f = FunctionCtx::new(1, Type::Void, None);
        let loc = Location::new(1);
        f.add_var(loc, "x", Type::Int).unwrap();
        f.stack = f.nvar;
        assert!(f.add_var(loc, "x", Type::Int).is_err());
    }

    #[test]
    fn label_targets_panics_on_unbound_label() {
        let mut f = FunctionCtx::new(1, Type::Void, None);
        f.new_label();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f.label_targets()));
        assert!(result.is_err());
    }
}

//! Lexical scope chain: name resolution with loop-label inheritance.

use std::collections::HashMap;

use crate::func_ctx::FuncRef;
use crate::opcode::Label;
use crate::types::Type;

/// A name bound in a scope: a local variable's data-stack slot and type.
#[derive(Debug, Clone)]
pub struct VarBinding {
    pub ty: Type,
    pub slot: i32,
}

/// A function bound in a scope: its index in the program-wide `funcs`
/// list and its return type. Keyed by `(name, argument types)` so that
/// functions may be overloaded on argument types.
#[derive(Debug, Clone)]
pub struct FuncBinding {
    pub rtype: Type,
    pub func: FuncRef,
}

/// A scope node. Scopes form a singly-linked chain within one function;
/// non-local names are resolved by falling through to the enclosing
/// function's own current scope (see `FunctionCtx::get_var`).
#[derive(Debug, Default)]
pub struct Scope {
    pub prev: Option<Box<Scope>>,
    /// Locals declared directly in this scope (not an enclosing one).
    pub nlocal: u32,
    /// `stack` height captured on entry, restored on exit.
    pub save: i32,
    vars: HashMap<String, VarBinding>,
    funcs: HashMap<(String, Vec<Type>), FuncBinding>,
    /// Label of the enclosing loop's start/end, or `None` if not in a loop.
    /// Inherited from `prev` on construction, overwritten by `loop`.
    pub loop_start: Option<Label>,
    pub loop_end: Option<Label>,
}

impl Scope {
    pub fn new_root() -> Self {
        Scope::default()
    }

    /// Push a child scope, inheriting the loop labels currently in scope.
    pub fn enter(prev: Box<Scope>, save: i32) -> Self {
        let (loop_start, loop_end) = (prev.loop_start, prev.loop_end);
        Scope {
            prev: Some(prev),
            nlocal: 0,
            save,
            vars: HashMap::new(),
            funcs: HashMap::new(),
            loop_start,
            loop_end,
        }
    }

    pub fn define_var(&mut self, name: &str, binding: VarBinding) -> Result<(), ()> {
        if self.vars.contains_key(name) {
            return Err(());
        }
        self.vars.insert(name.to_string(), binding);
        self.nlocal += 1;
        Ok(())
    }

    pub fn lookup_var(&self, name: &str) -> Option<&VarBinding> {
        self.vars.get(name)
    }

    pub fn define_func(
        &mut self,
        name: &str,
        arg_types: Vec<Type>,
        binding: FuncBinding,
    ) -> Result<(), ()> {
        let key = (name.to_string(), arg_types);
        if self.funcs.contains_key(&key) {
            return Err(());
        }
        self.funcs.insert(key, binding);
        Ok(())
    }

    pub fn lookup_func(&self, name: &str, arg_types: &[Type]) -> Option<&FuncBinding> {
        self.funcs
            .get(&(name.to_string(), arg_types.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_is_rejected_within_one_scope() {
        let mut s = Scope::new_root();
        s.define_var("x", VarBinding { ty: Type::Int, slot: 0 }).unwrap();
        assert!(s.define_var("x", VarBinding { ty: Type::Int, slot: 1 }).is_err());
    }

    #[test]
    fn overloading_distinguishes_by_argument_types() {
        let mut s = Scope::new_root();
        s.define_func(
            "f",
            vec![Type::Int],
            FuncBinding { rtype: Type::Void, func: FuncRef::new(0) },
        )
        .unwrap();
        s.define_func(
            "f",
            vec![Type::Byte],
            FuncBinding { rtype: Type::Void, func: FuncRef::new(1) },
        )
        .unwrap();
        assert!(s.lookup_func("f", &[Type::Int]).is_some());
        assert!(s.lookup_func("f", &[Type::Byte]).is_some());
        assert!(s.lookup_func("f", &[Type::Void]).is_none());
    }

    #[test]
    fn child_scope_inherits_loop_labels() {
        let mut root = Scope::new_root();
        root.loop_start = Some(Label::new(1));
        root.loop_end = Some(Label::new(2));
        let child = Scope::enter(Box::new(root), 0);
        assert_eq!(child.loop_start, Some(Label::new(1)));
    }
}

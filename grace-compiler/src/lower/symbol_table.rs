use std::collections::HashMap;

use crate::ir::{BlockId, FuncId, Value};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    /// Storage slot holding a value of `ty`. When `by_ref` is set the slot
    /// holds the address of the value instead (array parameters).
    Variable {
        storage: Value,
        ty: Type,
        by_ref: bool,
    },
    Label(BlockId),
    Function {
        func: FuncId,
        return_type: Option<Type>,
        params: Vec<Type>,
    },
}

impl Symbol {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Symbol::Variable { .. } => "variable",
            Symbol::Label(_) => "label",
            Symbol::Function { .. } => "function",
        }
    }
}

/// Stack of lexical scopes, innermost last. The global scope is always
/// present at the bottom.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
        tracing::trace!(depth = self.scopes.len(), "enter scope");
    }

    /// Pop the innermost scope.
    ///
    /// # Panics
    ///
    /// When called without a matching [`SymbolTable::enter_scope`].
    pub fn leave_scope(&mut self) {
        assert!(
            self.scopes.len() > 1,
            "leave_scope called without a matching enter_scope"
        );
        self.scopes.pop();
        tracing::trace!(depth = self.scopes.len(), "leave scope");
    }

    /// Number of open scopes, including the global one.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Declare a symbol in the innermost scope. Fails with the existing
    /// symbol when the name is already bound in that same scope; bindings in
    /// enclosing scopes are shadowed.
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> Result<(), Symbol> {
        let innermost = self.scopes.len() - 1;
        Self::insert(&mut self.scopes[innermost], name, symbol)
    }

    /// Declare a symbol in the global scope (even if inside a function)
    pub fn declare_global(&mut self, name: &str, symbol: Symbol) -> Result<(), Symbol> {
        Self::insert(&mut self.scopes[0], name, symbol)
    }

    fn insert(table: &mut HashMap<String, Symbol>, name: &str, symbol: Symbol) -> Result<(), Symbol> {
        if let Some(existing) = table.get(name) {
            return Err(existing.clone());
        }
        table.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Like [`SymbolTable::lookup`], but scopes between the global one and
    /// `floor` are skipped. Used from nested function bodies, which cannot
    /// see the locals of the function they are declared in.
    pub fn lookup_from(&self, name: &str, floor: usize) -> Option<&Symbol> {
        let floor = floor.clamp(1, self.scopes.len());
        self.scopes[floor..]
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.scopes[0].get(name))
    }

    /// Binding of `name` in the innermost scope only.
    pub fn lookup_current(&self, name: &str) -> Option<&Symbol> {
        self.scopes.last().and_then(|scope| scope.get(name))
    }

    pub fn lookup_global(&self, name: &str) -> Option<&Symbol> {
        self.scopes[0].get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(slot: u32, ty: Type) -> Symbol {
        Symbol::Variable {
            storage: Value::Reg(slot),
            ty,
            by_ref: false,
        }
    }

    #[test]
    fn redeclaration_in_same_scope_is_rejected() {
        let mut st = SymbolTable::new();
        st.declare("x", var(0, Type::Int)).unwrap();
        let existing = st.declare("x", var(1, Type::Bool)).unwrap_err();
        assert_eq!(existing, var(0, Type::Int));
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut st = SymbolTable::new();
        st.declare("x", var(0, Type::Int)).unwrap();
        st.enter_scope();
        st.declare("x", var(1, Type::Bool)).unwrap();
        assert_eq!(st.lookup("x"), Some(&var(1, Type::Bool)));
        st.leave_scope();
        assert_eq!(st.lookup("x"), Some(&var(0, Type::Int)));
    }

    #[test]
    fn lookup_walks_outward() {
        let mut st = SymbolTable::new();
        st.declare("g", var(0, Type::Int)).unwrap();
        st.enter_scope();
        st.enter_scope();
        assert!(st.lookup("g").is_some());
        assert!(st.lookup_current("g").is_none());
        assert!(st.lookup("missing").is_none());
        assert_eq!(st.depth(), 3);
    }

    #[test]
    fn lookup_from_skips_enclosing_locals() {
        let mut st = SymbolTable::new();
        st.declare("x", var(0, Type::Int)).unwrap();
        st.enter_scope();
        st.declare("x", var(1, Type::Bool)).unwrap();
        st.declare("y", var(2, Type::Int)).unwrap();
        st.enter_scope();
        let floor = st.depth() - 1;
        assert_eq!(st.lookup_from("x", floor), Some(&var(0, Type::Int)));
        assert!(st.lookup_from("y", floor).is_none());
        assert_eq!(st.lookup("y"), Some(&var(2, Type::Int)));
    }

    #[test]
    fn global_declaration_from_nested_scope() {
        let mut st = SymbolTable::new();
        st.enter_scope();
        let f = Symbol::Function {
            func: FuncId(0),
            return_type: Some(Type::Int),
            params: vec![Type::Int],
        };
        st.declare_global("f", f.clone()).unwrap();
        st.leave_scope();
        assert_eq!(st.lookup_global("f"), Some(&f));
        assert!(st.declare_global("f", f).is_err());
    }

    #[test]
    fn labels_bind_like_any_symbol() {
        let mut st = SymbolTable::new();
        let block = BlockId {
            func: FuncId(0),
            index: 2,
        };
        st.declare("exit", Symbol::Label(block)).unwrap();
        assert_eq!(st.lookup("exit").map(Symbol::kind_name), Some("label"));
    }

    #[test]
    #[should_panic(expected = "without a matching enter_scope")]
    fn leaving_global_scope_panics() {
        let mut st = SymbolTable::new();
        st.leave_scope();
    }
}

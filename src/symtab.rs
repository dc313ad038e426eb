//! Scoped symbol table
//!
//! A stack of scope frames mapping names to symbol records. Lookup searches
//! from innermost to outermost; definition fails on collision within the
//! innermost frame. Exiting a scope drops all of its bindings; no scope is
//! ever re-entered.

use std::collections::HashMap;

/// One named entity known to the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// Declared type string, e.g. `int` or `char**`
    pub ty: String,
    pub is_function: bool,
}

/// The scope stack.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    /// Open a new innermost scope. The first call creates the global frame.
    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Close the innermost scope, dropping its bindings.
    pub fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// Current scope depth (zero before the global frame is opened).
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Define a name in the innermost scope. Returns false, and changes
    /// nothing, when the name already exists there.
    pub fn define(&mut self, name: &str, ty: &str, is_function: bool) -> bool {
        if self.scopes.is_empty() {
            self.enter_scope();
        }
        let scope = self.scopes.last_mut().expect("scope was just entered");
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                ty: ty.to_string(),
                is_function,
            },
        );
        true
    }

    /// Search for a name from the innermost scope outward.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Is the name bound in the innermost scope?
    pub fn exists_in_current_scope(&self, name: &str) -> bool {
        self.scopes
            .last()
            .map(|scope| scope.contains_key(name))
            .unwrap_or(false)
    }
}

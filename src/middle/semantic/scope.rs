use std::collections::BTreeMap;

use crate::{
    index::{IndexVec, simple_index},
    middle::semantic::ty::Type,
};

simple_index! {
    /// Identifies a scope frame in the analyzer's arena
    pub struct ScopeId;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub ty: Type,
    /// Last literal assigned to the variable, if it was a plain literal
    pub value: Option<String>,
    pub declared_line: usize,
    pub is_constant: bool,
}

#[derive(Debug)]
pub struct Scope {
    pub name: String,
    symbols: BTreeMap<String, VariableInfo>,
}

/// A symbol as it appears in the flattened report view
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSnapshot {
    pub scope: String,
    pub name: String,
    pub info: VariableInfo,
}

/// Every scope ever opened lives in an arena; the active visibility chain is
/// a stack of ids into it. Frames are never dropped so the final snapshot
/// can list symbols from scopes that have already been closed.
#[derive(Debug)]
pub struct ScopeStack {
    frames: IndexVec<ScopeId, Scope>,
    active: Vec<ScopeId>,
}

impl ScopeStack {
    /// Creates the stack with its global scope already open
    pub fn new() -> Self {
        let mut frames = IndexVec::new();
        let global = frames.push(Scope {
            name: "global".to_owned(),
            symbols: BTreeMap::new(),
        });

        Self {
            frames,
            active: vec![global],
        }
    }

    /// Creates a new block or function scope
    pub fn push_scope(&mut self, name: impl Into<String>) -> ScopeId {
        let id = self.frames.push(Scope {
            name: name.into(),
            symbols: BTreeMap::new(),
        });
        self.active.push(id);
        id
    }

    /// Closes the innermost scope. The global scope is never popped.
    pub fn pop_scope(&mut self) {
        debug_assert!(
            self.active.len() > 1,
            "Attempted to pop the global scope"
        );

        if self.active.len() > 1 {
            self.active.pop();
        }
    }

    fn current(&self) -> ScopeId {
        *self
            .active
            .last()
            .expect("the global scope is never popped")
    }

    pub fn current_name(&self) -> &str {
        &self.frames[self.current()].name
    }

    /// Looks for a binding only within the current (most nested) scope
    pub fn get_shallow_binding(&self, name: &str) -> Option<&VariableInfo> {
        self.frames[self.current()].symbols.get(name)
    }

    /// Adds a binding only within the current (most nested) scope
    pub fn add_shallow_binding(&mut self, name: impl Into<String>, info: VariableInfo) {
        let current = self.current();
        self.frames[current].symbols.insert(name.into(), info);
    }

    /// Searches the active scopes from the innermost outwards
    pub fn get_binding(&self, name: &str) -> Option<&VariableInfo> {
        self.active
            .iter()
            .rev()
            .find_map(|id| self.frames[*id].symbols.get(name))
    }

    pub fn get_binding_mut(&mut self, name: &str) -> Option<&mut VariableInfo> {
        let owner = self
            .active
            .iter()
            .rev()
            .copied()
            .find(|id| self.frames[*id].symbols.contains_key(name))?;

        self.frames[owner].symbols.get_mut(name)
    }

    /// True if `name` was declared in a scope that has since been closed
    pub fn was_bound_in_closed_scope(&self, name: &str) -> bool {
        self.frames
            .enumerate()
            .any(|(id, scope)| !self.active.contains(&id) && scope.symbols.contains_key(name))
    }

    /// Read-only flattened view of every symbol in every scope, in scope
    /// creation order
    pub fn snapshot(&self) -> Vec<SymbolSnapshot> {
        self.frames
            .enumerate()
            .map(|(_, scope)| scope)
            .flat_map(|scope| {
                let mut symbols = scope
                    .symbols
                    .iter()
                    .map(|(name, info)| SymbolSnapshot {
                        scope: scope.name.clone(),
                        name: name.clone(),
                        info: info.clone(),
                    })
                    .collect::<Vec<_>>();
                symbols.sort_by_key(|symbol| symbol.info.declared_line);
                symbols
            })
            .collect()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(line: usize) -> VariableInfo {
        VariableInfo {
            ty: Type::Int,
            value: Some("1".to_owned()),
            declared_line: line,
            is_constant: false,
        }
    }

    #[test]
    fn lookup_walks_from_innermost_scope() {
        let mut scopes = ScopeStack::new();
        scopes.add_shallow_binding("x", int(1));
        scopes.push_scope("suma");

        assert!(scopes.get_shallow_binding("x").is_none());
        assert_eq!(scopes.get_binding("x").map(|i| i.declared_line), Some(1));

        scopes.add_shallow_binding("x", int(3));
        assert_eq!(scopes.get_binding("x").map(|i| i.declared_line), Some(3));

        scopes.pop_scope();
        assert_eq!(scopes.get_binding("x").map(|i| i.declared_line), Some(1));
    }

    #[test]
    fn mutation_goes_to_the_owning_scope() {
        let mut scopes = ScopeStack::new();
        scopes.add_shallow_binding("total", int(1));
        scopes.push_scope("while@2");

        scopes.get_binding_mut("total").unwrap().value = Some("7".to_owned());
        scopes.pop_scope();

        assert_eq!(
            scopes.get_binding("total").unwrap().value.as_deref(),
            Some("7")
        );
    }

    #[test]
    fn closed_scopes_are_remembered() {
        let mut scopes = ScopeStack::new();
        scopes.push_scope("if@1");
        scopes.add_shallow_binding("temporal", int(2));
        assert_eq!(scopes.current_name(), "if@1");
        scopes.pop_scope();

        assert!(scopes.get_binding("temporal").is_none());
        assert!(scopes.was_bound_in_closed_scope("temporal"));
        assert!(!scopes.was_bound_in_closed_scope("otro"));
        assert_eq!(scopes.current_name(), "global");
    }

    #[test]
    fn snapshot_lists_every_scope() {
        let mut scopes = ScopeStack::new();
        scopes.add_shallow_binding("b", int(2));
        scopes.add_shallow_binding("a", int(1));
        scopes.push_scope("f");
        scopes.add_shallow_binding("p", int(4));
        scopes.pop_scope();

        let snapshot = scopes
            .snapshot()
            .into_iter()
            .map(|s| format!("{}:{}", s.scope, s.name))
            .collect::<Vec<_>>();

        assert_eq!(snapshot, vec!["global:a", "global:b", "f:p"]);
    }
}

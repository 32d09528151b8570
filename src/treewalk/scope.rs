use std::collections::{hash_map::Iter, HashMap, HashSet};

use crate::treewalk::{types::Dict, TreewalkValue};

/// Names bound in one namespace: module globals, a function's locals, or a class body.
pub type SymbolTable = HashMap<String, TreewalkValue>;

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Scope {
    symbol_table: SymbolTable,

    /// Names declared `global` in this scope.
    global_vars: HashSet<String>,

    /// Names declared `nonlocal` in this scope.
    nonlocal_vars: HashSet<String>,
}

impl Scope {
    pub fn new(symbol_table: SymbolTable) -> Self {
        Self {
            symbol_table,
            global_vars: HashSet::new(),
            nonlocal_vars: HashSet::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<TreewalkValue> {
        self.symbol_table.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbol_table.contains_key(name)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.symbol_table.keys().cloned().collect()
    }

    pub fn delete(&mut self, name: &str) -> Option<TreewalkValue> {
        self.symbol_table.remove(name)
    }

    /// The `Scope` is returned to allow calls to be chained.
    pub fn insert(&mut self, name: &str, value: TreewalkValue) -> &mut Self {
        self.symbol_table.insert(name.to_string(), value);
        self
    }

    pub fn mark_global(&mut self, name: &str) {
        self.global_vars.insert(name.to_string());
    }

    pub fn mark_nonlocal(&mut self, name: &str) {
        self.nonlocal_vars.insert(name.to_string());
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.global_vars.contains(name)
    }

    pub fn has_nonlocal(&self, name: &str) -> bool {
        self.nonlocal_vars.contains(name)
    }

    /// Snapshot as a `dict`, sorted by name so output is deterministic.
    pub fn to_dict(&self) -> Dict {
        let mut items: Vec<_> = self.symbol_table.iter().collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        Dict::from_str_items(items.into_iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl<'a> IntoIterator for &'a Scope {
    type Item = (&'a String, &'a TreewalkValue);
    type IntoIter = Iter<'a, String, TreewalkValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbol_table.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_are_tracked() {
        let mut scope = Scope::default();
        scope.mark_global("counter");
        scope.mark_nonlocal("total");
        assert!(scope.has_global("counter"));
        assert!(!scope.has_global("total"));
        assert!(scope.has_nonlocal("total"));
    }

    #[test]
    fn chained_inserts() {
        let mut scope = Scope::default();
        scope
            .insert("a", TreewalkValue::Int(1))
            .insert("b", TreewalkValue::Int(2));
        assert_eq!(scope.get("b"), Some(TreewalkValue::Int(2)));
        assert_eq!(scope.delete("a"), Some(TreewalkValue::Int(1)));
        assert!(!scope.contains("a"));
    }
}

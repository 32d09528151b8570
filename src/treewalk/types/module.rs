use crate::{
    domain::ModuleName,
    treewalk::{Scope, TreewalkValue},
};

#[derive(Debug, PartialEq)]
pub struct Module {
    name: ModuleName,
    scope: Scope,
}

impl Module {
    pub fn new(name: ModuleName) -> Self {
        let mut scope = Scope::default();
        scope.insert("__name__", TreewalkValue::str(name.as_str()));
        Self { name, scope }
    }

    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<TreewalkValue> {
        self.scope.get(name)
    }

    pub fn insert(&mut self, name: &str, value: TreewalkValue) {
        self.scope.insert(name, value);
    }

    pub fn delete(&mut self, name: &str) -> Option<TreewalkValue> {
        self.scope.delete(name)
    }

    /// The names `from module import *` binds: everything without a leading underscore.
    pub fn public_symbols(&self) -> Vec<(String, TreewalkValue)> {
        let mut symbols: Vec<_> = self
            .scope
            .into_iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        symbols.sort_by(|a, b| a.0.cmp(&b.0));
        symbols
    }

    pub fn dir(&self) -> Vec<String> {
        let mut names = self.scope.symbols();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_module_knows_its_name() {
        let module = Module::new(ModuleName::from_dotted("os.path"));
        assert_eq!(module.get("__name__"), Some(TreewalkValue::str("os.path")));
    }

    #[test]
    fn star_import_skips_private_names() {
        let mut module = Module::new(ModuleName::from_dotted("io"));
        module.insert("StringIO", TreewalkValue::None);
        module.insert("_private", TreewalkValue::None);
        let names: Vec<_> = module.public_symbols().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["StringIO"]);
    }
}

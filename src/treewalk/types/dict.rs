use std::collections::HashMap;

use crate::treewalk::{utils::HashKey, DomainResult, TreewalkValue};

/// An insertion-ordered mapping, matching the iteration order Python guarantees for `dict`.
#[derive(Default, Clone)]
pub struct Dict {
    entries: Vec<(TreewalkValue, TreewalkValue)>,
    index: HashMap<HashKey, usize>,
}

impl Dict {
    pub fn from_items(items: Vec<(TreewalkValue, TreewalkValue)>) -> DomainResult<Self> {
        let mut dict = Dict::default();
        for (key, value) in items {
            dict.insert(key, value)?;
        }
        Ok(dict)
    }

    /// Build a dict from `str` keys, as used for keyword arguments and module namespaces.
    pub fn from_str_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (S, TreewalkValue)>,
        S: Into<String>,
    {
        let mut dict = Dict::default();
        for (key, value) in items {
            let key: String = key.into();
            dict.insert_hashed(HashKey::Str(key.clone()), TreewalkValue::Str(key), value);
        }
        dict
    }

    fn insert_hashed(&mut self, hashed: HashKey, key: TreewalkValue, value: TreewalkValue) {
        match self.index.get(&hashed) {
            // An existing key keeps both its position and its original key object.
            Some(&position) => self.entries[position].1 = value,
            None => {
                self.index.insert(hashed, self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn insert(&mut self, key: TreewalkValue, value: TreewalkValue) -> DomainResult<()> {
        let hashed = key.hash_key()?;
        self.insert_hashed(hashed, key, value);
        Ok(())
    }

    pub fn get(&self, key: &TreewalkValue) -> DomainResult<Option<TreewalkValue>> {
        let hashed = key.hash_key()?;
        Ok(self
            .index
            .get(&hashed)
            .map(|&position| self.entries[position].1.clone()))
    }

    pub fn get_str(&self, key: &str) -> Option<TreewalkValue> {
        self.index
            .get(&HashKey::Str(key.to_string()))
            .map(|&position| self.entries[position].1.clone())
    }

    pub fn contains(&self, key: &TreewalkValue) -> DomainResult<bool> {
        Ok(self.index.contains_key(&key.hash_key()?))
    }

    pub fn remove(&mut self, key: &TreewalkValue) -> DomainResult<Option<TreewalkValue>> {
        let hashed = key.hash_key()?;
        let Some(position) = self.index.remove(&hashed) else {
            return Ok(None);
        };
        let (_, value) = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Ok(Some(value))
    }

    pub fn pop_last(&mut self) -> Option<(TreewalkValue, TreewalkValue)> {
        let (key, value) = self.entries.pop()?;
        self.index.retain(|_, position| *position < self.entries.len());
        Some((key, value))
    }

    pub fn extend(&mut self, other: &Dict) {
        for (key, value) in &other.entries {
            // Keys already in a dict are hashable.
            if let Ok(hashed) = key.hash_key() {
                self.insert_hashed(hashed, key.clone(), value.clone());
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<TreewalkValue> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn values(&self) -> Vec<TreewalkValue> {
        self.entries.iter().map(|(_, value)| value.clone()).collect()
    }

    pub fn items(&self) -> Vec<(TreewalkValue, TreewalkValue)> {
        self.entries.clone()
    }
}

impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.index.iter().all(|(hashed, &position)| {
                other
                    .index
                    .get(hashed)
                    .is_some_and(|&theirs| other.entries[theirs].1 == self.entries[position].1)
            })
    }
}

/// A set is a dict whose values are ignored.
#[derive(Default, Clone, PartialEq)]
pub struct Set(Dict);

impl Set {
    pub fn from_items(items: impl IntoIterator<Item = TreewalkValue>) -> DomainResult<Self> {
        let mut set = Set::default();
        for item in items {
            set.add(item)?;
        }
        Ok(set)
    }

    pub fn add(&mut self, item: TreewalkValue) -> DomainResult<()> {
        self.0.insert(item, TreewalkValue::None)
    }

    pub fn contains(&self, item: &TreewalkValue) -> DomainResult<bool> {
        self.0.contains(item)
    }

    pub fn remove(&mut self, item: &TreewalkValue) -> DomainResult<bool> {
        Ok(self.0.remove(item)?.is_some())
    }

    pub fn pop(&mut self) -> Option<TreewalkValue> {
        self.0.pop_last().map(|(key, _)| key)
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn items(&self) -> Vec<TreewalkValue> {
        self.0.keys()
    }
}

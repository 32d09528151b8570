use crate::treewalk::TreewalkValue;

/// An immutable sequence. `sys.version_info` is a tuple with field names attached, so it compares
/// like a plain tuple but also answers `.major` and friends.
#[derive(Clone, Default)]
pub struct Tuple {
    items: Vec<TreewalkValue>,
    fields: Option<NamedFields>,
}

#[derive(Clone, Copy)]
pub struct NamedFields {
    pub type_name: &'static str,
    pub names: &'static [&'static str],
}

impl Tuple {
    pub fn new(items: Vec<TreewalkValue>) -> Self {
        Self {
            items,
            fields: None,
        }
    }

    pub fn named(fields: NamedFields, items: Vec<TreewalkValue>) -> Self {
        Self {
            items,
            fields: Some(fields),
        }
    }

    pub fn items(&self) -> &[TreewalkValue] {
        &self.items
    }

    pub fn into_items(self) -> Vec<TreewalkValue> {
        self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreewalkValue> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TreewalkValue> {
        self.items.get(index)
    }

    pub fn field(&self, name: &str) -> Option<&TreewalkValue> {
        let fields = self.fields?;
        let index = fields.names.iter().position(|n| *n == name)?;
        self.items.get(index)
    }

    pub fn fields(&self) -> Option<NamedFields> {
        self.fields
    }

    pub fn type_name(&self) -> &'static str {
        self.fields.map_or("tuple", |f| f.type_name)
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

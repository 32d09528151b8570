use crate::treewalk::{types::Exception, DomainResult, TreewalkValue};

/// Evaluated call arguments, after `*` and `**` expansion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<TreewalkValue>,
    keywords: Vec<(String, TreewalkValue)>,
}

impl Args {
    pub fn new(positional: Vec<TreewalkValue>, keywords: Vec<(String, TreewalkValue)>) -> Self {
        Self {
            positional,
            keywords,
        }
    }

    pub fn positional(positional: Vec<TreewalkValue>) -> Self {
        Self::new(positional, vec![])
    }

    /// Prepend a bound receiver, e.g. `self` for a method call.
    pub fn with_receiver(mut self, receiver: TreewalkValue) -> Self {
        self.positional.insert(0, receiver);
        self
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    pub fn get_arg(&self, index: usize) -> Option<&TreewalkValue> {
        self.positional.get(index)
    }

    pub fn args(&self) -> &[TreewalkValue] {
        &self.positional
    }

    pub fn kwargs(&self) -> &[(String, TreewalkValue)] {
        &self.keywords
    }

    pub fn into_parts(self) -> (Vec<TreewalkValue>, Vec<(String, TreewalkValue)>) {
        (self.positional, self.keywords)
    }

    pub fn get_kwarg(&self, name: &str) -> Option<&TreewalkValue> {
        self.keywords
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// A parameter that may be passed either positionally at `index` or by keyword.
    pub fn get(&self, index: usize, name: &str) -> Option<&TreewalkValue> {
        self.get_arg(index).or_else(|| self.get_kwarg(name))
    }

    pub fn push_kwarg(&mut self, name: String, value: TreewalkValue) -> DomainResult<()> {
        if self.get_kwarg(&name).is_some() {
            return Err(Exception::type_error(format!(
                "got multiple values for keyword argument '{name}'"
            )));
        }
        self.keywords.push((name, value));
        Ok(())
    }
}

/// Validate the positional argument count of a builtin. Builtins that accept keywords check
/// them themselves.
pub fn check_args(
    args: &Args,
    name: &str,
    condition: impl Fn(usize) -> bool,
    expected: &str,
) -> DomainResult<()> {
    if condition(args.len()) {
        Ok(())
    } else {
        Err(Exception::type_error(format!(
            "{name}() takes {expected} argument(s) ({} given)",
            args.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_or_keyword() {
        let args = Args::new(
            vec![TreewalkValue::Int(1)],
            vec![("mode".into(), TreewalkValue::str("r"))],
        );
        assert_eq!(args.get(0, "file"), Some(&TreewalkValue::Int(1)));
        assert_eq!(args.get(1, "mode"), Some(&TreewalkValue::str("r")));
        assert_eq!(args.get(2, "encoding"), None);
    }

    #[test]
    fn duplicate_keyword() {
        let mut args = Args::default();
        args.push_kwarg("a".into(), TreewalkValue::None)
            .expect("first is fine");
        assert!(args.push_kwarg("a".into(), TreewalkValue::None).is_err());
    }

    #[test]
    fn arity() {
        let args = Args::positional(vec![TreewalkValue::None]);
        assert!(check_args(&args, "len", |n| n == 1, "exactly one").is_ok());
        assert!(check_args(&args, "zip", |n| n >= 2, "at least two").is_err());
    }
}

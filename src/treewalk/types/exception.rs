use crate::{
    core::Container,
    domain::ExceptionKind,
    treewalk::{types::Object, TreewalkValue},
};

/// A raised or constructed exception. Instances of user classes deriving from a builtin
/// exception keep their object in `instance` and take `kind` from their nearest builtin ancestor.
#[derive(Debug, PartialEq, Clone)]
pub struct Exception {
    pub kind: ExceptionKind,
    pub payload: Vec<TreewalkValue>,
    pub instance: Option<Container<Object>>,
}

impl Exception {
    pub fn new(kind: ExceptionKind, payload: Vec<TreewalkValue>) -> Self {
        Self {
            kind,
            payload,
            instance: None,
        }
    }

    fn new_from_str(kind: ExceptionKind, msg: impl Into<String>) -> Self {
        Self::new(kind, vec![TreewalkValue::Str(msg.into())])
    }

    pub fn from_instance(
        kind: ExceptionKind,
        payload: Vec<TreewalkValue>,
        instance: Container<Object>,
    ) -> Self {
        Self {
            kind,
            payload,
            instance: Some(instance),
        }
    }

    pub fn type_name(&self) -> String {
        match &self.instance {
            Some(object) => object.borrow().class.borrow().name.clone(),
            None => self.kind.name().to_string(),
        }
    }

    /// The value an `except ... as e` clause binds.
    pub fn as_value(&self) -> TreewalkValue {
        match &self.instance {
            Some(object) => TreewalkValue::Object(object.clone()),
            None => TreewalkValue::Exception(self.clone()),
        }
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::new_from_str(ExceptionKind::TypeError, msg)
    }

    pub fn value_error(msg: impl Into<String>) -> Self {
        Self::new_from_str(ExceptionKind::ValueError, msg)
    }

    pub fn runtime_error(msg: impl Into<String>) -> Self {
        Self::new_from_str(ExceptionKind::RuntimeError, msg)
    }

    pub fn import_error(msg: impl Into<String>) -> Self {
        Self::new_from_str(ExceptionKind::ImportError, msg)
    }

    pub fn module_not_found(name: &str) -> Self {
        Self::new_from_str(
            ExceptionKind::ModuleNotFoundError,
            format!("No module named '{name}'"),
        )
    }

    pub fn name_error(name: &str) -> Self {
        Self::new_from_str(
            ExceptionKind::NameError,
            format!("name '{name}' is not defined"),
        )
    }

    pub fn key_error(key: TreewalkValue) -> Self {
        Self::new(ExceptionKind::KeyError, vec![key])
    }

    pub fn index_error(msg: impl Into<String>) -> Self {
        Self::new_from_str(ExceptionKind::IndexError, msg)
    }

    pub fn attribute_error(type_name: &str, attr: &str) -> Self {
        Self::new_from_str(
            ExceptionKind::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    pub fn assertion_error(payload: Vec<TreewalkValue>) -> Self {
        Self::new(ExceptionKind::AssertionError, payload)
    }

    pub fn div_by_zero_error(msg: impl Into<String>) -> Self {
        Self::new_from_str(ExceptionKind::ZeroDivisionError, msg)
    }

    pub fn overflow_error(msg: impl Into<String>) -> Self {
        Self::new_from_str(ExceptionKind::OverflowError, msg)
    }

    pub fn stop_iteration() -> Self {
        Self::new(ExceptionKind::StopIteration, vec![])
    }

    pub fn permission_error(msg: impl Into<String>) -> Self {
        Self::new_from_str(ExceptionKind::PermissionError, msg)
    }

    pub fn recursion_error() -> Self {
        Self::new_from_str(
            ExceptionKind::RecursionError,
            "maximum recursion depth exceeded",
        )
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::new_from_str(ExceptionKind::NotImplementedError, msg)
    }

    pub fn system_exit(code: TreewalkValue) -> Self {
        let payload = if code.is_none() { vec![] } else { vec![code] };
        Self::new(ExceptionKind::SystemExit, payload)
    }

    pub fn first_arg_or_none(&self) -> TreewalkValue {
        self.payload.first().cloned().unwrap_or(TreewalkValue::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_exception_binds_itself() {
        let exc = Exception::value_error("bad");
        assert_eq!(exc.type_name(), "ValueError");
        assert_eq!(exc.as_value(), TreewalkValue::Exception(exc.clone()));
        assert_eq!(exc.first_arg_or_none(), TreewalkValue::str("bad"));
    }

    #[test]
    fn system_exit_without_code() {
        assert!(Exception::system_exit(TreewalkValue::None).payload.is_empty());
        assert_eq!(
            Exception::system_exit(TreewalkValue::Int(2)).payload,
            vec![TreewalkValue::Int(2)]
        );
    }
}

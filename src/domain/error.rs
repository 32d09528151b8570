use std::fmt::{Display, Error, Formatter};

/// The builtin exception hierarchy available inside the sandbox.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ExceptionKind {
    BaseException,
    SystemExit,
    KeyboardInterrupt,
    Exception,
    StopIteration,
    ArithmeticError,
    ZeroDivisionError,
    OverflowError,
    AssertionError,
    AttributeError,
    ImportError,
    ModuleNotFoundError,
    LookupError,
    IndexError,
    KeyError,
    NameError,
    UnboundLocalError,
    OSError,
    FileNotFoundError,
    PermissionError,
    RuntimeError,
    NotImplementedError,
    RecursionError,
    SyntaxError,
    TypeError,
    ValueError,
    UnicodeError,
    Warning,
    UserWarning,
    DeprecationWarning,
}

const ALL: [ExceptionKind; 30] = [
    ExceptionKind::BaseException,
    ExceptionKind::SystemExit,
    ExceptionKind::KeyboardInterrupt,
    ExceptionKind::Exception,
    ExceptionKind::StopIteration,
    ExceptionKind::ArithmeticError,
    ExceptionKind::ZeroDivisionError,
    ExceptionKind::OverflowError,
    ExceptionKind::AssertionError,
    ExceptionKind::AttributeError,
    ExceptionKind::ImportError,
    ExceptionKind::ModuleNotFoundError,
    ExceptionKind::LookupError,
    ExceptionKind::IndexError,
    ExceptionKind::KeyError,
    ExceptionKind::NameError,
    ExceptionKind::UnboundLocalError,
    ExceptionKind::OSError,
    ExceptionKind::FileNotFoundError,
    ExceptionKind::PermissionError,
    ExceptionKind::RuntimeError,
    ExceptionKind::NotImplementedError,
    ExceptionKind::RecursionError,
    ExceptionKind::SyntaxError,
    ExceptionKind::TypeError,
    ExceptionKind::ValueError,
    ExceptionKind::UnicodeError,
    ExceptionKind::Warning,
    ExceptionKind::UserWarning,
    ExceptionKind::DeprecationWarning,
];

impl ExceptionKind {
    pub fn all() -> &'static [ExceptionKind] {
        &ALL
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BaseException => "BaseException",
            Self::SystemExit => "SystemExit",
            Self::KeyboardInterrupt => "KeyboardInterrupt",
            Self::Exception => "Exception",
            Self::StopIteration => "StopIteration",
            Self::ArithmeticError => "ArithmeticError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::OverflowError => "OverflowError",
            Self::AssertionError => "AssertionError",
            Self::AttributeError => "AttributeError",
            Self::ImportError => "ImportError",
            Self::ModuleNotFoundError => "ModuleNotFoundError",
            Self::LookupError => "LookupError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::NameError => "NameError",
            Self::UnboundLocalError => "UnboundLocalError",
            Self::OSError => "OSError",
            Self::FileNotFoundError => "FileNotFoundError",
            Self::PermissionError => "PermissionError",
            Self::RuntimeError => "RuntimeError",
            Self::NotImplementedError => "NotImplementedError",
            Self::RecursionError => "RecursionError",
            Self::SyntaxError => "SyntaxError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::UnicodeError => "UnicodeError",
            Self::Warning => "Warning",
            Self::UserWarning => "UserWarning",
            Self::DeprecationWarning => "DeprecationWarning",
        }
    }

    /// Resolve a builtin name, including the legacy aliases of `OSError`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "IOError" | "EnvironmentError" => Some(Self::OSError),
            _ => ALL.iter().find(|kind| kind.name() == name).copied(),
        }
    }

    pub fn parent(&self) -> Option<Self> {
        let parent = match self {
            Self::BaseException => return None,
            Self::SystemExit | Self::KeyboardInterrupt | Self::Exception => Self::BaseException,
            Self::ZeroDivisionError | Self::OverflowError => Self::ArithmeticError,
            Self::ModuleNotFoundError => Self::ImportError,
            Self::IndexError | Self::KeyError => Self::LookupError,
            Self::UnboundLocalError => Self::NameError,
            Self::FileNotFoundError | Self::PermissionError => Self::OSError,
            Self::NotImplementedError | Self::RecursionError => Self::RuntimeError,
            Self::UnicodeError => Self::ValueError,
            Self::UserWarning | Self::DeprecationWarning => Self::Warning,
            _ => Self::Exception,
        };
        Some(parent)
    }

    pub fn is_subclass_of(&self, other: &ExceptionKind) -> bool {
        let mut current = Some(*self);
        while let Some(kind) = current {
            if kind == *other {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}

impl Display for ExceptionKind {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy() {
        assert!(ExceptionKind::ModuleNotFoundError.is_subclass_of(&ExceptionKind::ImportError));
        assert!(ExceptionKind::KeyError.is_subclass_of(&ExceptionKind::Exception));
        assert!(ExceptionKind::SystemExit.is_subclass_of(&ExceptionKind::BaseException));
        assert!(!ExceptionKind::SystemExit.is_subclass_of(&ExceptionKind::Exception));
        assert!(!ExceptionKind::ImportError.is_subclass_of(&ExceptionKind::ModuleNotFoundError));
    }

    #[test]
    fn names_round_trip() {
        for kind in ExceptionKind::all() {
            assert_eq!(ExceptionKind::from_name(kind.name()), Some(*kind));
        }
        assert_eq!(
            ExceptionKind::from_name("IOError"),
            Some(ExceptionKind::OSError)
        );
        assert_eq!(ExceptionKind::from_name("setup"), None);
    }
}

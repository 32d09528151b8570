use std::fmt::{Display, Error, Formatter};

use crate::domain::Identifier;

/// A dotted module reference as written in an `import` statement, e.g. `os.path`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct ModulePath(Vec<Identifier>);

impl ModulePath {
    pub fn new(segments: Vec<Identifier>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[Identifier] {
        &self.0
    }

    pub fn segments_as_str(&self) -> Vec<&str> {
        self.0.iter().map(Identifier::as_str).collect()
    }

    /// The first segment, which is the name an `import a.b.c` statement binds.
    pub fn head(&self) -> Option<&Identifier> {
        self.0.first()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ModulePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.segments_as_str().join("."))
    }
}

/// The module part of a `from ... import` statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FromImportPath {
    Absolute(ModulePath),
    /// The leading dot count and the (possibly empty) path after the dots.
    Relative(usize, ModulePath),
}

impl Display for FromImportPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            FromImportPath::Absolute(path) => write!(f, "{path}"),
            FromImportPath::Relative(levels, path) => {
                write!(f, "{}{path}", ".".repeat(*levels))
            }
        }
    }
}

/// A resolved, absolute module name used at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleName(Vec<String>);

impl ModuleName {
    pub fn new(segments: Vec<String>) -> Self {
        assert!(!segments.is_empty());
        Self(segments)
    }

    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        Self::new(segments.iter().map(|s| s.as_ref().to_string()).collect())
    }

    pub fn from_dotted(s: &str) -> Self {
        let segments = s.split('.').map(|s| s.to_string()).collect();
        Self::new(segments)
    }

    pub fn from_path(path: &ModulePath) -> Option<Self> {
        if path.is_empty() {
            None
        } else {
            Some(Self::from_segments(&path.segments_as_str()))
        }
    }

    pub fn as_str(&self) -> String {
        self.0.join(".")
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The root package, which is what availability is decided on.
    pub fn head(&self) -> &str {
        self.0
            .first()
            .map(|s| s.as_str())
            .unwrap_or_default()
    }

    pub fn tail(&self) -> &str {
        self.0.last().map(|s| s.as_str()).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<ModuleName> {
        self.strip_last(1)
    }

    /// Removes `n` segments from the end of the module name.
    ///
    /// Returns `None` if removing `n` segments would erase the module name entirely.
    pub fn strip_last(&self, n: usize) -> Option<ModuleName> {
        if n >= self.0.len() {
            return None;
        }

        let new_len = self.0.len() - n;
        Some(ModuleName(self.0[..new_len].to_vec()))
    }

    /// Iterate from the full module name downward to its parents, excluding the full name itself.
    ///
    /// Example:
    ///   "a.b.c" -> yields ["a.b", "a"]
    pub fn parents(&self) -> impl DoubleEndedIterator<Item = ModuleName> + '_ {
        (1..self.0.len()).filter_map(move |n| self.strip_last(n))
    }
}

impl Display for ModuleName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> ModulePath {
        ModulePath::new(
            segments
                .iter()
                .map(|s| Identifier::new(*s).expect("valid identifier"))
                .collect(),
        )
    }

    #[test]
    fn parents_of_three_segments() {
        let m = ModuleName::from_segments(&["a", "b", "c"]);
        let parents: Vec<_> = m.parents().collect();

        assert_eq!(
            parents,
            vec![
                ModuleName::from_segments(&["a", "b"]),
                ModuleName::from_segments(&["a"]),
            ]
        );
    }

    #[test]
    fn parents_of_one_segment_is_empty() {
        let m = ModuleName::from_segments(&["a"]);
        assert!(m.parents().next().is_none());
    }

    #[test]
    fn head_is_root_package() {
        let m = ModuleName::from_dotted("distutils.command.build_ext");
        assert_eq!(m.head(), "distutils");
        assert_eq!(m.tail(), "build_ext");
        assert_eq!(m.parent(), Some(ModuleName::from_dotted("distutils.command")));
    }

    #[test]
    fn from_empty_path() {
        assert_eq!(ModuleName::from_path(&ModulePath::default()), None);
        assert_eq!(
            ModuleName::from_path(&path(&["os", "path"])),
            Some(ModuleName::from_dotted("os.path"))
        );
    }

    #[test]
    fn display_relative_import_path() {
        let p = FromImportPath::Relative(2, path(&["pkg", "version"]));
        assert_eq!(p.to_string(), "..pkg.version");
        let p = FromImportPath::Absolute(path(&["setuptools"]));
        assert_eq!(p.to_string(), "setuptools");
    }
}

use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

use crate::domain::Text;

/// A build descriptor's text together with the path it is reported under. The path is used for
/// diagnostics and `__file__` only; nothing is ever resolved relative to it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Source {
    path: PathBuf,
    text: Text,
}

impl Source {
    pub fn new(path: impl Into<PathBuf>, text: Text) -> Self {
        Self {
            path: path.into(),
            text,
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new("<string>", Text::new(text))
    }

    pub fn from_path<P>(filepath: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(&filepath)?;
        Ok(Self::new(filepath.as_ref(), Text::from(text)))
    }

    /// Read the full descriptor from an already-open stream, e.g. a member of a source archive.
    pub fn from_reader<R>(path: impl Into<PathBuf>, mut reader: R) -> io::Result<Self>
    where
        R: Read,
    {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Self::new(path, Text::from(text)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn text(&self) -> &Text {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_reader_keeps_path() {
        let source = Source::from_reader("pkg-1.0/setup.py", "setup()".as_bytes())
            .expect("reader should not fail");

        assert_eq!(source.path(), Path::new("pkg-1.0/setup.py"));
        assert_eq!(source.text().as_str(), "setup()");
    }

    #[test]
    fn from_reader_drops_byte_order_mark() {
        let source = Source::from_reader("setup.py", "\u{feff}setup()\n".as_bytes())
            .expect("reader should not fail");
        assert_eq!(source.text().as_str(), "setup()\n");
    }

    #[test]
    fn from_path_missing_file() {
        assert!(Source::from_path("/definitely/not/here/setup.py").is_err());
    }
}

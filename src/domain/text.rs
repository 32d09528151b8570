const BYTE_ORDER_MARK: char = '\u{feff}';

/// Represents a finished piece of Python code (not in progress!). A leading byte order mark is
/// dropped, as the Python tokenizer does.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Text(String);

impl Text {
    pub fn new(text: &str) -> Self {
        Self(text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Text {
    fn from(mut value: String) -> Self {
        if value.starts_with(BYTE_ORDER_MARK) {
            value.drain(..BYTE_ORDER_MARK.len_utf8());
        }
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_mark_is_dropped() {
        assert_eq!(Text::new("\u{feff}setup()").as_str(), "setup()");
        assert_eq!(Text::from("\u{feff}x = 1\n".to_string()).as_str(), "x = 1\n");
        assert_eq!(Text::new("x = '\u{feff}'").as_str(), "x = '\u{feff}'");
    }
}

//! The mailbox the registration interceptor writes into. One buffer is created per extraction
//! and handed back to the caller once the script finishes, so runs never see each other's data.

use crate::core::{log, LogLevel};

#[derive(Debug, Default, PartialEq, Clone)]
pub struct CaptureBuffer {
    entries: Vec<Vec<String>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the requirements of one registration call.
    pub fn record(&mut self, requirements: Vec<String>) {
        if !self.entries.is_empty() {
            log(LogLevel::Warn, || {
                format!(
                    "Registration call reached {} times; keeping every requirement list",
                    self.entries.len() + 1
                )
            });
        }
        log(LogLevel::Debug, || {
            format!("Captured {} requirement(s)", requirements.len())
        });
        self.entries.push(requirements);
    }

    /// Number of registration calls recorded so far.
    pub fn records(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, flattened in recording order.
    pub fn drain(&mut self) -> Vec<String> {
        self.entries.drain(..).flatten().collect()
    }
}

/// setuptools accepts `install_requires` as one string with a requirement per line.
pub fn split_requirement_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_flattens_and_resets() {
        let mut buffer = CaptureBuffer::new();
        buffer.record(vec!["a>=1.0".into()]);
        buffer.record(vec!["b".into(), "c".into()]);
        assert_eq!(buffer.records(), 2);

        assert_eq!(buffer.drain(), vec!["a>=1.0", "b", "c"]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn empty_record_still_counts() {
        let mut buffer = CaptureBuffer::new();
        buffer.record(vec![]);
        assert_eq!(buffer.records(), 1);
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn string_requirements() {
        assert_eq!(
            split_requirement_lines("\n  requests>=2\n\nsix\n   "),
            vec!["requests>=2", "six"]
        );
        assert!(split_requirement_lines("").is_empty());
    }
}

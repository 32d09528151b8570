/// An in-memory text stream. The neutralizer substitutes one seeded with the sentinel for every
/// read-mode `open()`, and `io.StringIO` builds them directly.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct StringIO {
    buffer: String,
    position: usize,
    closed: bool,
}

impl StringIO {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            buffer: initial.into(),
            position: 0,
            closed: false,
        }
    }

    /// Byte offset of the `index`th character, clamped to the end of the buffer.
    fn byte_offset(&self, index: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(index)
            .map_or(self.buffer.len(), |(offset, _)| offset)
    }

    fn remaining(&self) -> &str {
        &self.buffer[self.byte_offset(self.position)..]
    }

    /// Read up to `size` characters, or everything left when `size` is `None` or negative.
    pub fn read(&mut self, size: Option<i64>) -> String {
        let rest = self.remaining();
        let text: String = match size {
            Some(n) if n >= 0 => rest.chars().take(n as usize).collect(),
            _ => rest.to_string(),
        };
        self.position += text.chars().count();
        text
    }

    pub fn readline(&mut self) -> String {
        let rest = self.remaining();
        let line = match rest.find('\n') {
            Some(end) => rest[..=end].to_string(),
            None => rest.to_string(),
        };
        self.position += line.chars().count();
        line
    }

    pub fn readlines(&mut self) -> Vec<String> {
        let mut lines = vec![];
        loop {
            let line = self.readline();
            if line.is_empty() {
                return lines;
            }
            lines.push(line);
        }
    }

    /// Overwrite from the current position, returning the number of characters written. A
    /// position past the end pads the gap with NULs.
    pub fn write(&mut self, text: &str) -> usize {
        let written = text.chars().count();
        let length = self.buffer.chars().count();
        if self.position > length {
            self.buffer
                .extend(std::iter::repeat('\0').take(self.position - length));
        }
        let start = self.byte_offset(self.position);
        let end = self.byte_offset(self.position + written);
        self.buffer.replace_range(start..end, text);
        self.position += written;
        written
    }

    /// Move to character `position`. Seeking past the end is allowed, as in `io.StringIO`.
    pub fn seek(&mut self, position: usize) -> usize {
        self.position = position;
        position
    }

    /// The current position in characters.
    pub fn tell(&self) -> usize {
        self.position
    }

    pub fn getvalue(&self) -> &str {
        &self.buffer
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_consumes() {
        let mut stream = StringIO::new("FIXME");
        assert_eq!(stream.read(Some(2)), "FI");
        assert_eq!(stream.read(None), "XME");
        assert_eq!(stream.read(None), "");
        assert_eq!(stream.getvalue(), "FIXME");
    }

    #[test]
    fn lines() {
        let mut stream = StringIO::new("a\nb\nc");
        assert_eq!(stream.readline(), "a\n");
        assert_eq!(stream.readlines(), vec!["b\n", "c"]);
    }

    #[test]
    fn write_then_seek() {
        let mut stream = StringIO::default();
        assert_eq!(stream.write("hello"), 5);
        stream.seek(0);
        stream.write("J");
        assert_eq!(stream.getvalue(), "Jello");
        assert_eq!(stream.tell(), 1);
    }

    #[test]
    fn positions_count_characters() {
        let mut stream = StringIO::new("héllo");
        assert_eq!(stream.read(Some(2)), "hé");
        assert_eq!(stream.tell(), 2);
        assert_eq!(stream.readline(), "llo");
        assert_eq!(stream.tell(), 5);
    }

    #[test]
    fn overwrite_non_ascii() {
        let mut stream = StringIO::new("ñandú");
        stream.seek(1);
        assert_eq!(stream.write("AN"), 2);
        assert_eq!(stream.getvalue(), "ñANdú");
        assert_eq!(stream.tell(), 3);
        stream.seek(4);
        assert_eq!(stream.write("üé"), 2);
        assert_eq!(stream.getvalue(), "ñANdüé");
        assert_eq!(stream.read(None), "");
    }

    #[test]
    fn write_past_the_end_pads() {
        let mut stream = StringIO::new("é");
        stream.seek(3);
        stream.write("x");
        assert_eq!(stream.getvalue(), "é\0\0x");
        assert_eq!(stream.tell(), 4);
        stream.seek(10);
        assert_eq!(stream.read(None), "");
    }
}

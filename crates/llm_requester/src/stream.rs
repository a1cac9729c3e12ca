use std::io::{self, Write};

/// Line-buffered writer for streamed answers.
///
/// Deltas are held until a newline arrives, so the sink only ever sees whole
/// lines. Whatever is left when the stream ends is flushed by [`finish`](Self::finish)
/// with a newline appended.
pub struct LineBuffer<'a> {
    sink: &'a mut (dyn Write + Send),
    pending: String,
}

impl<'a> LineBuffer<'a> {
    pub fn new(sink: &'a mut (dyn Write + Send)) -> Self {
        Self {
            sink,
            pending: String::new(),
        }
    }

    pub fn push(&mut self, delta: &str) -> io::Result<()> {
        self.pending.push_str(delta);
        if let Some(idx) = self.pending.rfind('\n') {
            let rest = self.pending.split_off(idx + 1);
            self.sink.write_all(self.pending.as_bytes())?;
            self.sink.flush()?;
            self.pending = rest;
        }
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.pending.push('\n');
            self.sink.write_all(self.pending.as_bytes())?;
            self.pending.clear();
        }
        self.sink.flush()
    }
}

//! Per-agent console.
//!
//! Sequential runs print straight to stdout. Concurrent runs buffer every line
//! and print the whole block when the agent finishes, so output from two files
//! never interleaves. A progress bar, if one is drawn, is suspended while a
//! block is printed.

use indicatif::ProgressBar;
use std::fmt;
use std::io::{self, Write};

pub struct AgentConsole {
    buffered: bool,
    buffer: String,
    progress: Option<ProgressBar>,
}

impl AgentConsole {
    pub fn new(buffered: bool) -> Self {
        Self {
            buffered,
            buffer: String::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        self.text(text.as_ref());
        self.text("\n");
    }

    pub fn text(&mut self, text: &str) {
        self.buffer.push_str(text);
        if !self.buffered {
            self.flush_buffer();
        }
    }

    /// 已写入但尚未输出的内容
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let block = std::mem::take(&mut self.buffer);
        let print = || {
            let mut out = io::stdout().lock();
            let _ = out.write_all(block.as_bytes());
            let _ = out.flush();
        };
        match &self.progress {
            Some(bar) => bar.suspend(print),
            None => print(),
        }
    }
}

impl fmt::Write for AgentConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.text(s);
        Ok(())
    }
}

impl Drop for AgentConsole {
    fn drop(&mut self) {
        self.flush_buffer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    #[test]
    fn test_buffered_console_holds_output() {
        let mut console = AgentConsole::new(true);
        console.line("processing: a.go");
        write!(console, "issues: {}", 2).unwrap();
        assert_eq!(console.pending(), "processing: a.go\nissues: 2");
        console.flush_buffer();
        assert!(console.pending().is_empty());
    }

    #[test]
    fn test_direct_console_prints_immediately() {
        let mut console = AgentConsole::new(false);
        console.line("done");
        assert!(console.pending().is_empty());
    }
}

use std::sync::Mutex;

use crossterm::style::Color;
use taskvisor::exec::LogSink;

/// A `LogSink` that keeps every emitted line for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(String, Color, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(program, line)` pairs in emission order.
    pub fn lines(&self) -> Vec<(String, String)> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _, l)| (p.clone(), l.clone()))
            .collect()
    }

    /// Lines emitted by one program.
    pub fn lines_of(&self, program: &str) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _, _)| p == program)
            .map(|(_, _, l)| l.clone())
            .collect()
    }

    /// Color used for a program's prefix, if it printed anything.
    pub fn color_of(&self, program: &str) -> Option<Color> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _, _)| p == program)
            .map(|(_, c, _)| *c)
    }
}

impl LogSink for RecordingSink {
    fn emit(&self, program: &str, color: Color, line: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((program.to_string(), color, line.to_string()));
    }
}

//! Progress output written back to whoever triggered an operation.

use std::sync::Mutex;

/// Line-oriented progress sink. Writes never fail from the caller's view.
pub trait OutputSink: Send + Sync {
    fn write_str(&self, s: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_str(&self, _s: &str) {}
}

/// Collects output in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    buf: Mutex<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl OutputSink for BufferSink {
    fn write_str(&self, s: &str) {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).push_str(s);
    }
}

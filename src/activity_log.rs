use std::{collections::VecDeque, sync::Arc};

use flexi_logger::{DeferredNow, writers::LogWriter};
use parking_lot::Mutex;

const DEFAULT_CAPACITY: usize = 1000;

/// In-memory tail of the log, oldest line first.
pub struct ActivityLog {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn for_each<F>(&self, func: F)
    where
        F: FnMut(&String),
    {
        self.lines.lock().iter().for_each(func);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// flexi_logger sink feeding an [`ActivityLog`]. Errors are echoed to stderr.
pub struct ActivityLogWriter {
    log: Arc<ActivityLog>,
}

impl ActivityLogWriter {
    pub fn new(log: Arc<ActivityLog>) -> Self {
        Self { log }
    }
}

impl LogWriter for ActivityLogWriter {
    fn write(&self, now: &mut DeferredNow, record: &log::Record) -> std::io::Result<()> {
        let line = format!(
            "[{}] {} - {}",
            record.level().as_str().to_uppercase(),
            now.now().format("%Y-%m-%d %H:%M:%S"),
            record.args()
        );
        if record.level() == log::Level::Error {
            eprintln!("{}", line);
        }
        self.log.push(line);
        Ok(())
    }

    fn flush(&self) -> std::io::Result<()> {
        Ok(())
    }
}

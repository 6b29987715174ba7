//! Scripted nodes shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{Node, Status};

/// Counters observed from outside a [`Scripted`] after it has been boxed.
#[derive(Debug, Clone, Default)]
pub struct ScriptStats {
    ticks: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
}

impl ScriptStats {
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

/// Returns the scripted statuses in order, repeating the last one.
pub struct Scripted {
    name: String,
    script: Vec<Status>,
    cursor: usize,
    stats: ScriptStats,
    log: Option<Arc<Mutex<Vec<String>>>>,
}

impl Scripted {
    pub fn new(name: &str, script: &[Status]) -> (Self, ScriptStats) {
        assert!(!script.is_empty(), "Scripted needs at least one status");
        let stats = ScriptStats::default();
        let scripted = Self {
            name: name.to_string(),
            script: script.to_vec(),
            cursor: 0,
            stats: stats.clone(),
            log: None,
        };
        (scripted, stats)
    }

    /// Like [`Scripted::new`], also appending the node's name to `log` on each tick.
    pub fn logged(
        name: &str,
        script: &[Status],
        log: &Arc<Mutex<Vec<String>>>,
    ) -> (Self, ScriptStats) {
        let (mut scripted, stats) = Self::new(name, script);
        scripted.log = Some(Arc::clone(log));
        (scripted, stats)
    }

    pub fn boxed(name: &str, script: &[Status]) -> (Box<dyn Node>, ScriptStats) {
        let (scripted, stats) = Self::new(name, script);
        (Box::new(scripted), stats)
    }
}

impl Node for Scripted {
    fn tick(&mut self) -> Status {
        self.stats.ticks.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().unwrap().push(self.name.clone());
        }
        let status = self.script[self.cursor.min(self.script.len() - 1)];
        self.cursor += 1;
        status
    }

    fn reset(&mut self) {
        self.stats.resets.fetch_add(1, Ordering::SeqCst);
        self.cursor = 0;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

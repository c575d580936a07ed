use std::sync::atomic::{AtomicUsize, Ordering};

/// Logs processed item counts, once per additional 10% of the total.
#[derive(Debug)]
pub struct ProgressLogger {
    name: &'static str,
    total: Option<usize>,
    processed: AtomicUsize,
    last_decile: AtomicUsize,
}

impl ProgressLogger {
    pub fn new(name: &'static str, total: Option<usize>) -> Self {
        Self { name, total, processed: AtomicUsize::new(0), last_decile: AtomicUsize::new(0) }
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// Records `count` more processed items. Returns true if a progress line
    /// was logged.
    pub fn track(&self, count: usize) -> bool {
        let processed = self.processed.fetch_add(count, Ordering::Relaxed) + count;
        let Some(total) = self.total.filter(|t| *t > 0) else {
            tracing::debug!(name = self.name, processed, "Batch processed");
            return false;
        };

        let decile = (processed.min(total) * 10) / total;
        let previous = self.last_decile.fetch_max(decile, Ordering::Relaxed);
        if decile > previous {
            tracing::info!(name = self.name, processed, total, "{} progress: {}/{} ({}%)", self.name, processed, total, decile * 10);
            true
        } else {
            false
        }
    }
}

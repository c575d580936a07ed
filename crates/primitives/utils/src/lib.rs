#![allow(clippy::new_without_default)]

pub mod service;

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task,
    time::{Duration, Instant},
};

use tokio::{sync::mpsc, task::JoinHandle};

pub use service::ServiceContext;

/// Tasks spawned through this handle are aborted when it is dropped, so a
/// failing test or a cancelled parent never leaks a background loop.
pub struct AbortOnDrop<T>(JoinHandle<T>);
impl<T: Send + 'static> AbortOnDrop<T> {
    #[track_caller] // forward the tokio track_caller
    pub fn spawn<F: Future<Output = T> + Send + 'static>(future: F) -> Self {
        Self(tokio::spawn(future))
    }
}
impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort()
    }
}
impl<T> Future for AbortOnDrop<T> {
    type Output = T;
    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        // Panic: the task is never aborted, except on drop in which case it cannot be polled again.
        Pin::new(&mut self.get_mut().0).poll(cx).map(|r| r.expect("Join error"))
    }
}
impl<T> From<JoinHandle<T>> for AbortOnDrop<T> {
    fn from(value: JoinHandle<T>) -> Self {
        Self(value)
    }
}

pub struct PerfStopwatch(pub Instant);

impl PerfStopwatch {
    pub fn new() -> PerfStopwatch {
        PerfStopwatch(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

#[macro_export]
macro_rules! stopwatch_end {
    ($stopwatch:expr, $($arg:tt)+) => {
        tracing::debug!($($arg)+, $stopwatch.elapsed())
    }
}

/// Optional sink for state updates emitted by long running loops. Production
/// code passes `None`; tests subscribe to observe state transitions.
#[derive(Debug)]
pub struct ServiceStateSender<T>(Option<mpsc::UnboundedSender<T>>);

impl<T> Default for ServiceStateSender<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> ServiceStateSender<T> {
    pub fn new(sender: Option<mpsc::UnboundedSender<T>>) -> Self {
        Self(sender)
    }

    pub fn send(&mut self, val: T) {
        if let Some(sender) = &mut self.0 {
            // The receiving end may be gone, which is fine.
            let _ = sender.send(val);
        }
    }
}

pub fn service_state_channel<T>() -> (ServiceStateSender<T>, mpsc::UnboundedReceiver<T>) {
    let (sender, recv) = mpsc::unbounded_channel();
    (ServiceStateSender(Some(sender)), recv)
}

/// Displays `None` as a placeholder instead of requiring the caller to match.
pub struct DisplayOption<'a, T>(pub &'a Option<T>, pub &'static str);

impl<T: fmt::Display> fmt::Display for DisplayOption<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(val) => write!(f, "{val}"),
            None => f.write_str(self.1),
        }
    }
}

pub fn fmt_option<'a, T: fmt::Display>(opt: &'a Option<T>, or_else: &'static str) -> DisplayOption<'a, T> {
    DisplayOption(opt, or_else)
}

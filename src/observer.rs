//! Per-call events and aggregated call statistics.
//!
//! Every result-mode invocation produces exactly one [`CallEvent`], including calls the
//! query function cancelled and calls that failed. Observers are attached per query
//! function; [`StatsRegistry`] aggregates events by function name.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::error::QueryFnError;

/// Outcome of one query function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub func_name: String,
    pub duration: Duration,
    /// Rows returned, or rows changed for statements run for their effects.
    pub tuples: u64,
    /// [`QueryFnError::kind`] of the failure, if the call failed.
    pub error: Option<String>,
}

/// Receives call events.
pub trait CallObserver: Send + Sync {
    fn on_call(&self, event: &CallEvent);
}

/// Accumulated statistics for one function name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallStat {
    pub calls: u64,
    pub duration: Duration,
    pub tuples: u64,
    pub fails: u64,
    pub fails_by_error: BTreeMap<String, u64>,
}

impl CallStat {
    fn record(&mut self, event: &CallEvent) {
        self.calls += 1;
        self.duration += event.duration;
        self.tuples += event.tuples;
        if let Some(kind) = &event.error {
            self.fails += 1;
            *self.fails_by_error.entry(kind.clone()).or_insert(0) += 1;
        }
    }
}

#[derive(Default)]
struct RegistryState {
    names: BTreeSet<String>,
    stats: BTreeMap<String, CallStat>,
}

/// Aggregates call events by function name and forwards them to listeners.
///
/// A panicking listener is logged and skipped; it never affects the call that produced
/// the event.
#[derive(Default)]
pub struct StatsRegistry {
    state: Mutex<RegistryState>,
    listeners: Mutex<Vec<Arc<dyn CallObserver>>>,
}

impl StatsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a function name as known, before it is ever called.
    pub fn register(&self, func_name: impl Into<String>) {
        self.lock_state().names.insert(func_name.into());
    }

    /// Every name registered or seen in an event.
    #[must_use]
    pub fn func_names(&self) -> BTreeSet<String> {
        self.lock_state().names.clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn CallObserver>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    #[must_use]
    pub fn stat(&self, func_name: &str) -> Option<CallStat> {
        self.lock_state().stats.get(func_name).cloned()
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, CallStat> {
        self.lock_state().stats.clone()
    }

    /// Reset statistics; registered names are kept.
    pub fn clear_stat(&self) {
        self.lock_state().stats.clear();
    }

    /// Apply every event already queued on `rx`. Returns how many were applied.
    pub fn drain(&self, rx: &mut UnboundedReceiver<CallEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.on_call(&event);
            applied += 1;
        }
        applied
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CallObserver for StatsRegistry {
    fn on_call(&self, event: &CallEvent) {
        {
            let mut state = self.lock_state();
            state.names.insert(event.func_name.clone());
            state
                .stats
                .entry(event.func_name.clone())
                .or_default()
                .record(event);
        }
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_call(event))).is_err() {
                warn!(function = %event.func_name, "call listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for StatsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRegistry")
            .field("stats", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Forwards events over an unbounded channel, for aggregation on another task or thread.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<CallEvent>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new(tx: UnboundedSender<CallEvent>) -> Self {
        Self { tx }
    }
}

impl CallObserver for ChannelObserver {
    fn on_call(&self, event: &CallEvent) {
        if self.tx.send(event.clone()).is_err() {
            warn!(function = %event.func_name, "call event receiver closed");
        }
    }
}

/// Measures one call and reports it exactly once.
pub(crate) struct CallTimer {
    func_name: String,
    observer: Option<Arc<dyn CallObserver>>,
    start: Instant,
}

impl CallTimer {
    pub(crate) fn start(func_name: &str, observer: Option<&Arc<dyn CallObserver>>) -> Self {
        Self {
            func_name: func_name.to_owned(),
            observer: observer.cloned(),
            start: Instant::now(),
        }
    }

    pub(crate) fn report(self, tuples: u64, error_kind: Option<&str>) {
        if let Some(observer) = &self.observer {
            let event = CallEvent {
                func_name: self.func_name,
                duration: self.start.elapsed(),
                tuples,
                error: error_kind.map(str::to_owned),
            };
            observer.on_call(&event);
        }
    }

    /// Report the call outcome and hand the result back unchanged.
    pub(crate) fn finish<T>(
        self,
        result: Result<T, QueryFnError>,
        tuples: impl FnOnce(&T) -> u64,
    ) -> Result<T, QueryFnError> {
        match &result {
            Ok(value) => self.report(tuples(value), None),
            Err(err) => self.report(0, Some(err.kind())),
        }
        result
    }
}

// ABOUTME: Background task lifecycle management for periodic store sweeps
// ABOUTME: Provides an abort-on-drop guard so sweepers never outlive their store or block shutdown
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2025 Cadence Works

//! Periodic background tasks bound to an owner's lifetime.
//!
//! Expired authorization codes and pending upstream-auth entries are swept
//! on a fixed interval independent of request traffic. The sweep loop runs
//! as a spawned task owned by a [`PeriodicTask`] guard: dropping the guard
//! aborts the task, so a store going away (or the process shutting down)
//! cancels its sweeper instead of leaving it to keep the runtime busy.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a periodic background task; aborts the task on drop.
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn a task that invokes `tick` every `period`.
    ///
    /// The first tick fires after one full period, not immediately.
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let name = name.into();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The initial tick of tokio's interval completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                debug!(task = %task_name, "Running periodic task");
                tick().await;
            }
        });

        Self { name, handle }
    }

    /// Name the task was spawned with
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicitly cancel the task ahead of drop (graceful shutdown path)
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        debug!(task = %self.name, "Aborting periodic task");
        self.handle.abort();
    }
}

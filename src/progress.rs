//! Progress events emitted while the pipeline runs.

use std::time::Duration;
use tracing::info;

/// Events emitted during a build run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Configuration resolved; the run is about to start
    Started { environments: usize },

    /// One environment's build/merge sequence started
    EnvironmentStarted { environment: String },

    /// One environment finished end to end
    EnvironmentComplete {
        environment: String,
        duration: Duration,
    },

    /// Every environment finished and the index was written
    Completed {
        environments: usize,
        total_time: Duration,
    },
}

/// Receiver for [`ProgressEvent`]s.
pub trait ProgressHandler {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Handler that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {
        // Intentionally empty
    }
}

/// Handler that reports events as status text through tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { environments } => {
                info!(environments, "starting build run");
            }
            ProgressEvent::EnvironmentStarted { environment } => {
                info!(environment = environment.as_str(), "building environment");
            }
            ProgressEvent::EnvironmentComplete {
                environment,
                duration,
            } => {
                info!(
                    environment = environment.as_str(),
                    elapsed_secs = duration.as_secs_f64(),
                    "environment complete"
                );
            }
            ProgressEvent::Completed {
                environments,
                total_time,
            } => {
                info!(
                    environments,
                    elapsed_secs = total_time.as_secs_f64(),
                    "build run complete"
                );
            }
        }
    }
}

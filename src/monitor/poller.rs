use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use cycletrack_core::{
    Engine, RecordStore, ScalarStore, Snapshot, SystemClock, TelemetrySource,
};

use crate::config::Settings;

/// Message sent from poller to main loop
#[derive(Debug)]
pub enum PollMessage {
    /// Fresh snapshot from an accounting tick
    Updated(Box<Snapshot>),
    /// Error during polling
    Error(String),
}

/// Drives the accounting engine at a fixed cadence.
///
/// Single-writer by construction: the poller owns the engine and both stores,
/// so every tick runs to completion before the next is scheduled.
pub struct Poller<T> {
    engine: Engine,
    telemetry: T,
    records: Box<dyn RecordStore + Send>,
    scalars: Box<dyn ScalarStore + Send>,
    settings: Settings,
    /// Poll at the tighter detail cadence
    detail: bool,
}

impl<T: TelemetrySource + Send + 'static> Poller<T> {
    pub fn new(
        settings: Settings,
        engine: Engine,
        telemetry: T,
        records: Box<dyn RecordStore + Send>,
        scalars: Box<dyn ScalarStore + Send>,
        detail: bool,
    ) -> Self {
        Self {
            engine,
            telemetry,
            records,
            scalars,
            settings,
            detail,
        }
    }

    /// Start polling in a background task
    pub fn start(self) -> mpsc::Receiver<PollMessage> {
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            self.run(tx).await;
        });

        rx
    }

    /// Run the polling loop
    async fn run(mut self, tx: mpsc::Sender<PollMessage>) {
        let interval_secs = if self.detail {
            self.settings.detail_poll_interval_secs
        } else {
            self.settings.poll_interval_secs
        };
        let clock = SystemClock;
        let mut last_error: Option<String> = None;
        let mut last_error_at: Option<Instant> = None;

        loop {
            let snapshot = self.engine.tick(
                &clock,
                &self.telemetry,
                self.records.as_mut(),
                self.scalars.as_mut(),
            );

            if snapshot.has_telemetry() {
                last_error = None;
                last_error_at = None;
                if tx
                    .send(PollMessage::Updated(Box::new(snapshot)))
                    .await
                    .is_err()
                {
                    break; // Receiver dropped
                }
            } else {
                // Suppress repeats of the same error within a short window.
                let err_str = "battery telemetry unavailable".to_string();
                let should_send = match &last_error {
                    Some(prev) if prev == &err_str => last_error_at
                        .map(|t| t.elapsed() >= Duration::from_secs(2))
                        .unwrap_or(true),
                    _ => true,
                };
                if should_send {
                    if tx.send(PollMessage::Error(err_str.clone())).await.is_err() {
                        break;
                    }
                    last_error_at = Some(Instant::now());
                }
                last_error = Some(err_str);
            }

            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycletrack_core::{EngineConfig, MemoryRecordStore, MemoryScalarStore, ScalarState};

    #[derive(Debug, Default)]
    struct NoTelemetry;

    impl TelemetrySource for NoTelemetry {
        fn cycle_count(&self) -> Option<i64> {
            None
        }

        fn capacity(&self) -> Option<cycletrack_core::Capacity> {
            None
        }

        fn design_capacity(&self) -> Option<i64> {
            None
        }

        fn health_text(&self) -> Option<String> {
            None
        }

        fn official_health_percent(&self) -> Option<i64> {
            None
        }

        fn power_source(&self) -> cycletrack_core::PowerSource {
            cycletrack_core::PowerSource::Unknown
        }

        fn time_remaining(&self) -> Option<cycletrack_core::TimeRemaining> {
            None
        }
    }

    #[tokio::test]
    async fn test_poller_reports_missing_telemetry_once() {
        let mut settings = Settings::default();
        settings.poll_interval_secs = 1;
        let engine = Engine::new(EngineConfig::default(), ScalarState::default());
        let poller = Poller::new(
            settings,
            engine,
            NoTelemetry,
            Box::new(MemoryRecordStore::new()),
            Box::new(MemoryScalarStore::new()),
            false,
        );

        let mut rx = poller.start();
        match rx.recv().await {
            Some(PollMessage::Error(message)) => {
                assert!(message.contains("telemetry"));
            }
            other => panic!("expected an error message, got {other:?}"),
        }
    }
}

//! The sensor stream loop.
//!
//! One long-lived task: pull a sample, persist it, predict, update the
//! exceedance trackers, and raise alerts when a run-length threshold trips.
//! Every per-cycle failure is contained within that cycle; only startup-time
//! model loading may abort the process.

use crate::alert::AlertDispatcher;
use crate::config::Config;
use crate::features::normalize;
use crate::generator::SampleSource;
use crate::model::Predictor;
use crate::sensor_log::SensorLog;
use crate::tracker::{ExceedanceTracker, GasLimitBank};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Upper bound on one alert dispatch so a slow SMS provider cannot stall
/// sample ingestion.
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Owns the per-process alerting state and the act of appending to the log.
pub struct Monitor {
    source: Box<dyn SampleSource + Send + Sync>,
    predictor: Arc<dyn Predictor + Send + Sync>,
    dispatcher: Arc<AlertDispatcher>,
    log: SensorLog,
    alert_tracker: ExceedanceTracker,
    gas_bank: GasLimitBank,
    period: Duration,
}

impl Monitor {
    pub fn new(
        source: Box<dyn SampleSource + Send + Sync>,
        predictor: Arc<dyn Predictor + Send + Sync>,
        dispatcher: Arc<AlertDispatcher>,
        log: SensorLog,
        config: &Config,
    ) -> Self {
        Self {
            source,
            predictor,
            dispatcher,
            log,
            alert_tracker: ExceedanceTracker::new(config.alert_threshold, config.alert_run_length),
            gas_bank: GasLimitBank::new(config.gas_run_length),
            period: config.sample_period,
        }
    }

    /// Run until the shutdown flag flips. Cycles are strictly sequential; a
    /// slow cycle delays the next tick rather than overlapping it.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_secs = self.period.as_secs(), "sensor stream loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("sensor stream loop stopped");
    }

    /// One full cycle. Public so tests can drive the loop with synthetic
    /// ticks instead of real sleeps. Returns the prediction when one was
    /// made.
    pub async fn cycle(&mut self) -> Option<f64> {
        let sample = self.source.next_sample();

        // Persistence failures lose the row but not the cycle.
        if let Err(e) = self.log.append(&sample) {
            tracing::warn!("failed to append sample to sensor log: {e}");
        }

        let vector = normalize(&sample);
        let prediction = match self.predictor.predict(&vector) {
            Ok(value) => value,
            Err(e) => {
                // A failed cycle must not touch tracker state: no false
                // resets, no false trips.
                tracing::error!("prediction failed, skipping cycle: {e}");
                return None;
            }
        };
        tracing::info!(prediction, "predicted emission");

        if self.alert_tracker.observe(prediction) {
            self.send_alert(prediction).await;
        }

        for (gas, advice) in self.gas_bank.observe(|gas| sample.reading(gas)) {
            tracing::warn!(
                gas = gas.label(),
                limit = gas.regulatory_limit().unwrap_or_default(),
                "regulatory limit exceeded repeatedly; suggested mitigation: {advice}"
            );
        }

        Some(prediction)
    }

    async fn send_alert(&self, prediction: f64) {
        let message = format!(
            "SOS ALERT: Emissions exceeded {} ppm {} times in a row. Current emission: {prediction:.2} ppm.",
            self.alert_tracker.threshold(),
            self.alert_tracker.run_length(),
        );
        match tokio::time::timeout(DISPATCH_TIMEOUT, self.dispatcher.send_alert(&message)).await {
            Ok(Ok(sid)) => tracing::info!(%sid, "SOS alert sent"),
            Ok(Err(e)) => tracing::error!("SOS alert dispatch failed: {e}"),
            Err(_) => tracing::error!("SOS alert dispatch timed out"),
        }
    }

    /// Current consecutive-breach count of the primary tracker.
    pub fn alert_count(&self) -> u32 {
        self.alert_tracker.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MemoryDispatcher;
    use crate::features::FeatureVector;
    use crate::model::ModelError;
    use crate::schema::{Channel, Sample};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Source that repeats a fixed reading set every cycle.
    struct FixedSource(HashMap<Channel, f64>);

    impl SampleSource for FixedSource {
        fn next_sample(&mut self) -> Sample {
            Sample::new(self.0.clone())
        }
    }

    /// Predictor that replays a scripted sequence of outcomes, repeating the
    /// last one once the script runs out.
    struct ScriptedPredictor {
        script: Mutex<Vec<Result<f64, ()>>>,
    }

    impl ScriptedPredictor {
        fn new(script: Vec<Result<f64, ()>>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }

        fn constant(value: f64) -> Self {
            Self::new(vec![Ok(value)])
        }
    }

    impl Predictor for ScriptedPredictor {
        fn predict(&self, _vector: &FeatureVector) -> Result<f64, ModelError> {
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0]
            };
            next.map_err(|_| ModelError::Predict("scripted failure".to_string()))
        }
    }

    fn test_monitor(
        readings: HashMap<Channel, f64>,
        predictor: ScriptedPredictor,
        dir: &std::path::Path,
    ) -> Monitor {
        let config = Config {
            log_path: dir.join("sensor_data.csv"),
            ..Config::default()
        };
        Monitor::new(
            Box::new(FixedSource(readings)),
            Arc::new(predictor),
            Arc::new(AlertDispatcher::Memory(MemoryDispatcher::new())),
            SensorLog::new(config.log_path.clone()),
            &config,
        )
    }

    #[tokio::test]
    async fn test_alert_fires_once_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = test_monitor(
            HashMap::new(),
            ScriptedPredictor::constant(50.0),
            dir.path(),
        );

        for _ in 0..5 {
            monitor.cycle().await;
        }
        assert_eq!(monitor.dispatcher.memory().unwrap().sent().len(), 1);
        assert_eq!(monitor.alert_count(), 0);

        // A sixth breach starts a new run, it does not re-fire.
        monitor.cycle().await;
        assert_eq!(monitor.dispatcher.memory().unwrap().sent().len(), 1);
        assert_eq!(monitor.alert_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_prediction_leaves_tracker_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = test_monitor(
            HashMap::new(),
            ScriptedPredictor::new(vec![Ok(50.0), Ok(50.0), Err(()), Ok(50.0)]),
            dir.path(),
        );

        monitor.cycle().await;
        monitor.cycle().await;
        assert_eq!(monitor.alert_count(), 2);

        // Failing cycle: count unchanged from its pre-cycle value.
        assert_eq!(monitor.cycle().await, None);
        assert_eq!(monitor.alert_count(), 2);

        // Next cycle proceeds normally.
        assert_eq!(monitor.cycle().await, Some(50.0));
        assert_eq!(monitor.alert_count(), 3);
    }

    #[tokio::test]
    async fn test_cycle_appends_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = test_monitor(
            HashMap::from([(Channel::Pm25, 12.5)]),
            ScriptedPredictor::constant(10.0),
            dir.path(),
        );

        monitor.cycle().await;
        monitor.cycle().await;

        let rows = monitor.log.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].reading(Channel::Pm25), Some(12.5));
    }

    #[tokio::test]
    async fn test_log_failure_does_not_stop_alerting() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            // A directory is not a writable log file; every append fails.
            log_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        let mut monitor = Monitor::new(
            Box::new(FixedSource(HashMap::new())),
            Arc::new(ScriptedPredictor::constant(50.0)),
            Arc::new(AlertDispatcher::Memory(MemoryDispatcher::new())),
            SensorLog::new(config.log_path.clone()),
            &config,
        );

        for _ in 0..5 {
            assert_eq!(monitor.cycle().await, Some(50.0));
        }
        assert_eq!(monitor.dispatcher.memory().unwrap().sent().len(), 1);
    }

    #[tokio::test]
    async fn test_gas_bank_advice_after_sustained_breach() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = test_monitor(
            HashMap::from([(Channel::Nox, 90.0)]),
            ScriptedPredictor::constant(10.0),
            dir.path(),
        );

        for _ in 0..5 {
            monitor.cycle().await;
        }
        // The fire resets the gas counter; no SMS is involved.
        assert_eq!(monitor.gas_bank.count(Channel::Nox), Some(0));
        assert!(monitor.dispatcher.memory().unwrap().sent().is_empty());
    }
}

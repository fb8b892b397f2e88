//! Consecutive-exceedance tracking.
//!
//! Counters live in memory only and reset on restart. The stream loop is the
//! sole writer; a cycle whose prediction fails must not touch them.

use crate::schema::Channel;

/// Counts consecutive threshold breaches for one signal.
///
/// Edge-triggered: the tracker fires once when the run length is reached,
/// resets to zero, and will not fire again until it has re-accumulated a
/// full run.
#[derive(Debug, Clone)]
pub struct ExceedanceTracker {
    threshold: f64,
    run_length: u32,
    count: u32,
}

impl ExceedanceTracker {
    pub fn new(threshold: f64, run_length: u32) -> Self {
        Self {
            threshold,
            run_length: run_length.max(1),
            count: 0,
        }
    }

    /// Evaluate one value. Returns `true` exactly when the tracker fires.
    pub fn observe(&mut self, value: f64) -> bool {
        if value >= self.threshold {
            self.count += 1;
            if self.count >= self.run_length {
                self.count = 0;
                return true;
            }
        } else {
            self.count = 0;
        }
        false
    }

    /// Current consecutive-breach count.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn run_length(&self) -> u32 {
        self.run_length
    }
}

/// An independent tracker per regulatory-limited gas.
///
/// Each gas is evaluated against its own government limit every cycle; a fire
/// surfaces that gas's mitigation advice. Gases absent from a sample are
/// skipped for that cycle, leaving their counters untouched.
#[derive(Debug)]
pub struct GasLimitBank {
    trackers: Vec<(Channel, ExceedanceTracker)>,
}

impl GasLimitBank {
    pub fn new(run_length: u32) -> Self {
        let trackers = Channel::limited()
            .map(|gas| {
                let limit = gas.regulatory_limit().unwrap_or(f64::INFINITY);
                (gas, ExceedanceTracker::new(limit, run_length))
            })
            .collect();
        Self { trackers }
    }

    /// Evaluate the gases present in a reading set. Returns the gases that
    /// fired this cycle, paired with their mitigation advice.
    pub fn observe<F>(&mut self, reading: F) -> Vec<(Channel, &'static str)>
    where
        F: Fn(Channel) -> Option<f64>,
    {
        let mut fired = Vec::new();
        for (gas, tracker) in &mut self.trackers {
            if let Some(value) = reading(*gas) {
                if tracker.observe(value) {
                    if let Some(advice) = gas.mitigation_advice() {
                        fired.push((*gas, advice));
                    }
                }
            }
        }
        fired
    }

    /// Current count for one gas, if it is tracked.
    pub fn count(&self, gas: Channel) -> Option<u32> {
        self.trackers
            .iter()
            .find(|(c, _)| *c == gas)
            .map(|(_, t)| t.count())
    }
}

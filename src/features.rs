//! Feature normalization for model input.
//!
//! The regression model was trained on 22 columns: a date column it does not
//! meaningfully use, followed by the 21 sensor channels in [`Channel::ALL`]
//! order. The model cannot detect a reordered vector, so the ordering lives
//! here and nowhere else.

use crate::schema::{Channel, Sample};

/// Number of model input columns: the date placeholder plus 21 channels.
pub const FEATURE_COUNT: usize = Channel::ALL.len() + 1;

/// Constant standing in for the training-time "From Date" column.
pub const DATE_PLACEHOLDER: f64 = 0.0;

/// A complete, ordered numeric vector ready for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build a vector from raw values. Callers are expected to go through
    /// [`normalize`]; this exists for model-side tests.
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// The values in model order.
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }
}

/// Map a raw, possibly-incomplete sample into a complete feature vector.
///
/// Missing or non-finite channels are replaced by the per-channel default.
/// Missing channels are expected and never an error.
pub fn normalize(sample: &Sample) -> FeatureVector {
    let mut values = [0.0; FEATURE_COUNT];
    values[0] = DATE_PLACEHOLDER;
    for (i, channel) in Channel::ALL.iter().enumerate() {
        values[i + 1] = sample
            .reading(*channel)
            .unwrap_or_else(|| channel.default_value());
    }
    FeatureVector { values }
}

/// Normalize a buffered historical sequence.
///
/// Gaps are forward-filled from the previous row, then backward-filled from
/// the next, and fall back to zero for channels absent from every row. Used
/// when re-predicting over log history, where neighboring rows are a better
/// estimate than the static defaults.
pub fn normalize_series(samples: &[Sample]) -> Vec<FeatureVector> {
    let mut columns: Vec<Vec<Option<f64>>> = Channel::ALL
        .iter()
        .map(|channel| samples.iter().map(|s| s.reading(*channel)).collect())
        .collect();

    for column in &mut columns {
        let mut last = None;
        for cell in column.iter_mut() {
            match cell {
                Some(v) => last = Some(*v),
                None => *cell = last,
            }
        }
        let mut next = None;
        for cell in column.iter_mut().rev() {
            match cell {
                Some(v) => next = Some(*v),
                None => *cell = next,
            }
        }
    }

    (0..samples.len())
        .map(|row| {
            let mut values = [0.0; FEATURE_COUNT];
            values[0] = DATE_PLACEHOLDER;
            for (col, column) in columns.iter().enumerate() {
                values[col + 1] = column[row].unwrap_or(0.0);
            }
            FeatureVector { values }
        })
        .collect()
}

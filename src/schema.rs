//! Sensor channel schema.
//!
//! The monitored site reports a fixed set of 21 pollutant and meteorological
//! channels. The ordering of [`Channel::ALL`] is the ordering the regression
//! model was trained with and must not change between releases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One named numeric measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Pm25,
    Pm10,
    No,
    No2,
    Nox,
    Nh3,
    So2,
    Co,
    Ozone,
    Benzene,
    Toluene,
    Temp,
    Rh,
    Ws,
    Wd,
    Sr,
    Bp,
    Vws,
    Xylene,
    Rf,
    At,
}

impl Channel {
    /// All channels, in model training order.
    pub const ALL: [Channel; 21] = [
        Channel::Pm25,
        Channel::Pm10,
        Channel::No,
        Channel::No2,
        Channel::Nox,
        Channel::Nh3,
        Channel::So2,
        Channel::Co,
        Channel::Ozone,
        Channel::Benzene,
        Channel::Toluene,
        Channel::Temp,
        Channel::Rh,
        Channel::Ws,
        Channel::Wd,
        Channel::Sr,
        Channel::Bp,
        Channel::Vws,
        Channel::Xylene,
        Channel::Rf,
        Channel::At,
    ];

    /// Display / CSV header label, matching the station's export format.
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Pm25 => "PM2.5 (ug/m3)",
            Channel::Pm10 => "PM10 (ug/m3)",
            Channel::No => "NO (ug/m3)",
            Channel::No2 => "NO2 (ug/m3)",
            Channel::Nox => "NOx (ppb)",
            Channel::Nh3 => "NH3 (ug/m3)",
            Channel::So2 => "SO2 (ug/m3)",
            Channel::Co => "CO (mg/m3)",
            Channel::Ozone => "Ozone (ug/m3)",
            Channel::Benzene => "Benzene (ug/m3)",
            Channel::Toluene => "Toluene (ug/m3)",
            Channel::Temp => "Temp (degree C)",
            Channel::Rh => "RH (%)",
            Channel::Ws => "WS (m/s)",
            Channel::Wd => "WD (deg)",
            Channel::Sr => "SR (W/mt2)",
            Channel::Bp => "BP (mmHg)",
            Channel::Vws => "VWS (m/s)",
            Channel::Xylene => "Xylene (ug/m3)",
            Channel::Rf => "RF (mm)",
            Channel::At => "AT (degree C)",
        }
    }

    /// Fill value used when a channel is absent from a sample: a plausible
    /// midpoint for that pollutant or weather metric.
    pub fn default_value(&self) -> f64 {
        match self {
            Channel::Pm25 => 30.0,
            Channel::Pm10 => 70.0,
            Channel::No => 20.0,
            Channel::No2 => 15.0,
            Channel::Nox => 25.0,
            Channel::Nh3 => 5.0,
            Channel::So2 => 30.0,
            Channel::Co => 2.5,
            Channel::Ozone => 25.0,
            Channel::Benzene => 0.2,
            Channel::Toluene => 0.3,
            Channel::Temp => 32.0,
            Channel::Rh => 60.0,
            Channel::Ws => 3.0,
            Channel::Wd => 270.0,
            Channel::Sr => 150.0,
            Channel::Bp => 1015.0,
            Channel::Vws => 2.0,
            Channel::Xylene => 0.4,
            Channel::Rf => 1.0,
            Channel::At => 33.0,
        }
    }

    /// Government limit for the gases that have one.
    pub fn regulatory_limit(&self) -> Option<f64> {
        match self {
            Channel::Pm25 => Some(60.0),
            Channel::Pm10 => Some(100.0),
            Channel::Nox => Some(40.0),
            Channel::So2 => Some(50.0),
            Channel::Co => Some(4.0),
            _ => None,
        }
    }

    /// Mitigation advice for the regulatory-limited gases.
    pub fn mitigation_advice(&self) -> Option<&'static str> {
        match self {
            Channel::Pm25 => Some("Improve dust collection filters"),
            Channel::Pm10 => Some("Use water sprays to reduce airborne particles"),
            Channel::Nox => Some("Optimize combustion temperatures"),
            Channel::So2 => Some("Switch to low-sulfur fuels"),
            Channel::Co => Some("Improve ventilation and fuel efficiency"),
            _ => None,
        }
    }

    /// Channels that carry a regulatory limit.
    pub fn limited() -> impl Iterator<Item = Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| c.regulatory_limit().is_some())
    }

    /// Resolve a channel from its display label.
    pub fn from_label(label: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// One timestamped set of channel readings.
///
/// Raw samples may omit any subset of channels; the feature normalizer fills
/// the gaps before the model sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Training-era date column, kept for schema compatibility.
    pub from_date: String,
    /// Channel readings present in this sample.
    pub readings: HashMap<Channel, f64>,
}

impl Sample {
    /// Create a sample taken now with the given readings.
    pub fn new(readings: HashMap<Channel, f64>) -> Self {
        let now = Utc::now();
        Self {
            timestamp: now,
            from_date: now.format("%Y-%m-%d").to_string(),
            readings,
        }
    }

    /// Reading for a channel, if present and finite.
    pub fn reading(&self, channel: Channel) -> Option<f64> {
        self.readings
            .get(&channel)
            .copied()
            .filter(|v| v.is_finite())
    }

    /// Whether every channel in the schema is present.
    pub fn is_complete(&self) -> bool {
        Channel::ALL.iter().all(|c| self.reading(*c).is_some())
    }
}

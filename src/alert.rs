//! Alert dispatch over SMS.
//!
//! At most one send is attempted per trip event; failures are logged by the
//! caller and dropped. No retry, and no delivery guarantee beyond the
//! provider's accepted-message id.

use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;

/// Dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("alert dispatcher is not configured")]
    NotConfigured,
    #[error("SMS provider config error: {0}")]
    Config(String),
    #[error("SMS provider network error: {0}")]
    Network(String),
    #[error("SMS provider rejected the message ({status}): {message}")]
    Provider { status: u16, message: String },
}

/// Twilio credentials and routing, read from the environment.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sending number.
    pub from_number: String,
    /// On-call number that receives alerts.
    pub to_number: String,
}

impl TwilioConfig {
    /// Load credentials from `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`,
    /// `TWILIO_PHONE_NUMBER` and `ALERT_PHONE_NUMBER`.
    pub fn from_env() -> Result<Self, DispatchError> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| DispatchError::Config(format!("{name} is not set")))
        };
        Ok(Self {
            account_sid: var("TWILIO_ACCOUNT_SID")?,
            auth_token: var("TWILIO_AUTH_TOKEN")?,
            from_number: var("TWILIO_PHONE_NUMBER")?,
            to_number: var("ALERT_PHONE_NUMBER")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TwilioResponse {
    sid: String,
}

/// SMS client against the Twilio Messages API.
#[derive(Debug)]
pub struct TwilioClient {
    config: TwilioConfig,
    http: reqwest::Client,
}

impl TwilioClient {
    pub fn new(config: TwilioConfig) -> Result<Self, DispatchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DispatchError::Config(e.to_string()))?;
        Ok(Self { config, http })
    }

    async fn send(&self, message: &str) -> Result<String, DispatchError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        );
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", self.config.to_number.as_str()),
                ("From", self.config.from_number.as_str()),
                ("Body", message),
            ])
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(DispatchError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: TwilioResponse = response
            .json()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;
        Ok(body.sid)
    }
}

/// In-memory dispatcher for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryDispatcher {
    sent: Mutex<Vec<String>>,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("dispatcher lock poisoned").clone()
    }

    fn record(&self, message: &str) -> String {
        let mut sent = self.sent.lock().expect("dispatcher lock poisoned");
        sent.push(message.to_string());
        format!("mem-{}", sent.len())
    }
}

/// The dispatcher the stream loop and server hold.
#[derive(Debug)]
pub enum AlertDispatcher {
    /// Real SMS delivery.
    Twilio(TwilioClient),
    /// Record messages without sending (dry runs, tests).
    Memory(MemoryDispatcher),
    /// No credentials configured; every send fails softly.
    Disabled,
}

impl AlertDispatcher {
    /// Build from the environment, falling back to `Disabled` when the
    /// credentials are absent.
    pub fn from_env() -> Self {
        match TwilioConfig::from_env().and_then(TwilioClient::new) {
            Ok(client) => AlertDispatcher::Twilio(client),
            Err(e) => {
                tracing::warn!("SMS alerting disabled: {e}");
                AlertDispatcher::Disabled
            }
        }
    }

    /// Send one alert message, returning the provider message id.
    pub async fn send_alert(&self, message: &str) -> Result<String, DispatchError> {
        match self {
            AlertDispatcher::Twilio(client) => client.send(message).await,
            AlertDispatcher::Memory(memory) => Ok(memory.record(message)),
            AlertDispatcher::Disabled => Err(DispatchError::NotConfigured),
        }
    }

    /// The recording half of a memory dispatcher, if that is what this is.
    pub fn memory(&self) -> Option<&MemoryDispatcher> {
        match self {
            AlertDispatcher::Memory(memory) => Some(memory),
            _ => None,
        }
    }
}

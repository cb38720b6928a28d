//! Mail transport contract and two in-process transports.
//!
//! The engine only hands fully-formed messages to a transport. Retries,
//! queuing and the wire protocol (SMTP, push) belong to the transport.

use crate::error::{NotifyError, NotifyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub message_id: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one message. Any error is treated as a failure for this
    /// recipient only.
    async fn send(&self, mail: OutgoingMail) -> NotifyResult<Delivery>;
}

/// Logs each message instead of sending it.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, mail: OutgoingMail) -> NotifyResult<Delivery> {
        let message_id = format!("<{}@civicdesk.local>", uuid::Uuid::new_v4());
        log::info!("mail {message_id} to={} subject={:?}", mail.to, mail.subject);
        log::debug!("mail {message_id} body:\n{}", mail.text);
        Ok(Delivery { message_id })
    }
}

/// Keeps every message in memory. Addresses registered with `fail_for`
/// get a transport error; `delay` holds every send for a fixed time.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_for(&self, email: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(email.to_lowercase());
        }
    }

    /// Messages accepted so far, in the order sends completed.
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, email: &str) -> Vec<OutgoingMail> {
        self.sent()
            .into_iter()
            .filter(|m| m.to.eq_ignore_ascii_case(email))
            .collect()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: OutgoingMail) -> NotifyResult<Delivery> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let refused = self
            .failing
            .lock()
            .map(|f| f.contains(&mail.to.to_lowercase()))
            .unwrap_or(false);
        if refused {
            return Err(NotifyError::Transport {
                email: mail.to,
                reason: "mailbox refused message".into(),
            });
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("recording transport lock poisoned"))?;
        sent.push(mail);
        Ok(Delivery {
            message_id: format!("recorded-{}", sent.len()),
        })
    }
}

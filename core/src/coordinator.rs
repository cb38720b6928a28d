//! The broadcast coordinator — one status change in, one summary out.
//!
//! EXECUTION ORDER (fixed):
//!   1. Fetch the complaint snapshot with relations.
//!   2. Fetch active administrators (failure here only drops step 6 of
//!      resolution, it never aborts the broadcast).
//!   3. Resolve recipients for the new status.
//!   4. Render and send to every recipient concurrently.
//!   5. Wait for every send to settle, then aggregate.
//!
//! RULES:
//!   - One recipient's failure never stops another recipient's send.
//!   - Every send is bounded by the configured timeout.
//!   - No retries here; retry policy belongs to the transport.
//!   - No database writes.

use crate::{
    branding::BrandingSource,
    complaint::{ComplaintSnapshot, Person},
    config::NotifyConfig,
    error::{NotifyError, NotifyResult},
    event::{AttemptedRecipient, BroadcastEvent, BroadcastResult},
    render::TemplateRenderer,
    resolver::{Recipient, RecipientResolver},
    store::ComplaintStore,
    transport::{Delivery, MailTransport, OutgoingMail},
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

pub struct BroadcastCoordinator {
    store: Arc<dyn ComplaintStore>,
    transport: Arc<dyn MailTransport>,
    resolver: RecipientResolver,
    renderer: TemplateRenderer,
    send_timeout: Duration,
}

impl BroadcastCoordinator {
    pub fn new(
        config: Arc<NotifyConfig>,
        store: Arc<dyn ComplaintStore>,
        transport: Arc<dyn MailTransport>,
    ) -> NotifyResult<Self> {
        let branding: Arc<dyn BrandingSource> = Arc::new(config.branding.clone());
        Self::with_branding(config, store, transport, branding)
    }

    /// Use a branding source other than the one in the config file.
    pub fn with_branding(
        config: Arc<NotifyConfig>,
        store: Arc<dyn ComplaintStore>,
        transport: Arc<dyn MailTransport>,
        branding: Arc<dyn BrandingSource>,
    ) -> NotifyResult<Self> {
        let templates = Arc::new(config.templates.clone());
        Ok(Self {
            store,
            transport,
            resolver: RecipientResolver::new(templates),
            send_timeout: config.send_timeout(),
            renderer: TemplateRenderer::new(config, branding)?,
        })
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub fn resolver(&self) -> &RecipientResolver {
        &self.resolver
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Notify everyone entitled to hear about `event`.
    ///
    /// Fails only if the complaint cannot be loaded. Per-recipient render
    /// and transport failures are counted in the result, never returned.
    pub async fn broadcast(&self, event: &BroadcastEvent) -> NotifyResult<BroadcastResult> {
        let complaint = self
            .store
            .fetch_complaint_with_relations(event.complaint_id)
            .await?
            .ok_or(NotifyError::ComplaintNotFound {
                complaint_id: event.complaint_id,
            })?;

        let administrators = self.administrators(&complaint).await;
        let recipients = self
            .resolver
            .resolve(&complaint, &administrators, event.new_status);

        if recipients.is_empty() {
            log::info!(
                "broadcast {} -> {}: no recipients",
                complaint.code,
                event.new_status
            );
            return Ok(BroadcastResult::empty());
        }

        let sends = recipients
            .iter()
            .map(|recipient| self.deliver(recipient, &complaint, event));
        let outcomes = join_all(sends).await;

        let mut attempts = Vec::with_capacity(recipients.len());
        for (recipient, outcome) in recipients.iter().zip(outcomes) {
            let delivered = match outcome {
                Ok(delivery) => {
                    log::debug!(
                        "sent {} to {} as {} ({})",
                        complaint.code,
                        recipient.email,
                        recipient.role,
                        delivery.message_id
                    );
                    true
                }
                Err(e) => {
                    log::warn!(
                        "notification for {} to {} as {} failed: {e}",
                        complaint.code,
                        recipient.email,
                        recipient.role
                    );
                    false
                }
            };
            attempts.push(AttemptedRecipient {
                email: recipient.email.clone(),
                role: recipient.role,
                delivered,
            });
        }

        let result = BroadcastResult::from_attempts(attempts);
        log::info!(
            "broadcast {} {} -> {} ({}): sent={} failed={} total={}",
            complaint.code,
            event
                .previous_status
                .map(|s| s.as_str())
                .unwrap_or("-"),
            event.new_status,
            event.trigger.as_str(),
            result.emails_sent,
            result.failed_count,
            result.total_recipients,
        );
        Ok(result)
    }

    async fn administrators(&self, complaint: &ComplaintSnapshot) -> Vec<Person> {
        match self.store.list_active_administrators().await {
            Ok(admins) => admins,
            Err(e) => {
                log::warn!(
                    "cannot list administrators for {}: {e}; continuing without them",
                    complaint.code
                );
                Vec::new()
            }
        }
    }

    /// Render and send to one recipient. Every failure mode ends up as Err.
    async fn deliver(
        &self,
        recipient: &Recipient,
        complaint: &ComplaintSnapshot,
        event: &BroadcastEvent,
    ) -> NotifyResult<Delivery> {
        let message = self.renderer.render(recipient, complaint, event)?;
        let mail = OutgoingMail {
            to: recipient.email.clone(),
            subject: message.subject,
            text: message.text,
            html: message.html,
        };
        match tokio::time::timeout(self.send_timeout, self.transport.send(mail)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout {
                email: recipient.email.clone(),
                timeout_ms: u64::try_from(self.send_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

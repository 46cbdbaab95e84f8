//! # Event Dispatcher
//!
//! Consumes the inbound subject as a member of a queue group and fans each
//! event out to persistence, realtime re-publish and bot delivery. Branch
//! failures are isolated from each other and never retried; a decoded
//! message counts as handled whatever its side effects did.
//!
//! Concurrency is bounded by a semaphore. When every permit is taken the
//! dispatcher stops pulling from the subscription, which leaves buffering to
//! the bus client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, instrument, warn};

use crate::bot::BotChannel;
use crate::bus::{BusError, MessageBus};
use crate::config::AppConfig;
use crate::events::{AlertEvent, EVENT_NOTIFICATION, EventEnvelope, InboundEvent};
use crate::models::notification::{self, NewNotification, RealtimeNotification};
use crate::notifications::NotificationUseCase;

/// Subjects and limits the dispatcher runs with.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub subject: String,
    pub queue_group: String,
    pub realtime_subject: String,
    pub max_in_flight: usize,
    pub persist_timeout: Duration,
}

impl DispatcherSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            subject: config.bus.subject.clone(),
            queue_group: config.bus.queue_group.clone(),
            realtime_subject: config.bus.realtime_subject.clone(),
            max_in_flight: config.dispatcher.max_in_flight.max(1),
            persist_timeout: config.dispatcher.persist_timeout(),
        }
    }
}

/// Result of one side-effect branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    Succeeded,
    /// The event did not ask for this branch, or an earlier branch made it moot.
    Skipped,
    Failed(String),
}

impl BranchOutcome {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => BranchOutcome::Succeeded,
            Err(err) => BranchOutcome::Failed(err.to_string()),
        }
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Empty or undecodable body; dropped.
    Rejected(String),
    Ignored {
        event_name: String,
    },
    Notification {
        event_name: String,
        persisted: BranchOutcome,
        realtime: BranchOutcome,
    },
    Alert {
        realtime: BranchOutcome,
        bot: BranchOutcome,
    },
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Rejected(_) => "rejected",
            DispatchOutcome::Ignored { .. } => "ignored",
            DispatchOutcome::Notification {
                persisted: BranchOutcome::Failed(_),
                ..
            } => "persist_failed",
            DispatchOutcome::Notification { .. } => "notification",
            DispatchOutcome::Alert { .. } => "alert",
        }
    }
}

/// Bus worker routing events to the use case, the realtime subject and the bot.
#[derive(Clone)]
pub struct EventDispatcher {
    notifications: Arc<NotificationUseCase>,
    bus: Arc<dyn MessageBus>,
    bot: Arc<dyn BotChannel>,
    settings: Arc<DispatcherSettings>,
    span: Span,
}

impl EventDispatcher {
    pub fn new(
        notifications: Arc<NotificationUseCase>,
        bus: Arc<dyn MessageBus>,
        bot: Arc<dyn BotChannel>,
        settings: DispatcherSettings,
        span: Span,
    ) -> Self {
        Self {
            notifications,
            bus,
            bot,
            settings: Arc::new(settings),
            span,
        }
    }

    /// Consumes until `shutdown` fires or the subscription ends, then waits
    /// for in-flight messages to finish.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BusError> {
        let mut messages = self
            .bus
            .queue_subscribe(&self.settings.subject, &self.settings.queue_group)
            .await?;

        let max_in_flight = self.settings.max_in_flight;
        let permits = Arc::new(Semaphore::new(max_in_flight));
        info!(
            parent: &self.span,
            subject = %self.settings.subject,
            queue_group = %self.settings.queue_group,
            max_in_flight,
            "dispatcher started"
        );

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                message = messages.next() => match message {
                    Some(message) => message,
                    None => {
                        warn!(parent: &self.span, "subscription closed by the bus");
                        break;
                    }
                },
            };

            let dispatcher = self.clone();
            tokio::spawn(
                async move {
                    let _permit = permit;
                    dispatcher.handle_message(&message.payload).await;
                }
                .instrument(self.span.clone()),
            );
        }

        // Every permit back means every spawned handler has finished.
        let _drained = permits.acquire_many(max_in_flight as u32).await;
        info!(parent: &self.span, "dispatcher stopped");
        Ok(())
    }

    /// Decodes and routes a single message body.
    #[instrument(parent = &self.span, skip_all, fields(bytes = payload.len()))]
    pub async fn handle_message(&self, payload: &[u8]) -> DispatchOutcome {
        let started = Instant::now();

        let outcome = match InboundEvent::decode(payload) {
            Err(err) => {
                warn!(error = %err, "dropping undecodable message");
                DispatchOutcome::Rejected(err.to_string())
            }
            Ok(InboundEvent::Ignored { event_name }) => {
                debug!(event_name, "ignoring unhandled event");
                DispatchOutcome::Ignored { event_name }
            }
            Ok(InboundEvent::Notification {
                event_name,
                notification,
            }) => self.persist_and_publish(event_name, notification).await,
            Ok(InboundEvent::IndicatorAlert(alert)) => self.deliver_alert(alert).await,
        };

        counter!("notifier_dispatch_messages_total", "outcome" => outcome.label()).increment(1);
        histogram!("notifier_dispatch_duration_seconds").record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn persist_and_publish(
        &self,
        event_name: String,
        notification: NewNotification,
    ) -> DispatchOutcome {
        let work = async {
            match self.notifications.save_notification(&notification).await {
                Ok(saved) => (BranchOutcome::Succeeded, self.publish_notification(saved).await),
                Err(err) => {
                    warn!(event_name, error = %err, "failed to persist notification");
                    (BranchOutcome::Failed(err.to_string()), BranchOutcome::Skipped)
                }
            }
        };

        let (persisted, realtime) = match timeout(self.settings.persist_timeout, work).await {
            Ok(branches) => branches,
            Err(_) => {
                warn!(
                    event_name,
                    timeout_ms = self.settings.persist_timeout.as_millis() as u64,
                    "persist and republish timed out"
                );
                (
                    BranchOutcome::Failed("timed out".to_string()),
                    BranchOutcome::Skipped,
                )
            }
        };

        DispatchOutcome::Notification {
            event_name,
            persisted,
            realtime,
        }
    }

    async fn publish_notification(&self, saved: notification::Model) -> BranchOutcome {
        let envelope = EventEnvelope {
            event_name: EVENT_NOTIFICATION.to_string(),
            event_type: Vec::new(),
            user_id: saved.user_id.to_string(),
            data: RealtimeNotification::from(saved),
        };

        let result = match serde_json::to_vec(&envelope) {
            Ok(body) => self.publish_realtime(body).await,
            Err(err) => BranchOutcome::Failed(err.to_string()),
        };
        if let BranchOutcome::Failed(reason) = &result {
            warn!(reason, "failed to publish realtime notification");
        }
        result
    }

    async fn publish_realtime(&self, body: Vec<u8>) -> BranchOutcome {
        let outcome = BranchOutcome::from_result(
            self.bus
                .publish(&self.settings.realtime_subject, body)
                .await,
        );
        let label = if outcome == BranchOutcome::Succeeded {
            "sent"
        } else {
            "failed"
        };
        counter!("notifier_realtime_publish_total", "outcome" => label).increment(1);
        outcome
    }

    async fn deliver_alert(&self, alert: AlertEvent) -> DispatchOutcome {
        // Realtime goes first so a bot failure can never hold it back.
        let realtime = if alert.realtime {
            let outcome = self.publish_realtime(alert.raw.clone()).await;
            if let BranchOutcome::Failed(reason) = &outcome {
                warn!(user_id = %alert.user_id, reason, "failed to republish alert");
            }
            outcome
        } else {
            BranchOutcome::Skipped
        };

        let bot = match &alert.bot {
            None => BranchOutcome::Skipped,
            Some(Err(reason)) => {
                warn!(user_id = %alert.user_id, reason, "alert payload could not be decoded");
                BranchOutcome::Failed(format!("undecodable alert: {reason}"))
            }
            Some(Ok(indicator)) => {
                let result = self
                    .bot
                    .send_indicator_alert_message(&alert.user_id, indicator)
                    .await;
                if let Err(err) = &result {
                    warn!(user_id = %alert.user_id, error = %err, "bot alert delivery failed");
                }
                BranchOutcome::from_result(result)
            }
        };

        DispatchOutcome::Alert { realtime, bot }
    }
}

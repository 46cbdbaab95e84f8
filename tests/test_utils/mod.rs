//! Test utilities shared by the integration tests.
//!
//! In-memory SQLite with migrations, plus in-memory stand-ins for the message
//! bus, the bot channel and the two upstream services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use migration::{Migrator, MigratorTrait};
use notifier::bot::{BotChannel, BotError};
use notifier::bus::{BusError, BusMessage, MessageBus};
use notifier::clients::{ClientError, EmailSender, ProfileLookup, UserProfile, ValidationEmail};
use notifier::events::IndicatorAlert;
use reqwest::StatusCode;
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Same as [`setup_test_db`], shared the way repositories take it.
#[allow(dead_code)]
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

/// In-memory bus: inbound messages are pushed by the test, publishes are recorded.
#[allow(dead_code)]
pub struct FakeBus {
    sender: mpsc::UnboundedSender<BusMessage>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<BusMessage>>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail_publish: AtomicBool,
}

#[allow(dead_code)]
impl FakeBus {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            published: Mutex::new(Vec::new()),
            fail_publish: AtomicBool::new(false),
        })
    }

    pub fn push(&self, subject: &str, payload: Vec<u8>) {
        let _ = self.sender.send(BusMessage {
            subject: subject.to_string(),
            payload,
        });
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }

    pub fn fail_publishes(&self) {
        self.fail_publish.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageBus for FakeBus {
    async fn queue_subscribe(
        &self,
        subject: &str,
        _queue_group: &str,
    ) -> Result<BoxStream<'static, BusMessage>, BusError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BusError::Subscribe {
                subject: subject.to_string(),
                reason: "already subscribed".to_string(),
            })?;

        Ok(stream::unfold(receiver, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        })
        .boxed())
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BusError::Publish {
                subject: subject.to_string(),
                reason: "bus unavailable".to_string(),
            });
        }
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), payload));
        Ok(())
    }
}

/// Bot channel that records alerts instead of calling a chat platform.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeBot {
    sent: Mutex<Vec<(String, IndicatorAlert)>>,
    fail: AtomicBool,
}

#[allow(dead_code)]
impl FakeBot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let bot = Self::default();
        bot.fail.store(true, Ordering::SeqCst);
        Arc::new(bot)
    }

    pub fn sent(&self) -> Vec<(String, IndicatorAlert)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl BotChannel for FakeBot {
    async fn start(&self, _shutdown: CancellationToken) -> Result<(), BotError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), BotError> {
        Ok(())
    }

    async fn send_indicator_alert_message(
        &self,
        user_id: &str,
        alert: &IndicatorAlert,
    ) -> Result<(), BotError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BotError::ChannelDisabled {
                user_id: user_id.to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id.to_string(), alert.clone()));
        Ok(())
    }
}

/// Profile lookup backed by a fixed email to profile map.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeProfiles {
    profiles: HashMap<String, UserProfile>,
}

#[allow(dead_code)]
impl FakeProfiles {
    pub fn with(email: &str, id: &str, full_name: &str, language: &str) -> Arc<Self> {
        let mut profiles = HashMap::new();
        profiles.insert(
            email.to_string(),
            UserProfile {
                id: id.to_string(),
                full_name: full_name.to_string(),
                language: language.to_string(),
            },
        );
        Arc::new(Self { profiles })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ProfileLookup for FakeProfiles {
    async fn get_profile_by_email(&self, email: &str) -> Result<UserProfile, ClientError> {
        self.profiles
            .get(email)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                service: "profile service",
                what: email.to_string(),
            })
    }
}

/// Email sender that records what it was asked to send.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeEmails {
    sent: Mutex<Vec<(String, String, ValidationEmail)>>,
    fail: AtomicBool,
}

#[allow(dead_code)]
impl FakeEmails {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let emails = Self::default();
        emails.fail.store(true, Ordering::SeqCst);
        Arc::new(emails)
    }

    pub fn sent(&self) -> Vec<(String, String, ValidationEmail)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for FakeEmails {
    async fn send_validation_email(
        &self,
        to: &str,
        locale: &str,
        email: &ValidationEmail,
    ) -> Result<(), ClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                service: "email service",
                status: StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), locale.to_string(), email.clone()));
        Ok(())
    }
}

//! Telegram adapter tests against a mocked Bot API.

mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notifier::bot::telegram::{Chat, Message, Update};
use notifier::bot::{BotChannel, BotError, RegistrationHandler, TelegramBot};
use notifier::config::TelegramConfig;
use notifier::events::IndicatorAlert;
use notifier::models::user_setting::{ChannelType, NewChannelSetting};
use notifier::repositories::{ChannelSettingStore, UserSettingRepository, ValidationCodeRepository};
use serde_json::json;
use test_utils::{FakeEmails, FakeProfiles, setup_test_db_arc};
use tokio_util::sync::CancellationToken;
use tracing::Span;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, body_string_contains, method, path},
};

const USER_ID: &str = "7d0c5f3e-5a5e-4f57-a8f4-3f9d1d1a9e01";

struct Fixture {
    bot: TelegramBot,
    settings: Arc<UserSettingRepository>,
    emails: Arc<FakeEmails>,
}

async fn fixture(api_base: Option<&str>) -> Result<Fixture> {
    let db = setup_test_db_arc().await?;
    let settings = Arc::new(UserSettingRepository::new(db.clone()));
    let emails = FakeEmails::new();
    let config = TelegramConfig {
        bot_token: api_base.map(|_| "TEST".to_string()),
        api_base: api_base.unwrap_or("https://api.telegram.org").to_string(),
        poll_timeout_seconds: 1,
        ..Default::default()
    };

    let registration = RegistrationHandler::new(
        Arc::new(ValidationCodeRepository::new(db)),
        FakeProfiles::with("a@b.com", USER_ID, "Ada", "en"),
        emails.clone(),
        &config,
        Span::none(),
    );
    let bot = TelegramBot::new(&config, settings.clone(), registration, Span::none())?;

    Ok(Fixture {
        bot,
        settings,
        emails,
    })
}

fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: 1,
            chat: Chat {
                id: chat_id,
                first_name: Some("Ada".to_string()),
                last_name: Some("L".to_string()),
            },
            text: Some(text.to_string()),
        }),
    }
}

fn sent_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {"message_id": 99}}))
}

fn btc_alert() -> IndicatorAlert {
    IndicatorAlert {
        symbol: "BTCUSDT".to_string(),
        time_frame: "1h".to_string(),
        signal: "buy".to_string(),
        close_price: 64000.5,
        ..Default::default()
    }
}

#[tokio::test]
async fn register_command_runs_handshake_and_confirms() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTEST/sendMessage"))
        .and(body_partial_json(json!({"chat_id": "555"})))
        .and(body_string_contains("registered successfully"))
        .respond_with(sent_ok())
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(Some(server.uri().as_str())).await?;
    f.bot
        .handle_update(text_update(1, 555, "/register  a@b.com"))
        .await?;

    let sent = f.emails.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "a@b.com");
    assert_eq!(sent[0].2.telegram_name, "Ada L");
    Ok(())
}

#[tokio::test]
async fn other_messages_get_instructions() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTEST/sendMessage"))
        .and(body_string_contains("/register"))
        .respond_with(sent_ok())
        .expect(2)
        .mount(&server)
        .await;

    let f = fixture(Some(server.uri().as_str())).await?;
    f.bot.handle_update(text_update(1, 555, "/start")).await?;
    // A bare command has no email to register.
    f.bot.handle_update(text_update(2, 555, "/register   ")).await?;

    assert!(f.emails.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn alert_goes_to_linked_chat_as_html() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTEST/sendMessage"))
        .and(body_partial_json(json!({"chat_id": "555", "parse_mode": "HTML"})))
        .and(body_string_contains("ALERT - $BTCUSDT"))
        .respond_with(sent_ok())
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(Some(server.uri().as_str())).await?;
    f.settings
        .create(NewChannelSetting {
            user_id: USER_ID.to_string(),
            channel_type: ChannelType::Telegram,
            nid: "555".to_string(),
        })
        .await?;

    f.bot.send_indicator_alert_message(USER_ID, &btc_alert()).await?;
    Ok(())
}

#[tokio::test]
async fn alert_follows_most_recently_linked_chat() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTEST/sendMessage"))
        .and(body_partial_json(json!({"chat_id": "222"})))
        .respond_with(sent_ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTEST/sendMessage"))
        .and(body_partial_json(json!({"chat_id": "111"})))
        .respond_with(sent_ok())
        .expect(0)
        .mount(&server)
        .await;

    let f = fixture(Some(server.uri().as_str())).await?;
    for nid in ["111", "222"] {
        f.settings
            .create(NewChannelSetting {
                user_id: USER_ID.to_string(),
                channel_type: ChannelType::Telegram,
                nid: nid.to_string(),
            })
            .await?;
    }

    f.bot.send_indicator_alert_message(USER_ID, &btc_alert()).await?;
    assert_eq!(f.settings.get_by_user_id(USER_ID).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn alert_without_linked_channel_short_circuits() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sent_ok())
        .expect(0)
        .mount(&server)
        .await;

    let f = fixture(Some(server.uri().as_str())).await?;
    let err = f
        .bot
        .send_indicator_alert_message(USER_ID, &btc_alert())
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::ChannelNotLinked { .. }));
    Ok(())
}

#[tokio::test]
async fn bot_api_rejection_is_surfaced() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTEST/sendMessage"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&server)
        .await;

    let f = fixture(Some(server.uri().as_str())).await?;
    f.settings
        .create(NewChannelSetting {
            user_id: USER_ID.to_string(),
            channel_type: ChannelType::Telegram,
            nid: "555".to_string(),
        })
        .await?;

    match f.bot.send_indicator_alert_message(USER_ID, &btc_alert()).await {
        Err(BotError::Api { method, description }) => {
            assert_eq!(method, "sendMessage");
            assert!(description.contains("blocked"));
        }
        other => panic!("unexpected result {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unconfigured_bot_starts_idle_and_refuses_alerts() -> Result<()> {
    let f = fixture(None).await?;
    f.bot.start(CancellationToken::new()).await?;
    f.bot.stop().await?;

    let err = f
        .bot
        .send_indicator_alert_message(USER_ID, &btc_alert())
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::NotConfigured(_)));
    Ok(())
}

#[tokio::test]
async fn polling_loop_replies_and_stops() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTEST/getUpdates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [{
                "update_id": 7,
                "message": {"message_id": 1, "chat": {"id": 555, "first_name": "Ada"}, "text": "hi"}
            }]
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTEST/getUpdates"))
        .and(body_partial_json(json!({"offset": 8})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true, "result": []}))
                .set_delay(Duration::from_millis(100)),
        )
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTEST/sendMessage"))
        .respond_with(sent_ok())
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(Some(server.uri().as_str())).await?;
    let shutdown = CancellationToken::new();
    f.bot.start(shutdown.clone()).await?;
    assert!(matches!(
        f.bot.start(shutdown.clone()).await,
        Err(BotError::AlreadyStarted)
    ));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.iter().any(|r| r.url.path().ends_with("sendMessage")) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "no reply sent");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    f.bot.stop().await?;
    Ok(())
}

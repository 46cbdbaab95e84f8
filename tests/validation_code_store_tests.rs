//! Integration tests for the expiring validation code store.

mod test_utils;

use std::time::Duration;

use anyhow::Result;
use notifier::models::validation_code::{ValidationKey, derive_token};
use notifier::repositories::{ValidationCodeRepository, ValidationCodeStore};
use test_utils::setup_test_db_arc;

#[tokio::test]
async fn saved_payload_is_readable_until_expiry() -> Result<()> {
    let store = ValidationCodeRepository::new(setup_test_db_arc().await?);
    let key = ValidationKey::Code("ABC123".to_string());

    store.save(&key, "a@b.com:555", 1).await?;
    assert_eq!(store.get(&key).await?, "a@b.com:555");

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert!(store.get(&key).await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn zero_ttl_is_never_readable() -> Result<()> {
    let store = ValidationCodeRepository::new(setup_test_db_arc().await?);
    let key = ValidationKey::Code("ZZZ999".to_string());

    store.save(&key, "a@b.com:555", 0).await?;
    assert!(store.get(&key).await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn missing_key_is_not_found() -> Result<()> {
    let store = ValidationCodeRepository::new(setup_test_db_arc().await?);
    let err = store
        .get(&ValidationKey::Token("unknown".to_string()))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn last_write_wins_and_refreshes_expiry() -> Result<()> {
    let store = ValidationCodeRepository::new(setup_test_db_arc().await?);
    let key = ValidationKey::Code("ABC123".to_string());

    store.save(&key, "a@b.com:555", 0).await?;
    store.save(&key, "c@d.com:777", 60).await?;
    assert_eq!(store.get(&key).await?, "c@d.com:777");
    Ok(())
}

#[tokio::test]
async fn code_and_token_live_side_by_side() -> Result<()> {
    let store = ValidationCodeRepository::new(setup_test_db_arc().await?);
    let token = derive_token("ABC123", "a@b.com");

    store
        .save(&ValidationKey::Code("ABC123".to_string()), "a@b.com:555", 60)
        .await?;
    store
        .save(&ValidationKey::Token(token.clone()), "a@b.com:555", 60)
        .await?;

    assert_eq!(
        store.get(&ValidationKey::Code("ABC123".to_string())).await?,
        store.get(&ValidationKey::Token(token)).await?
    );
    Ok(())
}

use super::*;
use crate::token_store::TokenStore;

async fn memory_store(profile: Option<&str>) -> Arc<DurableCredentialStore> {
    DurableCredentialStore::initialize("sqlite::memory:", profile)
        .await
        .expect("credential store")
}

#[tokio::test]
async fn uses_default_profile_when_none_given() {
    let store = memory_store(None).await;
    assert_eq!(store.profile(), storage::DEFAULT_PROFILE);
}

#[tokio::test]
async fn saved_pair_survives_into_a_new_token_store() {
    let durable = memory_store(Some("staging")).await;
    let writer = TokenStore::with_persistence(durable.clone());
    writer.set(Credentials::new("access-1", "refresh-1")).await;

    let reader = TokenStore::with_persistence(durable);
    assert!(reader.restore().await.expect("restore"));
    assert_eq!(
        reader.get().await,
        Some(Credentials::new("access-1", "refresh-1"))
    );
}

#[tokio::test]
async fn refreshed_access_token_overwrites_persisted_row() {
    let durable = memory_store(None).await;
    let tokens = TokenStore::with_persistence(durable.clone());
    tokens.set(Credentials::new("access-1", "refresh-1")).await;
    tokens.replace_access("access-2".to_string(), None).await;

    assert_eq!(
        durable.load().await.expect("load"),
        Some(Credentials::new("access-2", "refresh-1"))
    );
}

#[tokio::test]
async fn clearing_the_store_erases_the_row() {
    let durable = memory_store(None).await;
    let tokens = TokenStore::with_persistence(durable.clone());
    tokens.set(Credentials::new("access-1", "refresh-1")).await;

    tokens.clear().await;

    assert_eq!(durable.load().await.expect("load"), None);
    durable.erase().await.expect("erasing twice is fine");
}

use std::sync::Arc;
use std::time::Duration;
use vitrine_storage::test_helpers::MockPresigner;
use vitrine_storage::{KeyNormalizer, StorageGateway};

#[tokio::test]
async fn test_normalized_url_reference_is_signed_as_bare_key() {
    let normalizer = KeyNormalizer::new(Some("wardrobe".to_string()));
    let mock = Arc::new(MockPresigner::new());
    let gateway = StorageGateway::with_presigner(mock.clone(), Duration::from_secs(900));

    let key = normalizer.normalize(Some(
        "https://acct.r2.cloudflarestorage.com/wardrobe/usergen/u1/look.png?X-Amz-Expires=10",
    ));
    let url = gateway.presign_default(key.as_deref()).await;

    assert_eq!(
        url.as_deref(),
        Some("https://signed.test/usergen/u1/look.png?expires=900")
    );
    assert_eq!(mock.calls(), vec!["usergen/u1/look.png".to_string()]);
}

#[tokio::test]
async fn test_gateway_is_shareable_across_tasks() {
    let mock = Arc::new(MockPresigner::new());
    let gateway = Arc::new(StorageGateway::with_presigner(
        mock.clone(),
        Duration::from_secs(60),
    ));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .presign_default(Some(&format!("generated/{}.png", i)))
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_some());
    }
    assert_eq!(mock.call_count(), 10);
}

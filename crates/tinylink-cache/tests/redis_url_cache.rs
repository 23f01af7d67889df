use jiff::{SignedDuration, Timestamp};
use redis::AsyncCommands;
use std::time::Duration;
use tinylink_cache::RedisUrlCache;
use tinylink_core::{CacheError, ShortCode, UrlCache};
use tinylink_test_infra::entity;
use tinylink_test_infra::redis::RedisServer;

async fn start() -> (RedisServer, RedisUrlCache) {
    let server = RedisServer::new().await.expect("failed to start redis");
    let url = server.redis_url().await.expect("failed to resolve redis url");
    let cache = RedisUrlCache::connect(&url).await.expect("failed to connect");
    (server, cache)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn stores_entity_as_json_under_url_prefix() {
    let (server, cache) = start().await;
    let url = entity("abc123", "https://example.com", Timestamp::now(), SignedDuration::from_secs(60));

    assert!(cache.get_url(url.short_code()).await.unwrap().is_none());
    cache.set_url(&url, Duration::from_secs(60)).await.unwrap();
    assert_eq!(cache.get_url(url.short_code()).await.unwrap(), Some(url.clone()));

    let mut conn = server.client().await.unwrap().get_multiplexed_async_connection().await.unwrap();
    let raw: String = conn.get("url:abc123").await.unwrap();
    assert!(raw.contains("\"originalUrl\":\"https://example.com\""));

    let pttl: i64 = conn.pttl("url:abc123").await.unwrap();
    assert!(pttl > 0 && pttl <= 60_000);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn entry_expires_with_its_ttl() {
    let (_server, cache) = start().await;
    let url = entity("short1", "https://example.com", Timestamp::now(), SignedDuration::from_secs(60));

    cache.set_url(&url, Duration::from_millis(100)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(cache.get_url(url.short_code()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn del_removes_entry_and_is_idempotent() {
    let (_server, cache) = start().await;
    let url = entity("abc123", "https://example.com", Timestamp::now(), SignedDuration::from_secs(60));
    cache.set_url(&url, Duration::from_secs(60)).await.unwrap();

    cache.del(url.short_code()).await.unwrap();
    cache.del(url.short_code()).await.unwrap();
    assert!(cache.get_url(url.short_code()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn corrupt_payload_is_invalid_data() {
    let (server, cache) = start().await;
    let mut conn = server.client().await.unwrap().get_multiplexed_async_connection().await.unwrap();
    let _: () = conn.set("url:broken", "not json").await.unwrap();

    let err = cache
        .get_url(&ShortCode::new_unchecked("broken"))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::InvalidData(_)));
}

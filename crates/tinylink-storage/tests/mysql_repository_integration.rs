use jiff::SignedDuration;
use std::sync::Arc;
use tinylink_core::{Clock, ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
use tinylink_storage::MySqlRepository;
use tinylink_test_infra::mysql::{MySqlConfig, MySqlServer};
use tinylink_test_infra::ManualClock;

struct Fixture {
    _mysql: MySqlServer,
    clock: ManualClock,
    repo: MySqlRepository,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::new(MySqlConfig::builder().build())
            .await
            .expect("start mysql");
        let pool = mysql.connect_pool().await.expect("connect mysql");
        let clock = ManualClock::starting_now();
        let repo = MySqlRepository::with_clock(pool, Arc::new(clock.clone()));
        repo.ensure_schema().await.expect("create schema");

        Self {
            _mysql: mysql,
            clock,
            repo,
        }
    }

    fn record(&self, code: &str, ttl: SignedDuration) -> UrlRecord {
        UrlRecord {
            original_url: format!("https://example.com/{code}"),
            short_code: ShortCode::new_unchecked(code),
            expires_at: self.clock.now() + ttl,
        }
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn create_and_get_live_record() {
    let fixture = Fixture::start().await;

    let created = fixture
        .repo
        .create(fixture.record("abc123", SignedDuration::from_secs(30)))
        .await
        .unwrap();
    let got = fixture
        .repo
        .get_by_short_code(created.short_code())
        .await
        .unwrap();

    assert_eq!(got, Some(created));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn live_code_conflicts() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .create(fixture.record("promo2024", SignedDuration::from_secs(30)))
        .await
        .unwrap();

    let err = fixture
        .repo
        .create(fixture.record("promo2024", SignedDuration::from_secs(30)))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn expired_code_is_hidden_then_reclaimed() {
    let fixture = Fixture::start().await;
    let code = ShortCode::new_unchecked("abc123");
    fixture
        .repo
        .create(fixture.record("abc123", SignedDuration::from_secs(30)))
        .await
        .unwrap();

    fixture.clock.advance(SignedDuration::from_secs(31));
    assert_eq!(fixture.repo.get_by_short_code(&code).await.unwrap(), None);

    let reclaimed = fixture
        .repo
        .create(fixture.record("abc123", SignedDuration::from_secs(30)))
        .await
        .unwrap();
    assert_eq!(
        fixture.repo.get_by_short_code(&code).await.unwrap(),
        Some(reclaimed)
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn delete_is_logical_and_frees_the_code() {
    let fixture = Fixture::start().await;
    let code = ShortCode::new_unchecked("abc123");
    fixture
        .repo
        .create(fixture.record("abc123", SignedDuration::from_secs(30)))
        .await
        .unwrap();

    assert!(fixture.repo.delete(&code).await.unwrap());
    assert!(!fixture.repo.delete(&code).await.unwrap());
    assert_eq!(fixture.repo.get_by_short_code(&code).await.unwrap(), None);

    let deleted_at: Option<i64> =
        sqlx::query_scalar("SELECT deleted_at FROM short_urls WHERE short_code = ?")
            .bind("abc123")
            .fetch_one(fixture.repo.pool())
            .await
            .unwrap();
    assert!(deleted_at.is_some());

    fixture
        .repo
        .create(fixture.record("abc123", SignedDuration::from_secs(30)))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn ensure_schema_is_idempotent() {
    let fixture = Fixture::start().await;
    fixture.repo.ensure_schema().await.unwrap();

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM short_urls")
        .fetch_one(fixture.repo.pool())
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_creates_with_distinct_codes_all_succeed() {
    let fixture = Arc::new(Fixture::start().await);

    let mut handles = Vec::new();
    for i in 0..64 {
        let fixture = Arc::clone(&fixture);
        handles.push(tokio::spawn(async move {
            let record = fixture.record(&format!("code{i}"), SignedDuration::from_secs(30));
            fixture.repo.create(record).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_reclaims_of_one_stale_code_have_one_winner() {
    let fixture = Arc::new(Fixture::start().await);
    fixture
        .repo
        .create(fixture.record("race", SignedDuration::from_secs(1)))
        .await
        .unwrap();
    fixture.clock.advance(SignedDuration::from_secs(1));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let fixture = Arc::clone(&fixture);
        handles.push(tokio::spawn(async move {
            let record = fixture.record("race", SignedDuration::from_secs(30));
            fixture.repo.create(record).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert!(matches!(err, StorageError::Conflict(_)), "{err}"),
        }
    }
    assert_eq!(winners, 1);
}

//! Integration tests for the MongoDB lock store.

use std::time::Duration;

use mongodb::Client;
use shedlock::prelude::*;
use shedlock_mongo::MongoLockStore;

/// Helper to get MongoDB URI from environment or use default.
fn get_mongo_uri() -> String {
    std::env::var("MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

async fn store() -> MongoLockStore {
    let client = Client::with_uri_str(get_mongo_uri())
        .await
        .expect("Failed to connect to MongoDB");
    MongoLockStore::new(&client.database("test_shedlock"), Some("shedlock_test"))
}

#[tokio::test]
#[ignore] // Requires MongoDB server running
async fn test_mongo_lock_lifecycle() {
    let locker = LockManager::builder(store().await)
        .locked_by("mongo-test")
        .build();
    let name = format!("mongo-{}", uuid::Uuid::new_v4().simple());

    assert!(locker.acquire(&name, Duration::from_secs(30)).await.unwrap());
    assert!(!locker.acquire(&name, Duration::from_secs(30)).await.unwrap());

    assert!(locker.release(&name).await.unwrap());
    assert!(locker.acquire(&name, Duration::from_secs(30)).await.unwrap());

    assert!(locker.delete(&name).await.unwrap());
    assert!(!locker.delete(&name).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires MongoDB server running
async fn test_mongo_store_time() {
    let store = store().await;
    let locker = LockManager::builder(store.clone())
        .locked_by("mongo-db-time")
        .use_store_time(true)
        .build();
    let name = format!("mongo-dbtime-{}", uuid::Uuid::new_v4().simple());

    assert!(locker.acquire(&name, Duration::from_millis(200)).await.unwrap());
    assert!(!locker.acquire(&name, Duration::from_millis(200)).await.unwrap());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(locker.acquire(&name, Duration::from_secs(30)).await.unwrap());

    assert!(locker.release(&name).await.unwrap());
    let record = store
        .collection()
        .find_one(mongodb::bson::doc! { "_id": name.as_str() })
        .await
        .unwrap()
        .expect("record kept after release");
    assert_eq!(record.locked_by, "mongo-db-time");

    locker.delete(&name).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires MongoDB server running
async fn test_concurrent_acquire() {
    let store = store().await;
    let name = format!("mongo-race-{}", uuid::Uuid::new_v4().simple());

    let mut tasks = Vec::new();
    for i in 0..10 {
        let locker = LockManager::builder(store.clone())
            .locked_by(format!("racer-{i}"))
            .build();
        let name = name.clone();
        tasks.push(tokio::spawn(async move {
            locker.acquire(&name, Duration::from_secs(30)).await.unwrap()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    LockManager::new(store).delete(&name).await.unwrap();
}

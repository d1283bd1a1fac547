use std::time::Duration;

use docconv::application::ports::{BrokerChannel, BrokerError};
use docconv::domain::{
    ConversionOptions, DocumentRef, InputFormat, JobId, StoragePath, TaskMessage,
};

use crate::helpers::TestPostgres;

fn task(filename: &str) -> TaskMessage {
    let job_id = JobId::new();
    TaskMessage {
        job_id,
        filename: filename.to_string(),
        document: DocumentRef {
            storage_path: StoragePath::new(&job_id, filename),
            format: InputFormat::Csv,
        },
        options: ConversionOptions::default(),
        attempt: 2,
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_published_task_when_consumed_and_acked_then_payload_round_trips() {
    let pg = TestPostgres::new().await;
    let broker = pg.broker(Duration::from_secs(30));
    let published = task("table.csv");

    broker.publish(&published, Duration::ZERO).await.unwrap();
    let delivery = broker.consume().await.unwrap();

    assert_eq!(delivery.task, published);
    assert_eq!(delivery.delivery_count, 1);
    broker.ack(&delivery).await.unwrap();
    assert!(
        tokio::time::timeout(Duration::from_millis(300), broker.consume())
            .await
            .is_err()
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_unacked_task_when_visibility_lapses_then_redelivered_and_old_receipt_rejected() {
    let pg = TestPostgres::new().await;
    let broker = pg.broker(Duration::from_millis(300));
    broker.publish(&task("slow.csv"), Duration::ZERO).await.unwrap();

    let first = broker.consume().await.unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), broker.consume())
        .await
        .expect("task was not redelivered")
        .unwrap();

    assert_eq!(second.message_id, first.message_id);
    assert_eq!(second.delivery_count, 2);
    assert_eq!(
        broker.ack(&first).await,
        Err(BrokerError::UnknownReceipt(first.message_id))
    );
    broker.ack(&second).await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_nacked_task_when_delay_elapses_then_consumable_again() {
    let pg = TestPostgres::new().await;
    let broker = pg.broker(Duration::from_secs(30));
    broker.publish(&task("retry.csv"), Duration::ZERO).await.unwrap();
    let delivery = broker.consume().await.unwrap();

    broker
        .nack(&delivery, Duration::from_millis(200))
        .await
        .unwrap();
    let again = tokio::time::timeout(Duration::from_secs(5), broker.consume())
        .await
        .expect("nacked task was not released")
        .unwrap();

    assert_eq!(again.message_id, delivery.message_id);
    assert_ne!(again.receipt, delivery.receipt);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_one_task_when_two_brokers_consume_then_only_one_claims_it() {
    let pg = TestPostgres::new().await;
    let left = pg.broker(Duration::from_secs(30));
    let right = pg.broker(Duration::from_secs(30));
    left.publish(&task("shared.csv"), Duration::ZERO).await.unwrap();

    let winner = left.consume().await.unwrap();
    let loser = tokio::time::timeout(Duration::from_millis(300), right.consume()).await;

    assert_eq!(winner.task.filename, "shared.csv");
    assert!(loser.is_err());
    right.ping().await.unwrap();
}

//! Tests against a live NATS server on `localhost:4222`.
//!
//! Each test plays the world source itself: it answers the request
//! subjects and publishes entity ticks. Run with
//! `cargo test -p hexwatch-nats -- --ignored` while `nats-server` is up.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures::StreamExt as _;
use hexwatch_core::SourceError;
use hexwatch_core::client::StreamClient;
use hexwatch_core::config::SourceConfig;
use hexwatch_core::source::{ConnectionRole, SourceConnector};
use hexwatch_nats::NatsConnector;
use hexwatch_types::{
    Axial, EntitiesMessage, ErrorCode, Reply, RoomId, RoomLayoutReply, RoomListReply,
};
use serde::Serialize;

const URL: &str = "nats://localhost:4222";

fn config(prefix: &str) -> SourceConfig {
    let mut config = SourceConfig {
        url: String::from(URL),
        request_timeout_ms: 2_000,
        ..SourceConfig::default()
    };
    config.subjects.rooms = format!("{prefix}.rooms");
    config.subjects.layout = format!("{prefix}.layout");
    config.subjects.terrain = format!("{prefix}.terrain");
    config.subjects.entities = format!("{prefix}.entities");
    config
}

/// Answer every request on `subject` with `reply`.
async fn serve<T: Serialize + Send + Sync + 'static>(
    client: async_nats::Client,
    subject: String,
    reply: Reply<T>,
) {
    let mut requests = client.subscribe(subject).await.unwrap();
    let payload = serde_json::to_vec(&reply).unwrap();
    tokio::spawn(async move {
        while let Some(request) = requests.next().await {
            if let Some(inbox) = request.reply {
                client.publish(inbox, payload.clone().into()).await.unwrap();
            }
        }
    });
}

#[tokio::test]
#[ignore]
async fn bootstrap_and_stream_over_nats() {
    let config = config("hexwatch.test.stream");
    let responder = async_nats::connect(URL).await.unwrap();
    serve(
        responder.clone(),
        config.subjects.rooms.clone(),
        Reply::Ok {
            body: RoomListReply {
                room_ids: vec![Axial::new(0, 0), Axial::new(1, 0)],
            },
        },
    )
    .await;
    serve(
        responder.clone(),
        config.subjects.layout.clone(),
        Reply::Ok {
            body: RoomLayoutReply::default(),
        },
    )
    .await;
    responder.flush().await.unwrap();

    let connector = NatsConnector::from_config(&config);
    let source = connector.connect(ConnectionRole::Stream).await.unwrap();
    let client = StreamClient::new(source, Duration::from_secs(2));

    let bootstrap = client.bootstrap().await.unwrap();
    assert_eq!(bootstrap.rooms, vec![RoomId::new(0, 0), RoomId::new(1, 0)]);

    let mut updates = client.subscribe().await.unwrap();
    let tick = EntitiesMessage {
        world_time: 9,
        ..EntitiesMessage::default()
    };
    responder
        .publish(
            config.subjects.entities.clone(),
            serde_json::to_vec(&tick).unwrap().into(),
        )
        .await
        .unwrap();
    responder.flush().await.unwrap();

    let update = tokio::time::timeout(Duration::from_secs(2), updates.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(update.world_time, 9);
}

#[tokio::test]
#[ignore]
async fn terrain_not_found_over_nats() {
    let config = config("hexwatch.test.terrain");
    let responder = async_nats::connect(URL).await.unwrap();
    serve::<()>(
        responder.clone(),
        config.subjects.terrain.clone(),
        Reply::Error {
            code: ErrorCode::NotFound,
            message: String::from("no such room"),
        },
    )
    .await;
    responder.flush().await.unwrap();

    let connector = NatsConnector::from_config(&config);
    let source = connector.connect(ConnectionRole::Requests).await.unwrap();
    let client = StreamClient::new(source, Duration::from_secs(2));

    assert_eq!(
        client.fetch_terrain(RoomId::new(3, 3)).await,
        Err(SourceError::RoomNotFound(RoomId::new(3, 3)))
    );
}

#[tokio::test]
#[ignore]
async fn no_responders_is_unavailable() {
    let connector = NatsConnector::from_config(&config("hexwatch.test.silent"));
    let source = connector.connect(ConnectionRole::Stream).await.unwrap();
    let client = StreamClient::new(source, Duration::from_secs(2));

    assert!(matches!(
        client.bootstrap().await,
        Err(SourceError::Unavailable(_))
    ));
}

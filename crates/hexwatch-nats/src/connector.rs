//! [`SourceConnector`] over a NATS server.
//!
//! Every connection is a fresh `async_nats::Client`. The client would
//! happily reconnect behind our back after a network blip and resume the
//! subscription mid-stream; instead, a disconnect event ends the entity
//! stream with [`SourceError::Unavailable`] so the supervisor
//! re-bootstraps on a new connection.

use std::sync::Arc;
use std::time::Duration;

use async_nats::Event;
use futures::StreamExt as _;
use futures::stream::{self, BoxStream};
use hexwatch_core::SourceError;
use hexwatch_core::config::{SourceConfig, SubjectsConfig};
use hexwatch_core::source::{ConnectionRole, SourceConnector, WorldSource};
use hexwatch_types::{
    Axial, EntitiesMessage, RoomId, RoomLayoutReply, RoomListReply, TerrainReply,
};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::codec;

/// Opens NATS connections to the world source.
#[derive(Debug, Clone)]
pub struct NatsConnector {
    url: String,
    subjects: SubjectsConfig,
    request_timeout: Duration,
}

impl NatsConnector {
    /// A connector for the configured server and subjects.
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            url: config.url.clone(),
            subjects: config.subjects.clone(),
            request_timeout: config.request_timeout(),
        }
    }
}

impl SourceConnector for NatsConnector {
    type Source = NatsSource;

    async fn connect(&self, role: ConnectionRole) -> Result<NatsSource, SourceError> {
        let name = match role {
            ConnectionRole::Stream => "hexwatch-stream",
            ConnectionRole::Requests => "hexwatch-requests",
        };
        let (lost_tx, lost_rx) = watch::channel(false);
        let lost_tx = Arc::new(lost_tx);

        info!(url = %self.url, connection = name, "Connecting to NATS");
        let client = async_nats::ConnectOptions::new()
            .name(name)
            .request_timeout(Some(self.request_timeout))
            .event_callback(move |event| {
                let lost_tx = Arc::clone(&lost_tx);
                async move {
                    match event {
                        Event::Disconnected => {
                            warn!(connection = name, "NATS connection lost");
                            lost_tx.send_replace(true);
                        }
                        Event::Connected => debug!(connection = name, "NATS connected"),
                        other => debug!(connection = name, event = ?other, "NATS event"),
                    }
                }
            })
            .connect(self.url.as_str())
            .await
            .map_err(|e| {
                codec::connect_error(e.kind(), format!("failed to connect to {}: {e}", self.url))
            })?;
        info!(connection = name, "NATS connection established");

        Ok(NatsSource {
            client,
            subjects: self.subjects.clone(),
            lost: lost_rx,
        })
    }
}

/// One NATS connection to the world source.
pub struct NatsSource {
    client: async_nats::Client,
    subjects: SubjectsConfig,
    lost: watch::Receiver<bool>,
}

impl std::fmt::Debug for NatsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsSource")
            .field("subjects", &self.subjects)
            .field("lost", &*self.lost.borrow())
            .finish_non_exhaustive()
    }
}

impl NatsSource {
    async fn request<T: DeserializeOwned>(
        &self,
        operation: &str,
        subject: &str,
        payload: Vec<u8>,
        room: Option<RoomId>,
    ) -> Result<T, SourceError> {
        debug!(operation, subject, "Requesting");
        let message = self
            .client
            .request(subject.to_owned(), payload.into())
            .await
            .map_err(|e| codec::request_error(operation, e.kind(), &e.to_string()))?;
        codec::decode_reply(operation, &message.payload, room)
    }
}

impl WorldSource for NatsSource {
    type Updates = BoxStream<'static, Result<EntitiesMessage, SourceError>>;

    async fn list_rooms(&self) -> Result<RoomListReply, SourceError> {
        self.request("ListRooms", &self.subjects.rooms, Vec::new(), None)
            .await
    }

    async fn room_layout(&self) -> Result<RoomLayoutReply, SourceError> {
        self.request("GetRoomLayout", &self.subjects.layout, Vec::new(), None)
            .await
    }

    async fn room_terrain(&self, room: Axial) -> Result<TerrainReply, SourceError> {
        let payload = serde_json::to_vec(&room).map_err(|e| {
            SourceError::Protocol(format!("failed to encode terrain request: {e}"))
        })?;
        self.request(
            "GetRoomTerrain",
            &self.subjects.terrain,
            payload,
            Some(RoomId::from(room)),
        )
        .await
    }

    async fn subscribe_entities(&self) -> Result<Self::Updates, SourceError> {
        let subject = self.subjects.entities.clone();
        let subscriber = self.client.subscribe(subject.clone()).await.map_err(|e| {
            SourceError::Unavailable(format!("failed to subscribe to {subject}: {e}"))
        })?;
        info!(subject = %subject, "Subscribed to entity updates");
        Ok(entity_stream(subscriber, self.lost.clone()))
    }
}

/// Decode subscription messages until the subscription closes or the
/// connection is reported lost.
fn entity_stream(
    subscriber: async_nats::Subscriber,
    lost: watch::Receiver<bool>,
) -> BoxStream<'static, Result<EntitiesMessage, SourceError>> {
    stream::unfold(Some((subscriber, lost)), |state| async move {
        let (mut subscriber, mut lost) = state?;
        let next = tokio::select! {
            biased;
            _ = lost.wait_for(|lost| *lost) => None,
            message = subscriber.next() => Some(message),
        };
        match next {
            None => Some((
                Err(SourceError::Unavailable(String::from("NATS connection lost"))),
                None,
            )),
            Some(Some(message)) => Some((
                codec::decode_entities(&message.payload),
                Some((subscriber, lost)),
            )),
            Some(None) => None,
        }
    })
    .boxed()
}

//! Integration tests for the resilience supervisor.
//!
//! Every test drives a real [`StateManager`] against a
//! [`ScriptedConnector`]. Timing tests run on Tokio's paused clock, so
//! backoff waits elapse instantly in virtual time while still being
//! measurable.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use hexwatch_core::backoff::BackoffPolicy;
use hexwatch_core::scripted::{ScriptedConnector, ScriptedSession};
use hexwatch_core::source::ConnectionRole;
use hexwatch_core::{
    FatalError, ManagerError, QueryError, SourceError, StateManager, SubscriberError,
    SupervisorPhase, SyncSettings, WorldSnapshot, WorldState,
};
use hexwatch_types::{Axial, Bot, EntitiesMessage, RoomBots, RoomId, TerrainKind, TerrainTile, WorldPosition};
use tokio::sync::mpsc;
use tokio::time::Instant;

fn settings(max_retries: Option<u32>) -> SyncSettings {
    SyncSettings {
        policy: BackoffPolicy {
            base: Duration::from_secs(1),
            max: Duration::from_secs(10),
            max_retries,
            jitter: 0.0,
        },
        request_timeout: Duration::from_secs(5),
    }
}

fn rooms() -> Vec<RoomId> {
    vec!["0,0".parse().unwrap(), "1,0".parse().unwrap()]
}

fn bot(id: u64, room: Axial) -> Bot {
    Bot {
        id,
        position: WorldPosition {
            room,
            pos: Axial::new(0, 1),
        },
        owner_id: None,
        script_id: None,
        carry: 0,
        carry_max: 0,
        hp: 100,
        hp_max: 100,
    }
}

/// A tick that puts `count` bots (ids `1..=count`) in `room`.
fn tick(world_time: u64, room: RoomId, count: u64) -> EntitiesMessage {
    EntitiesMessage {
        world_time,
        bots: vec![RoomBots {
            room_id: room.axial(),
            bots: (1..=count).map(|id| bot(id, room.axial())).collect(),
        }],
        ..EntitiesMessage::default()
    }
}

/// Forward every published snapshot into a channel.
fn collect(world: &WorldState) -> mpsc::UnboundedReceiver<Arc<WorldSnapshot>> {
    let (tx, rx) = mpsc::unbounded_channel();
    world.register(move |snapshot: &Arc<WorldSnapshot>| -> Result<(), SubscriberError> {
        tx.send(Arc::clone(snapshot))
            .map_err(|e| SubscriberError::new(e.to_string()))
    });
    rx
}

/// Virtual time since `started` is `secs` seconds, give or take timer
/// rounding.
fn assert_elapsed(started: Instant, secs: u64) {
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(secs), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(secs.saturating_add(1)), "{elapsed:?}");
}

async fn wait_for_phase(world: &WorldState, wanted: SupervisorPhase) {
    let mut phase = world.watch_phase();
    phase.wait_for(|current| *current == wanted).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn retries_with_capped_backoff_then_resumes() {
    let origin = RoomId::new(0, 0);
    let connector = ScriptedConnector::new([
        ScriptedSession::refuse(SourceError::Unavailable(String::from("refused"))),
        ScriptedSession::refuse(SourceError::Unavailable(String::from("refused"))),
        ScriptedSession::refuse(SourceError::Unavailable(String::from("refused"))),
        ScriptedSession::refuse(SourceError::Unavailable(String::from("refused"))),
        ScriptedSession::refuse(SourceError::Unavailable(String::from("refused"))),
        ScriptedSession::refuse(SourceError::Unavailable(String::from("refused"))),
        ScriptedSession::serve(&rooms())
            .with_updates([tick(1, origin, 1)])
            .hold_open(),
    ]);
    let started = Instant::now();
    let manager = StateManager::start(connector.clone(), &settings(None));
    let world = manager.world();
    let mut published = collect(&world);

    let first = published.recv().await.unwrap();

    // 1 + 2 + 4 + 8 + 10 + 10
    assert_elapsed(started, 35);
    assert_eq!(first.world_time, 1);
    assert_eq!(first.session, 7);
    assert_eq!(connector.connects(ConnectionRole::Stream), 7);
    assert_eq!(world.counters().retryable_failures, 6);
    assert_eq!(world.phase(), SupervisorPhase::Streaming { session: 7 });

    manager.shutdown().await.unwrap();
    assert_eq!(world.phase(), SupervisorPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn backoff_resets_after_a_successful_session() {
    let origin = RoomId::new(0, 0);
    let connector = ScriptedConnector::new([
        ScriptedSession::refuse(SourceError::Unavailable(String::from("refused"))),
        ScriptedSession::refuse(SourceError::Unavailable(String::from("refused"))),
        ScriptedSession::serve(&rooms()).with_updates([tick(1, origin, 1)]),
        ScriptedSession::refuse(SourceError::Unavailable(String::from("refused"))),
        ScriptedSession::serve(&rooms())
            .with_updates([tick(1, origin, 2)])
            .hold_open(),
    ]);
    let started = Instant::now();
    let manager = StateManager::start(connector, &settings(None));
    let world = manager.world();
    let mut published = collect(&world);

    let first = published.recv().await.unwrap();
    assert_elapsed(started, 3);
    assert_eq!(first.session, 3);

    // The stream ended after one update: waits restart at 1s, then 2s.
    let second = published.recv().await.unwrap();
    assert_elapsed(started, 6);
    assert_eq!(second.session, 5);
    assert_eq!(second.world_time, 1);
    assert_eq!(second.room(origin).unwrap().bots.len(), 2);

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn permission_denied_is_fatal() {
    let connector = ScriptedConnector::new([ScriptedSession::refuse(
        SourceError::PermissionDenied(String::from("bad credentials")),
    )]);
    let mut manager = StateManager::start(connector.clone(), &settings(None));
    let world = manager.world();

    let outcome = manager.stopped().await;

    assert!(matches!(
        outcome,
        Err(ManagerError::Fatal {
            source: FatalError::NonRetryable {
                source: SourceError::PermissionDenied(_)
            }
        })
    ));
    assert_eq!(world.phase(), SupervisorPhase::Stopped);
    assert_eq!(connector.connects(ConnectionRole::Stream), 1);
    assert!(manager.stopped().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn retry_ceiling_is_fatal() {
    let connector = ScriptedConnector::default();
    let mut manager = StateManager::start(connector.clone(), &settings(Some(2)));

    let outcome = manager.stopped().await;

    assert!(matches!(
        outcome,
        Err(ManagerError::Fatal {
            source: FatalError::RetriesExhausted { attempts: 3, .. }
        })
    ));
    assert_eq!(connector.connects(ConnectionRole::Stream), 3);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_backoff() {
    let connector = ScriptedConnector::default();
    let mut long_waits = settings(None);
    long_waits.policy.base = Duration::from_secs(600);
    long_waits.policy.max = Duration::from_secs(600);
    let manager = StateManager::start(connector, &long_waits);
    let world = manager.world();

    wait_for_phase(
        &world,
        SupervisorPhase::Backoff {
            attempt: 1,
            delay: Duration::from_secs(600),
        },
    )
    .await;
    let asked = Instant::now();
    manager.shutdown().await.unwrap();

    assert!(asked.elapsed() < Duration::from_secs(1));
    assert_eq!(world.phase(), SupervisorPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_manager_stops_the_supervisor() {
    let (session, _feed) = ScriptedSession::live(&rooms());
    let manager = StateManager::start(ScriptedConnector::new([session]), &settings(None));
    let world = manager.world();
    wait_for_phase(&world, SupervisorPhase::Streaming { session: 1 }).await;

    drop(manager);

    wait_for_phase(&world, SupervisorPhase::Stopped).await;
}

#[tokio::test(start_paused = true)]
async fn bootstrap_then_first_update_scenario() {
    let origin: RoomId = "0,0".parse().unwrap();
    let east: RoomId = "1,0".parse().unwrap();
    let (session, feed) = ScriptedSession::live(&rooms());
    let manager = StateManager::start(ScriptedConnector::new([session]), &settings(None));
    let world = manager.world();
    let mut published = collect(&world);

    wait_for_phase(&world, SupervisorPhase::Streaming { session: 1 }).await;
    let bootstrapped = world.current().unwrap();
    assert_eq!(bootstrapped.world_time, -1);
    assert_eq!(bootstrapped.rooms(), rooms().as_slice());
    assert_eq!(world.room_objects(origin), Err(QueryError::NotInitialized));

    assert!(feed.send(tick(1, origin, 2)));
    let snapshot = published.recv().await.unwrap();

    // The bootstrap snapshot was never pushed to subscribers.
    assert_eq!(snapshot.world_time, 1);
    let view = world.room_objects(origin).unwrap();
    assert_eq!(view.time, 1);
    assert_eq!(view.payload.bots.len(), 2);
    let empty = world.room_objects(east).unwrap();
    assert_eq!(empty.time, 1);
    assert!(empty.payload.bots.is_empty());
    assert!(empty.payload.structures.is_empty());
    assert!(empty.payload.resources.is_empty());

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn out_of_order_update_is_dropped_and_counted() {
    let origin = RoomId::new(0, 0);
    let east = RoomId::new(1, 0);
    let (session, feed) = ScriptedSession::live(&rooms());
    let manager = StateManager::start(ScriptedConnector::new([session]), &settings(None));
    let world = manager.world();
    let mut published = collect(&world);

    assert!(feed.send(tick(5, origin, 3)));
    assert_eq!(published.recv().await.unwrap().world_time, 5);

    assert!(feed.send(tick(3, origin, 1)));
    assert!(feed.send(tick(6, east, 1)));
    let next = published.recv().await.unwrap();

    assert_eq!(next.world_time, 6);
    assert_eq!(next.room(origin).unwrap().bots.len(), 3);
    assert_eq!(world.counters().stale_updates, 1);
    assert_eq!(world.counters().snapshots_published, 2);

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn undeclared_room_restarts_the_session() {
    let origin = RoomId::new(0, 0);
    let connector = ScriptedConnector::new([
        ScriptedSession::serve(&rooms())
            .with_updates([tick(1, RoomId::new(9, 9), 1)])
            .hold_open(),
        ScriptedSession::serve(&rooms())
            .with_updates([tick(1, origin, 1)])
            .hold_open(),
    ]);
    let manager = StateManager::start(connector, &settings(None));
    let world = manager.world();
    let mut published = collect(&world);

    let snapshot = published.recv().await.unwrap();

    assert_eq!(snapshot.session, 2);
    assert_eq!(world.counters().retryable_failures, 1);
    assert!(world.current().unwrap().room(RoomId::new(9, 9)).is_none());

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stream_error_mid_session_restarts() {
    let origin = RoomId::new(0, 0);
    let connector = ScriptedConnector::new([
        ScriptedSession::serve(&rooms()).with_items([
            Ok(tick(1, origin, 1)),
            Err(SourceError::Unavailable(String::from("connection reset"))),
        ]),
        ScriptedSession::serve(&rooms())
            .with_updates([tick(40, origin, 4)])
            .hold_open(),
    ]);
    let started = Instant::now();
    let manager = StateManager::start(connector, &settings(None));
    let world = manager.world();
    let mut published = collect(&world);

    assert_eq!(published.recv().await.unwrap().session, 1);
    let resumed = published.recv().await.unwrap();

    assert_eq!(resumed.session, 2);
    assert_eq!(resumed.world_time, 40);
    assert_elapsed(started, 1);

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failing_subscriber_does_not_stop_ingestion() {
    let origin = RoomId::new(0, 0);
    let (session, feed) = ScriptedSession::live(&rooms());
    let manager = StateManager::start(ScriptedConnector::new([session]), &settings(None));
    let world = manager.world();
    world.register(|_: &Arc<WorldSnapshot>| -> Result<(), SubscriberError> {
        Err(SubscriberError::new("relay gone"))
    });
    let mut published = collect(&world);

    assert!(feed.send(tick(1, origin, 1)));
    assert!(feed.send(tick(2, origin, 2)));
    published.recv().await.unwrap();
    let second = published.recv().await.unwrap();

    assert_eq!(second.world_time, 2);
    assert_eq!(world.counters().callback_failures, 2);
    assert!(matches!(world.phase(), SupervisorPhase::Streaming { .. }));

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn late_subscriber_sees_only_later_snapshots() {
    let origin = RoomId::new(0, 0);
    let (session, feed) = ScriptedSession::live(&rooms());
    let manager = StateManager::start(ScriptedConnector::new([session]), &settings(None));
    let world = manager.world();
    let mut early = collect(&world);

    assert!(feed.send(tick(1, origin, 1)));
    assert_eq!(early.recv().await.unwrap().world_time, 1);

    let mut late = collect(&world);
    assert!(feed.send(tick(2, origin, 1)));
    assert!(feed.send(tick(3, origin, 1)));

    assert_eq!(early.recv().await.unwrap().world_time, 2);
    assert_eq!(early.recv().await.unwrap().world_time, 3);
    assert_eq!(late.recv().await.unwrap().world_time, 2);
    assert_eq!(late.recv().await.unwrap().world_time, 3);

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn terrain_comes_from_the_source() {
    let origin = RoomId::new(0, 0);
    let tiles = vec![TerrainTile {
        position: Axial::new(0, 0),
        terrain: TerrainKind::Wall,
    }];
    let connector = ScriptedConnector::default()
        .with_terrain(origin, tiles.clone())
        .with_terrain_error(RoomId::new(1, 0), SourceError::Unavailable(String::from("busy")));
    let manager = StateManager::start(connector.clone(), &settings(None));
    let world = manager.world();

    assert_eq!(world.terrain(origin).await.unwrap(), tiles);
    assert_eq!(world.terrain(origin).await.unwrap(), tiles);
    assert_eq!(connector.connects(ConnectionRole::Requests), 1);

    assert_eq!(
        world.terrain(RoomId::new(5, 5)).await,
        Err(QueryError::RoomNotFound(RoomId::new(5, 5)))
    );
    assert!(matches!(
        world.terrain(RoomId::new(1, 0)).await,
        Err(QueryError::Source(SourceError::Unavailable(_)))
    ));

    // A transport failure drops the cached connection.
    assert_eq!(world.terrain(origin).await.unwrap(), tiles);
    assert_eq!(connector.connects(ConnectionRole::Requests), 2);

    manager.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_a_torn_snapshot() {
    let origin = RoomId::new(0, 0);
    let east = RoomId::new(1, 0);
    let (session, feed) = ScriptedSession::live(&rooms());
    let manager = StateManager::start(ScriptedConnector::new([session]), &settings(None));
    let world = manager.world();
    let mut published = collect(&world);
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let world = world.clone();
            let stop_rx = stop_rx.clone();
            tokio::spawn(async move {
                let mut checked = 0_u64;
                while !*stop_rx.borrow() {
                    if let Some(snapshot) = world.current().filter(|s| s.is_initialized()) {
                        // Each tick stamps both rooms with bots numbered
                        // up to its world time.
                        let expected = usize::try_from(snapshot.world_time).unwrap();
                        assert_eq!(snapshot.room(origin).unwrap().bots.len(), expected);
                        assert_eq!(snapshot.room(east).unwrap().bots.len(), expected);
                        checked = checked.saturating_add(1);
                    }
                    tokio::task::yield_now().await;
                }
                checked
            })
        })
        .collect();

    for world_time in 1..=50_u64 {
        let mut message = tick(world_time, origin, world_time);
        message.bots.push(RoomBots {
            room_id: east.axial(),
            bots: (1..=world_time).map(|id| bot(id, east.axial())).collect(),
        });
        assert!(feed.send(message));
    }
    let mut last = 0;
    while last < 50 {
        last = published.recv().await.unwrap().world_time;
    }

    stop_tx.send_replace(true);
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(world.current().unwrap().world_time, 50);

    manager.shutdown().await.unwrap();
}

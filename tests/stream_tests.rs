// Stats stream lifecycle: subscribe on start, publish decoded stats, unsubscribe + close on shutdown

mod common;

use common::*;
use edgemax_stats::codec;
use edgemax_stats::models::{Stat, StatType, SystemStats};
use edgemax_stats::protocol::{Name, Request};
use edgemax_stats::stream::{StatsStream, StreamOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn names(stats: &[StatType]) -> Option<Vec<Name>> {
    Some(stats.iter().map(|&name| Name { name }).collect())
}

async fn next_request(peer: &mut Peer) -> Request {
    let frame = timeout(WAIT, peer.sent.recv())
        .await
        .expect("timed out waiting for a request frame")
        .expect("socket sink dropped");
    let header_len = frame.iter().position(|&b| b == b'\n').unwrap();
    let declared: usize = std::str::from_utf8(&frame[..header_len])
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(declared, frame.len() - header_len - 1);
    codec::decode(&frame).unwrap()
}

#[tokio::test]
async fn test_start_subscribes_to_all_categories_with_session_id() {
    let (connector, mut peer) = channel_socket();
    let session = Arc::new(FakeSession::new("abc123"));

    let (stream, _stats) = StatsStream::start(session.clone(), &connector, StreamOptions::default())
        .await
        .unwrap();

    let sub = next_request(&mut peer).await;
    assert_eq!(sub.subscribe, names(&StatType::ALL));
    assert_eq!(sub.unsubscribe, None);
    assert_eq!(sub.session_id, "abc123");
    assert_eq!(stream.stat_types(), StatType::ALL.to_vec());

    {
        let dialed = connector.dialed.lock().unwrap();
        assert_eq!(dialed.len(), 1);
        let (url, origin, tls) = &dialed[0];
        assert_eq!(url.as_str(), "wss://192.168.1.1/ws/stats");
        assert_eq!(origin.as_str(), "https://192.168.1.1/");
        assert!(tls.insecure_skip_verify);
    }

    stream.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_failure_leaves_nothing_running() {
    let connector = ChannelConnector::refusing();
    let session = Arc::new(FakeSession::new("abc123"));

    let result = StatsStream::start(session.clone(), &connector, StreamOptions::default()).await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.heartbeats(), 0);
}

#[tokio::test]
async fn test_collector_publishes_framed_and_bare_stats() {
    let (connector, mut peer) = channel_socket();
    let session = Arc::new(FakeSession::new("abc123"));
    let (stream, mut stats) =
        StatsStream::start(session, &connector, StreamOptions::default())
            .await
            .unwrap();
    let _ = next_request(&mut peer).await;

    peer.push(&framed(&format!(r#"{{"system-stats":{SYSTEM_STATS_JSON}}}"#)));
    let stat = timeout(WAIT, stats.recv()).await.unwrap().unwrap();
    assert_eq!(
        stat,
        Stat::SystemStats(SystemStats {
            cpu: 10,
            uptime: Duration::from_secs(20),
            memory: 30,
        })
    );

    peer.push(r#"{"interfaces":{"eth1":{},"eth0":{"up":"true"}}}"#);
    let Stat::Interfaces(ifaces) = timeout(WAIT, stats.recv()).await.unwrap().unwrap() else {
        panic!("expected interfaces");
    };
    let names: Vec<&str> = ifaces.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["eth0", "eth1"]);
    assert!(ifaces[0].up);

    stream.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_collector_skips_bad_frames_and_entries() {
    let (connector, mut peer) = channel_socket();
    let session = Arc::new(FakeSession::new("abc123"));
    let (stream, mut stats) =
        StatsStream::start(session, &connector, StreamOptions::default())
            .await
            .unwrap();
    let _ = next_request(&mut peer).await;

    // Not a frame at all, then a frame with one bad and one unknown entry.
    peer.push("garbage");
    peer.push(&framed(
        r#"{"system-stats":{"cpu":"foo"},"unknown":{},"export":{"not-an-ip":{}}}"#,
    ));

    let stat = timeout(WAIT, stats.recv()).await.unwrap().unwrap();
    assert_eq!(stat.stat_type(), StatType::DpiStats);
    let Stat::DpiStats(dpi) = stat else {
        unreachable!()
    };
    assert!(dpi.is_empty());

    peer.push(&framed(&format!(r#"{{"system-stats":{SYSTEM_STATS_JSON}}}"#)));
    let stat = timeout(WAIT, stats.recv()).await.unwrap().unwrap();
    assert_eq!(stat.stat_type(), StatType::SystemStats);

    stream.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_collector_survives_read_failure() {
    let (connector, mut peer) = channel_socket();
    let session = Arc::new(FakeSession::new("abc123"));
    let (stream, mut stats) =
        StatsStream::start(session, &connector, StreamOptions::default())
            .await
            .unwrap();
    let _ = next_request(&mut peer).await;

    peer.push_error();
    peer.push(&framed(&format!(r#"{{"system-stats":{SYSTEM_STATS_JSON}}}"#)));

    let stat = timeout(WAIT, stats.recv()).await.unwrap().unwrap();
    assert_eq!(stat.stat_type(), StatType::SystemStats);

    timeout(WAIT, stream.shutdown()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_completes_after_appliance_hangs_up() {
    let (connector, mut peer) = channel_socket();
    let session = Arc::new(FakeSession::new("abc123"));
    let (stream, mut stats) =
        StatsStream::start(session, &connector, StreamOptions::default())
            .await
            .unwrap();
    let _ = next_request(&mut peer).await;

    // Every read now fails at once; the collector must not hog the runtime.
    peer.hang_up();
    tokio::time::sleep(Duration::from_millis(50)).await;

    timeout(WAIT, stream.shutdown()).await.unwrap().unwrap();

    let unsub = next_request(&mut peer).await;
    assert_eq!(unsub.unsubscribe, names(&StatType::ALL));
    assert!(peer.is_closed());
    assert!(timeout(WAIT, stats.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_shutdown_unsubscribes_closes_socket_then_ends_stream() {
    let (connector, mut peer) = channel_socket();
    let session = Arc::new(FakeSession::new("abc123"));
    let requested = vec![StatType::Interfaces, StatType::SystemStats];
    let (stream, mut stats) = StatsStream::start(
        session,
        &connector,
        StreamOptions {
            stats: requested.clone(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let sub = next_request(&mut peer).await;
    assert_eq!(sub.subscribe, names(&requested));
    assert!(!peer.is_closed());

    timeout(WAIT, stream.shutdown()).await.unwrap().unwrap();

    let unsub = next_request(&mut peer).await;
    assert_eq!(unsub.subscribe, None);
    assert_eq!(unsub.unsubscribe, names(&requested));
    assert_eq!(unsub.session_id, "abc123");
    assert!(peer.is_closed());

    // Exactly one subscribe and one unsubscribe went out.
    assert!(peer.sent.try_recv().is_err());
    assert!(timeout(WAIT, stats.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_shutdown_does_not_wait_for_a_slow_consumer() {
    let (connector, mut peer) = channel_socket();
    let session = Arc::new(FakeSession::new("abc123"));
    let (stream, _stats) = StatsStream::start(session, &connector, StreamOptions::default())
        .await
        .unwrap();
    let _ = next_request(&mut peer).await;

    // Nobody reads `_stats`: the collector ends up parked on publishing.
    for _ in 0..4 {
        peer.push(&framed(&format!(r#"{{"system-stats":{SYSTEM_STATS_JSON}}}"#)));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    timeout(WAIT, stream.shutdown()).await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_sends_heartbeat_every_interval() {
    let (connector, mut peer) = channel_socket();
    let session = Arc::new(FakeSession::new("abc123"));
    let (stream, _stats) =
        StatsStream::start(session.clone(), &connector, StreamOptions::default())
            .await
            .unwrap();
    let _ = next_request(&mut peer).await;

    tokio::time::sleep(Duration::from_millis(11_000)).await;
    assert_eq!(session.heartbeats(), 3);

    stream.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(session.heartbeats(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_failure_is_reported_at_shutdown() {
    let (connector, mut peer) = channel_socket();
    let session = Arc::new(FakeSession::failing("abc123"));
    let (stream, mut stats) =
        StatsStream::start(session.clone(), &connector, StreamOptions::default())
            .await
            .unwrap();
    let _ = next_request(&mut peer).await;

    tokio::time::sleep(Duration::from_secs(12)).await;
    // The loop stops after the first failure.
    assert_eq!(session.heartbeats(), 1);

    // Streaming is unaffected until shutdown.
    peer.push(&framed(&format!(r#"{{"system-stats":{SYSTEM_STATS_JSON}}}"#)));
    assert!(stats.recv().await.is_some());

    let err = stream.shutdown().await.unwrap_err();
    assert!(err.to_string().contains("heartbeat refused"));

    // Teardown still ran.
    let unsub = next_request(&mut peer).await;
    assert_eq!(unsub.unsubscribe, names(&StatType::ALL));
    assert!(peer.is_closed());
    assert!(stats.recv().await.is_none());
}

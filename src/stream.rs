// Stats stream: dial + subscribe, then run keepalive and collector tasks until shutdown.
// Keepalive errors are held in the task's JoinHandle and only surface at shutdown.

use reqwest::Url;
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::client::{SESSION_COOKIE, Session};
use crate::codec;
use crate::error::{Error, Result};
use crate::models::{Stat, StatType};
use crate::protocol::{self, Request};
use crate::transport::{Connector, FrameSink, FrameSource};

/// Heartbeat period that keeps the appliance session alive.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

const STATS_PATH: &str = "/ws/stats";

#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Categories to subscribe to; empty means all.
    pub stats: Vec<StatType>,
    pub keepalive_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            stats: Vec::new(),
            keepalive_interval: KEEPALIVE_INTERVAL,
        }
    }
}

/// Socket address for the stats stream: base address on `wss` with a fixed path.
pub fn stats_url(base: &Url) -> Result<Url> {
    let mut url = base.clone();
    url.set_scheme("wss")
        .map_err(|()| Error::Url(format!("cannot derive websocket url from {base}")))?;
    url.set_path(STATS_PATH);
    Ok(url)
}

/// A running stats stream. Call [`StatsStream::shutdown`] exactly once to
/// unsubscribe and release the socket.
pub struct StatsStream<K: FrameSink> {
    request: Request,
    sink: K,
    keepalive: JoinHandle<Result<()>>,
    keepalive_stop: oneshot::Sender<()>,
    collector: JoinHandle<()>,
    collector_stop: oneshot::Sender<()>,
}

impl<K: FrameSink> StatsStream<K> {
    /// Dials the stats socket and subscribes. Nothing is left running if any step fails.
    /// Decoded stats arrive on the returned receiver, which closes after shutdown.
    pub async fn start<S, C>(
        session: Arc<S>,
        connector: &C,
        options: StreamOptions,
    ) -> Result<(Self, mpsc::Receiver<Stat>)>
    where
        S: Session,
        C: Connector<Sink = K>,
    {
        let url = stats_url(session.base_url())?;
        let session_id = session.cookie(SESSION_COOKIE).unwrap_or_default();
        if session_id.is_empty() {
            tracing::warn!(cookie = SESSION_COOKIE, "no session cookie; subscribing anyway");
        }

        let (mut sink, source) = connector
            .connect(&url, session.base_url(), session.tls_settings())
            .await?;

        let request = Request::subscribe(&options.stats, session_id);
        protocol::send(&mut sink, &request).await?;

        let (stat_tx, stat_rx) = mpsc::channel(1);
        let (keepalive_stop, keepalive_stop_rx) = oneshot::channel();
        let (collector_stop, collector_stop_rx) = oneshot::channel();

        let keepalive = tokio::spawn(keepalive(
            session,
            options.keepalive_interval,
            keepalive_stop_rx,
        ));
        let collector = tokio::spawn(collect(source, stat_tx, collector_stop_rx));

        tracing::info!(
            url = %url,
            stats = ?request.stat_types(),
            "stats stream started"
        );

        Ok((
            Self {
                request,
                sink,
                keepalive,
                keepalive_stop,
                collector,
                collector_stop,
            },
            stat_rx,
        ))
    }

    pub fn stat_types(&self) -> Vec<StatType> {
        self.request.stat_types()
    }

    /// Stops the keepalive, unsubscribes, closes the socket, then stops the
    /// collector, which closes the stats receiver. Teardown always runs to the
    /// end; the first error (keepalive, unsubscribe, close) is returned.
    pub async fn shutdown(self) -> Result<()> {
        let StatsStream {
            request,
            mut sink,
            keepalive,
            keepalive_stop,
            collector,
            collector_stop,
        } = self;

        let _ = keepalive_stop.send(());
        let keepalive_result = keepalive.await.map_err(Error::from).and_then(|r| r);

        let unsubscribe = protocol::send(&mut sink, &request.into_unsubscribe()).await;
        let close = sink.close().await;
        drop(sink);

        let _ = collector_stop.send(());
        let collector_result = collector.await;

        tracing::info!("stats stream stopped");

        keepalive_result?;
        unsubscribe?;
        close?;
        collector_result?;
        Ok(())
    }
}

/// Sends a heartbeat now and every `period` until stopped. The first failure ends the loop.
async fn keepalive<S: Session>(
    session: Arc<S>,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
) -> Result<()> {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut stop => {
                tracing::debug!("keepalive shutting down");
                return Ok(());
            }
            _ = tick.tick() => {
                match session.heartbeat().await {
                    Ok(hb) => tracing::trace!(
                        success = hb.success,
                        ping = hb.ping,
                        session = hb.session,
                        "heartbeat"
                    ),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            operation = "heartbeat",
                            "keepalive failed; reporting at shutdown"
                        );
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Receives frames, decodes each known category and publishes the result.
/// Receive and decode failures are skipped; the loop yields once and retries.
async fn collect<R: FrameSource>(
    mut source: R,
    tx: mpsc::Sender<Stat>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = &mut stop => break,
            r = source.recv() => r,
        };

        // TODO: back off when the socket keeps failing; today a dead socket spins until shutdown.
        let frame: HashMap<String, Box<RawValue>> =
            match received.and_then(|b| codec::decode(&b)) {
                Ok(f) => f,
                Err(e) => {
                    tracing::debug!(error = %e, operation = "receive_frame", "frame dropped");
                    // A dead socket fails without suspending; let the rest of the runtime in.
                    tokio::task::yield_now().await;
                    continue;
                }
            };

        for (key, raw) in frame {
            let Ok(stat_type) = key.parse::<StatType>() else {
                continue;
            };
            let stat = match Stat::decode(stat_type, &raw) {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        stat_type = %stat_type,
                        operation = "decode_stat",
                        "stat skipped"
                    );
                    continue;
                }
            };

            tokio::select! {
                biased;
                _ = &mut stop => return,
                r = tx.send(stat) => {
                    if r.is_err() {
                        tracing::debug!("stats receiver dropped; collector exiting");
                        return;
                    }
                }
            }
        }
    }
    tracing::debug!("collector shutting down");
}

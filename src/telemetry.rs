//! Paced telemetry reporting.
//!
//! Control loops usually produce sensor readings faster, or more erratically,
//! than the controller wants them. [`InfoReporter`] decouples the two:
//! readings are published into a watch channel and a background task sends
//! the latest one at the configured [`ReportRate`]. Samples published between
//! two ticks are overwritten, never queued.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::LinkError;
use crate::connection::InfoSender;
use crate::transport::Transport;
use crate::types::{InfoSample, ReportRate};

/// Background task sending the most recently published sample.
///
/// The task ends when [`stop`](Self::stop) is called, when the reporter is
/// dropped, or when the connection behind its [`InfoSender`] disconnects.
#[derive(Debug)]
pub struct InfoReporter {
    latest: watch::Sender<Option<InfoSample>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<u64>>,
}

impl InfoReporter {
    /// Spawn the reporting task on the current tokio runtime.
    pub fn spawn<T: Transport>(sender: InfoSender<T>, rate: ReportRate) -> Self {
        let (latest, rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let ticker = rate.interval().map(|period| {
            let mut ticker = interval(period);
            // Don't burst after a stall
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let task = tokio::spawn(report_task(sender, rx, ticker, cancel.clone()));
        Self { latest, cancel, task: Some(task) }
    }

    /// Replace the sample to be sent on the next tick.
    pub fn publish(&self, sample: InfoSample) {
        self.latest.send_replace(Some(sample));
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the task and return how many reports it sent.
    pub async fn stop(mut self) -> u64 {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!("Reporter task failed: {}", e);
                0
            }),
            None => 0,
        }
    }
}

impl Drop for InfoReporter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn report_task<T: Transport>(
    sender: InfoSender<T>,
    mut latest: watch::Receiver<Option<InfoSample>>,
    mut ticker: Option<Interval>,
    cancel: CancellationToken,
) -> u64 {
    debug!("Reporter task started");
    let mut sent = 0u64;

    loop {
        match ticker.as_mut() {
            Some(ticker) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sender.closed() => break,
                    _ = ticker.tick() => {}
                }
                // Nothing new since the last report
                if !latest.has_changed().unwrap_or(false) {
                    continue;
                }
            }
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sender.closed() => break,
                    changed = latest.changed() => if changed.is_err() { break },
                }
            }
        }

        let Some(sample) = *latest.borrow_and_update() else {
            continue;
        };

        match sender.send(&sample).await {
            Ok(_) => sent += 1,
            Err(LinkError::NotConnected { state }) => {
                debug!(?state, "Connection no longer connected, reporter stopping");
                break;
            }
            Err(e) => warn!("Failed to send report: {}", e),
        }
    }

    info!("Reporter task ended ({} reports sent)", sent);
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::connection::Connection;
    use crate::packet::Packet;
    use crate::transport::memory::{MemoryPeer, MemoryTransport};
    use crate::types::{Command, MotorPowers};
    use std::net::SocketAddr;
    use std::time::Duration;

    fn controller() -> SocketAddr {
        "10.0.0.1:5000".parse().unwrap()
    }

    async fn connected() -> (Connection<MemoryTransport>, MemoryPeer) {
        let _ = tracing_subscriber::fmt::try_init();
        let (transport, mut peer) = MemoryTransport::pair(controller());
        let mut config = ClientConfig::new(controller(), "reporter");
        config.read_timeout_ms = 20;

        let mut connection =
            Connection::with_transport(transport, &config, |_: Command| {}).unwrap();
        connection.connect().await.unwrap();
        peer.next_sent().await.unwrap();
        (connection, peer)
    }

    fn sample(motor: i32) -> InfoSample {
        InfoSample { motors: MotorPowers::new(motor, 0, 0, 0), ..Default::default() }
    }

    async fn next_motor(peer: &mut MemoryPeer) -> i32 {
        let (bytes, _) = tokio::time::timeout(Duration::from_secs(1), peer.next_sent())
            .await
            .expect("report arrives")
            .unwrap();
        match Packet::decode(&bytes).unwrap() {
            Packet::Info(info) => info.sample.motors.0[0],
            other => panic!("expected info packet, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn immediate_rate_sends_each_publish() {
        let (connection, mut peer) = connected().await;
        let reporter = InfoReporter::spawn(connection.info_sender(), ReportRate::Immediate);

        reporter.publish(sample(1));
        assert_eq!(next_motor(&mut peer).await, 1);
        reporter.publish(sample(2));
        assert_eq!(next_motor(&mut peer).await, 2);

        assert_eq!(reporter.stop().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn paced_rate_keeps_only_latest() {
        let (connection, mut peer) = connected().await;
        let reporter = InfoReporter::spawn(connection.info_sender(), ReportRate::Hz(10));

        // Let the first (immediate) tick pass with nothing published
        tokio::time::sleep(Duration::from_millis(10)).await;
        for motor in 1..=5 {
            reporter.publish(sample(motor));
        }
        assert_eq!(next_motor(&mut peer).await, 5);

        // No new sample, no new report
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(peer.try_next_sent().is_none());

        assert_eq!(reporter.stop().await, 1);
    }

    #[tokio::test]
    async fn reporter_stops_when_connection_disconnects() {
        let (mut connection, _peer) = connected().await;
        let reporter = InfoReporter::spawn(connection.info_sender(), ReportRate::Hz(50));
        assert!(reporter.is_running());

        connection.disconnect().await;
        tokio::time::timeout(Duration::from_secs(1), async {
            while reporter.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("reporter stops after disconnect");
    }
}

//! Cooperative control loop — the single owner of all mutable state.
//!
//! Every engine transition, registry update and persistence write happens
//! on this loop. Inputs arrive over channels; timeouts are polled once per
//! tick against the monotonic clock.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::bridge::CommandBridge;
use crate::ports::{
    BusEvent, BusPublisher, InboundFrame, KeyValueStore, MonotonicClock, RadioTransport, WallClock,
};

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Period of engine timeout polling and telemetry draining.
    pub tick: Duration,
    /// Period of wall-clock broadcasts to the nodes.
    pub time_sync: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            time_sync: Duration::from_secs(60),
        }
    }
}

/// Drives a [`CommandBridge`] from radio frames, bus events and time.
pub struct ControlLoop<R, B, S, M, W> {
    bridge: CommandBridge<R, B, S>,
    frames: mpsc::Receiver<InboundFrame>,
    bus_events: mpsc::Receiver<BusEvent>,
    monotonic: M,
    wall: W,
    config: LoopConfig,
}

impl<R, B, S, M, W> ControlLoop<R, B, S, M, W>
where
    R: RadioTransport + Sync,
    B: BusPublisher + Sync,
    S: KeyValueStore + Sync,
    M: MonotonicClock,
    W: WallClock,
{
    pub fn new(
        bridge: CommandBridge<R, B, S>,
        frames: mpsc::Receiver<InboundFrame>,
        bus_events: mpsc::Receiver<BusEvent>,
        monotonic: M,
        wall: W,
        config: LoopConfig,
    ) -> Self {
        Self {
            bridge,
            frames,
            bus_events,
            monotonic,
            wall,
            config,
        }
    }

    /// Run until `shutdown` resolves, then hand the bridge back.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> CommandBridge<R, B, S> {
        let mut tick = tokio::time::interval(self.config.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut time_sync = tokio::time::interval(self.config.time_sync);
        time_sync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            tick = ?self.config.tick,
            time_sync = ?self.config.time_sync,
            "control loop started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                Some(frame) = self.frames.recv() => self.on_frame(frame).await,
                Some(event) = self.bus_events.recv() => self.on_bus_event(event).await,
                _ = tick.tick() => self.bridge.on_tick(self.monotonic.now()).await,
                _ = time_sync.tick() => {
                    self.bridge
                        .broadcast_time_sync(self.wall.now(), self.monotonic.now())
                        .await;
                }
            }
        }

        tracing::info!("control loop stopped");
        self.bridge
    }

    async fn on_frame(&mut self, frame: InboundFrame) {
        let now = self.monotonic.now();
        if let Err(err) = self.bridge.on_frame(frame.from, &frame.bytes, now).await {
            tracing::warn!(%err, peer = %frame.from, len = frame.bytes.len(), "dropping radio frame");
        }
    }

    async fn on_bus_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::Connected => {
                tracing::info!("bus connected");
                self.bridge.on_bus_connected().await;
            }
            BusEvent::Disconnected => tracing::warn!("bus disconnected"),
            BusEvent::Message(message) => {
                let now = self.monotonic.now();
                if let Err(err) = self.bridge.on_bus_message(&message, now).await {
                    tracing::warn!(%err, topic = %message.topic, "rejected bus request");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::TelemetryMailbox;
    use crate::ports::{BusMessage, SystemMonotonicClock};
    use crate::topics::Topics;
    use relaysync_domain::channel::RelayChannel;
    use relaysync_domain::error::RelaySyncError;
    use relaysync_domain::peer::PeerAddress;
    use relaysync_domain::time::WallTime;
    use relaysync_domain::wire::{Frame, HelloPacket, ScheduleAckPacket};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct SpyRadio {
        sent: Mutex<Vec<Frame>>,
    }

    impl SpyRadio {
        fn count(&self, kind: &str) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|frame| frame.kind() == kind)
                .count()
        }
    }

    impl RadioTransport for SpyRadio {
        fn send(
            &self,
            _to: PeerAddress,
            frame: &[u8],
        ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
            self.sent.lock().unwrap().push(Frame::decode(frame).unwrap());
            async { Ok(()) }
        }
    }

    #[derive(Default)]
    struct SpyBus {
        published: Mutex<Vec<(String, String)>>,
    }

    impl BusPublisher for SpyBus {
        fn publish(
            &self,
            topic: &str,
            payload: &str,
            _retained: bool,
        ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_owned(), payload.to_owned()));
            async { Ok(()) }
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<HashMap<String, String>>,
    }

    impl KeyValueStore for MemoryStore {
        fn get(
            &self,
            key: &str,
        ) -> impl Future<Output = Result<Option<String>, RelaySyncError>> + Send {
            let value = self.values.lock().unwrap().get(key).cloned();
            async move { Ok(value) }
        }

        fn put(
            &self,
            key: &str,
            value: &str,
        ) -> impl Future<Output = Result<(), RelaySyncError>> + Send {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_owned(), value.to_owned());
            async { Ok(()) }
        }
    }

    struct FixedWallClock;

    impl WallClock for FixedWallClock {
        fn now(&self) -> WallTime {
            WallTime {
                minute_of_day: 600,
                weekday_mon0: 0,
                valid: true,
            }
        }
    }

    const NODE: PeerAddress = PeerAddress::new([0x24, 0x6F, 0x28, 0, 0, 1]);
    const SCHEDULE: &str = r#"[{"at":"07:30","state":"ON","days":"1111100"}]"#;

    struct Inputs {
        frames: mpsc::Sender<InboundFrame>,
        bus: mpsc::Sender<BusEvent>,
        stop: oneshot::Sender<()>,
    }

    fn setup(
        radio: &Arc<SpyRadio>,
        bus: &Arc<SpyBus>,
        store: &Arc<MemoryStore>,
    ) -> (
        ControlLoop<
            Arc<SpyRadio>,
            Arc<SpyBus>,
            Arc<MemoryStore>,
            SystemMonotonicClock,
            FixedWallClock,
        >,
        Inputs,
        oneshot::Receiver<()>,
    ) {
        let bridge = CommandBridge::new(
            Arc::clone(radio),
            Arc::clone(bus),
            Arc::clone(store),
            Topics::new("relaysync"),
            Arc::new(TelemetryMailbox::new()),
        );
        let (frames_tx, frames_rx) = mpsc::channel(16);
        let (bus_tx, bus_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = oneshot::channel();
        let control = ControlLoop::new(
            bridge,
            frames_rx,
            bus_rx,
            SystemMonotonicClock::default(),
            FixedWallClock,
            LoopConfig::default(),
        );
        let inputs = Inputs {
            frames: frames_tx,
            bus: bus_tx,
            stop: stop_tx,
        };
        (control, inputs, stop_rx)
    }

    fn frame(frame: Frame) -> InboundFrame {
        InboundFrame {
            from: NODE,
            bytes: frame.encode(),
        }
    }

    fn schedule_request() -> BusEvent {
        BusEvent::Message(BusMessage::new("relaysync/relay/1/schedule/set", SCHEDULE))
    }

    async fn pause() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_complete_sync_through_the_loop() {
        let radio = Arc::new(SpyRadio::default());
        let bus = Arc::new(SpyBus::default());
        let store = Arc::new(MemoryStore::default());
        let (control, inputs, stop) = setup(&radio, &bus, &store);

        let driver = async move {
            let hello = Frame::Hello(HelloPacket { channel: 1, ms: 0 });
            inputs.frames.send(frame(hello)).await.unwrap();
            pause().await;
            inputs.bus.send(schedule_request()).await.unwrap();
            pause().await;
            let ack = Frame::ScheduleAck(ScheduleAckPacket {
                channel: 1,
                ok: true,
                count: 1,
                ms: 0,
            });
            inputs.frames.send(frame(ack)).await.unwrap();
            pause().await;
            inputs.stop.send(()).unwrap();
        };
        let (bridge, ()) = tokio::join!(
            control.run(async {
                let _ = stop.await;
            }),
            driver
        );

        let channel = RelayChannel::new(1).unwrap();
        assert!(!bridge.is_syncing(channel));
        assert_eq!(bridge.active_schedule(channel).len(), 1);
        assert_eq!(radio.count("ScheduleRules"), 1);
        assert_eq!(
            store.values.lock().unwrap().get("schedule_1").map(String::as_str),
            Some(SCHEDULE)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_retry_and_time_out_on_ticks() {
        let radio = Arc::new(SpyRadio::default());
        let bus = Arc::new(SpyBus::default());
        let store = Arc::new(MemoryStore::default());
        let (control, inputs, stop) = setup(&radio, &bus, &store);

        let driver = async move {
            let hello = Frame::Hello(HelloPacket { channel: 1, ms: 0 });
            inputs.frames.send(frame(hello)).await.unwrap();
            pause().await;
            inputs.bus.send(schedule_request()).await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            inputs.stop.send(()).unwrap();
        };
        let (bridge, ()) = tokio::join!(
            control.run(async {
                let _ = stop.await;
            }),
            driver
        );

        assert!(!bridge.is_syncing(RelayChannel::new(1).unwrap()));
        assert_eq!(radio.count("ScheduleRules"), 2);
        let acks: Vec<_> = bus
            .published
            .lock()
            .unwrap()
            .iter()
            .filter(|(topic, _)| topic == "relaysync/relay/1/schedule/slave/ack")
            .map(|(_, payload)| payload.clone())
            .collect();
        assert_eq!(acks, vec!["ERROR".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_republish_schedules_when_bus_connects() {
        let radio = Arc::new(SpyRadio::default());
        let bus = Arc::new(SpyBus::default());
        let store = Arc::new(MemoryStore::default());
        let (control, inputs, stop) = setup(&radio, &bus, &store);

        let driver = async move {
            inputs.bus.send(BusEvent::Connected).await.unwrap();
            inputs.bus.send(BusEvent::Disconnected).await.unwrap();
            pause().await;
            inputs.stop.send(()).unwrap();
        };
        tokio::join!(
            control.run(async {
                let _ = stop.await;
            }),
            driver
        );

        let current = bus
            .published
            .lock()
            .unwrap()
            .iter()
            .filter(|(topic, _)| topic.ends_with("/schedule/current"))
            .count();
        assert_eq!(current, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_broadcast_time_sync_periodically() {
        let radio = Arc::new(SpyRadio::default());
        let bus = Arc::new(SpyBus::default());
        let store = Arc::new(MemoryStore::default());
        let (control, inputs, stop) = setup(&radio, &bus, &store);

        let driver = async move {
            let hello = Frame::Hello(HelloPacket { channel: 1, ms: 0 });
            inputs.frames.send(frame(hello)).await.unwrap();
            tokio::time::sleep(Duration::from_secs(125)).await;
            inputs.stop.send(()).unwrap();
        };
        tokio::join!(
            control.run(async {
                let _ = stop.await;
            }),
            driver
        );

        let syncs = radio.count("TimeSync");
        assert!((2..=3).contains(&syncs), "got {syncs} time syncs");
    }

    #[tokio::test(start_paused = true)]
    async fn should_survive_garbage_frames() {
        let radio = Arc::new(SpyRadio::default());
        let bus = Arc::new(SpyBus::default());
        let store = Arc::new(MemoryStore::default());
        let (control, inputs, stop) = setup(&radio, &bus, &store);

        let driver = async move {
            let garbage = InboundFrame {
                from: NODE,
                bytes: vec![0xEE, 1, 2],
            };
            inputs.frames.send(garbage).await.unwrap();
            pause().await;
            inputs.stop.send(()).unwrap();
        };
        let (bridge, ()) = tokio::join!(
            control.run(async {
                let _ = stop.await;
            }),
            driver
        );

        assert_eq!(bridge.peers().len(), 1);
    }
}

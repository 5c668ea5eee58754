//! Command bridge — turns bus requests and radio frames into engine calls,
//! and engine outcomes into publications and persistence.
//!
//! All state lives here and is mutated only from the control loop.

use std::sync::Arc;

use relaysync_domain::channel::{PerChannel, RelayChannel};
use relaysync_domain::error::{DeliveryError, RelaySyncError};
use relaysync_domain::event::SyncEvent;
use relaysync_domain::json::{parse_schedule, to_json};
use relaysync_domain::peer::{PeerAddress, PeerRegistry, Registration};
use relaysync_domain::schedule::{RelaySchedule, SwitchState};
use relaysync_domain::time::{Millis, WallTime};
use relaysync_domain::wire::{
    CommandPacket, ExecutedPacket, Frame, RelayCommand, ScheduleAckPacket, TimeSyncPacket,
};

use crate::mailbox::{TelemetryMailbox, TelemetryReading};
use crate::ports::{BusMessage, BusPublisher, KeyValueStore, RadioTransport};
use crate::sync_engine::{MAX_RETRIES, ScheduleSyncEngine, SyncRequest, SyncState, TickOutcome};
use crate::topics::{InboundTopic, Topics};

/// Payload published on `schedule/slave/ack` after a successful sync.
pub const ACK_OK: &str = "OK";
/// Payload published on `schedule/slave/ack` after any failure.
pub const ACK_ERROR: &str = "ERROR";

/// A node is considered offline when no telemetry arrived for this long.
pub const LINK_TIMEOUT_MS: u32 = 5_000;

/// Tracks telemetry liveness and reports transitions only.
#[derive(Debug, Clone, Copy, Default)]
struct LinkMonitor {
    last_reading: Option<Millis>,
    online: bool,
}

impl LinkMonitor {
    /// Returns `true` when the link just came online.
    fn on_reading(&mut self, now: Millis) -> bool {
        self.last_reading = Some(now);
        !std::mem::replace(&mut self.online, true)
    }

    /// Returns `true` when the link just went offline.
    fn on_tick(&mut self, now: Millis) -> bool {
        let Some(last) = self.last_reading else {
            return false;
        };
        if self.online && now.elapsed_since(last) > LINK_TIMEOUT_MS {
            self.online = false;
            return true;
        }
        false
    }
}

/// Glue between the message bus, the radio and the per-channel engines.
pub struct CommandBridge<R, B, S> {
    radio: R,
    bus: B,
    store: S,
    topics: Topics,
    peers: PeerRegistry,
    engines: PerChannel<ScheduleSyncEngine>,
    observed: PerChannel<Option<SwitchState>>,
    telemetry: Arc<TelemetryMailbox>,
    link: LinkMonitor,
}

impl<R, B, S> CommandBridge<R, B, S>
where
    R: RadioTransport + Sync,
    B: BusPublisher + Sync,
    S: KeyValueStore + Sync,
{
    /// Create a bridge with empty schedules on every channel.
    pub fn new(
        radio: R,
        bus: B,
        store: S,
        topics: Topics,
        telemetry: Arc<TelemetryMailbox>,
    ) -> Self {
        Self {
            radio,
            bus,
            store,
            topics,
            peers: PeerRegistry::new(),
            engines: PerChannel::from_fn(|channel| {
                ScheduleSyncEngine::new(channel, RelaySchedule::empty())
            }),
            observed: PerChannel::default(),
            telemetry,
            link: LinkMonitor::default(),
        }
    }

    // ── Startup ─────────────────────────────────────────────────────

    /// Load every channel's persisted schedule as its active schedule.
    ///
    /// Missing, unreadable or malformed entries leave the channel empty.
    pub async fn restore(&mut self) {
        for channel in RelayChannel::ALL {
            let key = channel.storage_key();
            let schedule = match self.store.get(&key).await {
                Ok(Some(text)) => parse_schedule(&text).unwrap_or_else(|err| {
                    tracing::warn!(channel = %channel, error = %err, "discarding malformed persisted schedule");
                    RelaySchedule::empty()
                }),
                Ok(None) => RelaySchedule::empty(),
                Err(err) => {
                    tracing::warn!(channel = %channel, error = %err, "failed to load persisted schedule");
                    RelaySchedule::empty()
                }
            };
            tracing::info!(channel = %channel, rules = schedule.len(), "restored schedule");
            self.engines[channel].restore(schedule);
        }
    }

    /// Republish every channel's active schedule (retained).
    pub async fn on_bus_connected(&self) {
        for channel in RelayChannel::ALL {
            self.publish_current(channel).await;
        }
    }

    // ── Bus side ────────────────────────────────────────────────────

    /// Dispatch a message received on a subscribed topic.
    ///
    /// # Errors
    ///
    /// Returns the parse or validation error of a malformed payload. The
    /// failure has already been reported on the bus where applicable.
    pub async fn on_bus_message(
        &mut self,
        message: &BusMessage,
        now: Millis,
    ) -> Result<(), RelaySyncError> {
        match self.topics.parse(&message.topic) {
            Some(InboundTopic::ScheduleSet(channel)) => {
                self.on_schedule_set_request(channel, &message.payload, now)
                    .await
            }
            Some(InboundTopic::RelaySet(channel)) => {
                self.on_relay_command_request(channel, &message.payload, now)
                    .await
            }
            None => {
                tracing::debug!(topic = %message.topic, "ignoring message on unknown topic");
                Ok(())
            }
        }
    }

    /// Ask for `payload` (schedule JSON) to become `channel`'s schedule.
    ///
    /// # Errors
    ///
    /// Returns the parse, validation or capacity error of a malformed
    /// payload; `ERROR` is published and the engine is left untouched.
    pub async fn on_schedule_set_request(
        &mut self,
        channel: RelayChannel,
        payload: &str,
        now: Millis,
    ) -> Result<(), RelaySyncError> {
        let desired = match parse_schedule(payload) {
            Ok(schedule) => schedule,
            Err(err) => {
                self.publish(&self.topics.schedule_ack(channel), ACK_ERROR, false)
                    .await;
                return Err(err);
            }
        };
        let rules = desired.len();
        let request = self.engines[channel].request_sync(desired, now);
        match request {
            SyncRequest::AlreadyActive => {
                tracing::info!(channel = %channel, rules, "schedule already active");
                self.publish_current(channel).await;
            }
            SyncRequest::Transmit(packet) => {
                tracing::info!(channel = %channel, rules, "schedule sync started");
                self.broadcast(&Frame::ScheduleRules(packet)).await;
            }
        }
        Ok(())
    }

    /// Send a direct relay command once to every peer.
    ///
    /// No acknowledgement is expected and nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCommand`](relaysync_domain::error::ValidationError::InvalidCommand)
    /// when `payload` is not `ON`, `OFF` or `TOGGLE`.
    pub async fn on_relay_command_request(
        &mut self,
        channel: RelayChannel,
        payload: &str,
        now: Millis,
    ) -> Result<(), RelaySyncError> {
        let command: RelayCommand = payload.parse()?;
        tracing::info!(channel = %channel, command = %command, "relay command");
        let packet = CommandPacket::for_channel(channel, command, now.get());
        self.broadcast(&Frame::Command(packet)).await;
        Ok(())
    }

    // ── Radio side ──────────────────────────────────────────────────

    /// Handle a raw frame received from `from`.
    ///
    /// The sender is registered before decoding.
    ///
    /// # Errors
    ///
    /// Returns a wire error for undecodable frames, or a validation error
    /// for a frame naming an unknown channel.
    pub async fn on_frame(
        &mut self,
        from: PeerAddress,
        bytes: &[u8],
        now: Millis,
    ) -> Result<(), RelaySyncError> {
        self.register_peer(from, now);
        let frame = Frame::decode(bytes)?;
        tracing::debug!(peer = %from, kind = frame.kind(), "frame received");
        match frame {
            Frame::ScheduleAck(packet) => self.on_inbound_ack(packet).await,
            Frame::Executed(packet) => self.on_inbound_executed(packet).await,
            Frame::Telemetry(packet) => {
                self.telemetry.deposit(TelemetryReading { from, packet });
                Ok(())
            }
            Frame::Hello(hello) => {
                tracing::debug!(peer = %from, channel = hello.channel, "hello");
                Ok(())
            }
            other => {
                tracing::debug!(peer = %from, kind = other.kind(), "ignoring hub-bound frame");
                Ok(())
            }
        }
    }

    /// Route an acknowledgement to its channel's engine.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the channel is out of range.
    pub async fn on_inbound_ack(&mut self, packet: ScheduleAckPacket) -> Result<(), RelaySyncError> {
        let channel = RelayChannel::new(packet.channel)?;
        tracing::debug!(channel = %channel, ok = packet.ok, rules = packet.count, "schedule ack");
        let event = self.engines[channel].on_ack(packet.ok);
        match event {
            Some(event) => self.finish(event).await,
            None => tracing::debug!(channel = %channel, "ignoring ack with no sync in flight"),
        }
        Ok(())
    }

    /// Record that the node switched a relay.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the channel is out of range.
    pub async fn on_inbound_executed(
        &mut self,
        packet: ExecutedPacket,
    ) -> Result<(), RelaySyncError> {
        let channel = RelayChannel::new(packet.channel)?;
        tracing::info!(
            channel = %channel,
            state = %packet.state,
            minute_of_day = packet.minute_of_day,
            "relay executed"
        );
        self.publish(&self.topics.executed(channel), packet.state.as_str(), false)
            .await;
        self.observe(channel, packet.state).await;
        Ok(())
    }

    /// Publish a telemetry reading and the relay states it reports.
    pub async fn on_telemetry(&mut self, reading: TelemetryReading, now: Millis) {
        self.register_peer(reading.from, now);
        match serde_json::to_string(&reading.packet) {
            Ok(json) => self.publish(&self.topics.telemetry(), &json, false).await,
            Err(err) => tracing::warn!(error = %err, "failed to serialize telemetry"),
        }
        for (channel, state) in RelayChannel::ALL.into_iter().zip(reading.packet.relays) {
            self.observe(channel, state).await;
        }
        if self.link.on_reading(now) {
            tracing::info!(peer = %reading.from, "link online");
            self.publish(&self.topics.link(), "online", true).await;
        }
    }

    // ── Time ────────────────────────────────────────────────────────

    /// Advance every engine, drain the telemetry mailbox and check liveness.
    pub async fn on_tick(&mut self, now: Millis) {
        for channel in RelayChannel::ALL {
            let outcome = self.engines[channel].on_tick(now);
            match outcome {
                Some(TickOutcome::Retransmit(packet)) => {
                    let attempt = match self.engines[channel].state() {
                        SyncState::AwaitingAck { retries_left, .. } => {
                            MAX_RETRIES - retries_left + 1
                        }
                        SyncState::Idle => 0,
                    };
                    tracing::info!(channel = %channel, attempt, "retransmitting schedule");
                    self.broadcast(&Frame::ScheduleRules(packet)).await;
                }
                Some(TickOutcome::Finished(event)) => self.finish(event).await,
                None => {}
            }
        }
        if let Some(reading) = self.telemetry.take() {
            self.on_telemetry(reading, now).await;
        }
        if self.link.on_tick(now) {
            tracing::warn!("link offline");
            self.publish(&self.topics.link(), "offline", true).await;
        }
    }

    /// Distribute the wall-clock time to every peer, fire-and-forget.
    pub async fn broadcast_time_sync(&self, time: WallTime, now: Millis) {
        if !time.valid {
            tracing::warn!("broadcasting unsynchronised wall time");
        }
        let packet = TimeSyncPacket {
            time,
            ms: now.get(),
        };
        self.broadcast(&Frame::TimeSync(packet)).await;
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    #[must_use]
    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    #[must_use]
    pub fn active_schedule(&self, channel: RelayChannel) -> &RelaySchedule {
        self.engines[channel].active()
    }

    #[must_use]
    pub fn is_syncing(&self, channel: RelayChannel) -> bool {
        !self.engines[channel].is_idle()
    }

    #[must_use]
    pub fn observed_state(&self, channel: RelayChannel) -> Option<SwitchState> {
        self.observed[channel]
    }

    // ── Internals ───────────────────────────────────────────────────

    fn register_peer(&mut self, address: PeerAddress, now: Millis) {
        match self.peers.touch_or_register(address, now) {
            Ok(Registration::Added) => {
                tracing::info!(peer = %address, known = self.peers.len(), "peer registered");
            }
            Ok(Registration::Refreshed) => {}
            Err(err) => tracing::warn!(peer = %address, error = %err, "peer dropped"),
        }
    }

    /// Persist and publish the outcome of a sync cycle.
    async fn finish(&self, event: SyncEvent) {
        match event {
            SyncEvent::Accepted { channel, schedule } => {
                tracing::info!(channel = %channel, rules = schedule.len(), "schedule accepted");
                let json = to_json(&schedule);
                if let Err(err) = self.store.put(&channel.storage_key(), &json).await {
                    tracing::warn!(channel = %channel, error = %err, "failed to persist schedule");
                }
                self.publish(&self.topics.schedule_current(channel), &json, true)
                    .await;
                self.publish(&self.topics.schedule_ack(channel), ACK_OK, false)
                    .await;
            }
            SyncEvent::Failed { channel, failure } => {
                tracing::info!(channel = %channel, failure = %failure, "schedule sync failed");
                self.publish(&self.topics.schedule_ack(channel), ACK_ERROR, false)
                    .await;
            }
        }
    }

    async fn observe(&mut self, channel: RelayChannel, state: SwitchState) {
        if self.observed[channel] == Some(state) {
            return;
        }
        self.observed[channel] = Some(state);
        self.publish(&self.topics.state(channel), state.as_str(), true)
            .await;
    }

    async fn publish_current(&self, channel: RelayChannel) {
        let json = to_json(self.engines[channel].active());
        self.publish(&self.topics.schedule_current(channel), &json, true)
            .await;
    }

    /// Best-effort publication; skipped while the bus is down.
    async fn publish(&self, topic: &str, payload: &str, retained: bool) {
        if !self.bus.is_connected() {
            tracing::warn!(topic, "bus disconnected, skipping publication");
            return;
        }
        if let Err(err) = self.bus.publish(topic, payload, retained).await {
            tracing::warn!(topic, error = %err, "publication failed");
        }
    }

    /// Send `frame` to every known peer, best-effort.
    async fn broadcast(&self, frame: &Frame) {
        match self.fan_out(frame).await {
            Ok(0) => tracing::warn!(kind = frame.kind(), peers = self.peers.len(), "frame reached no peer"),
            Ok(delivered) => tracing::debug!(kind = frame.kind(), delivered, "frame broadcast"),
            Err(err) => tracing::debug!(kind = frame.kind(), error = %err, "frame not sent"),
        }
    }

    async fn fan_out(&self, frame: &Frame) -> Result<usize, DeliveryError> {
        if self.peers.is_empty() {
            return Err(DeliveryError::NoPeers);
        }
        let bytes = frame.encode();
        let peers: Vec<PeerAddress> = self.peers.all().collect();
        let mut delivered = 0;
        for peer in peers {
            match self.radio.send(peer, &bytes).await {
                Ok(()) => delivered += 1,
                Err(err) => tracing::warn!(peer = %peer, error = %err, "radio send failed"),
            }
        }
        Ok(delivered)
    }
}

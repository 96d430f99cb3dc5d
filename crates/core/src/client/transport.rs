//! Client transport: lane buffers, bundle assembly and send dispatch.
//!
//! The transport is owned by a single actor (see [`super::worker`]), so every
//! method takes `&mut self` and no lane state is shared across tasks. Send
//! tasks run on the scheduler and report back through an outcome channel; the
//! owner feeds each [`SendOutcome`] to [`ClientTransport::on_send_complete`].
//!
//! Readiness: bundles are only assembled once a cipher is installed (or
//! `debug_mode` is on) and no salvage is in progress. Until then items simply
//! accumulate in their lanes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracelane_common::collections::{BoundedQueue, TryPushError};
use tracelane_common::error::ErrorClassification;
use tracelane_domain::{
    Bundle, BundleBody, ClientConfig, Event, LaneItem, PriorityLane, SalvageSnapshot,
};
use tracing::{debug, error, info, warn};

use super::error::{SendError, TransportError};
use super::ports::BundleSender;
use super::scheduler::{ConcurrentTaskScheduler, SchedulerTask};
use crate::crypto::PayloadCipher;

/// Result of one send attempt, routed back to the transport owner.
#[derive(Debug)]
pub struct SendOutcome {
    pub bundle: Bundle,
    pub result: Result<(), SendError>,
}

/// What the transport did with a completed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendDisposition {
    Delivered,
    /// Pushed back onto its lane tail for another attempt.
    Requeued { lane: PriorityLane, retry_count: u32, error: SendError },
    /// Given up on; the data is lost.
    Dropped { lane: PriorityLane, reason: String },
}

impl fmt::Display for SendDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => f.write_str("delivered"),
            Self::Requeued { lane, retry_count, error } => {
                write!(f, "{lane} bundle requeued (attempt {retry_count}): {error}")
            }
            Self::Dropped { lane, reason } => write!(f, "{lane} bundle dropped: {reason}"),
        }
    }
}

/// One bundle waiting for, or holding, a scheduler slot.
pub struct SendTask {
    bundle: Bundle,
    sender: Arc<dyn BundleSender>,
    outcomes: mpsc::UnboundedSender<SendOutcome>,
    timeout: Duration,
    debug_mode: bool,
}

impl SendTask {
    /// Recover the bundle of a task that never ran.
    pub fn into_bundle(self) -> Bundle {
        self.bundle
    }
}

impl SchedulerTask for SendTask {
    fn run(self) -> BoxFuture<'static, ()> {
        async move {
            let result = if self.debug_mode {
                match serde_json::to_string(&self.bundle.to_wire()) {
                    Ok(body) => {
                        info!(lane = %self.bundle.lane, body = %body, "debug mode: bundle not sent");
                        Ok(())
                    }
                    Err(e) => Err(SendError::Encode(e.to_string())),
                }
            } else {
                self.sender.send(&self.bundle.to_wire(), self.timeout).await
            };

            // Receiver gone means the owner has already finished salvage.
            let _ = self.outcomes.send(SendOutcome { bundle: self.bundle, result });
        }
        .boxed()
    }
}

/// Priority-lane buffers plus the machinery that drains them.
pub struct ClientTransport {
    config: ClientConfig,
    lanes: [BoundedQueue<LaneItem>; 3],
    cipher: Option<Arc<dyn PayloadCipher>>,
    scheduler: ConcurrentTaskScheduler<SendTask>,
    sender: Arc<dyn BundleSender>,
    outcomes: mpsc::UnboundedSender<SendOutcome>,
    flush_deadline: Option<Instant>,
    saving: bool,
    in_flight: usize,
    salvaged: Vec<Bundle>,
}

impl ClientTransport {
    /// Create a transport. Completed sends are reported on `outcomes`.
    pub fn new(
        config: ClientConfig,
        sender: Arc<dyn BundleSender>,
        outcomes: mpsc::UnboundedSender<SendOutcome>,
    ) -> Self {
        let lanes = std::array::from_fn(|_| BoundedQueue::new(config.max_lane_items.max(1)));
        let scheduler =
            ConcurrentTaskScheduler::new(config.max_concurrent_tasks, config.max_backlog_tasks.max(1));
        Self {
            config,
            lanes,
            cipher: None,
            scheduler,
            sender,
            outcomes,
            flush_deadline: None,
            saving: false,
            in_flight: 0,
            salvaged: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Install the payload cipher and start draining anything already buffered.
    pub fn set_cipher(&mut self, cipher: Arc<dyn PayloadCipher>) {
        self.cipher = Some(cipher);
        debug!("payload cipher installed");
        self.arm_flush_timer();
    }

    pub fn has_cipher(&self) -> bool {
        self.cipher.is_some()
    }

    /// Append an item to a lane and arm the flush timer if ready.
    ///
    /// Fails fast when the lane is at capacity.
    pub fn enqueue(&mut self, lane: PriorityLane, item: LaneItem) -> Result<(), TransportError> {
        let queue = &self.lanes[lane.index()];
        match queue.try_push(item) {
            Ok(()) => {}
            Err(TryPushError::Full(_)) => {
                return Err(TransportError::QueueOverflow { lane, capacity: queue.capacity() });
            }
            Err(TryPushError::Closed(_)) => return Err(TransportError::Stopped),
        }
        self.arm_flush_timer();
        Ok(())
    }

    /// Put a salvaged snapshot back in front of each lane.
    ///
    /// Replayed items predate anything buffered this session and were
    /// accepted once already, so lane capacity does not apply to them.
    pub fn replay(&mut self, snapshot: SalvageSnapshot) -> usize {
        let mut restored = 0;
        for (lane, items) in snapshot.into_lanes() {
            restored += items.len();
            self.lanes[lane.index()].restore_front(items);
        }
        if restored > 0 {
            info!(items = restored, "salvaged items restored");
            self.arm_flush_timer();
        }
        restored
    }

    /// Convenience for a freshly collected event.
    pub fn enqueue_event(&mut self, lane: PriorityLane, event: Event) -> Result<(), TransportError> {
        self.enqueue(lane, LaneItem::fresh(event))
    }

    /// Items currently buffered in a lane.
    pub fn pending(&self, lane: PriorityLane) -> usize {
        self.lanes[lane.index()].len()
    }

    pub fn pending_total(&self) -> usize {
        self.lanes.iter().map(BoundedQueue::len).sum()
    }

    /// Sends dispatched whose outcome has not come back yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// When the pending flush fires, if one is armed.
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.flush_deadline
    }

    fn is_ready(&self) -> bool {
        (self.cipher.is_some() || self.config.debug_mode)
            && !self.saving
            && !self.scheduler.is_stopped()
    }

    /// Start the debounce timer. A timer that is already pending is left
    /// untouched, so the first enqueue of a burst decides when it fires.
    fn arm_flush_timer(&mut self) {
        if self.flush_deadline.is_some() || !self.is_ready() || self.pending_total() == 0 {
            return;
        }
        self.flush_deadline = Some(Instant::now() + self.config.transport_delay());
    }

    /// Debounce timer fired: assemble and dispatch bundles.
    pub fn on_flush_timer(&mut self) {
        self.flush_deadline = None;
        self.pump();
    }

    /// Assemble bundles until `max_concurrent_tasks` sends are outstanding.
    ///
    /// Counted by outcomes received rather than scheduler slots: a task frees
    /// its slot only after its outcome is sent.
    fn pump(&mut self) {
        while self.is_ready() && self.in_flight < self.config.max_concurrent_tasks {
            match self.get_next_data() {
                Ok(Some(bundle)) => self.schedule(bundle),
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "bundle assembly failed; will retry on next flush");
                    self.arm_flush_timer();
                    break;
                }
            }
        }
    }

    fn schedule(&mut self, bundle: Bundle) {
        let task = SendTask {
            bundle,
            sender: Arc::clone(&self.sender),
            outcomes: self.outcomes.clone(),
            timeout: self.config.request_timeout(),
            debug_mode: self.config.debug_mode,
        };
        match self.scheduler.add_task(task) {
            Ok(()) => self.in_flight += 1,
            Err(rejected) => {
                let bundle = rejected.into_inner().into_bundle();
                warn!(lane = %bundle.lane, "scheduler rejected bundle; returning it to its lane");
                self.lanes[bundle.lane.index()].restore_front(vec![bundle.into_item()]);
            }
        }
    }

    /// Assemble the next bundle, highest-priority lane first.
    ///
    /// A bundle never spans lanes: the wire body is keyed by a single lane,
    /// so the size cap applies per bundle rather than summed across lanes and
    /// the next lane is only visited once the current one is empty. Standalone items (sealed, retried or
    /// pre-assembled) travel alone; plain events are merged up to
    /// `single_max_report_size`. Returns `None` once every lane is empty.
    pub fn get_next_data(&mut self) -> Result<Option<Bundle>, TransportError> {
        if self.cipher.is_none() && !self.config.debug_mode {
            return Err(TransportError::EncryptionNotReady);
        }
        let limit = self.config.single_max_report_size.max(1);

        for lane in PriorityLane::ALL {
            let queue = &self.lanes[lane.index()];
            let mut events: Vec<Event> = Vec::new();

            while events.len() < limit {
                match queue.peek_map(LaneItem::is_standalone) {
                    None => break,
                    Some(true) if events.is_empty() => {
                        let Some(item) = queue.try_pop() else { break };
                        return self.seal_standalone(lane, item).map(Some);
                    }
                    Some(true) => break,
                    Some(false) => {
                        if let Some(LaneItem { body: BundleBody::Plain(batch), .. }) = queue.try_pop()
                        {
                            events.extend(batch);
                        }
                    }
                }
            }

            if !events.is_empty() {
                return self.seal_events(lane, events).map(Some);
            }
        }
        Ok(None)
    }

    fn seal_standalone(&self, lane: PriorityLane, item: LaneItem) -> Result<Bundle, TransportError> {
        let retry_count = item.retry_count;
        let body = match item.body {
            BundleBody::Plain(events) if !self.config.debug_mode => match self.encrypt(&events) {
                Ok(sealed) => BundleBody::Cipher(sealed),
                Err(e) => {
                    let item = LaneItem { body: BundleBody::Plain(events), retry_count };
                    self.lanes[lane.index()].restore_front(vec![item]);
                    return Err(e);
                }
            },
            body => body,
        };
        Ok(Bundle { lane, body, retry_count })
    }

    fn seal_events(&self, lane: PriorityLane, events: Vec<Event>) -> Result<Bundle, TransportError> {
        if self.config.debug_mode {
            return Ok(Bundle::new(lane, BundleBody::Plain(events)));
        }
        match self.encrypt(&events) {
            Ok(sealed) => Ok(Bundle::new(lane, BundleBody::Cipher(sealed))),
            Err(e) => {
                self.lanes[lane.index()]
                    .restore_front(events.into_iter().map(LaneItem::fresh).collect());
                Err(e)
            }
        }
    }

    fn encrypt(&self, events: &[Event]) -> Result<String, TransportError> {
        let cipher = self.cipher.as_ref().ok_or(TransportError::EncryptionNotReady)?;
        let plaintext =
            serde_json::to_vec(events).map_err(|e| TransportError::Encode(e.to_string()))?;
        Ok(cipher.encrypt(&plaintext)?)
    }

    /// Apply the retry policy to a finished send.
    ///
    /// Retryable failures are requeued at the lane tail until the bundle has
    /// been retried `retry_cnt` times; after that, and for non-retryable
    /// failures, the bundle is dropped.
    pub fn on_send_complete(&mut self, outcome: SendOutcome) -> SendDisposition {
        self.in_flight = self.in_flight.saturating_sub(1);
        let SendOutcome { mut bundle, result } = outcome;
        let lane = bundle.lane;

        let disposition = match result {
            Ok(()) => {
                debug!(lane = %lane, events = bundle.body.event_count(), "bundle delivered");
                SendDisposition::Delivered
            }
            Err(error) if error.is_retryable() => {
                bundle.retry_count += 1;
                let retry_count = bundle.retry_count;
                if retry_count > self.config.retry_cnt {
                    error!(lane = %lane, retries = self.config.retry_cnt, error = %error, "retries exhausted; dropping bundle");
                    SendDisposition::Dropped {
                        lane,
                        reason: format!("retries exhausted after {retry_count} attempts: {error}"),
                    }
                } else {
                    match self.lanes[lane.index()].try_push(bundle.into_item()) {
                        Ok(()) => {
                            warn!(lane = %lane, retry_count, error = %error, "send failed; bundle requeued");
                            SendDisposition::Requeued { lane, retry_count, error }
                        }
                        Err(_) => {
                            error!(lane = %lane, error = %error, "lane full; dropping failed bundle");
                            SendDisposition::Dropped {
                                lane,
                                reason: format!("lane full while requeueing: {error}"),
                            }
                        }
                    }
                }
            }
            Err(error) => {
                error!(lane = %lane, severity = %error.severity(), error = %error, "bundle rejected; not retrying");
                SendDisposition::Dropped { lane, reason: error.to_string() }
            }
        };

        match disposition {
            SendDisposition::Requeued { .. } => self.arm_flush_timer(),
            _ => self.pump(),
        }
        disposition
    }

    /// First half of teardown: stop assembling, stop the scheduler and take
    /// back every send that never started.
    ///
    /// Returns how many sends are still in flight; their outcomes should be
    /// fed to [`Self::on_send_complete`] before [`Self::finish_salvage`] so
    /// failures land back in the lanes.
    pub fn begin_salvage(&mut self) -> usize {
        self.saving = true;
        self.flush_deadline = None;
        let drained = self.scheduler.stop_schedule_and_drain();
        self.in_flight = self.in_flight.saturating_sub(drained.len());
        self.salvaged.extend(drained.into_iter().map(SendTask::into_bundle));
        info!(
            backlog = self.salvaged.len(),
            in_flight = self.in_flight,
            buffered = self.pending_total(),
            "salvage started"
        );
        self.in_flight
    }

    /// Second half of teardown: empty every lane into a snapshot.
    ///
    /// Bundles taken from the scheduler backlog precede the lane's remaining
    /// items, which keeps each lane oldest-first.
    pub fn finish_salvage(&mut self) -> SalvageSnapshot {
        let mut snapshot = SalvageSnapshot::new();
        for bundle in self.salvaged.drain(..) {
            snapshot.push(bundle.lane, [bundle.into_item()]);
        }
        for lane in PriorityLane::ALL {
            snapshot.push(lane, self.lanes[lane.index()].drain());
        }
        if self.in_flight > 0 {
            warn!(in_flight = self.in_flight, "salvage finished with sends still outstanding");
        }
        info!(items = snapshot.total_items(), "salvage snapshot taken");
        snapshot
    }
}

// Copyright 2025 PRAGMA
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::{
    chainsync::Message,
    config::{SyncSettings, TimeoutPolicy},
    errors::SessionError,
    observer::{ChainObserver, RollBackwardEvent, RollForwardEvent},
    transport::{Frame, Transport, TransportError},
};
use std::{convert::Infallible, time::Duration};
use tokio::{select, time::sleep};
use tracing::{Level, debug, instrument, trace, warn};

/// Name of the event logged when a request for the next block goes unanswered in time. With
/// [`TimeoutPolicy::ForceResend`], a decode failure following it most likely comes from the
/// late reply.
pub const RESPONSE_TIMEOUT: &str = "response_timeout";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub requests_sent: u64,
    pub roll_forwards: u64,
    pub roll_backwards: u64,
    pub timeouts: u64,
    pub forced_resends: u64,
}

/// What a single iteration of the sync loop ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    RolledForward,
    RolledBackward,
    ForcedResend,
}

enum Wake {
    Received(Result<Frame<Message>, TransportError>),
    TimedOut,
}

/// Pulls blocks from the peer, forever.
///
/// Each iteration requests the next block unless a request is still pending, then races the
/// reply against a timer. `outstanding` is the number of requests the peer hasn't answered yet;
/// it only exceeds 1 after a forced resend.
pub struct SyncLoopDriver<T> {
    transport: T,
    timeout: Duration,
    policy: TimeoutPolicy,
    outstanding: u64,
    stats: SyncStats,
}

impl<T: Transport<Message>> SyncLoopDriver<T> {
    pub fn new(transport: T, settings: SyncSettings) -> Self {
        Self {
            transport,
            timeout: settings.timeout,
            policy: settings.on_timeout,
            outstanding: 0,
            stats: SyncStats::default(),
        }
    }

    /// Continue a session whose first request was sent right after finding the intersection.
    pub fn after_intersection(transport: T, settings: SyncSettings) -> Self {
        let mut driver = Self::new(transport, settings);
        driver.outstanding = 1;
        driver.stats.requests_sent = 1;
        driver
    }

    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub async fn run_forever<O: ChainObserver>(
        mut self,
        observer: &mut O,
    ) -> Result<Infallible, SessionError> {
        loop {
            self.step(observer).await?;
        }
    }

    #[instrument(
        level = Level::TRACE,
        skip_all,
        fields(outstanding = self.outstanding, requests_sent = self.stats.requests_sent),
    )]
    pub async fn step<O: ChainObserver>(&mut self, observer: &mut O) -> Result<Step, SessionError> {
        if self.outstanding == 0 {
            self.request_next().await?;
        }

        let timer = sleep(self.timeout);
        tokio::pin!(timer);
        let mut armed = true;

        loop {
            let wake = select! {
                biased;
                received = self.transport.recv() => Wake::Received(received),
                _ = &mut timer, if armed => Wake::TimedOut,
            };

            let frame = match wake {
                Wake::Received(received) => received?,
                Wake::TimedOut => {
                    self.stats.timeouts += 1;
                    match self.policy {
                        TimeoutPolicy::ForceResend => {
                            warn!(
                                event = RESPONSE_TIMEOUT,
                                timeout = ?self.timeout,
                                outstanding = self.outstanding,
                                "unresolved after timeout, requesting next again"
                            );
                            self.request_next().await?;
                            self.stats.forced_resends += 1;
                            return Ok(Step::ForcedResend);
                        }
                        TimeoutPolicy::WaitIndefinitely => {
                            warn!(
                                event = RESPONSE_TIMEOUT,
                                timeout = ?self.timeout,
                                outstanding = self.outstanding,
                                "unresolved after timeout, still waiting"
                            );
                            armed = false;
                            continue;
                        }
                    }
                }
            };

            match frame.message {
                Message::AwaitReply => {
                    debug!("peer is at its tip, awaiting its next block");
                }
                Message::RollForward(block, tip) => {
                    self.settle();
                    self.stats.roll_forwards += 1;
                    observer.roll_forward(RollForwardEvent {
                        raw: frame.raw,
                        block,
                        tip,
                    })?;
                    return Ok(Step::RolledForward);
                }
                Message::RollBackward(point, tip) => {
                    self.settle();
                    self.stats.roll_backwards += 1;
                    observer.roll_backward(RollBackwardEvent { point, tip })?;
                    return Ok(Step::RolledBackward);
                }
                other @ (Message::RequestNext
                | Message::FindIntersect(_)
                | Message::IntersectFound(..)
                | Message::IntersectNotFound(_)
                | Message::Done) => {
                    return Err(SessionError::ProtocolViolation {
                        expecting: "awaiting the next block",
                        received: other.name(),
                    });
                }
            }
        }
    }

    async fn request_next(&mut self) -> Result<(), SessionError> {
        self.transport.send(&Message::RequestNext).await?;
        self.outstanding += 1;
        self.stats.requests_sent += 1;
        trace!(outstanding = self.outstanding, "requested next block");
        Ok(())
    }

    fn settle(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chainsync::{WrappedBlock, block::tests::sample_block},
        point::{Point, Tip},
        testing::{CapturedLogs, MockTransport, RecordingObserver, framed},
    };

    fn settings(on_timeout: TimeoutPolicy) -> SyncSettings {
        SyncSettings {
            timeout: Duration::from_millis(5000),
            on_timeout,
        }
    }

    fn roll_forward(slot: u64) -> Frame<Message> {
        framed(Message::RollForward(
            WrappedBlock::new(6, sample_block(slot)),
            Tip::new(Point::Origin, slot),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn requests_when_nothing_is_pending() {
        let (transport, mut sent) = MockTransport::scripted([vec![roll_forward(1)]]);
        let mut driver = SyncLoopDriver::new(transport, settings(TimeoutPolicy::ForceResend));
        let mut observer = RecordingObserver::default();

        assert_eq!(driver.step(&mut observer).await.unwrap(), Step::RolledForward);
        assert_eq!(sent.drain(), vec![Message::RequestNext]);
        assert_eq!(driver.outstanding(), 0);
        assert_eq!(observer.forwards.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn await_reply_keeps_waiting_on_the_same_request() {
        let (transport, mut sent) = MockTransport::scripted([vec![
            Frame::bare(Message::AwaitReply),
            Frame::bare(Message::RollBackward(Point::Origin, Tip::origin())),
        ]]);
        let mut driver = SyncLoopDriver::new(transport, settings(TimeoutPolicy::ForceResend));
        let mut observer = RecordingObserver::default();

        assert_eq!(driver.step(&mut observer).await.unwrap(), Step::RolledBackward);
        assert_eq!(sent.drain(), vec![Message::RequestNext]);
        assert_eq!(
            observer.backwards,
            vec![RollBackwardEvent {
                point: Point::Origin,
                tip: Tip::origin()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn forced_resend_on_timeout() {
        let (transport, mut sent) = MockTransport::scripted([vec![], vec![roll_forward(7)]]);
        let mut driver = SyncLoopDriver::new(transport, settings(TimeoutPolicy::ForceResend));
        let mut observer = RecordingObserver::default();

        assert_eq!(driver.step(&mut observer).await.unwrap(), Step::ForcedResend);
        assert_eq!(driver.outstanding(), 2);

        assert_eq!(driver.step(&mut observer).await.unwrap(), Step::RolledForward);
        assert_eq!(
            sent.drain(),
            vec![Message::RequestNext, Message::RequestNext]
        );
        assert_eq!(driver.outstanding(), 1);
        assert_eq!(
            driver.stats(),
            SyncStats {
                requests_sent: 2,
                roll_forwards: 1,
                roll_backwards: 0,
                timeouts: 1,
                forced_resends: 1,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_logged_as_response_timeouts() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (transport, _) = MockTransport::<Message>::silent();
        let mut driver = SyncLoopDriver::new(transport, settings(TimeoutPolicy::ForceResend));
        let mut observer = RecordingObserver::default();

        assert_eq!(driver.step(&mut observer).await.unwrap(), Step::ForcedResend);

        let logs = logs.contents();
        let timeouts = logs
            .lines()
            .filter(|line| line.contains(&format!("\"event\":\"{RESPONSE_TIMEOUT}\"")))
            .collect::<Vec<_>>();
        assert_eq!(timeouts.len(), 1, "{logs}");
        assert!(timeouts[0].contains("\"outstanding\":1"), "{logs}");
        assert!(timeouts[0].contains("\"timeout\":\"5s\""), "{logs}");
    }

    #[tokio::test(start_paused = true)]
    async fn waits_past_the_timeout_when_asked_to() {
        let (transport, mut sent) = MockTransport::<Message>::silent();
        let mut driver =
            SyncLoopDriver::after_intersection(transport, settings(TimeoutPolicy::WaitIndefinitely));
        let mut observer = RecordingObserver::default();

        let step = tokio::time::timeout(Duration::from_secs(60), driver.step(&mut observer)).await;

        assert!(step.is_err(), "step should still be pending");
        assert!(sent.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_messages_are_fatal() {
        let (transport, _) = MockTransport::scripted([vec![Frame::bare(Message::Done)]]);
        let mut driver = SyncLoopDriver::new(transport, settings(TimeoutPolicy::ForceResend));
        let mut observer = RecordingObserver::default();

        let result = driver.step(&mut observer).await;

        assert!(matches!(
            result,
            Err(SessionError::ProtocolViolation {
                received: "Done",
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn raw_frames_reach_the_observer() {
        let frame = roll_forward(3);
        let (transport, _) = MockTransport::scripted([vec![frame.clone()]]);
        let mut driver = SyncLoopDriver::new(transport, settings(TimeoutPolicy::ForceResend));
        let mut observer = RecordingObserver::default();

        driver.step(&mut observer).await.unwrap();

        assert_eq!(observer.forwards[0].raw, frame.raw);
    }
}

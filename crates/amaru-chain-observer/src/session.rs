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
    chainsync,
    config::SessionConfig,
    errors::SessionError,
    handshake::HandshakeNegotiator,
    intersect::{IntersectOutcome, find_intersection},
    observer::ChainObserver,
    point::{Point, Tip},
    protocol_messages::{
        handshake::{self, HandshakeOutcome},
        version_data::VersionData,
        version_number::VersionNumber,
    },
    sync_loop::SyncLoopDriver,
    transport::Transport,
};
use std::convert::Infallible;
use tracing::{Level, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    HandshakeInFlight,
    Handshaken,
    IntersectInFlight,
    Syncing,
}

/// A single observer session with a node: handshake, then intersection, then an endless sync.
///
/// Phases must be run in that order; the session keeps track of where it is and refuses any
/// other order. Only one client message is ever unanswered at a phase boundary.
pub struct Session<H, C> {
    state: SessionState,
    handshake: Option<H>,
    chainsync: C,
    config: SessionConfig,
}

impl<H, C> Session<H, C>
where
    H: Transport<handshake::Message>,
    C: Transport<chainsync::Message>,
{
    pub fn new(handshake: H, chainsync: C, config: SessionConfig) -> Self {
        Self {
            state: SessionState::Disconnected,
            handshake: Some(handshake),
            chainsync,
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the handshake channel was released, which happens once the handshake is over.
    pub fn handshake_released(&self) -> bool {
        self.handshake.is_none()
    }

    fn expect_state(
        &self,
        expected: SessionState,
        operation: &'static str,
    ) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::OutOfOrder {
                operation,
                state: self.state,
            })
        }
    }

    #[instrument(level = Level::TRACE, skip_all)]
    pub async fn handshake(&mut self) -> Result<(VersionNumber, VersionData), SessionError> {
        self.expect_state(SessionState::Disconnected, "handshake")?;
        let transport = self.handshake.take().ok_or(SessionError::OutOfOrder {
            operation: "handshake",
            state: self.state,
        })?;

        self.state = SessionState::HandshakeInFlight;
        match HandshakeNegotiator::new(transport)
            .negotiate(&self.config.proposal)
            .await?
        {
            HandshakeOutcome::Accepted(version, data) => {
                self.state = SessionState::Handshaken;
                Ok((version, data))
            }
            HandshakeOutcome::Refused(reason) => Err(SessionError::HandshakeRejected(reason)),
        }
    }

    /// Find the intersection among the configured points. See [`Session::intersect_at`].
    pub async fn intersect(&mut self) -> Result<(Point, Tip), SessionError> {
        let points = self.config.intersection.clone();
        self.intersect_at(&points).await
    }

    /// Find the intersection among `points` and, once found, send the first request for the next
    /// block straight away.
    ///
    /// When the peer knows none of the points, the session goes back to `Handshaken` so that
    /// other candidates may be tried.
    #[instrument(level = Level::TRACE, skip_all)]
    pub async fn intersect_at(&mut self, points: &[Point]) -> Result<(Point, Tip), SessionError> {
        self.expect_state(SessionState::Handshaken, "find an intersection")?;

        self.state = SessionState::IntersectInFlight;
        match find_intersection(&mut self.chainsync, points).await? {
            IntersectOutcome::Found(point, tip) => {
                self.chainsync.send(&chainsync::Message::RequestNext).await?;
                self.state = SessionState::Syncing;
                Ok((point, tip))
            }
            IntersectOutcome::NotFound(tip) => {
                self.state = SessionState::Handshaken;
                Err(SessionError::NoIntersection {
                    points: points.to_vec(),
                    tip,
                })
            }
        }
    }

    pub fn into_sync_loop(self) -> Result<SyncLoopDriver<C>, SessionError> {
        self.expect_state(SessionState::Syncing, "start syncing")?;
        Ok(SyncLoopDriver::after_intersection(
            self.chainsync,
            self.config.sync,
        ))
    }

    /// Run all phases. Only returns on a fatal error.
    pub async fn run<O: ChainObserver>(
        mut self,
        observer: &mut O,
    ) -> Result<Infallible, SessionError> {
        let (version, _) = self.handshake().await?;
        let (point, tip) = self.intersect().await?;
        info!(%version, intersection = %point, %tip, "syncing");
        self.into_sync_loop()?.run_forever(observer).await
    }
}

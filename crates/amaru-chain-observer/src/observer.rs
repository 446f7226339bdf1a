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
    chainsync::WrappedBlock,
    digest::digest,
    envelope::{Extraction, extract},
    errors::SessionError,
    point::{HeaderHash, Point, Tip},
};
use amaru_minicbor_extra::lazy_array;
use tracing::{debug, info};

const EVENT_TARGET: &str = "amaru_chain_observer::observer";

/// The node's chain moved forward by one block.
#[derive(Debug, Clone, PartialEq)]
pub struct RollForwardEvent {
    /// The exact bytes of the roll-forward message, when retained.
    pub raw: Option<Vec<u8>>,
    pub block: WrappedBlock,
    pub tip: Tip,
}

impl RollForwardEvent {
    /// The block body bytes; taken from the raw message when possible.
    pub fn block_bytes(&self) -> Extraction {
        extract(self.raw.as_deref(), &self.block.block)
    }
}

/// The node's chain switched to a fork; the next block follows `point`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollBackwardEvent {
    pub point: Point,
    pub tip: Tip,
}

/// Receives the chain updates of a session, in order.
pub trait ChainObserver: Send {
    fn roll_forward(&mut self, event: RollForwardEvent) -> Result<(), SessionError>;

    fn roll_backward(&mut self, event: RollBackwardEvent) -> Result<(), SessionError>;
}

/// Logs every update, identifying blocks by the digest of their header.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    last_block: Option<HeaderHash>,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_block(&self) -> Option<HeaderHash> {
        self.last_block
    }
}

/// The serialised header of a block, that is, the first element of the block array.
pub fn block_header(block: &[u8]) -> Result<&[u8], SessionError> {
    let elements = lazy_array(block).map_err(|e| SessionError::MalformedBlock(e.to_string()))?;
    elements
        .first()
        .copied()
        .ok_or_else(|| SessionError::MalformedBlock("empty block".to_string()))
}

impl ChainObserver for LoggingObserver {
    fn roll_forward(&mut self, event: RollForwardEvent) -> Result<(), SessionError> {
        let extraction = event.block_bytes();
        if let Extraction::Fallback { reason, .. } = &extraction {
            debug!(target: EVENT_TARGET, %reason, "re-encoding structured block");
        }

        let hash = digest(block_header(extraction.bytes())?);
        info!(
            target: EVENT_TARGET,
            hash = %hash,
            era = event.block.era,
            tip = %event.tip,
            "roll_forward"
        );

        self.last_block = Some(hash);
        Ok(())
    }

    fn roll_backward(&mut self, event: RollBackwardEvent) -> Result<(), SessionError> {
        info!(
            target: EVENT_TARGET,
            point = %event.point,
            tip = %event.tip,
            "roll_backward"
        );

        self.last_block = match event.point {
            Point::Origin => None,
            Point::Specific(_, hash) => Some(hash),
        };
        Ok(())
    }
}

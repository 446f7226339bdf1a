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

use amaru_minicbor_extra::to_cbor;
use async_trait::async_trait;
use minicbor::{Decode, Decoder, Encode};
use pallas_network::{
    miniprotocols::{PROTOCOL_N2C_CHAIN_SYNC, PROTOCOL_N2C_HANDSHAKE},
    multiplexer::{self, AgentChannel, Bearer, Plexer, RunningPlexer},
};
use std::{
    fmt,
    marker::PhantomData,
    path::{Path, PathBuf},
};
use tracing::trace;

use crate::{chainsync, protocol_messages::handshake};

/// Largest payload carried by a single multiplexer segment.
pub const MAX_SEGMENT_PAYLOAD_LENGTH: usize = 65535;

/// A decoded message, along with the exact bytes it was decoded from when those are retained.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<M> {
    pub message: M,
    pub raw: Option<Vec<u8>>,
}

impl<M> Frame<M> {
    pub fn new(message: M, raw: Option<Vec<u8>>) -> Self {
        Self { message, raw }
    }

    /// A frame without raw bytes attached.
    pub fn bare(message: M) -> Self {
        Self { message, raw: None }
    }
}

/// Abstraction over one mini-protocol channel, as used by the session.
///
/// This lets us test the session phases without a running node. Production code uses
/// [`MuxTransport`] over a pallas multiplexer channel.
#[async_trait]
pub trait Transport<M>: Send
where
    M: Send + Sync,
{
    async fn send(&mut self, message: &M) -> Result<(), TransportError>;

    /// Wait for the next complete message from the peer.
    ///
    /// Implementations must keep any partially received message across cancellations, so that a
    /// subsequent call resumes where the cancelled one left off.
    async fn recv(&mut self) -> Result<Frame<M>, TransportError>;
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("multiplexer failure: {0}")]
    Mux(#[from] multiplexer::Error),
    #[error("failed to decode {protocol} message: {source}")]
    Decode {
        protocol: &'static str,
        source: minicbor::decode::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reassembly of the messages of one mini-protocol out of the segments received for it.
///
/// Segments are appended to a buffer until a whole message decodes out of it; bytes left over
/// after that message stay in the buffer for the next one. Nothing ties a segment to the request
/// it answers: a message cut short by a cancelled read is completed by whatever bytes arrive next.
pub struct Reassembly<M> {
    protocol: &'static str,
    buffer: Vec<u8>,
    retain_raw: bool,
    message: PhantomData<fn() -> M>,
}

impl<M> Reassembly<M> {
    pub fn new(protocol: &'static str, retain_raw: bool) -> Self {
        Self {
            protocol,
            buffer: Vec::new(),
            retain_raw,
            message: PhantomData,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        trace!(
            protocol = self.protocol,
            bytes = %hex::encode(chunk),
            buffered = self.buffer.len(),
            "received chunk"
        );
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes received but not yet consumed by a decoded message.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

impl<M> Reassembly<M>
where
    M: for<'b> Decode<'b, ()>,
{
    /// Decode the next message out of the buffer, if it holds a complete one.
    pub fn next_frame(&mut self) -> Result<Option<Frame<M>>, TransportError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let decoded = {
            let mut d = Decoder::new(&self.buffer);
            d.decode::<M>().map(|message| (message, d.position()))
        };

        match decoded {
            Ok((message, consumed)) => {
                let raw = self.buffer.drain(..consumed).collect::<Vec<u8>>();
                Ok(Some(Frame::new(message, self.retain_raw.then_some(raw))))
            }
            Err(e) if e.is_end_of_input() => Ok(None),
            Err(source) => {
                // The buffer can't be resynchronised once it holds garbage.
                self.buffer.clear();
                Err(TransportError::Decode {
                    protocol: self.protocol,
                    source,
                })
            }
        }
    }
}

/// A [`Transport`] over a multiplexer channel.
pub struct MuxTransport<M> {
    channel: AgentChannel,
    reassembly: Reassembly<M>,
}

impl<M> MuxTransport<M> {
    pub fn new(protocol: &'static str, channel: AgentChannel, retain_raw: bool) -> Self {
        Self {
            channel,
            reassembly: Reassembly::new(protocol, retain_raw),
        }
    }
}

#[async_trait]
impl<M> Transport<M> for MuxTransport<M>
where
    M: Encode<()> + for<'b> Decode<'b, ()> + fmt::Debug + Send + Sync,
{
    async fn send(&mut self, message: &M) -> Result<(), TransportError> {
        let bytes = to_cbor(message);
        trace!(
            protocol = self.reassembly.protocol,
            ?message,
            bytes = %hex::encode(&bytes),
            "sending"
        );
        for chunk in bytes.chunks(MAX_SEGMENT_PAYLOAD_LENGTH) {
            self.channel.enqueue_chunk(chunk.to_vec()).await?;
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame<M>, TransportError> {
        loop {
            if let Some(frame) = self.reassembly.next_frame()? {
                return Ok(frame);
            }

            // Cancellation safe: a chunk is only ever buffered once fully dequeued.
            let chunk = self.channel.dequeue_chunk().await?;
            self.reassembly.push(&chunk);
        }
    }
}

/// The node-to-client channels used by an observer session.
pub struct Connection {
    pub handshake: MuxTransport<handshake::Message>,
    pub chainsync: MuxTransport<chainsync::Message>,
    pub plexer: RunningPlexer,
}

/// Connect to a node's local socket and start multiplexing the handshake and chain-sync
/// mini-protocols over it.
pub async fn connect(path: &Path, retain_raw: bool) -> Result<Connection, TransportError> {
    let bearer = Bearer::connect_unix(path)
        .await
        .map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;

    let mut plexer = Plexer::new(bearer);

    let handshake = MuxTransport::new(
        "handshake",
        plexer.subscribe_client(PROTOCOL_N2C_HANDSHAKE),
        retain_raw,
    );
    let chainsync = MuxTransport::new(
        "chainsync",
        plexer.subscribe_client(PROTOCOL_N2C_CHAIN_SYNC),
        retain_raw,
    );

    Ok(Connection {
        handshake,
        chainsync,
        plexer: plexer.spawn(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chainsync::{Message, WrappedBlock, block::tests::sample_block},
        point::{Point, Tip},
    };

    fn roll_forward(slot: u64) -> Message {
        Message::RollForward(
            WrappedBlock::new(6, sample_block(slot)),
            Tip::new(Point::Origin, slot),
        )
    }

    #[test]
    fn reassembles_messages_split_across_chunks() {
        let message = roll_forward(42);
        let bytes = to_cbor(&message);
        let (head, tail) = bytes.split_at(bytes.len() / 2);

        let mut reassembly = Reassembly::<Message>::new("chainsync", true);
        reassembly.push(head);
        assert!(reassembly.next_frame().unwrap().is_none());
        assert_eq!(reassembly.pending_bytes(), head.len());

        reassembly.push(tail);
        let frame = reassembly.next_frame().unwrap().unwrap();
        assert_eq!(frame.message, message);
        assert_eq!(frame.raw, Some(bytes));
        assert_eq!(reassembly.pending_bytes(), 0);
    }

    #[test]
    fn keeps_leftovers_for_the_next_message() {
        let mut bytes = to_cbor(&Message::AwaitReply);
        bytes.extend(to_cbor(&roll_forward(1)));

        let mut reassembly = Reassembly::<Message>::new("chainsync", false);
        reassembly.push(&bytes);

        let first = reassembly.next_frame().unwrap().unwrap();
        assert_eq!(first, Frame::bare(Message::AwaitReply));
        let second = reassembly.next_frame().unwrap().unwrap();
        assert_eq!(second.message, roll_forward(1));
        assert!(reassembly.next_frame().unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let mut reassembly = Reassembly::<Message>::new("chainsync", true);
        reassembly.push(&[0x82, 0x19, 0xff, 0xff, 0x00]);
        assert!(matches!(
            reassembly.next_frame(),
            Err(TransportError::Decode {
                protocol: "chainsync",
                ..
            })
        ));
        assert_eq!(reassembly.pending_bytes(), 0);
    }

    #[test]
    fn truncated_response_followed_by_another_corrupts_both() {
        let first = roll_forward(1);
        let second = roll_forward(2);
        let first_bytes = to_cbor(&first);

        let mut reassembly = Reassembly::<Message>::new("chainsync", true);
        reassembly.push(&first_bytes[..first_bytes.len() / 2]);
        reassembly.push(&to_cbor(&second));

        let outcome = reassembly.next_frame();
        assert!(
            !matches!(&outcome, Ok(Some(frame)) if frame.message == first || frame.message == second),
            "{outcome:?}"
        );
    }
}

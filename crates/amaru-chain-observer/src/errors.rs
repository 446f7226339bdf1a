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
    point::{Point, Tip},
    protocol_messages::handshake::RefuseReason,
    session::SessionState,
    transport::TransportError,
};

/// Every error that ends an observer session. None of them is recovered from.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("handshake rejected by peer: {0}")]
    HandshakeRejected(RefuseReason),
    #[error("unexpected handshake reply: {0}")]
    UnexpectedHandshakeReply(&'static str),
    #[error("no intersection found for {points:?}; peer tip is at {tip}")]
    NoIntersection { points: Vec<Point>, tip: Tip },
    #[error("protocol violation: received {received} while {expecting}")]
    ProtocolViolation {
        expecting: &'static str,
        received: &'static str,
    },
    #[error("cannot {operation} while session is {state:?}")]
    OutOfOrder {
        operation: &'static str,
        state: SessionState,
    },
    #[error("malformed block: {0}")]
    MalformedBlock(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

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
    errors::SessionError,
    point::{Point, Tip},
    transport::Transport,
};
use tracing::{Level, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectOutcome {
    Found(Point, Tip),
    NotFound(Tip),
}

/// Ask the peer for the best of `points` it knows of, and wait for its answer.
///
/// Points are sent in the given order; which one is picked when several are known is up to the
/// peer.
#[instrument(
    level = Level::DEBUG,
    skip_all,
    fields(points = ?points.iter().map(|p| p.to_string()).collect::<Vec<_>>()),
)]
pub async fn find_intersection<T>(
    transport: &mut T,
    points: &[Point],
) -> Result<IntersectOutcome, SessionError>
where
    T: Transport<Message>,
{
    transport
        .send(&Message::FindIntersect(points.to_vec()))
        .await?;

    match transport.recv().await?.message {
        Message::IntersectFound(point, tip) => {
            info!(intersection = %point, %tip, "intersection found");
            Ok(IntersectOutcome::Found(point, tip))
        }
        Message::IntersectNotFound(tip) => {
            warn!(%tip, "intersection not found");
            Ok(IntersectOutcome::NotFound(tip))
        }
        other @ (Message::RequestNext
        | Message::AwaitReply
        | Message::RollForward(..)
        | Message::RollBackward(..)
        | Message::FindIntersect(_)
        | Message::Done) => Err(SessionError::ProtocolViolation {
            expecting: "awaiting an intersection",
            received: other.name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{point::HeaderHash, testing::MockTransport, transport::Frame};

    fn candidate() -> Point {
        Point::Specific(41084896, HeaderHash::from([0x35; 32]))
    }

    #[tokio::test]
    async fn found() {
        let tip = Tip::new(Point::Specific(41085000, HeaderHash::from([0x01; 32])), 1_800_000);
        let (mut transport, mut sent) = MockTransport::scripted([vec![Frame::bare(
            Message::IntersectFound(candidate(), tip),
        )]]);

        let outcome = find_intersection(&mut transport, &[candidate()]).await.unwrap();

        assert_eq!(outcome, IntersectOutcome::Found(candidate(), tip));
        assert_eq!(sent.drain(), vec![Message::FindIntersect(vec![candidate()])]);
    }

    #[tokio::test]
    async fn not_found() {
        let (mut transport, _) = MockTransport::scripted([vec![Frame::bare(
            Message::IntersectNotFound(Tip::origin()),
        )]]);

        let outcome = find_intersection(&mut transport, &[candidate()]).await.unwrap();

        assert_eq!(outcome, IntersectOutcome::NotFound(Tip::origin()));
    }

    #[tokio::test]
    async fn anything_else_is_a_protocol_violation() {
        let (mut transport, _) =
            MockTransport::scripted([vec![Frame::bare(Message::AwaitReply)]]);

        let result = find_intersection(&mut transport, &[candidate()]).await;

        assert!(matches!(
            result,
            Err(SessionError::ProtocolViolation {
                received: "AwaitReply",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let (mut transport, _) = MockTransport::<Message>::silent();
        transport.push_failure("connection reset by peer");

        let result = find_intersection(&mut transport, &[candidate()]).await;

        assert!(matches!(result, Err(SessionError::Transport(_))));
    }
}

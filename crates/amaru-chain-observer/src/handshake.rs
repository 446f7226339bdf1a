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
    errors::SessionError,
    protocol_messages::{
        handshake::{HandshakeOutcome, Message},
        version_table::VersionProposal,
    },
    transport::Transport,
};
use tracing::{Level, debug, info, instrument};

/// Runs the handshake mini-protocol, once.
///
/// Negotiating consumes the negotiator along with its transport: nothing else may be sent or
/// received on the handshake channel afterwards.
pub struct HandshakeNegotiator<T> {
    transport: T,
}

impl<T: Transport<Message>> HandshakeNegotiator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    #[instrument(
        level = Level::DEBUG,
        skip_all,
        fields(versions = ?proposal.values.keys().map(|v| v.to_string()).collect::<Vec<_>>()),
    )]
    pub async fn negotiate(
        mut self,
        proposal: &VersionProposal,
    ) -> Result<HandshakeOutcome, SessionError> {
        self.transport
            .send(&Message::Propose(proposal.clone()))
            .await?;

        let reply = self.transport.recv().await?.message;
        debug!(reply = reply.name(), "handshake reply");

        match reply {
            Message::Accept(version, data) => {
                if !proposal.values.contains_key(&version) {
                    return Err(SessionError::UnexpectedHandshakeReply(
                        "peer accepted a version that wasn't proposed",
                    ));
                }
                info!(
                    %version,
                    network_magic = %data.network_magic(),
                    "handshake accepted"
                );
                Ok(HandshakeOutcome::Accepted(version, data))
            }
            Message::Refuse(reason) => Ok(HandshakeOutcome::Refused(reason)),
            other @ (Message::Propose(_) | Message::QueryReply(_)) => {
                Err(SessionError::UnexpectedHandshakeReply(other.name()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol_messages::{
            handshake::RefuseReason,
            network_magic::NetworkMagic,
            version_data::VersionData,
            version_number::VersionNumber,
            version_table::VersionTable,
        },
        testing::MockTransport,
        transport::Frame,
    };

    #[tokio::test]
    async fn accepted_proposal() {
        let proposal = VersionTable::single(VersionNumber::V10, NetworkMagic::PREPROD);
        let (transport, mut sent) = MockTransport::handshake_peer(proposal.clone());

        let outcome = HandshakeNegotiator::new(transport)
            .negotiate(&proposal)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            HandshakeOutcome::Accepted(
                VersionNumber::V10,
                VersionData::new(NetworkMagic::PREPROD, false)
            )
        );
        assert_eq!(sent.drain(), vec![Message::Propose(proposal)]);
    }

    #[tokio::test]
    async fn refused_proposal() {
        let proposal = VersionTable::single(VersionNumber::V16, NetworkMagic::PREPROD);
        let supported = VersionTable::single(VersionNumber::V10, NetworkMagic::PREPROD);
        let (transport, _) = MockTransport::handshake_peer(supported);

        let outcome = HandshakeNegotiator::new(transport)
            .negotiate(&proposal)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            HandshakeOutcome::Refused(RefuseReason::VersionMismatch(vec![VersionNumber::V10]))
        );
    }

    #[tokio::test]
    async fn accepting_an_unproposed_version_is_an_error() {
        let proposal = VersionTable::single(VersionNumber::V10, NetworkMagic::PREPROD);
        let (transport, _) = MockTransport::scripted([vec![Frame::bare(Message::Accept(
            VersionNumber::V14,
            VersionData::new(NetworkMagic::PREPROD, false),
        ))]]);

        let result = HandshakeNegotiator::new(transport).negotiate(&proposal).await;

        assert!(matches!(
            result,
            Err(SessionError::UnexpectedHandshakeReply(_))
        ));
    }

    #[tokio::test]
    async fn query_reply_is_unexpected() {
        let proposal = VersionTable::single(VersionNumber::V10, NetworkMagic::PREPROD);
        let (transport, _) =
            MockTransport::scripted([vec![Frame::bare(Message::QueryReply(proposal.clone()))]]);

        let result = HandshakeNegotiator::new(transport).negotiate(&proposal).await;

        assert!(matches!(
            result,
            Err(SessionError::UnexpectedHandshakeReply("QueryReply"))
        ));
    }
}

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

//! Scripted in-memory peers, standing in for a node in tests.

use crate::{
    errors::SessionError,
    observer::{ChainObserver, RollBackwardEvent, RollForwardEvent},
    protocol_messages::{
        handshake::{Message, respond_to_proposal},
        version_data::VersionData,
        version_table::VersionTable,
    },
    transport::{Frame, Transport, TransportError},
};
use amaru_minicbor_extra::to_cbor;
use anyhow::anyhow;
use async_trait::async_trait;
use minicbor::Encode;
use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;

type Responder<M> = Box<dyn FnMut(&M) -> Vec<Frame<M>> + Send>;

/// A [`Transport`] whose peer answers each sent message with the replies its responder yields.
///
/// When there's nothing left to receive, `recv` never completes, like a node that stays silent.
pub struct MockTransport<M> {
    responder: Responder<M>,
    inbox: VecDeque<Result<Frame<M>, String>>,
    tx_sent: mpsc::UnboundedSender<M>,
}

/// Every message sent through a [`MockTransport`], in order.
pub struct SentMessages<M>(mpsc::UnboundedReceiver<M>);

impl<M> SentMessages<M> {
    pub fn drain(&mut self) -> Vec<M> {
        let mut sent = Vec::new();
        while let Ok(message) = self.0.try_recv() {
            sent.push(message);
        }
        sent
    }
}

impl<M: Send + 'static> MockTransport<M> {
    pub fn with_responder(
        responder: impl FnMut(&M) -> Vec<Frame<M>> + Send + 'static,
    ) -> (Self, SentMessages<M>) {
        let (tx_sent, rx_sent) = mpsc::unbounded_channel();
        let transport = Self {
            responder: Box::new(responder),
            inbox: VecDeque::new(),
            tx_sent,
        };
        (transport, SentMessages(rx_sent))
    }

    /// A peer answering the n-th sent message with the n-th batch of replies. An empty batch, or
    /// running out of batches, leaves the request unanswered.
    pub fn scripted(batches: impl IntoIterator<Item = Vec<Frame<M>>>) -> (Self, SentMessages<M>) {
        let mut batches = batches.into_iter().collect::<VecDeque<_>>();
        Self::with_responder(move |_| batches.pop_front().unwrap_or_default())
    }

    /// A peer that never says anything.
    pub fn silent() -> (Self, SentMessages<M>) {
        Self::with_responder(|_| Vec::new())
    }

    /// Make the next receive, once earlier replies are consumed, fail.
    pub fn push_failure(&mut self, reason: impl Into<String>) {
        self.inbox.push_back(Err(reason.into()));
    }
}

impl MockTransport<Message> {
    /// A handshake responder supporting the given versions.
    pub fn handshake_peer(supported: VersionTable<VersionData>) -> (Self, SentMessages<Message>) {
        Self::with_responder(move |message| match message {
            Message::Propose(proposal) => {
                vec![Frame::bare(respond_to_proposal(proposal, &supported))]
            }
            Message::Accept(..) | Message::Refuse(_) | Message::QueryReply(_) => Vec::new(),
        })
    }
}

/// A frame carrying the serialised form of its message as raw bytes.
pub fn framed<M: Encode<()>>(message: M) -> Frame<M> {
    let raw = to_cbor(&message);
    Frame::new(message, Some(raw))
}

#[async_trait]
impl<M> Transport<M> for MockTransport<M>
where
    M: Clone + Send + Sync,
{
    async fn send(&mut self, message: &M) -> Result<(), TransportError> {
        // Nobody may be watching, which is fine.
        let _ = self.tx_sent.send(message.clone());
        let replies = (self.responder)(message);
        self.inbox.extend(replies.into_iter().map(Ok));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame<M>, TransportError> {
        match self.inbox.pop_front() {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(reason)) => Err(TransportError::Other(anyhow!(reason))),
            None => std::future::pending().await,
        }
    }
}

/// An observer keeping every update it receives.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub forwards: Vec<RollForwardEvent>,
    pub backwards: Vec<RollBackwardEvent>,
}

impl ChainObserver for RecordingObserver {
    fn roll_forward(&mut self, event: RollForwardEvent) -> Result<(), SessionError> {
        self.forwards.push(event);
        Ok(())
    }

    fn roll_backward(&mut self, event: RollBackwardEvent) -> Result<(), SessionError> {
        self.backwards.push(event);
        Ok(())
    }
}

/// A log sink for `tracing_subscriber::fmt`, keeping everything written to it.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(buffer) => String::from_utf8_lossy(&buffer).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

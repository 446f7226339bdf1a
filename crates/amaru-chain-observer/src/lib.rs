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

//! A chain-sync observer for a local Cardano node.
//!
//! A [`session::Session`] connects to a node over its local socket, negotiates a node-to-client
//! protocol version, finds an intersection with the node's chain and then follows it forever,
//! reporting every roll-forward and roll-backward to a [`observer::ChainObserver`].

pub mod chainsync;
pub mod config;
pub mod digest;
pub mod envelope;
pub mod errors;
pub mod handshake;
pub mod intersect;
pub mod observability;
pub mod observer;
pub mod panic;
pub mod point;
pub mod protocol_messages;
pub mod session;
pub mod sync_loop;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

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
    point::Point,
    protocol_messages::{
        network_magic::NetworkMagic, version_number::VersionNumber, version_table::VersionProposal,
    },
};
use std::{path::PathBuf, time::Duration};

/// Environment variable holding the path to the node's local socket.
pub const SOCKET_PATH_VAR: &str = "CARDANO_NODE_SOCKET_PATH";

/// Where to start following the chain from, when nothing else is given.
pub const DEFAULT_INTERSECTION: &str =
    "41084896.35af5a4cfaf14d0783f21963926b0422dde37f570274faa4ed83f32938fbf07c";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

pub const DEFAULT_NETWORK_MAGIC: NetworkMagic = NetworkMagic::PREPROD;

pub const DEFAULT_PROTOCOL_VERSION: u64 = 10;

/// What to do when a request for the next block goes unanswered for too long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TimeoutPolicy {
    /// Send another request without waiting for the previous one to be answered. The peer may see
    /// it as a protocol violation, and a late reply to the first request can corrupt the next
    /// message being reassembled.
    #[default]
    #[value(name = "resend")]
    ForceResend,
    /// Log and keep waiting for the pending request.
    #[value(name = "wait")]
    WaitIndefinitely,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub timeout: Duration,
    pub on_timeout: TimeoutPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            on_timeout: TimeoutPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub proposal: VersionProposal,
    pub intersection: Vec<Point>,
    pub sync: SyncSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            proposal: VersionProposal::single(
                VersionNumber::node_to_client(DEFAULT_PROTOCOL_VERSION),
                DEFAULT_NETWORK_MAGIC,
            ),
            intersection: vec![default_intersection()],
            sync: SyncSettings::default(),
        }
    }
}

#[expect(clippy::expect_used)]
pub fn default_intersection() -> Point {
    Point::try_from(DEFAULT_INTERSECTION).expect("default intersection is a valid point")
}

/// Pick the node socket: the first non-empty of the environment and the command line. Without
/// either, the path is empty and connecting fails later on.
pub fn resolve_socket_path(from_env: Option<&str>, from_args: Option<&str>) -> PathBuf {
    [from_env, from_args]
        .into_iter()
        .flatten()
        .find(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Some("/env.socket"), Some("/arg.socket") => "/env.socket" ; "environment first")]
    #[test_case(Some(""), Some("/arg.socket") => "/arg.socket" ; "empty environment")]
    #[test_case(None, Some("/arg.socket") => "/arg.socket" ; "argument only")]
    #[test_case(None, Some("") => "" ; "empty argument")]
    #[test_case(None, None => "" ; "nothing")]
    fn socket_path(from_env: Option<&str>, from_args: Option<&str>) -> String {
        resolve_socket_path(from_env, from_args).display().to_string()
    }

    #[test]
    fn default_config_proposes_v10_on_preprod() {
        let config = SessionConfig::default();
        let (version, data) = config.proposal.highest().unwrap();
        assert_eq!(*version, VersionNumber::V10);
        assert_eq!(data.network_magic(), NetworkMagic::PREPROD);
        assert_eq!(config.proposal.values.len(), 1);
        assert_eq!(config.intersection[0].slot_or_default(), 41084896);
        assert_eq!(config.sync.timeout, Duration::from_millis(5000));
        assert_eq!(config.sync.on_timeout, TimeoutPolicy::ForceResend);
    }
}

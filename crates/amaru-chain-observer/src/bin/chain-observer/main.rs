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

use amaru_chain_observer::{
    built_info,
    config::{
        DEFAULT_INTERSECTION, DEFAULT_NETWORK_MAGIC, DEFAULT_PROTOCOL_VERSION, SOCKET_PATH_VAR,
        SessionConfig, SyncSettings, TimeoutPolicy, resolve_socket_path,
    },
    errors::SessionError,
    observability::{Color, setup_observability},
    observer::LoggingObserver,
    panic::panic_handler,
    point::Point,
    protocol_messages::{
        network_magic::NetworkMagic, version_number::VersionNumber, version_table::VersionTable,
    },
    session::Session,
    transport::{Connection, connect},
};
use clap::{CommandFactory, FromArgMatches, Parser};
use std::{convert::Infallible, env, path::PathBuf, sync::LazyLock, time::Duration};
use tracing::{error, info};

/// Lazily initialized version string including git commit SHA.
static VERSION: LazyLock<String> = LazyLock::new(|| {
    let version = built_info::PKG_VERSION;
    match (built_info::GIT_COMMIT_HASH_SHORT, built_info::GIT_DIRTY) {
        (Some(sha), Some(true)) => format!("{version} ({sha}+dirty)"),
        (Some(sha), _) => format!("{version} ({sha})"),
        _ => version.to_string(),
    }
});

/// Follow the chain of a local node and log every block it rolls forward to.
#[derive(Debug, Parser)]
#[clap(name = "chain-observer")]
#[clap(bin_name = "chain-observer")]
#[clap(author, about, long_about = None)]
struct Cli {
    /// Path to the node's local socket.
    ///
    /// The CARDANO_NODE_SOCKET_PATH environment variable, when set and non-empty, takes
    /// precedence over this argument.
    #[arg(verbatim_doc_comment)]
    socket_path: Option<String>,

    /// The network to connect to: a network magic, or one of 'mainnet', 'preprod', 'preview'
    /// and 'testnet'.
    #[arg(long, value_name = "NETWORK", default_value_t = DEFAULT_NETWORK_MAGIC, env("AMARU_NETWORK"))]
    network_magic: NetworkMagic,

    /// The node-to-client protocol version to propose.
    #[arg(long, value_name = "VERSION", default_value_t = DEFAULT_PROTOCOL_VERSION)]
    protocol_version: u64,

    /// Candidate intersection points, as '<slot>.<header hash>', separated by commas.
    #[arg(long, value_name = "POINT", value_delimiter = ',', default_value = DEFAULT_INTERSECTION)]
    intersection: Vec<Point>,

    /// How long to wait for the next block before acting on --on-timeout.
    #[arg(long, value_name = "MILLISECONDS", default_value_t = 5000)]
    timeout_ms: u64,

    /// What to do when the next block doesn't arrive in time.
    #[arg(long, value_enum, default_value_t = TimeoutPolicy::ForceResend)]
    on_timeout: TimeoutPolicy,

    /// Don't keep the raw bytes of received messages; blocks are then re-encoded from their
    /// decoded form.
    #[arg(long)]
    no_raw_frames: bool,

    #[clap(long, action, env("AMARU_WITH_JSON_TRACES"))]
    with_json_traces: bool,

    #[clap(long, action, env("AMARU_COLOR"))]
    color: Option<Color>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    panic_handler();

    let matches = <Cli as CommandFactory>::command()
        .version(VERSION.as_str())
        .get_matches();
    let args = <Cli as FromArgMatches>::from_arg_matches(&matches)?;

    setup_observability(args.with_json_traces, Color::is_enabled(args.color));

    let socket_path = resolve_socket_path(
        env::var(SOCKET_PATH_VAR).ok().as_deref(),
        args.socket_path.as_deref(),
    );

    let config = SessionConfig {
        proposal: VersionTable::single(
            VersionNumber::node_to_client(args.protocol_version),
            args.network_magic,
        ),
        intersection: args.intersection,
        sync: SyncSettings {
            timeout: Duration::from_millis(args.timeout_ms),
            on_timeout: args.on_timeout,
        },
    };

    info!(
        socket_path = %socket_path.display(),
        network_magic = %args.network_magic,
        version = %VERSION.as_str(),
        "Started with global arguments"
    );

    match observe(socket_path, !args.no_raw_frames, config).await {
        Ok(never) => match never {},
        Err(e) => {
            error!(error = %e, "session terminated");
            Err(e.into())
        }
    }
}

async fn observe(
    socket_path: PathBuf,
    retain_raw: bool,
    config: SessionConfig,
) -> Result<Infallible, SessionError> {
    let Connection {
        handshake,
        chainsync,
        plexer,
    } = connect(&socket_path, retain_raw).await?;

    let result = Session::new(handshake, chainsync, config)
        .run(&mut LoggingObserver::new())
        .await;

    plexer.abort().await;

    result
}

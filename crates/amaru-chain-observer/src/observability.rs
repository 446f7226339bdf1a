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

use std::{
    env::{self, VarError},
    error::Error,
    io::{self, IsTerminal},
    str::FromStr,
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Registry,
    filter::{Filtered, FromEnvError, ParseError},
    fmt::{
        Layer,
        format::{FmtSpan, Format, Json, JsonFields},
    },
    layer::Layered,
    prelude::*,
};

const AMARU_LOG_VAR: &str = "AMARU_LOG";

const DEFAULT_AMARU_LOG_FILTER: &str = "amaru_chain_observer=info";

const AMARU_TRACE_VAR: &str = "AMARU_TRACE";

const DEFAULT_AMARU_TRACE_FILTER: &str = "amaru_chain_observer=trace";

// -----------------------------------------------------------------------------
// TracingSubscriber
// -----------------------------------------------------------------------------

type JsonLayer<S> = Layered<JsonFilter<S>, S>;

type JsonFilter<S> = Filtered<Layer<S, JsonFields, Format<Json>>, EnvFilter, S>;

type DelayedWarning = Option<Box<dyn FnOnce()>>;

#[derive(Default)]
pub enum TracingSubscriber<S> {
    #[default]
    Empty,
    Registry(Registry),
    WithJson(JsonLayer<S>),
}

impl TracingSubscriber<Registry> {
    pub fn new() -> Self {
        Self::Registry(tracing_subscriber::registry())
    }

    #[expect(clippy::panic)]
    #[expect(clippy::wildcard_enum_match_arm)]
    pub fn with_json<F>(&mut self, layer_json: F) -> DelayedWarning
    where
        F: FnOnce() -> (JsonFilter<Registry>, DelayedWarning),
    {
        match std::mem::take(self) {
            Self::Registry(registry) => {
                let (layer, warning) = layer_json();
                *self = TracingSubscriber::WithJson(registry.with(layer));
                warning
            }
            _ => panic!("'with_json' called twice"),
        }
    }

    pub fn init(self, color: bool) {
        let (default_filter, warning) = new_default_filter(AMARU_LOG_VAR, DEFAULT_AMARU_LOG_FILTER);

        match self {
            TracingSubscriber::Empty => unreachable!(),
            TracingSubscriber::Registry(registry) => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr as fn() -> io::Stderr)
                        .event_format(tracing_subscriber::fmt::format().with_ansi(color).compact())
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(default_filter),
                )
                .init(),
            TracingSubscriber::WithJson(layered) => layered.init(),
        };

        if let Some(notify) = warning {
            notify();
        }
    }
}

// -----------------------------------------------------------------------------
// JSON TRACES
// -----------------------------------------------------------------------------

pub fn setup_json_traces(subscriber: &mut TracingSubscriber<Registry>) -> DelayedWarning {
    subscriber.with_json(|| {
        let (default_filter, warning) =
            new_default_filter(AMARU_TRACE_VAR, DEFAULT_AMARU_TRACE_FILTER);
        (
            tracing_subscriber::fmt::layer()
                .event_format(
                    tracing_subscriber::fmt::format()
                        .json()
                        .with_span_list(false),
                )
                .fmt_fields(JsonFields::new())
                .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
                .with_filter(default_filter),
            warning,
        )
    })
}

// -----------------------------------------------------------------------------
// ENV FILTER
// -----------------------------------------------------------------------------

fn new_default_filter(var: &str, default: &str) -> (EnvFilter, DelayedWarning) {
    match env_filter(var) {
        Ok(filter) => (filter, None),
        Err(e) => {
            // Notice stashed for when the tracing system is up.
            let fallback = default.to_string();
            let var = var.to_string();
            let warning = match e.source().and_then(|e| e.downcast_ref::<VarError>()) {
                Some(VarError::NotPresent) => {
                    Box::new(move || info!(var, fallback, "unspecified ENV variable"))
                        as Box<dyn FnOnce()>
                }
                _ => Box::new(move || warn!(var, fallback, reason = %e, "invalid ENV variable"))
                    as Box<dyn FnOnce()>,
            };

            #[expect(clippy::expect_used)]
            let filter = with_silenced_dependencies(default).expect("invalid default filter");
            (filter, Some(warning))
        }
    }
}

fn env_filter(var: &str) -> Result<EnvFilter, FromEnvError> {
    let directives = env::var(var)?;
    Ok(with_silenced_dependencies(&directives)?)
}

/// NOTE: We filter all logs using 'none' to avoid dependencies polluting our logs, which is a
/// not so nice side-effect of the tracing library.
fn with_silenced_dependencies(directives: &str) -> Result<EnvFilter, ParseError> {
    EnvFilter::try_new(format!("none,{directives}"))
}

pub fn setup_observability(with_json_traces: bool, color: bool) {
    let mut subscriber = TracingSubscriber::new();

    let warning = if with_json_traces {
        setup_json_traces(&mut subscriber)
    } else {
        None
    };

    subscriber.init(color);

    if let Some(notify) = warning {
        notify();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Never,
    Always,
    Auto,
}

impl FromStr for Color {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(Color::Never),
            "always" => Ok(Color::Always),
            "auto" => Ok(Color::Auto),
            _ => Err("valid color settings are 'never', 'always' or 'auto'"),
        }
    }
}

impl Color {
    pub fn is_enabled(this: Option<Self>) -> bool {
        match this {
            Some(Color::Never) => false,
            Some(Color::Always) => true,
            Some(Color::Auto) => std::io::stderr().is_terminal(),
            None => {
                if std::env::var("NO_COLOR").iter().any(|s| !s.is_empty()) {
                    false
                } else {
                    std::io::stderr().is_terminal()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("never" => Ok(Color::Never))]
    #[test_case("always" => Ok(Color::Always))]
    #[test_case("auto" => Ok(Color::Auto))]
    #[test_case("sometimes" => Err(()) ; "unknown")]
    fn parse_color(s: &str) -> Result<Color, ()> {
        s.parse().map_err(|_| ())
    }

    #[test]
    fn dependencies_are_silenced() {
        let filter = with_silenced_dependencies(DEFAULT_AMARU_LOG_FILTER).unwrap();
        assert!(filter.to_string().contains("amaru_chain_observer=info"));
    }
}

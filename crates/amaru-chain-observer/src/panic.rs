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

use crate::built_info;
use std::process::exit;

/// Installs a panic handler that prints some useful diagnostics and asks the user to report the
/// issue.
pub fn panic_handler() {
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let error_message = indoc::formatdoc! {
            r#"{fatal}
                Whoops! The chain observer panicked, rather than handling the error it encountered gracefully.

                This is almost certainly a bug, and we'd appreciate a report so we can improve it.

                Please report this error at https://github.com/pragma-org/amaru/issues/new.

                In your bug report please provide the information below and if possible the code
                that produced it.
                {info}

                "#,
            info = observer_info(),
            fatal = "amaru_chain_observer::fatal::error",
        };
        eprintln!("\n{}", indent(&error_message, 3));
        prev(info);
        // Exit with a non-zero code, as the session can't carry on anyway.
        exit(1);
    }));
}

pub fn indent(lines: &str, n: usize) -> String {
    let tab = " ".repeat(n);
    lines
        .lines()
        .map(|line| format!("{tab}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn observer_info() -> String {
    format!(
        r#"
Operating System: {}
Architecture:     {}
Version:          {}"#,
        built_info::CFG_OS,
        built_info::CFG_TARGET_ARCH,
        observer_version(true),
    )
}

pub fn observer_version(include_commit_hash: bool) -> String {
    let version = built_info::PKG_VERSION;
    let suffix = if include_commit_hash {
        format!(
            "+{}",
            built_info::GIT_COMMIT_HASH_SHORT.unwrap_or("unknown")
        )
    } else {
        "".to_string()
    };
    format!("v{version}{suffix}")
}

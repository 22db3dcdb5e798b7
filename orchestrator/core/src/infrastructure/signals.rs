// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Interrupt pass-through and terminal title handling for the interactive
//! session.
//!
//! While the application container runs in the foreground, Ctrl+C must reach
//! the container runtime's interactive session instead of killing the
//! controller. Installing a tokio handler replaces the default terminate
//! disposition for the rest of the process, so teardown can never be
//! interrupted either.

use std::io::Write;
use tokio::task::JoinHandle;
use tracing::debug;

/// Keeps SIGINT from terminating the controller.
///
/// The first `engage` installs tokio's process-wide SIGINT handler, which is
/// never uninstalled. Dropping the shield only stops the listener task, so
/// interrupts stay swallowed (not restored to the default) until the process
/// exits. The CLI exits right after teardown.
pub struct InterruptShield {
    listener: Option<JoinHandle<()>>,
}

impl InterruptShield {
    /// Must be called inside a tokio runtime.
    pub fn engage() -> Self {
        let listener = tokio::spawn(async {
            loop {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => debug!("Interrupt forwarded to the application container"),
                    Err(e) => {
                        debug!("Interrupt listener unavailable: {}", e);
                        break;
                    }
                }
            }
        });
        Self {
            listener: Some(listener),
        }
    }

    /// A shield that does nothing (tests, dry runs).
    pub fn disabled() -> Self {
        Self { listener: None }
    }
}

impl Drop for InterruptShield {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// OSC 0 title for the host terminal.
pub fn title_sequence(title: &str) -> String {
    format!("\x1b]0;{}\x07", title)
}

/// Sets the terminal title on creation and clears it when dropped.
pub struct TerminalTitle {
    active: bool,
}

impl TerminalTitle {
    pub fn set(title: &str) -> Self {
        write_title(title);
        Self { active: true }
    }

    pub fn disabled() -> Self {
        Self { active: false }
    }
}

impl Drop for TerminalTitle {
    fn drop(&mut self) {
        if self.active {
            write_title("");
        }
    }
}

fn write_title(title: &str) {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(title_sequence(title).as_bytes());
    let _ = stdout.flush();
}

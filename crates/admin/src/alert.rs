// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

/// Audible cue played when a notification arrives.
pub trait Chime: Send + Sync + 'static {
    fn ring(&self);
}

/// Rings the terminal bell on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Chime for TerminalBell {
    fn ring(&self) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(b"\x07").and_then(|()| out.flush()) {
            tracing::debug!(err = %e, "failed to ring terminal bell");
        }
    }
}

/// Never makes a sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Chime for Silent {
    fn ring(&self) {}
}

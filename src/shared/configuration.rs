// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::shared::constants::DD_SIGMON_DEFAULT_MAX_FRAMES;
use crate::signal_from_signum;
use serde::{Deserialize, Serialize};

/// Process-wide settings for the signal monitor, validated once at
/// construction and immutable afterwards.
///
/// An empty signal list is allowed and means "monitor nothing":
/// initialization with such a configuration is a successful no-op. Callers
/// who want the usual fatal set should pass [`crate::default_signals`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfiguration {
    signals: Vec<i32>,
    create_alt_stack: bool,
    use_alt_stack: bool,
    max_frames: usize,
    // Whether to demangle symbol names in stack traces
    demangle_names: bool,
}

impl MonitorConfiguration {
    pub fn new(
        mut signals: Vec<i32>,
        create_alt_stack: bool,
        use_alt_stack: bool,
        max_frames: Option<usize>,
        demangle_names: bool,
    ) -> anyhow::Result<Self> {
        // Requesting to create, but not use, the altstack is considered paradoxical.
        anyhow::ensure!(
            !create_alt_stack || use_alt_stack,
            "Cannot create an altstack without using it"
        );

        // Ensure we don't have double elements in the signals list.
        let before_len = signals.len();
        signals.sort();
        signals.dedup();
        anyhow::ensure!(
            before_len == signals.len(),
            "Signals contained duplicate elements"
        );
        // Ensure that all signal values translate to a valid signum
        signals
            .iter()
            .try_for_each(|x| signal_from_signum(*x).map(|_| ()))?;

        let max_frames = max_frames.unwrap_or(DD_SIGMON_DEFAULT_MAX_FRAMES);
        anyhow::ensure!(max_frames > 0, "max_frames must be at least 1");

        Ok(Self {
            signals,
            create_alt_stack,
            use_alt_stack,
            max_frames,
            demangle_names,
        })
    }

    pub fn signals(&self) -> &Vec<i32> {
        &self.signals
    }

    pub fn create_alt_stack(&self) -> bool {
        self.create_alt_stack
    }

    pub fn use_alt_stack(&self) -> bool {
        self.use_alt_stack
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub fn demangle_names(&self) -> bool {
        self.demangle_names
    }

    /// True when the caller asked to observe SIGQUIT, which is blocked by
    /// default in some embedding environments (Android's zygote masks it so
    /// the runtime can use it for ANR dumps) and must be unblocked before a
    /// handler for it can ever fire.
    pub(crate) fn needs_quit_unmask(&self) -> bool {
        self.signals.contains(&libc::SIGQUIT)
    }
}

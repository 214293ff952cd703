// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg(unix)]

use crate::collector::{
    register_fault_handlers, set_context, spawn_reporter, FaultRelay, FaultSink, MonitorContext,
};
use crate::shared::configuration::MonitorConfiguration;
use crate::shared::error::MonitorError;
use std::sync::Arc;

/// Invoked synchronously for every setup failure, and from the reporter
/// thread if it fails to attach. Registration happens during early process
/// startup where the caller may not be positioned to inspect a return
/// value, so the notifier is the authoritative failure surface; the
/// `Result` returned by [`init_with_signals`] carries the same information
/// for callers who can use it.
pub type FailureNotifier = Arc<dyn Fn(&MonitorError) + Send + Sync>;

/// Initialize the fatal-signal monitoring infrastructure.
///
/// Installs one shared trampoline handler for every signal in the
/// configuration, on an alternate stack, and spawns the reporter thread
/// that delivers `(signal number, formatted trace)` to `sink` whenever one
/// of those signals fires. An empty signal set is a successful no-op:
/// nothing is installed and `sink` is never invoked.
///
/// Failure behavior, in the order the steps run:
/// - relay creation failure: reported as `ChannelCreationFailure`, but
///   installation continues. The handlers go in muted; faults reach the
///   OS's default handling and no diagnostic is produced.
/// - registration failure (altstack, mask, sigaction): reported and
///   returned; registration stops at the failing step, and the SIGQUIT
///   mask is restored if it had been changed.
/// - reporter spawn/attach failure: reported; handlers stay installed but
///   no further faults are delivered for the remainder of the process.
///
/// PRECONDITIONS:
///     None.
/// SAFETY:
///     Monitor functions are not reentrant.
///     No other monitor functions should be called concurrently.
/// ATOMICITY:
///     This function is not atomic. A fault during its execution may be
///     observed by a partially installed monitor. A second call returns
///     `AlreadyInitialized`: signal handling is a process-wide resource and
///     this monitor claims it once.
pub fn init_with_signals(
    config: MonitorConfiguration,
    notifier: FailureNotifier,
    sink: Box<dyn FaultSink>,
) -> anyhow::Result<()> {
    if config.signals().is_empty() {
        tracing::debug!("no signals requested; monitor left uninstalled");
        return Ok(());
    }

    let relay = match FaultRelay::new() {
        Ok(relay) => Some(relay),
        Err(e) => {
            tracing::warn!(error = %e, "fault relay unavailable; handlers will install muted");
            notifier(&MonitorError::ChannelCreationFailure);
            None
        }
    };
    let muted = relay.is_none();

    // Publish the context before touching dispositions, so a signal landing
    // between two sigaction calls already finds a working trampoline.
    let context = match set_context(MonitorContext::new(relay)) {
        Ok(context) => context,
        Err(e) => {
            notifier(&e);
            return Err(e.into());
        }
    };

    if let Err(e) = register_fault_handlers(&config) {
        notifier(&e);
        return Err(e.into());
    }
    tracing::debug!(signals = ?config.signals(), "fault handlers registered");

    if muted {
        // Nothing to wait on; the degraded-mode contract is "installed but
        // permanently silent".
        return Ok(());
    }
    if let Err(e) = spawn_reporter(context, config, sink, notifier.clone()) {
        // Events posted from here on accumulate unread in the relay, which
        // is harmless.
        notifier(&MonitorError::WorkerAttachFailure);
        return Err(e);
    }
    Ok(())
}

// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The reporter: a permanent companion thread to the registered handlers.
//!
//! It blocks on the fault relay and, per event, captures and symbolizes a
//! backtrace and hands the formatted report to the caller's sink. The sink
//! runs here, in a normal execution context, never in signal context, and
//! may allocate, lock, and perform blocking I/O freely.

use super::crash_handler::MonitorContext;
use super::stacktrace;
use crate::api::FailureNotifier;
use crate::shared::configuration::MonitorConfiguration;
use crate::shared::constants::DD_SIGMON_REPORTER_THREAD_NAME;
use crate::shared::error::MonitorError;

/// The delivery side of the monitor, implemented by the embedder.
pub trait FaultSink: Send + 'static {
    /// Called exactly once, on the reporter thread, before any delivery.
    /// Embedders that must bind the thread to a managed runtime (a JVM's
    /// AttachCurrentThread, an interpreter's thread-state) acquire that
    /// capability here and hold it for the thread's lifetime.
    ///
    /// An error mutes the monitor for the remainder of the process: the
    /// attachment is not generally something that can be re-acquired later,
    /// so the reporter does not retry.
    fn attach(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Receives one fault: the signal number and the formatted multi-line
    /// trace.
    fn on_fatal_signal(&mut self, signum: i32, trace: &str);
}

/// Spawns the reporter thread. It never exits under normal operation.
///
/// PRECONDITIONS:
///     The context must hold a relay; a muted monitor has no reporter.
/// SAFETY:
///     Monitor functions are not guaranteed to be reentrant.
///     No other monitor functions should be called concurrently.
pub(crate) fn spawn_reporter(
    context: &'static MonitorContext,
    config: MonitorConfiguration,
    mut sink: Box<dyn FaultSink>,
    notifier: FailureNotifier,
) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name(DD_SIGMON_REPORTER_THREAD_NAME.into())
        .spawn(move || {
            if let Err(e) = sink.attach() {
                tracing::error!(
                    error = %e,
                    "reporter failed to attach; fault reports are disabled for this process"
                );
                notifier(&MonitorError::WorkerAttachFailure);
                return;
            }
            run_reporter_loop(context, &config, sink.as_mut());
        })?;
    Ok(())
}

fn run_reporter_loop(
    context: &'static MonitorContext,
    config: &MonitorConfiguration,
    sink: &mut dyn FaultSink,
) {
    let Some(relay) = context.relay() else {
        return;
    };
    loop {
        let event = match relay.wait() {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "fault relay wait failed; reporter exiting");
                return;
            }
        };
        tracing::debug!(signum = event.signum(), "fault event received");
        // The trace reflects this thread's stack at dispatch time together
        // with the signal that fired; the faulting thread has already been
        // resumed or terminated by the kernel's default semantics.
        let ips = stacktrace::capture(config.max_frames());
        let frames = stacktrace::symbolize(&ips, config.demangle_names());
        let report = stacktrace::format_report(event.signum(), &frames);
        sink.on_fatal_signal(event.signum(), &report);
    }
}

// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Everything that can go wrong while installing the monitor or running the
/// reporter. Setup failures abort registration early and are reported both
/// through the caller's notifier and as an `Err`; runtime failures
/// (channel creation, worker attach) degrade the monitor to "handlers
/// installed but diagnostics not delivered" instead of crashing the
/// monitored process.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("failed to allocate the alternate signal stack")]
    AllocationFailure,
    #[error("sigaltstack rejected the alternate signal stack")]
    AltStackFailure,
    #[error("failed to restore the thread signal mask")]
    MaskRestoreFailure,
    #[error("failed to register a handler for signal {0}")]
    SignalRegistrationFailure(i32),
    #[error("failed to create the fault notification channel")]
    ChannelCreationFailure,
    #[error("reporter worker failed to attach to the embedding runtime")]
    WorkerAttachFailure,
    #[error("signal monitor is already initialized")]
    AlreadyInitialized,
    #[error("invalid signal number {0}")]
    InvalidSignal(i32),
}

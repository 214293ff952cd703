// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use super::crash_handler::handle_fault_signal;
use crate::shared::configuration::MonitorConfiguration;
use crate::shared::constants::DD_SIGMON_ALTSTACK_MIN_PAGES;
use crate::shared::error::MonitorError;
use crate::signal_from_signum;
use libc::{
    mmap, sigaltstack, MAP_ANON, MAP_FAILED, MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE,
    SIGSTKSZ,
};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::ptr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;

static INIT_STARTED: AtomicBool = AtomicBool::new(false);

/// Registers UNIX signal handlers for every signal in the configuration.
/// This function uses a flag to ensure the initialization only happens once.
///
/// Steps, in order: allocate and install the alternate stack, unblock
/// SIGQUIT for the calling thread when it is being monitored, then install
/// the shared trampoline for each signal. Any failure aborts registration
/// before touching further dispositions (fail-fast); if SIGQUIT had been
/// unblocked, the prior thread mask is restored first. Partial registration
/// is surfaced to the caller rather than silently continued.
///
/// PRECONDITIONS:
///     The monitor context must already be published, so that a signal
///     arriving between two sigaction calls finds a working trampoline.
/// SAFETY:
///     Monitor functions are not guaranteed to be reentrant.
///     No other monitor functions should be called concurrently.
/// ATOMICITY:
///     Setting a signal disposition is per-signal; a crash concurrent with
///     this function may observe partial registration.
pub(crate) fn register_fault_handlers(
    config: &MonitorConfiguration,
) -> Result<(), MonitorError> {
    // Guarantee that registration only happens once.
    if INIT_STARTED
        .compare_exchange(false, true, SeqCst, SeqCst)
        .is_err()
    {
        return Err(MonitorError::AlreadyInitialized);
    }

    if config.create_alt_stack() {
        // SAFETY: this function has no documented preconditions.
        unsafe { create_alt_stack()? };
    }

    // SIGQUIT is blocked in the starting environment of some embedders; to
    // observe it the calling thread must unblock it. The guard restores the
    // previous mask if any later step fails.
    let mut mask_guard = if config.needs_quit_unmask() {
        Some(QuitMaskGuard::unblock()?)
    } else {
        None
    };

    let extra_saflags = if config.use_alt_stack() {
        SaFlags::SA_ONSTACK
    } else {
        SaFlags::empty()
    };

    // While the trampoline runs, block every other catchable signal so that
    // handlers cannot re-enter each other; SA_RESTART lets interrupted
    // syscalls resume instead of failing with EINTR.
    let sig_action = SigAction::new(
        SigHandler::SigAction(handle_fault_signal),
        SaFlags::SA_RESTART | extra_saflags,
        SigSet::all(),
    );

    for signum in config.signals() {
        let signal_type =
            signal_from_signum(*signum).map_err(|_| MonitorError::InvalidSignal(*signum))?;
        // SAFETY: the trampoline is async-signal-safe and lives for the
        // remaining lifetime of the process.
        unsafe { signal::sigaction(signal_type, &sig_action) }
            .map_err(|_| MonitorError::SignalRegistrationFailure(*signum))?;
    }

    if let Some(guard) = mask_guard.take() {
        guard.disarm();
    }
    Ok(())
}

/// Restores the saved thread signal mask on drop unless disarmed.
/// Restoration is best-effort: failing to restore leaves SIGQUIT unblocked,
/// which is the safe direction to fail in.
struct QuitMaskGuard {
    old_mask: SigSet,
    armed: bool,
}

impl QuitMaskGuard {
    fn unblock() -> Result<Self, MonitorError> {
        let old_mask = SigSet::thread_get_mask()
            .map_err(|_| MonitorError::SignalRegistrationFailure(libc::SIGQUIT))?;
        let mut quit_set = SigSet::empty();
        quit_set.add(Signal::SIGQUIT);
        quit_set
            .thread_unblock()
            .map_err(|_| MonitorError::SignalRegistrationFailure(libc::SIGQUIT))?;
        Ok(Self {
            old_mask,
            armed: true,
        })
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for QuitMaskGuard {
    fn drop(&mut self) {
        if self.armed && self.old_mask.thread_set_mask().is_err() {
            tracing::warn!(
                error = %MonitorError::MaskRestoreFailure,
                "SIGQUIT left unblocked after failed registration"
            );
        }
    }
}

/// Allocates a signal altstack, and puts a guard page at the end.
/// Inspired by <https://github.com/rust-lang/rust/pull/69969/files>
///
/// MAP_ANON memory comes back zero-filled, so the handler can never read
/// uninitialized stack memory. The mapping is owned by the process for the
/// rest of its lifetime: freeing it while a handler could still fire would
/// be a use-after-free.
unsafe fn create_alt_stack() -> Result<(), MonitorError> {
    // The default SIGSTKSZ is 8KB, which unwinding plus symbol work can
    // exceed; use the greater of it and a fixed page count.
    let page_size = page_size::get();
    let sigaltstack_base_size = std::cmp::max(SIGSTKSZ, DD_SIGMON_ALTSTACK_MIN_PAGES * page_size);
    let stackp = mmap(
        ptr::null_mut(),
        sigaltstack_base_size + page_size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANON,
        -1,
        0,
    );
    if stackp == MAP_FAILED {
        return Err(MonitorError::AllocationFailure);
    }
    if libc::mprotect(stackp, page_size, PROT_NONE) != 0 {
        return Err(MonitorError::AllocationFailure);
    }
    let stackp = stackp.add(page_size);

    let stack = libc::stack_t {
        ss_sp: stackp,
        ss_flags: 0,
        ss_size: sigaltstack_base_size,
    };
    if sigaltstack(&stack, ptr::null_mut()) != 0 {
        return Err(MonitorError::AltStackFailure);
    }
    Ok(())
}

// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Maximum number of raw return addresses captured per fault when the
/// caller does not override it. Deep enough to reach application code from
/// the reporter loop, shallow enough to keep symbolication cheap.
pub const DD_SIGMON_DEFAULT_MAX_FRAMES: usize = 30;

/// Minimum size of the alternate signal stack, in pages. The platform
/// default SIGSTKSZ (8KB on most Linuxes) is too small for unwinding plus
/// symbol work; sixteen pages is a small enough slice of process RSS that
/// nobody will notice.
pub const DD_SIGMON_ALTSTACK_MIN_PAGES: usize = 16;

/// Name given to the reporter thread, visible in `ps -T` and crash dumps.
pub const DD_SIGMON_REPORTER_THREAD_NAME: &str = "dd-sigmon-report";

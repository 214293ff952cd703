// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
mod crash_handler;
mod fault_relay;
mod reporter;
mod signal_handler_manager;
mod stacktrace;

pub use crash_handler::{disable, enable};
pub use reporter::FaultSink;
pub use stacktrace::{capture, format_report, symbolize, SymbolizedFrame};

pub(crate) use crash_handler::{set_context, MonitorContext};
pub(crate) use fault_relay::FaultRelay;
pub(crate) use reporter::spawn_reporter;
pub(crate) use signal_handler_manager::register_fault_handlers;

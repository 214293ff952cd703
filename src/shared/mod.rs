// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Structures shared between the registration path and the reporter thread.

pub(crate) mod configuration;
pub(crate) mod constants;
pub(crate) mod error;

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure types and rules of an airlock session: identity and naming, host
//! mounts, the network policy model, the agent command vector and the
//! container runtime port.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** No I/O beyond reading files handed in by callers

pub mod agent_command;
pub mod airlock_config;
pub mod mount;
pub mod network_policy;
pub mod runtime;
pub mod session;

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Airlock core
//!
//! Runs a coding agent inside an application container whose only network
//! path is a policy-enforcing proxy container. This crate holds the session
//! model, the lifecycle controller and the adapters for the container
//! runtime, template cache and filesystem.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Session orchestration shared by the `airlock` CLI

pub mod domain;
pub mod application;
pub mod infrastructure;

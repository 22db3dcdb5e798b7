// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod git_remote;
pub mod paths;
pub mod policy_processor;
pub mod runtime;
pub mod signals;
pub mod template_store;
pub mod topology_template;

pub use paths::AirlockPaths;
pub use runtime::CliContainerRuntime;

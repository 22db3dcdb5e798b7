// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod lifecycle;
pub mod reclamation;
pub mod teardown;

pub use lifecycle::{
    SessionController, SessionError, SessionOptions, SessionReport, SessionRequest, SessionStage,
};
pub use reclamation::{OrphanReclaimer, ReclamationReport};
pub use teardown::{CleanupAction, CleanupReport, TeardownPlan};

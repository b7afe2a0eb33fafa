// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Change confirmation.
//!
//! The backend has no push channel to the cache, so the only way to know a
//! write took effect is to read it back. [`ChangeController`] publishes a
//! value, then re-fetches the topic on a bounded [`PollPolicy`] until the
//! cache shows it.

mod controller;
mod policy;

pub use controller::{ChangeController, ChangeError, ConfirmationState, SettledCallback};
pub use policy::PollPolicy;

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Backend collaborator.
//!
//! The cache never talks to the network itself. A [`Transport`] fetches
//! topic subtrees and publishes single values; [`InMemoryTransport`] is a
//! process-local backend for demos and tests.

mod memory;
mod traits;

pub use memory::InMemoryTransport;
pub use traits::{
    FetchRequest, FetchResponse, PublishResponse, Transport, TransportError, PUBACK, STATUS_OK,
};

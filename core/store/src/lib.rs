// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Document collections addressed by [`ObjectId`].
//!
//! Services depend on the [`Collection`] trait only; [`MemoryCollection`] is
//! the bundled implementation.

pub mod collection;
pub mod config;
pub mod errors;
pub mod memory;
pub mod object_id;

pub use collection::{Collection, Cursor, Document, ID_FIELD, from_document, to_document};
pub use config::{StoreConfig, StoreKind};
pub use errors::StoreError;
pub use memory::MemoryCollection;
pub use object_id::ObjectId;

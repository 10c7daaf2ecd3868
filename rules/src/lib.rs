// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation of declared security-group rules with the registry.
//!
//! Declared rules enter through [`schema`], which checks the raw strings a
//! user wrote and produces typed [`DeclaredRule`]s.  [`rules_upsert`] and
//! [`rules_delete`] turn those into a single synchronization request and hand
//! it to a [`SyncClient`].

mod rules;
pub mod schema;
mod sync_client;

pub use rules::*;
pub use sync_client::*;

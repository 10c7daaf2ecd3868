// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Security-group rules: common facilities
//!
//! This crate holds the types shared by everything that talks to the
//! security-group registry: the user-facing port-range language, transport
//! protocols, the error type callers see, and the wire format of the
//! synchronization request.  The synchronization logic itself lives in
//! `sgroups-rules`.

// We only use rustdoc for internal documentation, including private items, so
// it's expected that we'll have links to private items in the docs.
#![allow(rustdoc::private_intra_doc_links)]

pub mod api;

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Externally-visible API types ([`external`]) and the types exchanged with
//! the security-group registry ([`internal`]).

pub mod external;
pub mod internal;

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data structures and related facilities for representing rules as users
//! declare them
//!
//! The contents here are all transport-agnostic.

mod error;
mod port_range;

pub use error::*;
pub use port_range::*;

use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FormatResult;
use std::str::FromStr;

/// The L4 transport protocol a rule applies to
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    /// The canonical (upper-case) name of the protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        }
    }
}

impl Display for Transport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "{}", self.as_str())
    }
}

/// Protocol names are matched without regard to case: `tcp`, `TCP` and `Tcp`
/// all parse as [`Transport::Tcp`].
impl FromStr for Transport {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Transport::Tcp, Transport::Udp]
            .into_iter()
            .find(|transport| transport.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                format!(
                    "unsupported transport: \"{}\" (expected \"tcp\" or \
                     \"udp\")",
                    value
                )
            })
    }
}

#[cfg(test)]
mod test {
    use super::Transport;

    #[test]
    fn test_transport_parse() {
        for (input, expected) in [
            ("tcp", Transport::Tcp),
            ("TCP", Transport::Tcp),
            ("Tcp", Transport::Tcp),
            ("udp", Transport::Udp),
            ("uDP", Transport::Udp),
        ] {
            assert_eq!(input.parse::<Transport>().unwrap(), expected);
        }

        for input in ["", "icmp", "tcp ", "tcp6"] {
            eprintln!("check transport \"{}\" (expecting error)", input);
            assert!(input.parse::<Transport>().is_err());
        }

        assert_eq!(
            "sctp".parse::<Transport>().unwrap_err(),
            "unsupported transport: \"sctp\" (expected \"tcp\" or \"udp\")"
        );
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(Transport::Tcp.to_string(), "TCP");
        assert_eq!(Transport::Udp.to_string(), "UDP");
        assert_eq!(serde_json::to_string(&Transport::Udp).unwrap(), "\"UDP\"");
    }
}

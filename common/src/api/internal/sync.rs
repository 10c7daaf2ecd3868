// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire format of the registry's synchronization RPC.

use crate::api::external::PortRange;
use crate::api::external::Transport;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// What the registry should do with the rules in a [`SyncRequest`]
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    /// Replace the stored rules for every (transport, from, to) key present
    /// in the request.
    Upsert,
    /// Remove the stored rules matching each key, whatever their ports.
    Delete,
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOp::Upsert => write!(f, "upsert"),
            SyncOp::Delete => write!(f, "delete"),
        }
    }
}

/// A rule as sent to the registry
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Rule {
    pub transport: Transport,
    pub sg_from: String,
    pub sg_to: String,
    pub ports_from: Vec<PortRange>,
    pub ports_to: Vec<PortRange>,
}

impl Rule {
    /// The key the registry stores this rule under:
    /// `<TRANSPORT>:<sg_from>-<sg_to>`
    ///
    /// Ports are not part of the key.
    pub fn key(&self) -> String {
        format!("{}:{}-{}", self.transport, self.sg_from, self.sg_to)
    }
}

/// One unit of work for the registry
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SyncRequest {
    pub op: SyncOp,
    pub rules: Vec<Rule>,
}

/// The registry's acknowledgement of a [`SyncRequest`]
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SyncAck {}

/// Opaque handle for a synchronized set of rules
///
/// The identity is the sorted, de-duplicated list of rule keys (see
/// [`Rule::key`]) joined with `;`.  Two rule sets with the same keys have the
/// same identity regardless of order, repetition, or ports.
#[derive(
    Clone,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(transparent)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    pub fn from_rules<'a, I>(rules: I) -> ResourceIdentity
    where
        I: IntoIterator<Item = &'a Rule>,
    {
        let mut keys: Vec<String> =
            rules.into_iter().map(|rule| rule.key()).collect();
        // `dedup` only removes adjacent repeats.
        keys.sort();
        keys.dedup();
        ResourceIdentity(keys.join(";"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_strategy::proptest;

    fn rule(transport: Transport, from: &str, to: &str, port: u16) -> Rule {
        Rule {
            transport,
            sg_from: from.to_string(),
            sg_to: to.to_string(),
            ports_from: vec![PortRange::single(port)],
            ports_to: vec![],
        }
    }

    #[test]
    fn test_identity() {
        let rules = vec![
            rule(Transport::Udp, "sg-b", "sg-a", 53),
            rule(Transport::Tcp, "sg-a", "sg-b", 80),
            rule(Transport::Tcp, "sg-a", "sg-b", 443),
        ];
        assert_eq!(
            ResourceIdentity::from_rules(&rules).as_str(),
            "TCP:sg-a-sg-b;UDP:sg-b-sg-a"
        );
        assert_eq!(ResourceIdentity::from_rules(&Vec::new()).as_str(), "");
    }

    #[test]
    fn test_sync_request_serialization() {
        let request = SyncRequest {
            op: SyncOp::Upsert,
            rules: vec![rule(Transport::Tcp, "a", "b", 22)],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "op": "upsert",
                "rules": [{
                    "transport": "TCP",
                    "sg_from": "a",
                    "sg_to": "b",
                    "ports_from": [{ "start": 22, "end": 22 }],
                    "ports_to": [],
                }],
            })
        );
    }

    #[proptest]
    fn proptest_identity_ignores_order_and_duplicates(
        #[strategy(proptest::collection::vec(
            (
                proptest::bool::ANY,
                "[a-c]{1,2}",
                "[a-c]{1,2}",
                proptest::num::u16::ANY,
            ),
            0..8,
        ))]
        triples: Vec<(bool, String, String, u16)>,
        seed: usize,
    ) {
        let rules: Vec<Rule> = triples
            .iter()
            .map(|(udp, from, to, port)| {
                let transport =
                    if *udp { Transport::Udp } else { Transport::Tcp };
                rule(transport, from, to, *port)
            })
            .collect();

        // Rotate, reverse, and repeat some of the rules with other ports.
        let mut shuffled = rules.clone();
        if !shuffled.is_empty() {
            let mid = seed % shuffled.len();
            shuffled.rotate_left(mid);
            shuffled.reverse();
            let mut extra = shuffled[mid].clone();
            let port = extra.ports_from[0].start() ^ 1;
            extra.ports_from = vec![PortRange::single(port)];
            shuffled.push(extra);
        }

        assert_eq!(
            ResourceIdentity::from_rules(&rules),
            ResourceIdentity::from_rules(&shuffled)
        );
    }
}

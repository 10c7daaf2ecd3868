// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The declarative form of a rules resource, and its validation
//!
//! A resource is written as a list of items whose fields are all strings:
//!
//! ```toml
//! [[rules]]
//! proto = "tcp"
//! sg-from = "web"
//! sg-to = "db"
//! ports-from = "1024-65535"
//! ports-to = "5432"
//! ```
//!
//! Validation checks every field of every item and reports all problems at
//! once, each tagged with the path of the offending attribute.  Port
//! expressions are checked here so users hear about mistakes early; they are
//! expanded again, authoritatively, when the rules are upserted.  Deletion
//! only needs each rule's key, so [`RulesResource::validate_keys`] leaves the
//! port expressions unchecked.

use crate::DeclaredRule;
use crate::PortsField;
use serde::Deserialize;
use serde::Serialize;
use sgroups_common::api::external::is_port_ranges_valid;
use sgroups_common::api::external::Transport;
use std::fmt;

pub const LABEL_RULES: &str = "rules";
pub const LABEL_PROTO: &str = "proto";

/// One rule, as written by the user
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuleItem {
    pub proto: String,
    pub sg_from: String,
    pub sg_to: String,
    pub ports_from: String,
    pub ports_to: String,
}

/// A rules resource, as written by the user
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RulesResource {
    #[serde(default)]
    pub rules: Vec<RuleItem>,
}

/// A problem with one attribute of a declared resource
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    /// e.g. `rules[1].ports-to`
    pub path: String,
    pub summary: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.summary)
    }
}

/// Every problem found while validating a resource
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl std::error::Error for Diagnostics {}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for diagnostic in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

/// Checks a protocol name (`tcp` or `udp`, in any case).
pub fn validate_proto(
    value: &str,
    path: &str,
) -> Result<Transport, Diagnostic> {
    value.parse().map_err(|_| Diagnostic {
        path: path.to_string(),
        summary: format!("bad proto: '{}'", value),
    })
}

/// Checks a port-range expression.
pub fn validate_port_ranges(value: &str, path: &str) -> Result<(), Diagnostic> {
    if is_port_ranges_valid(value) {
        return Ok(());
    }
    Err(Diagnostic {
        path: path.to_string(),
        summary: format!("bad port ranges: '{}'", value),
    })
}

/// Which attributes of an item are checked
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Checks {
    All,
    KeyOnly,
}

impl RuleItem {
    /// Validates this item, found at `path`, and converts it into a
    /// [`DeclaredRule`].
    pub fn validate(
        &self,
        path: &str,
    ) -> Result<DeclaredRule, Vec<Diagnostic>> {
        self.check(path, Checks::All)
    }

    /// Like [`RuleItem::validate`], but leaves the port expressions
    /// unchecked.
    pub fn validate_key(
        &self,
        path: &str,
    ) -> Result<DeclaredRule, Vec<Diagnostic>> {
        self.check(path, Checks::KeyOnly)
    }

    fn check(
        &self,
        path: &str,
        checks: Checks,
    ) -> Result<DeclaredRule, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        let transport =
            match validate_proto(&self.proto, &format!("{path}.{LABEL_PROTO}"))
            {
                Ok(transport) => Some(transport),
                Err(d) => {
                    diagnostics.push(d);
                    None
                }
            };
        if checks == Checks::All {
            for (field, value) in [
                (PortsField::From, &self.ports_from),
                (PortsField::To, &self.ports_to),
            ] {
                if let Err(d) =
                    validate_port_ranges(value, &format!("{path}.{field}"))
                {
                    diagnostics.push(d);
                }
            }
        }

        match transport {
            Some(transport) if diagnostics.is_empty() => Ok(DeclaredRule {
                transport,
                sg_from: self.sg_from.clone(),
                sg_to: self.sg_to.clone(),
                ports_from: self.ports_from.clone(),
                ports_to: self.ports_to.clone(),
            }),
            _ => Err(diagnostics),
        }
    }
}

impl RulesResource {
    /// Validates every item, returning the declared rules in order.
    pub fn validate(&self) -> Result<Vec<DeclaredRule>, Diagnostics> {
        self.check(Checks::All)
    }

    /// Validates what a delete needs: at least one item, each with a valid
    /// `proto`.  Port expressions are carried through as written.
    pub fn validate_keys(&self) -> Result<Vec<DeclaredRule>, Diagnostics> {
        self.check(Checks::KeyOnly)
    }

    fn check(&self, checks: Checks) -> Result<Vec<DeclaredRule>, Diagnostics> {
        if self.rules.is_empty() {
            return Err(Diagnostics(vec![Diagnostic {
                path: LABEL_RULES.to_string(),
                summary: String::from("at least one rule is required"),
            }]));
        }

        let mut declared = Vec::with_capacity(self.rules.len());
        let mut diagnostics = Vec::new();
        for (index, item) in self.rules.iter().enumerate() {
            match item.check(&format!("{LABEL_RULES}[{index}]"), checks) {
                Ok(rule) => declared.push(rule),
                Err(problems) => diagnostics.extend(problems),
            }
        }

        if diagnostics.is_empty() {
            Ok(declared)
        } else {
            Err(Diagnostics(diagnostics))
        }
    }
}

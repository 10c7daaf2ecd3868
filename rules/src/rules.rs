// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Functionality related to synchronizing declared rules.

use crate::SyncClient;
use sgroups_common::api::external::for_each_port_range;
use sgroups_common::api::external::Error;
use sgroups_common::api::external::PortRange;
use sgroups_common::api::external::PortRangeError;
use sgroups_common::api::external::Transport;
use sgroups_common::api::internal::sync::ResourceIdentity;
use sgroups_common::api::internal::sync::Rule;
use sgroups_common::api::internal::sync::SyncOp;
use sgroups_common::api::internal::sync::SyncRequest;
use slog::debug;
use slog::info;
use slog::warn;
use slog::Logger;
use std::fmt;

/// A rule as declared by the user
///
/// The transport has already been checked (see [`crate::schema`]); the port
/// expressions are kept as written and only expanded when the rule is
/// upserted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeclaredRule {
    pub transport: Transport,
    pub sg_from: String,
    pub sg_to: String,
    pub ports_from: String,
    pub ports_to: String,
}

/// Which port expression of a rule an error refers to
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PortsField {
    From,
    To,
}

impl PortsField {
    /// The attribute name users write the field under
    pub fn label(&self) -> &'static str {
        match self {
            PortsField::From => "ports-from",
            PortsField::To => "ports-to",
        }
    }
}

impl fmt::Display for PortsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A port expression of a declared rule could not be expanded
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{field} '{ports}', {err}")]
pub struct InvalidPorts {
    pub field: PortsField,
    /// the expression exactly as declared
    pub ports: String,
    #[source]
    pub err: PortRangeError,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// A declared rule was rejected before anything was sent to the registry.
    #[error("rule {index}: {err}")]
    InvalidRule {
        index: usize,
        #[source]
        err: InvalidPorts,
    },
    /// The registry (or the transport used to reach it) reported a failure.
    #[error(transparent)]
    Sync(#[from] Error),
}

impl From<SyncError> for Error {
    fn from(error: SyncError) -> Error {
        match error {
            SyncError::InvalidRule { index, err } => Error::invalid_value(
                &format!("rules[{}].{}", index, err.field),
                &format!("'{}': {}", err.ports, err.err),
            ),
            SyncError::Sync(error) => error,
        }
    }
}

fn expand_ports(
    field: PortsField,
    ports: &str,
) -> Result<Vec<PortRange>, InvalidPorts> {
    let mut ranges = Vec::new();
    for_each_port_range(ports, |range| {
        ranges.push(range);
        Ok::<(), PortRangeError>(())
    })
    .map_err(|err| InvalidPorts { field, ports: ports.to_string(), err })?;
    Ok(ranges)
}

impl DeclaredRule {
    /// Builds the rule sent to the registry on upsert, expanding both port
    /// expressions in the order they were written.
    pub fn to_rule(&self) -> Result<Rule, InvalidPorts> {
        Ok(Rule {
            transport: self.transport,
            sg_from: self.sg_from.clone(),
            sg_to: self.sg_to.clone(),
            ports_from: expand_ports(PortsField::From, &self.ports_from)?,
            ports_to: expand_ports(PortsField::To, &self.ports_to)?,
        })
    }

    /// Builds the rule sent to the registry on delete.
    ///
    /// Deletion is keyed on (transport, from, to) alone, so the port
    /// expressions are neither parsed nor sent.
    pub fn to_key_rule(&self) -> Rule {
        Rule {
            transport: self.transport,
            sg_from: self.sg_from.clone(),
            sg_to: self.sg_to.clone(),
            ports_from: Vec::new(),
            ports_to: Vec::new(),
        }
    }
}

async fn send_sync_request<C>(
    client: &C,
    request: &SyncRequest,
    log: &Logger,
) -> Result<(), Error>
where
    C: SyncClient + ?Sized,
{
    debug!(log, "sending rules to registry"; "op" => %request.op);
    if let Err(e) = client.sync(request).await {
        warn!(log, "failed to synchronize rules with registry";
            "op" => %request.op,
            "rules" => request.rules.len(),
            "error" => %e);
        return Err(e);
    }
    Ok(())
}

/// Replaces the registry's rules for every key in `declared` and returns the
/// identity of the synchronized set.
///
/// Every rule is expanded before anything is sent: if any of them is
/// invalid, the registry is not contacted at all.
pub async fn rules_upsert<C>(
    client: &C,
    declared: &[DeclaredRule],
    log: &Logger,
) -> Result<ResourceIdentity, SyncError>
where
    C: SyncClient + ?Sized,
{
    let rules = declared
        .iter()
        .enumerate()
        .map(|(index, rule)| {
            rule.to_rule().map_err(|err| SyncError::InvalidRule { index, err })
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(log, "resolved rules for upsert"; "rules" => ?rules);

    let request = SyncRequest { op: SyncOp::Upsert, rules };
    send_sync_request(client, &request, log).await?;

    let identity = ResourceIdentity::from_rules(&request.rules);
    info!(log, "upserted {} rules", request.rules.len();
        "identity" => %identity);
    Ok(identity)
}

/// Removes the registry's rules for every key in `declared`, whatever ports
/// they were stored with.
pub async fn rules_delete<C>(
    client: &C,
    declared: &[DeclaredRule],
    log: &Logger,
) -> Result<(), SyncError>
where
    C: SyncClient + ?Sized,
{
    let rules: Vec<Rule> =
        declared.iter().map(DeclaredRule::to_key_rule).collect();
    debug!(log, "resolved rules for delete"; "rules" => ?rules);

    let request = SyncRequest { op: SyncOp::Delete, rules };
    send_sync_request(client, &request, log).await?;

    info!(log, "deleted {} rules", request.rules.len());
    Ok(())
}

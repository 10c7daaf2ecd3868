// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line front end for synchronizing security-group rules

use anyhow::bail;
use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use sgroups_common::api::external::parse_port_ranges;
use sgroups_common::api::external::Error;
use sgroups_common::api::external::PortRange;
use sgroups_rules::rules_delete;
use sgroups_rules::rules_upsert;
use sgroups_rules::schema::Diagnostics;
use sgroups_rules::schema::RulesResource;
use sgroups_rules::DeclaredRule;
use sgroups_rules::HttpSyncClient;
use slog::info;

mod config;

use config::read_toml;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SgroupsRulesApp::parse();
    args.exec().await
}

/// Keep a security-group registry's rules in step with a rules file.
#[derive(Clone, Debug, Parser)]
#[clap(version)]
struct SgroupsRulesApp {
    #[clap(subcommand)]
    command: SgroupsRulesCmd,
}

impl SgroupsRulesApp {
    async fn exec(&self) -> Result<(), anyhow::Error> {
        match &self.command {
            SgroupsRulesCmd::Upsert(args) => args.exec(Op::Upsert).await,
            SgroupsRulesCmd::Delete(args) => args.exec(Op::Delete).await,
            SgroupsRulesCmd::Check(args) => args.exec(),
        }
    }
}

#[derive(Clone, Debug, Subcommand)]
enum SgroupsRulesCmd {
    /// Replace the registry's rules for every key in a rules file, then print
    /// the resource identity
    Upsert(SyncArgs),
    /// Remove the registry's rules for every key in a rules file
    Delete(SyncArgs),
    /// Check port-range expressions and print what they expand to
    Check(CheckArgs),
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Upsert,
    Delete,
}

impl Op {
    /// Validates `resource` as far as this operation needs.  A delete only
    /// needs each rule's key, so it goes ahead whatever the declared ports.
    fn declared_rules(
        self,
        resource: &RulesResource,
    ) -> Result<Vec<DeclaredRule>, Diagnostics> {
        match self {
            Op::Upsert => resource.validate(),
            Op::Delete => resource.validate_keys(),
        }
    }
}

#[derive(Clone, Debug, Args)]
struct SyncArgs {
    /// Path to the tool's configuration file
    #[clap(short, long, env = "SGROUPS_RULES_CONFIG", action)]
    config: Utf8PathBuf,
    /// Path to the TOML rules file
    #[clap(action)]
    rules_file: Utf8PathBuf,
}

impl SyncArgs {
    async fn exec(&self, op: Op) -> Result<(), anyhow::Error> {
        let config = Config::from_file(&self.config)?;
        let log = config
            .log
            .to_logger("sgroups-rules")
            .context("initializing logger")?;

        let resource: RulesResource = read_toml(&self.rules_file)?;
        let declared = op
            .declared_rules(&resource)
            .with_context(|| format!("invalid rules in {}", self.rules_file))?;

        let client = HttpSyncClient::new_with_client(
            &config.registry.url,
            config
                .registry
                .reqwest_client()
                .context("building HTTP client")?,
            &log,
        );
        info!(log, "synchronizing rules";
            "op" => ?op,
            "rules_file" => %self.rules_file,
            "rules" => declared.len(),
        );

        let result = match op {
            Op::Upsert => {
                rules_upsert(&client, &declared, &log).await.map(|identity| {
                    println!("{identity}");
                })
            }
            Op::Delete => rules_delete(&client, &declared, &log).await,
        };
        if let Err(error) = result {
            let error = Error::from(error);
            if error.retryable() {
                eprintln!("note: the registry may accept a later retry");
            }
            return Err(error.into());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Args)]
struct CheckArgs {
    /// Port-range expressions, e.g. "22, 80 1000-2000"
    #[clap(required = true, action)]
    exprs: Vec<String>,
}

impl CheckArgs {
    fn exec(&self) -> Result<(), anyhow::Error> {
        let mut nbad = 0;
        for expr in &self.exprs {
            match parse_port_ranges(expr).collect::<Result<Vec<_>, _>>() {
                Ok(ranges) => println!("{expr:?}: {}", format_ranges(&ranges)),
                Err(error) => {
                    println!("{expr:?}: {error}");
                    nbad += 1;
                }
            }
        }
        if nbad > 0 {
            bail!("{nbad} of {} expressions are invalid", self.exprs.len());
        }
        Ok(())
    }
}

fn format_ranges(ranges: &[PortRange]) -> String {
    ranges.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(" ")
}

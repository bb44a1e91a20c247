//! `bounties`: operate an LMDB-backed bounty ledger from the command line.
//!
//! Each invocation opens the data directory, runs one command as the
//! identity given by `--as`, and prints the result as JSON on stdout.

mod config;
mod view;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use bounty_ledger::{BountyEvent, BountyLedger};
use bounty_store::StoreVault;
use bounty_store_lmdb::{LmdbBountyStore, LmdbEnvironment, LmdbVaultStore};
use bounty_types::{Amount, BountyId, Clock, FulfilmentId, Identity, SystemClock, Timestamp};
use bounty_utils::LogFormat;

use config::DaemonConfig;
use view::BountyView;

type Ledger = BountyLedger<LmdbBountyStore, StoreVault<LmdbVaultStore>, SystemClock>;

#[derive(Parser)]
#[command(name = "bounties", about = "Escrowed bounty ledger", version)]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and environment variables override them.
    #[arg(long, global = true, env = "BOUNTIES_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the ledger database.
    #[arg(long, global = true, env = "BOUNTIES_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// LMDB map size in MiB.
    #[arg(long, global = true, env = "BOUNTIES_MAP_SIZE_MB")]
    map_size_mb: Option<usize>,

    /// Log filter: "trace", "debug", "info", "warn", "error".
    #[arg(long, global = true, env = "BOUNTIES_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output: "human" or "json".
    #[arg(long, global = true, env = "BOUNTIES_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Identity to act as.
    #[arg(long = "as", global = true, env = "BOUNTIES_IDENTITY")]
    identity: Option<Identity>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Payload {
    /// Payload as text.
    #[arg(long, conflicts_with = "data_hex")]
    data: Option<String>,

    /// Payload as hex bytes.
    #[arg(long)]
    data_hex: Option<String>,
}

impl Payload {
    fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        match (&self.data, &self.data_hex) {
            (Some(text), _) => Ok(text.as_bytes().to_vec()),
            (None, Some(h)) => {
                let h = h.strip_prefix("0x").unwrap_or(h);
                hex::decode(h).context("--data-hex is not valid hex")
            }
            (None, None) => Ok(Vec::new()),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Credit spendable value to an identity.
    Deposit {
        amount: Amount,
        /// Recipient (defaults to --as).
        #[arg(long)]
        to: Option<Identity>,
    },
    /// Show the spendable balance of an identity.
    Balance {
        /// Owner (defaults to --as).
        owner: Option<Identity>,
    },
    /// Post a bounty, escrowing its amount from --as.
    Issue {
        amount: Amount,
        /// Deadline as seconds from now.
        #[arg(long, conflicts_with = "deadline")]
        deadline_in: Option<u64>,
        /// Deadline as Unix seconds.
        #[arg(long)]
        deadline: Option<u64>,
        #[command(flatten)]
        payload: Payload,
    },
    /// Submit a fulfilment against a bounty.
    Fulfil {
        bounty: BountyId,
        #[command(flatten)]
        payload: Payload,
    },
    /// Accept a fulfilment and pay its fulfiler.
    Accept {
        bounty: BountyId,
        fulfilment: FulfilmentId,
    },
    /// Cancel a bounty and refund its issuer.
    Cancel { bounty: BountyId },
    /// Show one bounty with its fulfilments.
    Show { bounty: BountyId },
    /// List bounties.
    List {
        /// Only open bounties.
        #[arg(long)]
        open: bool,
    },
    /// Totals by status and escrow accounting.
    Summary,
    /// Cross-check the bounty arena against the escrow book.
    Check,
}

impl Cli {
    fn caller(&self) -> anyhow::Result<Identity> {
        self.identity
            .clone()
            .context("this command needs an identity: pass --as <name> or set BOUNTIES_IDENTITY")
    }

    fn resolve_config(&self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => DaemonConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(mb) = self.map_size_mb {
            config.map_size_mb = mb;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    bounty_utils::init_logging(config.log_format, &config.log_level);

    let env = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())
        .with_context(|| format!("opening ledger at {}", config.data_dir.display()))?;
    tracing::debug!(data_dir = %config.data_dir.display(), "ledger opened");

    let ledger: Ledger = BountyLedger::with_config(
        env.bounty_store(),
        StoreVault::new(env.vault_store()),
        SystemClock,
        config.ledger.clone(),
    );
    ledger.events().subscribe(Box::new(|event| {
        tracing::info!(event = event.name(), bounty = %event.bounty_id(), "ledger event");
    }));
    let mut events = ledger.events().channel();
    let reconciled = ledger
        .reconcile()
        .context("finishing interrupted escrow movements")?;
    if reconciled > 0 {
        tracing::warn!(reconciled, "finished interrupted escrow movements");
    }

    let mut output = run(&cli, &env, &ledger)?;

    let mut emitted: Vec<BountyEvent> = Vec::new();
    while let Ok(event) = events.try_recv() {
        emitted.push(event);
    }
    if let (false, Some(fields)) = (emitted.is_empty(), output.as_object_mut()) {
        fields.insert("events".to_string(), serde_json::to_value(&emitted)?);
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(cli: &Cli, env: &LmdbEnvironment, ledger: &Ledger) -> anyhow::Result<serde_json::Value> {
    let now = ledger.clock().now();
    let vault = StoreVault::new(env.vault_store());
    let value = match &cli.command {
        Command::Deposit { amount, to } => {
            let owner = match to {
                Some(owner) => owner.clone(),
                None => cli.caller()?,
            };
            let balance = vault.deposit(&owner, *amount)?;
            json!({ "owner": owner, "balance": balance.to_string() })
        }
        Command::Balance { owner } => {
            let owner = match owner {
                Some(owner) => owner.clone(),
                None => cli.caller()?,
            };
            let balance = vault.balance(&owner)?;
            json!({ "owner": owner, "balance": balance.to_string() })
        }
        Command::Issue {
            amount,
            deadline_in,
            deadline,
            payload,
        } => {
            let caller = cli.caller()?;
            let deadline = match (deadline_in, deadline) {
                (Some(secs), _) => now.plus_secs(*secs),
                (None, Some(at)) => Timestamp::new(*at),
                (None, None) => bail!("issue needs --deadline-in <secs> or --deadline <unix secs>"),
            };
            let data = payload.to_bytes()?;
            let id = ledger
                .issue(&caller, data, deadline, *amount)
                .context("issuing bounty")?;
            json!({ "bounty_id": id, "deadline": deadline.as_secs() })
        }
        Command::Fulfil { bounty, payload } => {
            let caller = cli.caller()?;
            let data = payload.to_bytes()?;
            let id = ledger
                .fulfil(&caller, *bounty, data)
                .with_context(|| format!("fulfilling bounty {bounty}"))?;
            json!({ "bounty_id": bounty, "fulfilment_id": id })
        }
        Command::Accept { bounty, fulfilment } => {
            let caller = cli.caller()?;
            ledger
                .accept_fulfilment(&caller, *bounty, *fulfilment)
                .with_context(|| format!("accepting fulfilment {fulfilment} of bounty {bounty}"))?;
            json!(BountyView::new(&ledger.bounty(*bounty)?, now))
        }
        Command::Cancel { bounty } => {
            let caller = cli.caller()?;
            ledger
                .cancel_bounty(&caller, *bounty)
                .with_context(|| format!("cancelling bounty {bounty}"))?;
            json!(BountyView::new(&ledger.bounty(*bounty)?, now))
        }
        Command::Show { bounty } => json!(BountyView::new(&ledger.bounty(*bounty)?, now)),
        Command::List { open } => {
            let bounties = if *open {
                ledger.open_bounties()?
            } else {
                ledger.bounties()?
            };
            let views: Vec<BountyView> = bounties.iter().map(|b| BountyView::new(b, now)).collect();
            json!(views)
        }
        Command::Summary => {
            let summary = ledger.summary()?;
            let custody = vault.escrowed_total()?;
            if custody != summary.escrowed {
                tracing::warn!(
                    ledger = %summary.escrowed,
                    custody = %custody,
                    "escrow totals disagree"
                );
            }
            json!({
                "bounties": summary.bounties,
                "open": summary.open,
                "paid": summary.paid,
                "cancelled": summary.cancelled,
                "fulfilments": summary.fulfilments,
                "escrowed": summary.escrowed.to_string(),
                "custody_escrowed": custody.to_string(),
            })
        }
        Command::Check => {
            let report = env.check_integrity()?;
            json!({
                "healthy": report.is_healthy(),
                "bounties_checked": report.bounties_checked,
                "escrows_checked": report.escrows_checked,
                "errors": report.errors,
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    fn exec(env: &LmdbEnvironment, ledger: &Ledger, args: &[&str]) -> anyhow::Result<serde_json::Value> {
        let cli = Cli::try_parse_from(std::iter::once("bounties").chain(args.iter().copied()))?;
        run(&cli, env, ledger)
    }

    #[test]
    fn commands_drive_a_full_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let ledger: Ledger = BountyLedger::new(
            env.bounty_store(),
            StoreVault::new(env.vault_store()),
            SystemClock,
        );

        let out = exec(&env, &ledger, &["--as", "alice", "deposit", "1_000"]).unwrap();
        assert_eq!(out["balance"], "1000");

        let out = exec(
            &env,
            &ledger,
            &["--as", "alice", "issue", "600", "--deadline-in", "3600", "--data", "fix it"],
        )
        .unwrap();
        assert_eq!(out["bounty_id"], 0);

        let out = exec(&env, &ledger, &["--as", "bob", "fulfil", "0", "--data-hex", "0xff01"]).unwrap();
        assert_eq!(out["fulfilment_id"], 0);

        let err = exec(&env, &ledger, &["--as", "bob", "accept", "0", "0"]).unwrap_err();
        assert!(format!("{err:#}").contains("not the issuer"));

        let out = exec(&env, &ledger, &["--as", "alice", "accept", "0", "0"]).unwrap();
        assert_eq!(out["status"], "paid");
        assert_eq!(out["fulfilments"][0]["data"], "0xff01");

        let out = exec(&env, &ledger, &["balance", "bob"]).unwrap();
        assert_eq!(out["balance"], "600");

        let out = exec(&env, &ledger, &["check"]).unwrap();
        assert_eq!(out["healthy"], true);

        let out = exec(&env, &ledger, &["list", "--open"]).unwrap();
        assert_eq!(out.as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn identity_is_required_for_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let ledger: Ledger = BountyLedger::new(
            env.bounty_store(),
            StoreVault::new(env.vault_store()),
            SystemClock,
        );
        let err = exec(&env, &ledger, &["cancel", "0"]).unwrap_err();
        assert!(err.to_string().contains("--as"));
    }

    #[test]
    fn issue_requires_a_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let ledger: Ledger = BountyLedger::new(
            env.bounty_store(),
            StoreVault::new(env.vault_store()),
            SystemClock,
        );
        let err = exec(&env, &ledger, &["--as", "alice", "issue", "5"]).unwrap_err();
        assert!(err.to_string().contains("--deadline"));
    }
}

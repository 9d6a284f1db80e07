//! Kv command: the caching helpers against the local table.

use anyhow::Context;
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use tally_core::config::Config;
use tally_core::kv::{KvStore, KvTable, Ttl};

/// Arguments for the `kv` subcommand.
#[derive(Args, Debug)]
pub struct KvArgs {
    /// Operation to run
    #[command(subcommand)]
    pub op: KvOp,
}

/// Expiry flag shared by writing operations.
#[derive(Args, Debug, Default, Clone)]
pub struct TtlArg {
    /// Expiry: epoch seconds, or seconds from now when below 604801
    /// (default: 90 days)
    #[arg(long, value_name = "SECONDS", value_parser = parse_ttl)]
    pub ttl: Option<Ttl>,
}

impl TtlArg {
    fn ttl(&self) -> Ttl {
        self.ttl.unwrap_or_default()
    }
}

fn parse_ttl(raw: &str) -> Result<Ttl, String> {
    raw.parse().map_err(|e: tally_core::kv::KvError| e.to_string())
}

/// Caching operations.
#[derive(Subcommand, Debug)]
pub enum KvOp {
    /// Read a counter
    Get {
        /// Key to read
        key: String,
        /// Treat an expired item as missing
        #[arg(long)]
        force_ttl_check: bool,
    },

    /// Add to a counter and print the new value
    Incr {
        /// Key to update
        key: String,
        /// Amount to add (may be negative)
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        by: i64,
        #[command(flatten)]
        ttl: TtlArg,
    },

    /// Reset a counter to zero
    ResetCounter {
        /// Key to reset
        key: String,
    },

    /// Set when a key expires
    Expire {
        /// Key to update
        key: String,
        /// Epoch seconds, or seconds from now when below 604801
        #[arg(value_parser = parse_ttl)]
        ttl: Ttl,
    },

    /// Store a JSON object
    DictPut {
        /// Key to write
        key: String,
        /// JSON object
        #[arg(id = "json_value", value_name = "JSON")]
        json: String,
        #[command(flatten)]
        ttl: TtlArg,
    },

    /// Read a stored JSON object
    DictGet {
        /// Key to read
        key: String,
        /// Treat an expired item as missing
        #[arg(long)]
        force_ttl_check: bool,
    },

    /// Read a string set
    SetGet {
        /// Key to read
        key: String,
        /// Treat an expired item as missing
        #[arg(long)]
        force_ttl_check: bool,
    },

    /// Replace a string set (no values resets it)
    SetPut {
        /// Key to write
        key: String,
        /// Members
        values: Vec<String>,
        #[command(flatten)]
        ttl: TtlArg,
    },

    /// Add members to a string set
    SetAdd {
        /// Key to update
        key: String,
        /// Members to add
        values: Vec<String>,
        #[command(flatten)]
        ttl: TtlArg,
    },

    /// Remove members from a string set
    SetRemove {
        /// Key to update
        key: String,
        /// Members to remove
        values: Vec<String>,
        #[command(flatten)]
        ttl: TtlArg,
    },

    /// Drop a string set
    SetReset {
        /// Key to reset
        key: String,
    },

    /// Count a hit and report whether the threshold was reached
    Threshold {
        /// Key to count under
        key: String,
        /// Hits that fire the threshold
        threshold: i64,
        /// Window length in seconds, started by the first hit
        expiry_seconds: i64,
    },

    /// Whether a key records a newly created account
    AccountAge {
        /// Account or user id key
        key: String,
    },

    /// Show the raw stored item
    Inspect {
        /// Key to show
        key: String,
    },
}

/// Execute the kv command.
#[instrument(name = "cmd_kv", skip_all, fields(json_output))]
pub fn cmd_kv(args: KvArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(json_output = global_json, op = ?args.op, "executing kv command");

    let store = KvStore::open(config).context("failed to open kv table")?;
    let value = run_op(&store, args.op)?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_value(&value);
    }
    Ok(())
}

fn run_op<T: KvTable>(store: &KvStore<T>, op: KvOp) -> anyhow::Result<Value> {
    let value = match op {
        KvOp::Get {
            key,
            force_ttl_check,
        } => json!(store.get_counter(&key, force_ttl_check)?),
        KvOp::Incr { key, by, ttl } => json!(store.increment_counter(&key, by, ttl.ttl())?),
        KvOp::ResetCounter { key } => {
            store.reset_counter(&key)?;
            Value::Null
        }
        KvOp::Expire { key, ttl } => {
            store.set_key_expiration(&key, ttl)?;
            Value::Null
        }
        KvOp::DictPut { key, json, ttl } => {
            let parsed: Value =
                serde_json::from_str(&json).context("dictionary must be valid JSON")?;
            store.put_dictionary(&key, &parsed, ttl.ttl())?;
            Value::Null
        }
        KvOp::DictGet {
            key,
            force_ttl_check,
        } => Value::Object(store.get_dictionary(&key, force_ttl_check)?),
        KvOp::SetGet {
            key,
            force_ttl_check,
        } => json!(store.get_string_set(&key, force_ttl_check)?),
        KvOp::SetPut { key, values, ttl } => {
            store.put_string_set(&key, values, ttl.ttl())?;
            Value::Null
        }
        KvOp::SetAdd { key, values, ttl } => {
            json!(store.add_to_string_set(&key, values, ttl.ttl())?)
        }
        KvOp::SetRemove { key, values, ttl } => {
            json!(store.remove_from_string_set(&key, values, ttl.ttl())?)
        }
        KvOp::SetReset { key } => {
            store.reset_string_set(&key)?;
            Value::Null
        }
        KvOp::Threshold {
            key,
            threshold,
            expiry_seconds,
        } => json!(store.evaluate_threshold(&key, threshold, expiry_seconds)?),
        KvOp::AccountAge { key } => json!(store.check_account_age(&key)?),
        KvOp::Inspect { key } => serde_json::to_value(store.inspect(&key)?)?,
    };
    Ok(value)
}

fn print_value(value: &Value) {
    match value {
        Value::Null => println!("  {} ok", "✓".green()),
        Value::Array(items) if items.is_empty() => println!("  {}", "(empty set)".dimmed()),
        Value::Array(items) => {
            for item in items {
                println!("{}", item.as_str().unwrap_or_default());
            }
        }
        Value::Object(_) => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
        }
        other => println!("{other}"),
    }
}

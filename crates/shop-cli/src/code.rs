//! # Code Subcommand
//!
//! - `parse` breaks a record code into kind, bucket and sequence.
//! - `next` computes the code that follows `--after` (or the first code of
//!   the bucket) for a kind at a given instant, the same way record
//!   creation does.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::{json, Value};

use shop_core::{CodeProposal, CodeSequencer, EntityKind, RecordCode, Timestamp};

/// Arguments for the `shop code` subcommand.
#[derive(Args, Debug)]
pub struct CodeArgs {
    #[command(subcommand)]
    pub command: CodeCommand,
}

/// Code subcommands.
#[derive(Subcommand, Debug)]
pub enum CodeCommand {
    /// Parse a record code such as `RPR2025010007`.
    Parse {
        /// The code to parse.
        code: String,
    },

    /// Compute the next code for a kind.
    Next {
        /// Entity kind: repair, bill, service or license.
        #[arg(long)]
        kind: EntityKind,
        /// Greatest existing code in the bucket.
        #[arg(long)]
        after: Option<String>,
        /// Instant to allocate at (RFC 3339, defaults to now).
        #[arg(long)]
        at: Option<String>,
    },
}

/// Execute the code subcommand.
pub fn run_code(args: &CodeArgs) -> Result<u8> {
    let out = match &args.command {
        CodeCommand::Parse { code } => parse_code(code)?,
        CodeCommand::Next { kind, after, at } => {
            let now = match at {
                Some(at) => Timestamp::parse_lenient(at)?,
                None => Timestamp::now(),
            };
            next_code(*kind, after.as_deref(), now)?
        }
    };
    crate::emit(&out)?;
    Ok(0)
}

fn parse_code(code: &str) -> Result<Value> {
    let code = RecordCode::parse(code)?;
    Ok(json!({
        "code": code.to_string(),
        "kind": code.kind(),
        "prefix": code.kind().prefix(),
        "bucket": code.bucket(),
        "sequence": code.sequence(),
    }))
}

fn next_code(kind: EntityKind, after: Option<&str>, now: Timestamp) -> Result<Value> {
    match CodeSequencer::propose(kind, now, after)? {
        CodeProposal::Next(code) => Ok(json!({ "kind": kind, "code": code.to_string() })),
        CodeProposal::Corrupted { found } => {
            bail!("{found} has a malformed sequence; the bucket must be scanned against the store")
        }
    }
}

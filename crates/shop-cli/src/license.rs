//! # License-Key Subcommand
//!
//! Draws fresh license keys. Uniqueness is only guaranteed once a key is
//! stored; this command does not consult a store.

use anyhow::{bail, Result};
use clap::Args;
use rand::Rng;
use serde_json::{json, Value};

use shop_core::LicenseKey;

/// Upper bound on keys per invocation.
const MAX_COUNT: usize = 1000;

/// Arguments for the `shop license-key` subcommand.
#[derive(Args, Debug)]
pub struct LicenseKeyArgs {
    /// Number of keys to generate.
    #[arg(long, default_value_t = 1)]
    pub count: usize,
}

/// Execute the license-key subcommand.
pub fn run_license_key(args: &LicenseKeyArgs) -> Result<u8> {
    let out = keys(args.count, &mut rand::thread_rng())?;
    crate::emit(&out)?;
    Ok(0)
}

fn keys<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Result<Value> {
    if count == 0 || count > MAX_COUNT {
        bail!("--count must be between 1 and {MAX_COUNT}");
    }
    let keys: Vec<String> = (0..count).map(|_| LicenseKey::generate(&mut *rng).to_string()).collect();
    Ok(json!({ "keys": keys }))
}

//! # shop-cli: Shop Records Command-Line Interface
//!
//! Offline inspection commands over the records core. Nothing here touches
//! a store; every command is a pure function of its arguments (and the
//! clock or RNG where noted) and prints JSON on stdout.
//!
//! ## Subcommands
//!
//! - `code parse` / `code next`: record code structure and allocation
//! - `bill totals`: tax, discount and total for a subtotal
//! - `transitions`: the lifecycle transition table of an entity kind
//! - `license-key`: fresh license keys
//!
//! Argument parsing lives in the `*Args` types; the `run_*` handlers
//! delegate to `shop-core` and `shop-state` and return an exit code.

pub mod bill;
pub mod code;
pub mod license;
pub mod transitions;

/// Print `value` as pretty JSON on stdout.
pub fn emit(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! # Bill Subcommand
//!
//! `totals` runs the bill calculator on a subtotal and percentage rates,
//! rounding half-up to the cent.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{json, Value};

use shop_core::{BillTotals, Money, Rate};

/// Arguments for the `shop bill` subcommand.
#[derive(Args, Debug)]
pub struct BillArgs {
    #[command(subcommand)]
    pub command: BillCommand,
}

/// Bill subcommands.
#[derive(Subcommand, Debug)]
pub enum BillCommand {
    /// Compute tax, discount and total.
    Totals {
        /// Subtotal, e.g. `1000.00`.
        #[arg(long)]
        subtotal: String,
        /// Tax percentage, e.g. `10` or `7.25`.
        #[arg(long, default_value = "0")]
        tax: String,
        /// Discount percentage.
        #[arg(long, default_value = "0")]
        discount: String,
    },
}

/// Execute the bill subcommand.
pub fn run_bill(args: &BillArgs) -> Result<u8> {
    let out = match &args.command {
        BillCommand::Totals {
            subtotal,
            tax,
            discount,
        } => totals(subtotal, tax, discount)?,
    };
    crate::emit(&out)?;
    Ok(0)
}

fn totals(subtotal: &str, tax: &str, discount: &str) -> Result<Value> {
    let subtotal = Money::parse(subtotal)?;
    let tax_rate = Rate::parse(tax)?;
    let discount_rate = Rate::parse(discount)?;
    let totals = BillTotals::recompute(subtotal, tax_rate, discount_rate)?;
    Ok(json!({
        "subtotal": totals.subtotal,
        "tax_rate": tax_rate,
        "discount_rate": discount_rate,
        "tax_amount": totals.tax_amount,
        "discount_amount": totals.discount_amount,
        "total": totals.total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_bill() {
        let v = totals("1000.00", "10", "5").unwrap();
        assert_eq!(v["tax_amount"], "100.00");
        assert_eq!(v["discount_amount"], "50.00");
        assert_eq!(v["total"], "1050.00");
    }

    #[test]
    fn rejects_out_of_range_rate() {
        let err = totals("10.00", "101", "0").unwrap_err();
        assert!(err.to_string().contains("tax_rate"), "{err}");
    }

    #[test]
    fn rejects_negative_subtotal() {
        assert!(totals("-1.00", "0", "0").is_err());
    }
}

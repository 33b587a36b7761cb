//! # shop CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shop_cli::bill::{run_bill, BillArgs};
use shop_cli::code::{run_code, CodeArgs};
use shop_cli::license::{run_license_key, LicenseKeyArgs};
use shop_cli::transitions::{run_transitions, TransitionsArgs};

/// Shop records toolkit.
///
/// Inspects record codes, bill arithmetic, lifecycle tables and license
/// keys. Output is JSON on stdout.
#[derive(Parser, Debug)]
#[command(name = "shop", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse record codes or compute the next one.
    Code(CodeArgs),

    /// Bill arithmetic.
    Bill(BillArgs),

    /// Show lifecycle transition tables.
    Transitions(TransitionsArgs),

    /// Generate license keys.
    LicenseKey(LicenseKeyArgs),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Code(args) => run_code(&args),
        Commands::Bill(args) => run_bill(&args),
        Commands::Transitions(args) => run_transitions(&args),
        Commands::LicenseKey(args) => run_license_key(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_cli::bill::BillCommand;
    use shop_cli::code::CodeCommand;
    use shop_core::EntityKind;

    #[test]
    fn cli_parse_code_next() {
        let cli = Cli::try_parse_from(["shop", "code", "next", "--kind", "license", "--at", "2025-01-15T10:00:00Z"])
            .unwrap();
        let Commands::Code(args) = cli.command else {
            panic!("expected code subcommand");
        };
        let CodeCommand::Next { kind, after, at } = args.command else {
            panic!("expected next");
        };
        assert_eq!(kind, EntityKind::License);
        assert!(after.is_none());
        assert_eq!(at.as_deref(), Some("2025-01-15T10:00:00Z"));
    }

    #[test]
    fn cli_parse_bill_totals_defaults() {
        let cli = Cli::try_parse_from(["shop", "bill", "totals", "--subtotal", "12.50"]).unwrap();
        let Commands::Bill(args) = cli.command else {
            panic!("expected bill subcommand");
        };
        let BillCommand::Totals { subtotal, tax, discount } = args.command;
        assert_eq!(subtotal, "12.50");
        assert_eq!(tax, "0");
        assert_eq!(discount, "0");
    }

    #[test]
    fn cli_parse_transitions_to_requires_from() {
        assert!(Cli::try_parse_from(["shop", "transitions", "--kind", "bill", "--to", "paid"]).is_err());
        assert!(Cli::try_parse_from(["shop", "transitions", "--kind", "bill", "--from", "pending", "--to", "paid"]).is_ok());
    }

    #[test]
    fn cli_parse_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["shop", "transitions", "--kind", "invoice"]).is_err());
    }

    #[test]
    fn cli_parse_license_key_count() {
        let cli = Cli::try_parse_from(["shop", "license-key", "--count", "3"]).unwrap();
        let Commands::LicenseKey(args) = cli.command else {
            panic!("expected license-key subcommand");
        };
        assert_eq!(args.count, 3);
    }
}

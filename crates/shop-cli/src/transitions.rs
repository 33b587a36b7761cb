//! # Transitions Subcommand
//!
//! Prints the lifecycle transition table of an entity kind, or the row of
//! a single state. With `--to`, answers whether one transition is allowed.

use anyhow::{bail, Result};
use clap::Args;
use serde_json::{json, Value};

use shop_core::EntityKind;
use shop_state::{can_transition_named, AnyStatus};

/// Arguments for the `shop transitions` subcommand.
#[derive(Args, Debug)]
pub struct TransitionsArgs {
    /// Entity kind: repair, bill, service or license.
    #[arg(long)]
    pub kind: EntityKind,
    /// Restrict the table to one state.
    #[arg(long)]
    pub from: Option<String>,
    /// Check a single transition from `--from` to this state.
    #[arg(long, requires = "from")]
    pub to: Option<String>,
}

/// Execute the transitions subcommand.
pub fn run_transitions(args: &TransitionsArgs) -> Result<u8> {
    let out = transitions(args.kind, args.from.as_deref(), args.to.as_deref())?;
    crate::emit(&out)?;
    Ok(0)
}

fn row(status: &AnyStatus) -> Value {
    json!({
        "status": status.as_str(),
        "terminal": status.is_terminal(),
        "next": status.valid_transitions(),
    })
}

fn transitions(kind: EntityKind, from: Option<&str>, to: Option<&str>) -> Result<Value> {
    match (from, to) {
        (Some(from), Some(to)) => Ok(json!({
            "kind": kind,
            "from": from,
            "to": to,
            "allowed": can_transition_named(kind, from, to)?,
        })),
        (Some(from), None) => {
            let status = AnyStatus::parse(kind, from)?;
            Ok(json!({ "kind": kind, "states": [row(&status)] }))
        }
        (None, None) => {
            let states: Vec<Value> = AnyStatus::all(kind).iter().map(row).collect();
            Ok(json!({ "kind": kind, "states": states }))
        }
        (None, Some(_)) => bail!("--to requires --from"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_table_lists_every_state() {
        let v = transitions(EntityKind::Bill, None, None).unwrap();
        let states = v["states"].as_array().unwrap();
        assert_eq!(states.len(), 4);
        assert_eq!(states[0]["status"], "pending");
        assert_eq!(states[0]["next"], json!(["paid", "cancelled", "overdue"]));
    }

    #[test]
    fn single_row_marks_terminal_states() {
        let v = transitions(EntityKind::License, Some("revoked"), None).unwrap();
        assert_eq!(v["states"][0]["terminal"], true);
        assert_eq!(v["states"][0]["next"], json!([]));
    }

    #[test]
    fn pair_check() {
        let v = transitions(EntityKind::Repair, Some("requested"), Some("completed")).unwrap();
        assert_eq!(v["allowed"], false);
        let v = transitions(EntityKind::Repair, Some("waiting_parts"), Some("in_progress")).unwrap();
        assert_eq!(v["allowed"], true);
    }

    #[test]
    fn unknown_status_is_an_error() {
        assert!(transitions(EntityKind::Service, Some("delivered"), None).is_err());
    }
}

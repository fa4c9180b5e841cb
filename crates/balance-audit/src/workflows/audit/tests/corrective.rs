use rust_decimal_macros::dec;

use super::common::*;
use crate::workflows::audit::corrective::{allocate_result, suggest, EntryDraft};
use crate::workflows::audit::domain::{EntrySide, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::BalanceSnapshot;

#[test]
fn draft_refuses_unbalanced_or_degenerate_entries() {
    assert!(EntryDraft::new()
        .debit("6011", "Achats", dec!(100))
        .credit("4011", "Fournisseurs", dec!(90))
        .finish()
        .is_none());
    assert!(EntryDraft::new().debit("6011", "Achats", dec!(100)).finish().is_none());
    assert!(EntryDraft::new()
        .debit("6011", "Achats", dec!(0))
        .credit("4011", "Fournisseurs", dec!(0))
        .finish()
        .is_none());
}

#[test]
fn draft_rounds_amounts_to_cents() {
    let entry = EntryDraft::new()
        .debit("6011", "Achats", dec!(100.004))
        .credit("4011", "Fournisseurs", dec!(100.001))
        .comment("arrondi")
        .finish()
        .expect("balanced after rounding");

    assert_eq!(entry.total(EntrySide::Debit), dec!(100.00));
    assert_eq!(entry.comment.as_deref(), Some("arrondi"));
}

#[test]
fn profit_is_allocated_to_retained_earnings() {
    let entry = allocate_result(dec!(500000)).expect("profit entry");

    assert_eq!(entry.lines[0].side, EntrySide::Debit);
    assert_eq!(entry.lines[0].account_code, "131");
    assert_eq!(entry.lines[1].account_code, "121");
    assert_eq!(entry.total(EntrySide::Credit), dec!(500000));
}

#[test]
fn loss_is_allocated_to_debit_retained_earnings() {
    let entry = allocate_result(dec!(-120000)).expect("loss entry");

    assert_eq!(entry.lines[0].account_code, "129");
    assert_eq!(entry.lines[1].account_code, "139");
    assert_eq!(entry.total(EntrySide::Debit), dec!(120000));
    assert!(allocate_result(dec!(0)).is_none());
}

#[test]
fn wrong_side_accounts_are_grouped_per_target() {
    let snapshot = BalanceSnapshot::new(
        "2024",
        vec![
            line("4111", "Clients", dec!(0), dec!(100)),
            line("4112", "Clients groupe", dec!(0), dec!(50)),
            line("4011", "Fournisseurs", dec!(80), dec!(0)),
            line("5211", "Banque", dec!(1000), dec!(0)),
        ],
    );
    let outcome = RuleOutcome::anomaly(Severity::Mineur, "sens inverse")
        .with_accounts(["4111", "4112", "4011", "5211", "9999"]);

    let entry = suggest(&outcome, &snapshot).expect("reclassification");

    assert!(entry.is_balanced());
    let accounts: Vec<(&str, EntrySide)> = entry
        .lines
        .iter()
        .map(|line| (line.account_code.as_str(), line.side))
        .collect();
    assert_eq!(
        accounts,
        vec![
            ("4111", EntrySide::Debit),
            ("4112", EntrySide::Debit),
            ("4011", EntrySide::Credit),
            ("4091", EntrySide::Debit),
            ("4191", EntrySide::Credit),
        ]
    );
    let clients_target = entry
        .lines
        .iter()
        .find(|line| line.account_code == "4191")
        .expect("4191 line");
    assert_eq!(clients_target.amount, dec!(150));
}

#[test]
fn nothing_to_reclassify_yields_no_entry() {
    let outcome = RuleOutcome::anomaly(Severity::Mineur, "sens inverse").with_accounts(["4111"]);
    assert!(suggest(&outcome, &current_snapshot()).is_none());
}

//! Level 8: continuity across exercises, read from the N-1 snapshot.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::support::{amount, codes, with_prior};
use super::ControlRule;
use crate::workflows::audit::domain::{Level, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::BalanceSnapshot;

const NOISE: Decimal = dec!(1);
const EQUITY: [&str; 4] = ["10", "11", "12", "14"];
const CONTRIBUTORS: [&str; 2] = ["4611", "4612"];

pub(super) fn rules() -> Vec<ControlRule> {
    let level = Level::MULTI_YEAR;
    vec![
        ControlRule::new("AR-002", level, "Continuite du capital", Severity::Mineur, |current, prior| {
            with_prior(prior, "continuite du capital", |prior| capital_continuity(current, prior))
        }),
        ControlRule::new("AR-003", level, "Tendance des resultats", Severity::Info, |current, prior| {
            with_prior(prior, "tendance des resultats", |prior| result_trend(current, prior))
        }),
        ControlRule::new(
            "AR-005",
            level,
            "Reports a nouveau successifs",
            Severity::Majeur,
            |current, prior| {
                with_prior(prior, "reports a nouveau successifs", |prior| {
                    successive_retained_earnings(current, prior)
                })
            },
        ),
        ControlRule::new(
            "AR-006",
            level,
            "Methodes comptables stables",
            Severity::Info,
            |current, prior| {
                with_prior(prior, "permanence des methodes", |prior| method_stability(current, prior))
            },
        ),
        ControlRule::new(
            "AR-007",
            level,
            "Ajustements retrospectifs",
            Severity::Majeur,
            |current, prior| {
                with_prior(prior, "ajustements retrospectifs", |prior| {
                    retrospective_adjustments(current, prior)
                })
            },
        ),
    ]
}

fn capital_continuity(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let now = current.credit_net("10");
    let before = prior.credit_net("10");
    let change = now - before;
    if change.abs() <= NOISE {
        return RuleOutcome::ok(format!("Capital stable: {}", amount(now)));
    }

    // An increase is backed by contributions (4611/4612), uncalled capital (109)
    // or reserves incorporated; a decrease by amounts due to partners.
    let contributions: Decimal = CONTRIBUTORS
        .iter()
        .map(|prefix| current.absolute_balances(prefix))
        .sum();
    let incorporated = (prior.credit_net("11") - current.credit_net("11")).max(Decimal::ZERO);
    let backed = if change > Decimal::ZERO {
        contributions > Decimal::ZERO || current.has_balance("109") || incorporated >= change - NOISE
    } else {
        current.has_balance("4619") || current.has_balance("4618")
    };
    if backed {
        return RuleOutcome::ok(format!(
            "Variation de capital de {} adossee a une operation identifiable",
            amount(change)
        ));
    }
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!(
            "Capital passe de {} a {} sans contrepartie identifiable",
            amount(before),
            amount(now)
        ),
    )
    .with_accounts(codes(current.entries_with_prefix("10")))
    .with_amount("capital_n", now)
    .with_amount("capital_n1", before)
    .with_amount("variation", change)
    .with_suggestion("Justifier la variation par le proces-verbal d'assemblee et les actes publies")
    .with_reference("Art. 8 Acte uniforme OHADA, permanence des methodes")
}

fn result_trend(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    // Earlier losses survive as a debit RAN in N-1.
    let earlier = prior.credit_net("12");
    let previous = prior.exercise_result();
    let latest = current.exercise_result();
    let series = [
        ("anterieurs", earlier),
        (prior.exercise(), previous),
        (current.exercise(), latest),
    ];
    if series.iter().all(|(_, result)| *result < Decimal::ZERO) {
        let cumulated: Decimal = series.iter().map(|(_, result)| result.abs()).sum();
        let description = series
            .iter()
            .map(|(exercise, result)| format!("{exercise}: {}", amount(*result)))
            .collect::<Vec<_>>()
            .join("; ");
        return RuleOutcome::anomaly(
            Severity::Info,
            "Deficits consecutifs: pertes anterieures, N-1 et N",
        )
        .with_description(description)
        .with_amount("deficits_cumules", cumulated)
        .with_suggestion(
            "Evaluer la continuite d'exploitation et verifier que les capitaux propres restent \
             superieurs a la moitie du capital",
        )
        .with_reference("Art. 664 AUSCGIE");
    }
    RuleOutcome::ok(format!(
        "Resultats: N-1 {}, N {}",
        amount(previous),
        amount(latest)
    ))
}

fn successive_retained_earnings(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let before = prior.credit_net("12");
    let now = current.credit_net("12");
    let variation = now - before;
    let prior_result = prior.exercise_result();

    // RAN can gain at most the N-1 profit; it can lose the N-1 loss plus what
    // moved to reserves, capital or distributions.
    let absorbed = (current.credit_net("11") - prior.credit_net("11")).max(Decimal::ZERO)
        + (current.credit_net("10") - prior.credit_net("10")).max(Decimal::ZERO)
        + current.credit_balances("465");
    let upper = prior_result.max(Decimal::ZERO);
    let lower = prior_result.min(Decimal::ZERO) - absorbed;

    if variation > upper + NOISE || variation < lower - NOISE {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!(
                "Report a nouveau passe de {} a {}, variation incompatible avec le resultat N-1 ({})",
                amount(before),
                amount(now),
                amount(prior_result)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("12")))
        .with_amount("ran_n1", before)
        .with_amount("ran_n", now)
        .with_amount("resultat_n1", prior_result)
        .with_amount("affectations_identifiees", absorbed)
        .with_suggestion(
            "Reconstituer la chaine des reports a nouveau: dividendes, mises en reserve, \
             incorporations au capital",
        )
        .with_reference("Art. 8 Acte uniforme OHADA, permanence des methodes");
    }
    RuleOutcome::ok("Reports a nouveau coherents")
}

fn roots(snapshot: &BalanceSnapshot) -> BTreeSet<&str> {
    snapshot
        .entries()
        .iter()
        .map(|entry| entry.account_code.get(..2).unwrap_or(entry.account_code.as_str()))
        .collect()
}

fn method_stability(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let now = roots(current);
    let before = roots(prior);
    let added: Vec<&str> = now.difference(&before).copied().collect();
    let removed: Vec<&str> = before.difference(&now).copied().collect();
    if added.len() <= 5 && removed.len() <= 5 {
        return RuleOutcome::ok("Methodes comptables stables");
    }
    RuleOutcome::anomaly(
        Severity::Info,
        format!(
            "Changements de structure: +{} comptes principaux, -{} comptes principaux",
            added.len(),
            removed.len()
        ),
    )
    .with_accounts(
        added
            .iter()
            .map(|root| format!("+{root}"))
            .chain(removed.iter().map(|root| format!("-{root}"))),
    )
    .with_amount("nouveaux", Decimal::from(added.len()))
    .with_amount("supprimes", Decimal::from(removed.len()))
    .with_suggestion("Documenter les changements de nomenclature dans l'annexe")
    .with_reference("Art. 8 Acte uniforme OHADA, permanence des methodes")
}

fn retrospective_adjustments(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    if !current.has_opening_balances() {
        return RuleOutcome::ok("Soldes d'ouverture non renseignes, ajustements non detectables");
    }
    // The N-1 result reaches the opening of N through 13x even when N-1 was
    // exported before closing.
    let closing_before: Decimal = EQUITY.iter().map(|prefix| prior.credit_net(prefix)).sum::<Decimal>()
        + prior.booked_result()
        + prior.pending_result();
    let opening_now: Decimal = EQUITY
        .iter()
        .chain(std::iter::once(&"13"))
        .map(|prefix| -current.opening_net_balance(prefix))
        .sum();
    let adjustment = opening_now - closing_before;
    if adjustment.abs() <= NOISE {
        return RuleOutcome::ok("Pas d'ajustement retrospectif");
    }
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!(
            "Ajustement retrospectif de {} sur les capitaux propres d'ouverture",
            amount(adjustment)
        ),
    )
    .with_accounts(codes(current.entries_with_prefix("12")))
    .with_amount("capitaux_propres_cloture_n1", closing_before)
    .with_amount("capitaux_propres_ouverture_n", opening_now)
    .with_amount("ajustement", adjustment)
    .with_suggestion(
        "Documenter la correction d'erreur ou le changement de methode dans l'annexe \
         (nature, motif, incidence sur les exercices anterieurs)",
    )
    .with_reference("Art. 8 Acte uniforme OHADA, changements de methodes")
}

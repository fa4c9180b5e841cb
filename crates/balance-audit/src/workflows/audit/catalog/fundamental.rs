//! Level 1: general equilibria and the minimum skeleton of a balance.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::support::{amount, codes, percent, with_prior};
use super::{ControlRule, Tolerance};
use crate::workflows::audit::domain::{Level, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::{BalanceEntry, BalanceSnapshot};

const RESULT_NOISE: Decimal = dec!(1);
const MANDATORY_CLASSES: [u8; 6] = [1, 2, 4, 5, 6, 7];
const COLLECTIVE_ACCOUNTS: [&str; 2] = ["401", "411"];

pub(super) fn rules() -> Vec<ControlRule> {
    let level = Level::FUNDAMENTAL;
    vec![
        ControlRule::new("F-001", level, "Equilibre general N", Severity::Bloquant, |current, _| {
            general_balance(current)
        }),
        ControlRule::new(
            "F-002",
            level,
            "Equilibre general N-1",
            Severity::Bloquant,
            |_, prior| with_prior(prior, "equilibre N-1", general_balance),
        ),
        ControlRule::new("F-003", level, "Resultat coherent", Severity::Bloquant, |current, _| {
            result_matches_13x(current)
        }),
        ControlRule::new(
            "F-004",
            level,
            "Total bilan equilibre",
            Severity::Bloquant,
            |current, _| balance_sheet_equilibrium(current),
        ),
        ControlRule::new(
            "F-005",
            level,
            "Classes essentielles presentes",
            Severity::Majeur,
            |current, _| mandatory_classes(current),
        ),
        ControlRule::new("F-006", level, "Compte capital present", Severity::Majeur, |current, _| {
            share_capital(current)
        }),
        ControlRule::new("F-007", level, "Compte resultat present", Severity::Mineur, |current, _| {
            result_account(current)
        }),
        ControlRule::new(
            "F-008",
            level,
            "Report a nouveau coherent",
            Severity::Majeur,
            |current, prior| {
                with_prior(prior, "report a nouveau", |prior| {
                    retained_earnings(current, prior)
                })
            },
        ),
        ControlRule::new(
            "F-009",
            level,
            "Nombre de comptes suffisant",
            Severity::Mineur,
            |current, _| minimum_accounts(current),
        ),
        ControlRule::new("F-010", level, "Comptes a solde nul", Severity::Info, |current, _| {
            zero_balance_accounts(current)
        }),
        ControlRule::new("F-011", level, "Comptes collectifs", Severity::Mineur, |current, _| {
            collective_accounts(current)
        }),
    ]
}

fn general_balance(snapshot: &BalanceSnapshot) -> RuleOutcome {
    let debit = snapshot.total_closing_debit();
    let credit = snapshot.total_closing_credit();
    let outcome = Tolerance::critical(Decimal::ZERO).compare(
        &format!("Total debit / total credit {}", snapshot.exercise()),
        debit,
        credit,
    );
    if outcome.is_anomaly() {
        outcome
            .with_suggestion(
                "La somme des soldes debiteurs doit egaler la somme des soldes crediteurs; \
                 rechercher l'ecriture desequilibree avant tout ajustement",
            )
            .with_reference("Art. 19 Acte uniforme OHADA relatif au droit comptable")
    } else {
        outcome
    }
}

fn result_matches_13x(current: &BalanceSnapshot) -> RuleOutcome {
    let computed = current.income_statement_result();
    if !current.has_prefix("13") {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Resultat calcule: {} mais pas de compte 13x",
                amount(computed)
            ),
        )
        .with_amount("resultat_calcule", computed);
    }
    if !current.has_open_income_statement() {
        return RuleOutcome::ok(format!(
            "Comptes de gestion soldes, resultat porte au 13x: {}",
            amount(current.booked_result())
        ));
    }

    let booked = current.booked_result();
    let gap = (computed - booked).abs();
    if gap > RESULT_NOISE {
        return RuleOutcome::anomaly(
            Severity::Bloquant,
            format!(
                "Ecart de {} entre resultat calcule et compte 13x",
                amount(gap)
            ),
        )
        .with_amount("resultat_calcule", computed)
        .with_amount("resultat_comptabilise", booked)
        .with_amount("ecart", gap)
        .with_suggestion("Le resultat (produits - charges) doit correspondre au solde du compte 13x")
        .with_reference("Art. 34 Acte uniforme OHADA");
    }
    RuleOutcome::ok(format!("Resultat coherent: {}", amount(computed)))
}

fn balance_sheet_equilibrium(current: &BalanceSnapshot) -> RuleOutcome {
    let (assets, liabilities) = current
        .entries()
        .iter()
        .filter(|entry| entry.in_classes(1..=5))
        .fold((Decimal::ZERO, Decimal::ZERO), |(assets, liabilities), entry| {
            let net = entry.net();
            if net > Decimal::ZERO {
                (assets + net, liabilities)
            } else {
                (assets, liabilities - net)
            }
        });
    let liabilities = liabilities + current.pending_result();
    let gap = (assets - liabilities).abs();
    if gap > RESULT_NOISE {
        return RuleOutcome::anomaly(
            Severity::Bloquant,
            format!(
                "Desequilibre bilan: actif={}, passif={} (ecart {})",
                amount(assets),
                amount(liabilities),
                amount(gap)
            ),
        )
        .with_amount("actif", assets)
        .with_amount("passif", liabilities)
        .with_amount("ecart", gap)
        .with_suggestion("Le total de l'actif doit etre egal au total du passif")
        .with_reference("Art. 29 Acte uniforme OHADA");
    }
    RuleOutcome::ok(format!("Bilan equilibre: {}", amount(assets)))
}

fn mandatory_classes(current: &BalanceSnapshot) -> RuleOutcome {
    let missing: Vec<String> = MANDATORY_CLASSES
        .iter()
        .filter(|class| {
            !current
                .entries()
                .iter()
                .any(|entry| entry.class() == Some(**class))
        })
        .map(|class| class.to_string())
        .collect();
    if missing.is_empty() {
        return RuleOutcome::ok("Toutes les classes essentielles sont presentes");
    }
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!("Classes manquantes: {}", missing.join(", ")),
    )
    .with_accounts(missing)
    .with_suggestion("Une balance complete doit contenir les classes 1, 2, 4, 5, 6 et 7")
}

fn share_capital(current: &BalanceSnapshot) -> RuleOutcome {
    if !current.has_prefix("101") {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            "Aucun compte de capital social (101x) trouve",
        )
        .with_suggestion("Le capital social est obligatoire pour toute societe");
    }
    RuleOutcome::ok(format!(
        "Capital social: {}",
        amount(current.credit_net("101"))
    ))
}

fn result_account(current: &BalanceSnapshot) -> RuleOutcome {
    if !current.has_prefix("13") {
        return RuleOutcome::anomaly(Severity::Mineur, "Aucun compte de resultat (13x) trouve")
            .with_suggestion("Le resultat de l'exercice doit apparaitre dans la balance");
    }
    RuleOutcome::ok(format!("Resultat: {}", amount(current.booked_result())))
}

fn retained_earnings(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let prior_result = prior.exercise_result();
    if !current.has_prefix("12") {
        if prior_result.is_zero() {
            return RuleOutcome::ok("Pas de report a nouveau ni de resultat N-1");
        }
        return RuleOutcome::anomaly(
            Severity::Majeur,
            "Pas de report a nouveau (12x) alors que la balance N-1 a un resultat",
        )
        .with_amount("resultat_n1", prior_result)
        .with_suggestion("Le resultat N-1 doit etre reporte ou affecte en N");
    }

    // RAN in N is the cumulated retained earnings: prior RAN plus the prior result
    // when it was carried forward rather than put in reserves.
    let carried = current.credit_net("12") - prior.credit_net("12");
    let gap = (carried - prior_result).abs();
    if gap > RESULT_NOISE && !carried.is_zero() {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!(
                "Variation du report a nouveau ({}) differente du resultat N-1 ({})",
                amount(carried),
                amount(prior_result)
            ),
        )
        .with_amount("variation_ran", carried)
        .with_amount("resultat_n1", prior_result)
        .with_amount("ecart", gap)
        .with_suggestion("Le report a nouveau doit recevoir le resultat de l'exercice precedent");
    }
    RuleOutcome::ok(format!(
        "Report a nouveau coherent: {}",
        amount(current.credit_net("12"))
    ))
}

fn minimum_accounts(current: &BalanceSnapshot) -> RuleOutcome {
    let count = current.len();
    if count < 50 {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!("Seulement {count} comptes (une balance complete en compte generalement 50 ou plus)"),
        )
        .with_amount("nombre_comptes", Decimal::from(count))
        .with_suggestion("Une balance trop courte peut indiquer un import partiel");
    }
    RuleOutcome::ok(format!("{count} comptes dans la balance"))
}

fn zero_balance_accounts(current: &BalanceSnapshot) -> RuleOutcome {
    let zeros: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| {
            entry.is_zero() && entry.movement_debit.is_zero() && entry.movement_credit.is_zero()
        })
        .collect();
    if zeros.is_empty() {
        return RuleOutcome::ok("Aucun compte a solde nul");
    }
    let share = percent(Decimal::from(zeros.len()), Decimal::from(current.len()));
    RuleOutcome::anomaly(
        Severity::Info,
        format!("{} compte(s) a solde nul ({share}%)", zeros.len()),
    )
    .with_accounts(codes(zeros))
    .with_suggestion("Les comptes sans solde ni mouvement peuvent etre nettoyes")
}

fn collective_accounts(current: &BalanceSnapshot) -> RuleOutcome {
    let undetailed: Vec<&str> = COLLECTIVE_ACCOUNTS
        .iter()
        .copied()
        .filter(|prefix| {
            current.contains(prefix)
                && !current
                    .entries_with_prefix(prefix)
                    .any(|entry| entry.account_code.len() > prefix.len())
        })
        .collect();
    if undetailed.is_empty() {
        return RuleOutcome::ok("Comptes collectifs correctement detailles");
    }
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!("Comptes collectifs non detailles: {}", undetailed.join(", ")),
    )
    .with_accounts(undetailed)
    .with_suggestion("Les comptes collectifs (401, 411) doivent etre ventiles en sous-comptes")
}

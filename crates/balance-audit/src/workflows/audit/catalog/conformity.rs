//! Level 2: conformity with the SYSCOHADA revised chart of accounts.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::chart::{lookup, NormalSide};
use super::support::{amount, codes, percent, SAMPLE};
use super::ControlRule;
use crate::workflows::audit::domain::{Level, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::{BalanceEntry, BalanceSnapshot};

const OBSOLETE_SYSCOA: [(&str, &str); 4] = [
    ("195", "provisions pour impots, remplace par 441x"),
    ("196", "provisions pour pensions, remplace par 198x"),
    ("471", "compte d'attente, remplace par les 47x specifiques"),
    ("694", "TAFIRE, supprime dans le SYSCOHADA revise"),
];

const TAFIRE_PREFIXES: [&str; 3] = ["694", "884", "894"];
const DIRECTION_NOISE: Decimal = dec!(0.01);

pub(super) fn rules() -> Vec<ControlRule> {
    let level = Level::CONFORMITY;
    vec![
        ControlRule::new("C-001", level, "Comptes OHADA valides", Severity::Majeur, |current, _| {
            known_roots(current)
        }),
        ControlRule::new("C-002", level, "Classes valides", Severity::Bloquant, |current, _| {
            valid_classes(current)
        }),
        ControlRule::new("C-003", level, "Longueur comptes standard", Severity::Info, |current, _| {
            standard_length(current)
        }),
        ControlRule::new("C-004", level, "Comptes obsoletes SYSCOA", Severity::Majeur, |current, _| {
            obsolete_accounts(current)
        }),
        ControlRule::new("C-005", level, "Comptes TAFIRE supprimes", Severity::Majeur, |current, _| {
            tafire_accounts(current)
        }),
        ControlRule::new("C-007", level, "Comptes a 2 chiffres", Severity::Mineur, |current, _| {
            two_digit_accounts(current)
        }),
        ControlRule::new("C-008", level, "Operations HAO (classe 8)", Severity::Info, |current, _| {
            hao_operations(current)
        }),
        ControlRule::new("C-010", level, "Sens comptes OHADA", Severity::Mineur, |current, _| {
            chart_direction(current)
        }),
    ]
}

fn known_roots(current: &BalanceSnapshot) -> RuleOutcome {
    let unknown: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| lookup(&entry.account_code).is_none())
        .collect();
    if unknown.is_empty() {
        return RuleOutcome::ok("Tous les comptes sont conformes au plan OHADA");
    }
    let share = percent(Decimal::from(unknown.len()), Decimal::from(current.len()));
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!(
            "{} compte(s) non conforme(s) au plan OHADA ({share}%)",
            unknown.len()
        ),
    )
    .with_accounts(codes(unknown))
    .with_description(
        "Ces numeros ne figurent pas dans le referentiel SYSCOHADA revise et ne pourront pas \
         etre repris dans les etats financiers",
    )
    .with_suggestion("Reclasser ces comptes selon le plan SYSCOHADA revise 2017")
    .with_reference("Art. 14 Acte uniforme OHADA, plan de comptes SYSCOHADA")
}

fn valid_classes(current: &BalanceSnapshot) -> RuleOutcome {
    let invalid: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| !entry.class().is_some_and(|class| (1..=9).contains(&class)))
        .collect();
    if invalid.is_empty() {
        return RuleOutcome::ok("Toutes les classes sont valides");
    }
    RuleOutcome::anomaly(
        Severity::Bloquant,
        format!("{} compte(s) avec classe invalide", invalid.len()),
    )
    .with_accounts(codes(invalid))
    .with_suggestion("Les comptes doivent commencer par un chiffre de classe de 1 a 9")
    .with_reference("Art. 14 Acte uniforme OHADA, nomenclature des comptes")
}

fn standard_length(current: &BalanceSnapshot) -> RuleOutcome {
    let short = current
        .entries()
        .iter()
        .filter(|entry| entry.account_code.len() < 4)
        .count();
    let long: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| entry.account_code.len() > 8)
        .collect();
    if short == 0 && long.is_empty() {
        return RuleOutcome::ok("Longueurs de comptes conformes");
    }
    let flagged = current
        .entries()
        .iter()
        .filter(|entry| entry.account_code.len() < 4 || entry.account_code.len() > 8);
    RuleOutcome::anomaly(
        Severity::Info,
        format!(
            "{short} compte(s) court(s) (<4), {} compte(s) long(s) (>8)",
            long.len()
        ),
    )
    .with_accounts(codes(flagged))
    .with_amount("comptes_courts", Decimal::from(short))
    .with_amount("comptes_longs", Decimal::from(long.len()))
    .with_suggestion("Ventiler les comptes courts en sous-comptes de 4 a 8 chiffres")
}

fn obsolete_accounts(current: &BalanceSnapshot) -> RuleOutcome {
    let found: Vec<(&BalanceEntry, &str)> = current
        .entries()
        .iter()
        .filter_map(|entry| {
            OBSOLETE_SYSCOA
                .iter()
                .find(|(prefix, _)| entry.has_prefix(prefix))
                .map(|(_, reason)| (entry, *reason))
        })
        .collect();
    if found.is_empty() {
        return RuleOutcome::ok("Aucun compte obsolete detecte");
    }
    let description = found
        .iter()
        .map(|(entry, reason)| format!("{}: {reason}", entry.account_code))
        .collect::<Vec<_>>()
        .join("; ");
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!("{} compte(s) obsolete(s) de l'ancien SYSCOA", found.len()),
    )
    .with_accounts(codes(found.iter().map(|(entry, _)| *entry)))
    .with_description(description)
    .with_suggestion("Migrer vers les comptes du SYSCOHADA revise avec la table de correspondance officielle")
    .with_reference("SYSCOHADA revise 2017, guide de migration")
}

fn tafire_accounts(current: &BalanceSnapshot) -> RuleOutcome {
    let tafire: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| TAFIRE_PREFIXES.iter().any(|prefix| entry.has_prefix(prefix)))
        .collect();
    if tafire.is_empty() {
        return RuleOutcome::ok("Aucun compte TAFIRE obsolete");
    }
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!(
            "{} compte(s) TAFIRE detecte(s), supprime(s) dans le revise",
            tafire.len()
        ),
    )
    .with_accounts(codes(tafire))
    .with_suggestion("Supprimer ces comptes et etablir le tableau des flux de tresorerie")
    .with_reference("SYSCOHADA revise 2017, suppression du TAFIRE")
}

fn two_digit_accounts(current: &BalanceSnapshot) -> RuleOutcome {
    let grouped: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| entry.account_code.len() == 2)
        .collect();
    if grouped.is_empty() {
        return RuleOutcome::ok("Aucun compte a 2 chiffres seulement");
    }
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!(
            "{} compte(s) a 2 chiffres (niveau insuffisant)",
            grouped.len()
        ),
    )
    .with_accounts(codes(grouped))
    .with_suggestion("Ventiler ces comptes en sous-comptes detailles d'au moins 4 chiffres")
    .with_reference("Plan SYSCOHADA revise 2017, hierarchie des comptes")
}

fn hao_operations(current: &BalanceSnapshot) -> RuleOutcome {
    let hao: Vec<&BalanceEntry> = current.entries_with_prefix("8").collect();
    if hao.is_empty() {
        return RuleOutcome::ok("Aucun compte HAO (classe 8)");
    }
    let total: Decimal = hao.iter().map(|entry| entry.net().abs()).sum();
    RuleOutcome::anomaly(
        Severity::Info,
        format!(
            "{} compte(s) HAO (classe 8) pour {}",
            hao.len(),
            amount(total)
        ),
    )
    .with_accounts(codes(hao))
    .with_amount("total_hao", total)
    .with_suggestion("Justifier chaque operation HAO dans les notes annexes")
    .with_reference("Art. 48 Acte uniforme OHADA, operations HAO")
}

fn chart_direction(current: &BalanceSnapshot) -> RuleOutcome {
    let inverted: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| {
            let net = entry.net();
            if net.abs() < DIRECTION_NOISE {
                return false;
            }
            match lookup(&entry.account_code).map(|account| account.side) {
                Some(NormalSide::Debit) => net < Decimal::ZERO,
                Some(NormalSide::Credit) => net > Decimal::ZERO,
                Some(NormalSide::Either) | None => false,
            }
        })
        .collect();
    if inverted.is_empty() {
        return RuleOutcome::ok("Sens des comptes conformes aux attentes OHADA");
    }

    let total: Decimal = inverted.iter().map(|entry| entry.net().abs()).sum();
    let description = inverted
        .iter()
        .take(SAMPLE)
        .filter_map(|entry| {
            lookup(&entry.account_code).map(|account| {
                format!("{} ({}): {}", entry.account_code, account.label, amount(entry.net()))
            })
        })
        .collect::<Vec<_>>()
        .join("; ");
    let severity = if inverted.len() > 5 {
        Severity::Mineur
    } else {
        Severity::Info
    };
    RuleOutcome::anomaly(
        severity,
        format!(
            "{} compte(s) avec solde inverse par rapport au sens OHADA attendu",
            inverted.len()
        ),
    )
    .with_accounts(codes(inverted))
    .with_description(description)
    .with_amount("total_inverse", total)
    .with_suggestion("Verifier chaque solde inverse et reclasser pour les etats financiers")
    .with_reference("Plan SYSCOHADA revise 2017, sens des comptes")
}

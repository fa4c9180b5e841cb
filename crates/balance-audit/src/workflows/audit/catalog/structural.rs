//! Level 0: integrity of the imported balance file.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::support::{amount, codes, percent, with_prior, SAMPLE};
use super::ControlRule;
use crate::workflows::audit::domain::{Level, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::{BalanceEntry, BalanceSnapshot};

const MINIMUM_LINES: usize = 10;
const IDENTITY_NOISE: Decimal = dec!(0.01);

pub(super) fn rules() -> Vec<ControlRule> {
    let level = Level::STRUCTURAL;
    vec![
        ControlRule::new("S-001", level, "Balance non vide", Severity::Bloquant, |current, _| {
            balance_not_empty(current)
        }),
        ControlRule::new("S-002", level, "Libelles renseignes", Severity::Mineur, |current, _| {
            labels_present(current)
        }),
        ControlRule::new(
            "S-003",
            level,
            "Numeros de compte valides",
            Severity::Bloquant,
            |current, _| account_code_format(current),
        ),
        ControlRule::new(
            "S-004",
            level,
            "Identite comptable par ligne",
            Severity::Bloquant,
            |current, _| line_identity(current),
        ),
        ControlRule::new(
            "S-005",
            level,
            "Nombre minimum de lignes",
            Severity::Bloquant,
            |current, _| minimum_lines(current),
        ),
        ControlRule::new(
            "S-006",
            level,
            "Comptes en collision apres normalisation",
            Severity::Majeur,
            |current, _| normalised_collisions(current),
        ),
        ControlRule::new("S-007", level, "Encodage des libelles", Severity::Mineur, |current, _| {
            label_encoding(current)
        }),
        ControlRule::new("S-008", level, "Lignes de totaux", Severity::Mineur, |current, _| {
            total_lines(current)
        }),
        ControlRule::new("S-009", level, "Balance N-1 presente", Severity::Mineur, |_, prior| {
            prior_supplied(prior)
        }),
        ControlRule::new("S-010", level, "Coherence N / N-1", Severity::Majeur, |current, prior| {
            with_prior(prior, "comparaison des plans de comptes", |prior| {
                account_overlap(current, prior)
            })
        }),
    ]
}

fn balance_not_empty(current: &BalanceSnapshot) -> RuleOutcome {
    if current.is_empty() {
        return RuleOutcome::anomaly(Severity::Bloquant, "La balance ne contient aucune ligne")
            .with_suggestion("Reimporter un fichier balance contenant des donnees comptables");
    }
    RuleOutcome::ok(format!("Balance lisible: {} lignes", current.len()))
}

fn labels_present(current: &BalanceSnapshot) -> RuleOutcome {
    let missing: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| entry.label.trim().is_empty())
        .collect();
    if missing.is_empty() {
        return RuleOutcome::ok("Tous les comptes ont un libelle");
    }
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!("{} compte(s) sans libelle", missing.len()),
    )
    .with_accounts(codes(missing))
    .with_suggestion("Completer les libelles a partir du plan de comptes de l'entreprise")
}

fn is_valid_code(code: &str) -> bool {
    (2..=12).contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit())
}

fn account_code_format(current: &BalanceSnapshot) -> RuleOutcome {
    let total = current.len();
    let invalid: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| !is_valid_code(&entry.account_code))
        .collect();
    if invalid.is_empty() {
        return RuleOutcome::ok(format!("Tous les {total} comptes ont un format valide"));
    }

    let valid_share = percent(
        Decimal::from(total - invalid.len()),
        Decimal::from(total),
    );
    let outcome = if valid_share < dec!(80) {
        RuleOutcome::anomaly(
            Severity::Bloquant,
            format!("Seulement {valid_share}% de comptes valides (seuil: 80%)"),
        )
    } else {
        RuleOutcome::anomaly(
            Severity::Mineur,
            format!("{} compte(s) avec format non standard", invalid.len()),
        )
    };
    outcome
        .with_accounts(codes(invalid))
        .with_suggestion("Corriger les numeros de compte (2 a 12 chiffres)")
}

fn line_identity(current: &BalanceSnapshot) -> RuleOutcome {
    let broken: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| entry.identity_gap().abs() > IDENTITY_NOISE)
        .collect();
    if broken.is_empty() {
        return RuleOutcome::ok("Solde final = solde initial + mouvements sur toutes les lignes");
    }
    let gap: Decimal = broken.iter().map(|entry| entry.identity_gap().abs()).sum();
    RuleOutcome::anomaly(
        Severity::Bloquant,
        format!(
            "{} ligne(s) ou le solde final ne decoule pas des mouvements (ecart cumule {})",
            broken.len(),
            amount(gap)
        ),
    )
    .with_accounts(codes(broken))
    .with_amount("ecart", gap)
    .with_suggestion("Reexporter la balance: les colonnes a-nouveaux, mouvements et soldes sont incoherentes")
}

fn minimum_lines(current: &BalanceSnapshot) -> RuleOutcome {
    if current.len() < MINIMUM_LINES {
        return RuleOutcome::anomaly(
            Severity::Bloquant,
            format!(
                "Seulement {} comptes (minimum requis: {MINIMUM_LINES})",
                current.len()
            ),
        )
        .with_suggestion("Une balance standard contient au minimum 10 comptes");
    }
    RuleOutcome::ok(format!("{} comptes dans la balance", current.len()))
}

fn normalise(code: &str) -> &str {
    let trimmed = code.trim_end_matches('0');
    if trimmed.is_empty() {
        code
    } else {
        trimmed
    }
}

fn normalised_collisions(current: &BalanceSnapshot) -> RuleOutcome {
    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entry in current.entries() {
        groups
            .entry(normalise(&entry.account_code))
            .or_default()
            .push(entry.account_code.as_str());
    }
    let colliding: Vec<String> = groups
        .values()
        .filter(|members| members.len() > 1)
        .flat_map(|members| members.iter().map(|code| code.to_string()))
        .take(SAMPLE)
        .collect();
    if colliding.is_empty() {
        return RuleOutcome::ok("Aucun compte en double apres normalisation");
    }
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!(
            "{} compte(s) designent le meme compte une fois les zeros finaux retires",
            colliding.len()
        ),
    )
    .with_accounts(colliding)
    .with_suggestion("Fusionner les comptes equivalents pour eviter les doubles comptages")
}

fn is_suspicious_label(label: &str) -> bool {
    label.chars().any(|c| c.is_control() || c == '\u{FFFD}')
        || label.contains("Ã©")
        || label.contains("Ã¨")
        || label.contains("\\u00")
}

fn label_encoding(current: &BalanceSnapshot) -> RuleOutcome {
    let suspicious: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| is_suspicious_label(&entry.label))
        .collect();
    if suspicious.is_empty() {
        return RuleOutcome::ok("Encodage des libelles correct");
    }
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!("{} libelle(s) avec encodage suspect", suspicious.len()),
    )
    .with_accounts(codes(suspicious))
    .with_suggestion("Verifier l'encodage UTF-8 du fichier source")
}

fn is_total_line(label: &str) -> bool {
    let upper = label.trim().to_uppercase();
    ["TOTAL", "SOUS-TOTAL", "SOUS TOTAL", "SOUSTOTAL", "S/TOTAL", "STOTAL"]
        .iter()
        .any(|marker| upper.starts_with(marker))
        || ["CLASSE", "SECTION"].iter().any(|marker| {
            upper
                .strip_prefix(marker)
                .is_some_and(|rest| rest.trim_start().starts_with(|c: char| c.is_ascii_digit()))
        })
}

fn total_lines(current: &BalanceSnapshot) -> RuleOutcome {
    let totals: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| is_total_line(&entry.label))
        .collect();
    if totals.is_empty() {
        return RuleOutcome::ok("Aucune ligne de totaux detectee");
    }
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!("{} ligne(s) de totaux detectee(s)", totals.len()),
    )
    .with_accounts(codes(totals))
    .with_suggestion("Exclure les lignes de totaux pour eviter les doubles comptages")
}

fn prior_supplied(prior: Option<&BalanceSnapshot>) -> RuleOutcome {
    match prior {
        Some(prior) => RuleOutcome::ok(format!(
            "Balance N-1 presente ({}): {} lignes",
            prior.exercise(),
            prior.len()
        )),
        None => RuleOutcome::anomaly(
            Severity::Mineur,
            "Balance N-1 non fournie, les controles comparatifs seront limites",
        )
        .with_suggestion("Fournir la balance N-1 pour activer les controles de variation"),
    }
}

fn account_overlap(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let current_codes = current.account_codes();
    let prior_codes = prior.account_codes();
    let new: Vec<&str> = current_codes.difference(&prior_codes).copied().collect();
    let vanished: Vec<&str> = prior_codes.difference(&current_codes).copied().collect();
    let common = current_codes.intersection(&prior_codes).count();
    let total = current_codes.len() + prior_codes.len();
    let common_share = percent(Decimal::from(common * 2), Decimal::from(total));

    if total > 0 && common_share < dec!(50) {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!("Seulement {common_share}% de comptes communs entre N et N-1"),
        )
        .with_accounts(
            new.iter()
                .take(SAMPLE / 2)
                .chain(vanished.iter().take(SAMPLE / 2))
                .copied(),
        )
        .with_suggestion("Verifier que les fichiers N et N-1 correspondent a la meme entreprise");
    }
    if new.len() > 10 || vanished.len() > 10 {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "{} nouveaux comptes en N, {} disparus",
                new.len(),
                vanished.len()
            ),
        )
        .with_amount("nouveaux", Decimal::from(new.len()))
        .with_amount("disparus", Decimal::from(vanished.len()))
        .with_suggestion("Verifier la correspondance des plans de comptes entre les deux exercices");
    }
    RuleOutcome::ok(format!(
        "{common_share}% de comptes communs entre N et N-1"
    ))
}

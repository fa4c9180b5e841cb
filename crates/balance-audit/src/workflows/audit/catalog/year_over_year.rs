//! Level 5: continuity between the current exercise and N-1.
//!
//! Every rule here needs the prior snapshot and reports itself as not
//! applicable without one.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::support::{amount, codes, percent, with_prior, SAMPLE};
use super::ControlRule;
use crate::workflows::audit::corrective;
use crate::workflows::audit::domain::{Level, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::{BalanceEntry, BalanceSnapshot};

const NOISE: Decimal = dec!(1);
const SIGNIFICANT: Decimal = dec!(100);
const EQUITY: [&str; 4] = ["10", "11", "12", "14"];
const WATCHED_HEADINGS: [&str; 7] = ["2", "3", "40", "41", "5", "6", "7"];

pub(super) fn rules() -> Vec<ControlRule> {
    let level = Level::YEAR_OVER_YEAR;
    vec![
        ControlRule::new(
            "COMP-001",
            level,
            "Cloture N-1 = Ouverture N",
            Severity::Bloquant,
            |current, prior| {
                with_prior(prior, "reprise des soldes", |prior| opening_matches_prior_closing(current, prior))
            },
        ),
        ControlRule::new(
            "COMP-002",
            level,
            "Comptes N-1 absents en N",
            Severity::Majeur,
            |current, prior| {
                with_prior(prior, "comptes N-1 absents", |prior| missing_prior_accounts(current, prior))
            },
        ),
        ControlRule::new(
            "COMP-003",
            level,
            "Affectation resultat N-1",
            Severity::Majeur,
            |current, prior| {
                with_prior(prior, "affectation du resultat", |prior| result_allocated(current, prior))
            },
        ),
        ControlRule::new(
            "COMP-004",
            level,
            "RAZ comptes de gestion",
            Severity::Bloquant,
            |current, prior| {
                with_prior(prior, "remise a zero des comptes de gestion", |prior| {
                    income_accounts_reset(current, prior)
                })
            },
        ),
        ControlRule::new(
            "COMP-005",
            level,
            "Equilibre ouverture N",
            Severity::Bloquant,
            |current, prior| {
                with_prior(prior, "equilibre d'ouverture", |_| opening_equilibrium(current))
            },
        ),
        ControlRule::new(
            "COMP-006",
            level,
            "Continuite capitaux propres",
            Severity::Majeur,
            |current, prior| {
                with_prior(prior, "capitaux propres", |prior| equity_continuity(current, prior))
            },
        ),
        ControlRule::new(
            "COMP-007",
            level,
            "Nouveaux comptes en N",
            Severity::Info,
            |current, prior| {
                with_prior(prior, "nouveaux comptes de bilan", |prior| new_balance_sheet_accounts(current, prior))
            },
        ),
        ControlRule::new(
            "COMP-008",
            level,
            "Continuite total bilan",
            Severity::Majeur,
            |current, prior| {
                with_prior(prior, "continuite du total actif", |prior| asset_total_continuity(current, prior))
            },
        ),
        ControlRule::new(
            "NN-001",
            level,
            "Resultat N-1 integralement affecte",
            Severity::Majeur,
            |current, prior| {
                with_prior(prior, "affectation RAN", |prior| allocation_complete(current, prior))
            },
        ),
        ControlRule::new(
            "NN-002",
            level,
            "Ouverture N = Cloture N-1",
            Severity::Bloquant,
            |current, prior| {
                with_prior(prior, "report des soldes de bilan", |prior| carried_balance_sheet(current, prior))
            },
        ),
        ControlRule::new(
            "NN-003",
            level,
            "Permanence des methodes",
            Severity::Mineur,
            |current, prior| {
                with_prior(prior, "structure comptable", |prior| structure_stability(current, prior))
            },
        ),
        ControlRule::new("NN-004", level, "Capital inchange", Severity::Info, |current, prior| {
            with_prior(prior, "capital", |prior| capital_change(current, prior))
        }),
        ControlRule::new(
            "NN-005",
            level,
            "Variations anormales",
            Severity::Mineur,
            |current, prior| {
                with_prior(prior, "variations par poste", |prior| abnormal_variations(current, prior))
            },
        ),
        ControlRule::new(
            "NN-006",
            level,
            "Variation total bilan",
            Severity::Info,
            |current, prior| {
                with_prior(prior, "total bilan", |prior| balance_sheet_variation(current, prior))
            },
        ),
        ControlRule::new(
            "NN-007",
            level,
            "Comptes gestion disparus",
            Severity::Mineur,
            |current, prior| {
                with_prior(prior, "comptes de gestion", |prior| vanished_income_accounts(current, prior))
            },
        ),
        ControlRule::new(
            "NN-008",
            level,
            "Coherence immobilisations N/N-1",
            Severity::Mineur,
            |current, prior| {
                with_prior(prior, "mouvements d'immobilisations", |prior| fixed_asset_movements(current, prior))
            },
        ),
    ]
}

fn opening_matches_prior_closing(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    if !current.has_opening_balances() {
        return RuleOutcome::ok("Soldes d'ouverture non renseignes dans la balance N");
    }

    let accounts: BTreeSet<&str> = current
        .entries()
        .iter()
        .chain(prior.entries())
        .filter(|entry| entry.in_classes(1..=5))
        .map(|entry| entry.account_code.as_str())
        .collect();

    let mut total_gap = Decimal::ZERO;
    let mut gaps = Vec::new();
    for code in accounts {
        let opening = current.entry(code).map_or(Decimal::ZERO, BalanceEntry::opening_net);
        let closing = prior.entry(code).map_or(Decimal::ZERO, BalanceEntry::net);
        let gap = (opening - closing).abs();
        if gap > NOISE {
            total_gap += gap;
            gaps.push((code.to_string(), closing, opening));
        }
    }

    if total_gap <= SIGNIFICANT {
        return RuleOutcome::ok("Soldes de bilan coherents entre N-1 et N");
    }
    let description = gaps
        .iter()
        .take(SAMPLE)
        .map(|(code, closing, opening)| {
            format!("{code}: N-1={} vs ouverture N={}", amount(*closing), amount(*opening))
        })
        .collect::<Vec<_>>()
        .join("; ");
    RuleOutcome::anomaly(
        Severity::Bloquant,
        format!(
            "Ecart total de {} entre la cloture N-1 et l'ouverture N",
            amount(total_gap)
        ),
    )
    .with_accounts(gaps.iter().take(SAMPLE).map(|(code, _, _)| code.clone()))
    .with_description(description)
    .with_amount("ecart_total", total_gap)
    .with_amount("comptes_avec_ecart", Decimal::from(gaps.len()))
    .with_suggestion("Rapprocher les deux balances compte par compte et verifier les ecritures de report a nouveau")
    .with_reference("Art. 40 Acte uniforme OHADA, continuite des exercices")
}

fn missing_prior_accounts(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let missing: Vec<&BalanceEntry> = prior
        .entries()
        .iter()
        .filter(|entry| {
            entry.in_classes(1..=5)
                && entry.net().abs() > SIGNIFICANT
                && !current.contains(&entry.account_code)
        })
        .collect();
    if missing.is_empty() {
        return RuleOutcome::ok("Tous les comptes de bilan N-1 sont presents en N");
    }
    let total: Decimal = missing.iter().map(|entry| entry.net().abs()).sum();
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!(
            "{} compte(s) de bilan significatif(s) en N-1 absent(s) en N",
            missing.len()
        ),
    )
    .with_amount("comptes_absents", Decimal::from(missing.len()))
    .with_amount("soldes_n1", total)
    .with_accounts(codes(missing))
    .with_suggestion("Ajouter les reports a nouveau manquants dans la balance N")
}

fn result_allocated(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let prior_result = prior.exercise_result();
    if prior_result.abs() < NOISE {
        return RuleOutcome::ok("Pas de resultat N-1 a affecter");
    }

    // With the income statement still open, 13x can only hold N-1. Once closed,
    // 13x holds the current result and only an exact repeat of N-1 is suspect.
    let booked = current.booked_result();
    let left_over = if current.has_open_income_statement() || (booked - prior_result).abs() < NOISE {
        booked
    } else {
        Decimal::ZERO
    };

    if left_over.abs() <= NOISE {
        return RuleOutcome::ok("Resultat N-1 correctement affecte");
    }
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!(
            "Resultat N-1 ({}) non affecte: compte 13x non solde en N ({})",
            amount(prior_result),
            amount(left_over)
        ),
    )
    .with_accounts(codes(current.entries_with_prefix("13")))
    .with_amount("resultat_n1", prior_result)
    .with_amount("compte_13_n", left_over)
    .with_amount("report_a_nouveau", current.credit_net("12"))
    .with_amount("reserves", current.credit_net("11"))
    .with_suggestion("Passer l'ecriture d'affectation du resultat: 13x vers 12x, 11x et 46x")
    .with_reference("Art. 36 Acte uniforme OHADA, affectation du resultat")
    .with_entry(corrective::allocate_result(left_over))
}

fn income_accounts_reset(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let carried: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| entry.in_classes(6..=7) && entry.opening_net().abs() > NOISE)
        .collect();
    let repeated: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| entry.in_classes(6..=7) && entry.net().abs() > SIGNIFICANT)
        .filter(|entry| {
            prior
                .entry(&entry.account_code)
                .is_some_and(|before| (before.net() - entry.net()).abs() < NOISE)
        })
        .collect();

    if carried.is_empty() && repeated.len() <= 3 {
        return RuleOutcome::ok("Comptes de gestion correctement remis a zero");
    }
    let message = if carried.is_empty() {
        format!(
            "{} comptes de gestion avec un solde identique a N-1 (remise a zero probablement omise)",
            repeated.len()
        )
    } else {
        format!("{} compte(s) de gestion avec un solde d'ouverture", carried.len())
    };
    RuleOutcome::anomaly(Severity::Bloquant, message)
        .with_accounts(codes(carried.iter().chain(repeated.iter()).copied()))
        .with_amount("soldes_ouverture", Decimal::from(carried.len()))
        .with_amount("soldes_identiques", Decimal::from(repeated.len()))
        .with_suggestion("Solder les comptes 6 et 7 dans le 13x puis reimporter la balance")
        .with_reference("Art. 22 Acte uniforme OHADA, independance des exercices")
}

fn opening_equilibrium(current: &BalanceSnapshot) -> RuleOutcome {
    if !current.has_opening_balances() {
        return RuleOutcome::ok("Soldes d'ouverture non renseignes dans la balance N");
    }
    let debit: Decimal = current.entries().iter().map(|entry| entry.opening_debit).sum();
    let credit: Decimal = current.entries().iter().map(|entry| entry.opening_credit).sum();
    let gap = (debit - credit).abs();
    if gap <= NOISE {
        return RuleOutcome::ok("Soldes d'ouverture equilibres");
    }
    RuleOutcome::anomaly(
        Severity::Bloquant,
        format!(
            "Desequilibre des soldes d'ouverture: debit {} credit {} ecart {}",
            amount(debit),
            amount(credit),
            amount(gap)
        ),
    )
    .with_amount("ouverture_debit", debit)
    .with_amount("ouverture_credit", credit)
    .with_amount("ecart", gap)
    .with_suggestion("Identifier les reports a nouveau errones; l'ouverture doit etre equilibree")
}

fn equity(snapshot: &BalanceSnapshot) -> Decimal {
    EQUITY.iter().map(|prefix| snapshot.credit_net(prefix)).sum()
}

fn equity_continuity(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let current_equity = equity(current);
    let prior_equity = equity(prior);
    let prior_result = prior.exercise_result();
    let expected = prior_equity + prior_result;
    let gap = (current_equity - expected).abs();
    let share = percent(gap, expected.abs());

    if share > dec!(20) && gap > dec!(10000) {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!(
                "Capitaux propres N ({}) differents de CP N-1 + resultat N-1 ({})",
                amount(current_equity),
                amount(expected)
            ),
        )
        .with_amount("capitaux_propres_n", current_equity)
        .with_amount("capitaux_propres_n1", prior_equity)
        .with_amount("resultat_n1", prior_result)
        .with_amount("ecart", gap)
        .with_amount("ecart_pct", share)
        .with_suggestion(
            "Reconstituer la variation des capitaux propres (capital, reserves, RAN, distributions)",
        )
        .with_reference("Art. 74 Acte uniforme OHADA, variation des capitaux propres");
    }
    RuleOutcome::ok("Continuite des capitaux propres verifiee")
}

fn allocation_complete(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let prior_result = prior.exercise_result();
    if prior_result.abs() < NOISE {
        return RuleOutcome::ok("Pas de resultat N-1 a repartir");
    }
    let to_retained = current.credit_net("12") - prior.credit_net("12");
    let to_reserves = current.credit_net("11") - prior.credit_net("11");
    let distributed = current.credit_balances("465");
    let allocated = to_retained + to_reserves + distributed;
    if allocated.is_zero() {
        // Nothing moved on reserves or RAN: either the allocation is still
        // pending on 13x or the balance is post-closing. COMP-003 covers both.
        return RuleOutcome::ok("Aucune affectation observable sur les comptes 11, 12 et 465");
    }
    let gap = (allocated - prior_result).abs();
    if gap <= NOISE {
        return RuleOutcome::ok(format!(
            "Resultat N-1 reparti: RAN {}, reserves {}, distributions {}",
            amount(to_retained),
            amount(to_reserves),
            amount(distributed)
        ));
    }
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!(
            "Affectation ({}) differente du resultat N-1 ({})",
            amount(allocated),
            amount(prior_result)
        ),
    )
    .with_amount("variation_ran", to_retained)
    .with_amount("variation_reserves", to_reserves)
    .with_amount("distributions", distributed)
    .with_amount("resultat_n1", prior_result)
    .with_amount("ecart", gap)
    .with_suggestion("Le resultat N-1 doit etre integralement reparti entre RAN, reserves et dividendes")
    .with_reference("Art. 143 Acte uniforme OHADA, affectation des resultats")
}

fn prefixes(snapshot: &BalanceSnapshot) -> BTreeSet<&str> {
    snapshot
        .entries()
        .iter()
        .map(|entry| entry.account_code.get(..3).unwrap_or(entry.account_code.as_str()))
        .collect()
}

fn structure_stability(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let now = prefixes(current);
    let before = prefixes(prior);
    let added: Vec<&str> = now.difference(&before).copied().collect();
    let removed: Vec<&str> = before.difference(&now).copied().collect();
    if added.len() <= 10 && removed.len() <= 10 {
        return RuleOutcome::ok("Structure comptable stable entre N et N-1");
    }
    let flagged = added
        .iter()
        .take(5)
        .map(|prefix| format!("+{prefix}"))
        .chain(removed.iter().take(5).map(|prefix| format!("-{prefix}")));
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!(
            "Changements importants de structure: {} nouveaux prefixes, {} supprimes",
            added.len(),
            removed.len()
        ),
    )
    .with_accounts(flagged)
    .with_amount("prefixes_nouveaux", Decimal::from(added.len()))
    .with_amount("prefixes_supprimes", Decimal::from(removed.len()))
    .with_suggestion("Verifier le respect du principe de permanence des methodes")
    .with_reference("Art. 40 Acte uniforme OHADA, permanence des methodes")
}

fn capital_change(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let now = current.credit_net("101");
    let before = prior.credit_net("101");
    if (now - before).abs() > NOISE {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!("Capital modifie: {} -> {}", amount(before), amount(now)),
        )
        .with_accounts(codes(current.entries_with_prefix("101")))
        .with_amount("capital_n", now)
        .with_amount("capital_n1", before)
        .with_suggestion("Verifier qu'une operation sur le capital justifie cette variation");
    }
    RuleOutcome::ok(format!("Capital stable: {}", amount(now)))
}

fn abnormal_variations(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let variations: Vec<(&str, Decimal, Decimal, Decimal)> = WATCHED_HEADINGS
        .iter()
        .filter_map(|heading| {
            let before = prior.absolute_balances(heading);
            if before <= dec!(1000) {
                return None;
            }
            let now = current.absolute_balances(heading);
            let change = percent(now - before, before);
            (change.abs() > dec!(50)).then_some((*heading, before, now, change))
        })
        .collect();
    if variations.is_empty() {
        return RuleOutcome::ok("Pas de variation anormale detectee");
    }
    let description = variations
        .iter()
        .map(|(heading, before, now, change)| {
            format!("{heading}x: {change}% ({} -> {})", amount(*before), amount(*now))
        })
        .collect::<Vec<_>>()
        .join("; ");
    let mut outcome = RuleOutcome::anomaly(
        Severity::Mineur,
        format!("{} poste(s) avec une variation superieure a 50%", variations.len()),
    )
    .with_accounts(variations.iter().map(|(heading, ..)| format!("{heading}x")))
    .with_description(description)
    .with_suggestion("Justifier les variations significatives entre exercices");
    for (heading, _, _, change) in &variations {
        outcome = outcome.with_amount(format!("variation_{heading}x_pct"), *change);
    }
    outcome
}

fn balance_sheet_variation(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let now = current.balance_sheet_total();
    let before = prior.balance_sheet_total();
    if before > Decimal::ZERO {
        let change = percent(now - before, before);
        if change.abs() > dec!(30) {
            return RuleOutcome::anomaly(
                Severity::Info,
                format!("Total bilan en variation de {change}%"),
            )
            .with_amount("total_bilan_n", now)
            .with_amount("total_bilan_n1", before)
            .with_amount("variation_pct", change);
        }
    }
    RuleOutcome::ok("Variation du total bilan dans les limites")
}

fn vanished_income_accounts(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let vanished: Vec<&BalanceEntry> = prior
        .entries()
        .iter()
        .filter(|entry| entry.in_classes(6..=7) && entry.net().abs() > dec!(1000))
        .filter(|entry| current.entry(&entry.account_code).map_or(true, BalanceEntry::is_zero))
        .collect();
    if vanished.is_empty() {
        return RuleOutcome::ok("Continuite des comptes de gestion");
    }
    let description = vanished
        .iter()
        .take(SAMPLE)
        .map(|entry| {
            format!(
                "{} ({}): {} en N-1",
                entry.account_code,
                entry.label.trim(),
                amount(entry.net().abs())
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!(
            "{} compte(s) de gestion significatif(s) en N-1 absent(s) ou a zero en N",
            vanished.len()
        ),
    )
    .with_accounts(codes(vanished))
    .with_description(description)
}

/// Debit balances of classes 2 to 5.
fn asset_total(snapshot: &BalanceSnapshot) -> Decimal {
    snapshot
        .entries()
        .iter()
        .filter(|entry| entry.in_classes(2..=5))
        .map(|entry| entry.net().max(Decimal::ZERO))
        .sum()
}

/// Gross fixed assets: class 2 debit balances outside 28x and 29x.
fn gross_fixed_assets(snapshot: &BalanceSnapshot) -> Decimal {
    snapshot
        .entries_with_prefix("2")
        .filter(|entry| !entry.has_prefix("28") && !entry.has_prefix("29"))
        .map(|entry| entry.net().max(Decimal::ZERO))
        .sum()
}

fn new_balance_sheet_accounts(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let new_accounts: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| entry.in_classes(1..=5) && entry.net().abs() > SIGNIFICANT)
        .filter(|entry| !prior.contains(&entry.account_code))
        .collect();
    if new_accounts.is_empty() {
        return RuleOutcome::ok("Pas de nouveau compte de bilan significatif");
    }
    RuleOutcome::anomaly(
        Severity::Info,
        format!(
            "{} nouveau(x) compte(s) de bilan en N absent(s) de N-1",
            new_accounts.len()
        ),
    )
    .with_amount("comptes_nouveaux", Decimal::from(new_accounts.len()))
    .with_accounts(codes(new_accounts))
    .with_suggestion("Verifier que ces comptes correspondent a des operations reelles et sont correctement classes")
}

fn asset_total_continuity(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let now = asset_total(current);
    let before = asset_total(prior);
    if before > Decimal::ZERO {
        let change = percent(now - before, before);
        if change.abs() > dec!(50) {
            return RuleOutcome::anomaly(
                Severity::Majeur,
                format!("Total actif en variation de {change}% entre N-1 et N"),
            )
            .with_amount("total_actif_n", now)
            .with_amount("total_actif_n1", before)
            .with_amount("variation_pct", change)
            .with_suggestion("Identifier les postes a l'origine de la variation et la documenter dans l'annexe");
        }
    }
    RuleOutcome::ok("Total bilan stable entre N-1 et N")
}

fn balance_sheet_magnitude(snapshot: &BalanceSnapshot) -> Decimal {
    snapshot
        .entries()
        .iter()
        .filter(|entry| entry.in_classes(1..=5))
        .map(|entry| entry.net().abs())
        .sum()
}

fn carried_balance_sheet(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let now = balance_sheet_magnitude(current);
    let before = balance_sheet_magnitude(prior);
    let change = percent((now - before).abs(), before.max(Decimal::ONE));
    if change > dec!(100) {
        return RuleOutcome::anomaly(
            Severity::Bloquant,
            format!("Variation des soldes de bilan de {change}% entre N-1 et N, report a verifier"),
        )
        .with_amount("soldes_bilan_n", now)
        .with_amount("soldes_bilan_n1", before)
        .with_amount("variation_pct", change)
        .with_suggestion("Verifier que la balance N reprend bien les soldes de cloture N-1");
    }
    RuleOutcome::ok("Soldes d'ouverture coherents")
}

fn fixed_asset_movements(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let now = gross_fixed_assets(current);
    let before = gross_fixed_assets(prior);
    let change = now - before;
    if change < dec!(-1000) && current.absolute_balances_any(&["81", "654"]).is_zero() {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Diminution des immobilisations ({}) sans cession comptabilisee (654/81x)",
                amount(change)
            ),
        )
        .with_amount("immobilisations_n", now)
        .with_amount("immobilisations_n1", before)
        .with_amount("variation", change)
        .with_suggestion("Verifier les mouvements d'immobilisations et comptabiliser les sorties d'actif");
    }
    RuleOutcome::ok("Immobilisations coherentes entre exercices")
}

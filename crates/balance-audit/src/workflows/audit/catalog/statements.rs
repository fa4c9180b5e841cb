//! Level 6: coherence of the financial statements derived from the balance.
//!
//! Balance sheet, income statement, intermediate balances (SIG), cash flow and
//! the notes on fixed assets, receivables and provisions.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::support::{amount, codes, percent, with_prior};
use super::{ControlRule, Tolerance};
use crate::workflows::audit::corrective::EntryDraft;
use crate::workflows::audit::domain::{Level, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::{BalanceEntry, BalanceSnapshot};

const EQUITY: [&str; 5] = ["10", "11", "12", "13", "14"];
const CONTRA_THIRD_PARTIES: [&str; 2] = ["49", "59"];
const PRODUCTION: [&str; 4] = ["70", "71", "72", "73"];
const CONSUMPTION: [&str; 4] = ["60", "61", "62", "63"];
const ALLOWANCES: [&str; 4] = ["681", "682", "691", "697"];
const REVERSALS: [&str; 2] = ["791", "797"];
const PROVISIONS: [&str; 5] = ["19", "29", "39", "49", "59"];
const DEPRECIATION_ALLOWANCES: [&str; 2] = ["681", "852"];
const RECEIVABLES: [&str; 6] = ["41", "42", "43", "44", "45", "46"];

pub(super) fn rules() -> Vec<ControlRule> {
    let level = Level::STATEMENTS;
    vec![
        ControlRule::new("EF-001", level, "Bilan equilibre", Severity::Bloquant, |current, _| {
            balance_sheet_equilibrium(current)
        }),
        ControlRule::new("EF-002", level, "Actif immobilise net", Severity::Bloquant, |current, _| {
            net_fixed_assets(current)
        }),
        ControlRule::new("EF-003", level, "Sous-total capitaux propres", Severity::Majeur, |current, _| {
            equity_subtotal(current)
        }),
        ControlRule::new(
            "EF-005",
            level,
            "Resultat CdR = Resultat bilan",
            Severity::Bloquant,
            |current, _| statement_results(current),
        ),
        ControlRule::new("EF-006", level, "SIG - Marge brute", Severity::Mineur, |current, _| {
            gross_margin(current)
        }),
        ControlRule::new("EF-007", level, "SIG - Valeur ajoutee", Severity::Majeur, |current, _| {
            value_added(current)
        }),
        ControlRule::new("EF-008", level, "Cascade resultat", Severity::Bloquant, |current, _| {
            result_cascade(current)
        }),
        ControlRule::new(
            "EF-009",
            level,
            "CAF additive vs soustractive",
            Severity::Mineur,
            |current, _| self_financing_methods(current),
        ),
        ControlRule::new("EF-010", level, "TFT - Tresorerie cloture", Severity::Info, |current, _| {
            closing_cash(current)
        }),
        ControlRule::new(
            "EF-011",
            level,
            "Capacite d'autofinancement",
            Severity::Info,
            |current, _| self_financing(current),
        ),
        ControlRule::new(
            "EF-012",
            level,
            "TFT - Variation tresorerie",
            Severity::Info,
            |current, prior| {
                with_prior(prior, "variation de tresorerie", |prior| cash_variation(current, prior))
            },
        ),
        ControlRule::new(
            "EF-013",
            level,
            "Variation capitaux propres",
            Severity::Mineur,
            |current, prior| {
                with_prior(prior, "variation des capitaux propres", |prior| {
                    equity_variation(current, prior)
                })
            },
        ),
        ControlRule::new(
            "EF-014",
            level,
            "Note 3A - Immobilisations brutes",
            Severity::Bloquant,
            |current, _| fixed_assets_note(current),
        ),
        ControlRule::new("EF-015", level, "Note 3B - Amortissements", Severity::Mineur, |current, _| {
            depreciation_note(current)
        }),
        ControlRule::new("EF-016", level, "Note 3H - Creances", Severity::Majeur, |current, _| {
            receivables_note(current)
        }),
        ControlRule::new("EF-017", level, "Note 3I - Dettes", Severity::Info, |current, _| {
            liabilities_note(current)
        }),
        ControlRule::new(
            "EF-018",
            level,
            "Note 3J - Mouvement des provisions",
            Severity::Mineur,
            |current, prior| provisions_movement(current, prior),
        ),
        ControlRule::new(
            "EF-019",
            level,
            "Mouvement des amortissements",
            Severity::Mineur,
            |current, prior| depreciation_movement(current, prior),
        ),
    ]
}

/// Result still sitting in classes 6 to 8, zero once they are closed into 13x.
fn unclosed_result(snapshot: &BalanceSnapshot) -> Decimal {
    if snapshot.has_open_income_statement() {
        snapshot.income_statement_result()
    } else {
        Decimal::ZERO
    }
}

fn sum_net(snapshot: &BalanceSnapshot, prefixes: &[&str]) -> Decimal {
    prefixes.iter().map(|prefix| snapshot.net_balance(prefix)).sum()
}

fn sum_credit_net(snapshot: &BalanceSnapshot, prefixes: &[&str]) -> Decimal {
    prefixes.iter().map(|prefix| snapshot.credit_net(prefix)).sum()
}

fn is_contra_third_party(entry: &BalanceEntry) -> bool {
    CONTRA_THIRD_PARTIES.iter().any(|prefix| entry.has_prefix(prefix))
}

fn equity(snapshot: &BalanceSnapshot) -> Decimal {
    sum_credit_net(snapshot, &EQUITY) + unclosed_result(snapshot)
}

fn balance_sheet_equilibrium(current: &BalanceSnapshot) -> RuleOutcome {
    let mut assets = current.net_balance("2") + current.net_balance("3");
    let mut liabilities = current.credit_net("1") + unclosed_result(current);
    for entry in current.entries().iter().filter(|entry| entry.in_classes(4..=5)) {
        let net = entry.net();
        if is_contra_third_party(entry) || net > Decimal::ZERO {
            assets += net;
        } else {
            liabilities -= net;
        }
    }

    let outcome = Tolerance::critical(dec!(1)).compare("Total actif / total passif", assets, liabilities);
    if outcome.is_anomaly() {
        outcome
            .with_amount("actif", assets)
            .with_amount("passif", liabilities)
            .with_suggestion(
                "Rechercher les comptes hors classes 1 a 8 et les ecritures desequilibrees \
                 avant d'etablir le bilan",
            )
            .with_reference("Art. 29 Acte uniforme OHADA, equilibre du bilan")
    } else {
        outcome
    }
}

fn net_fixed_assets(current: &BalanceSnapshot) -> RuleOutcome {
    let gross: Decimal = current
        .entries_with_prefix("2")
        .filter(|entry| !entry.has_prefix("28") && !entry.has_prefix("29"))
        .map(BalanceEntry::net)
        .sum();
    let contra = current.credit_net("28") + current.credit_net("29");
    let net = gross - contra;
    if net < Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Bloquant,
            format!("Actif immobilise net negatif: {}", amount(net)),
        )
        .with_amount("valeur_brute", gross)
        .with_amount("amortissements_depreciations", contra)
        .with_amount("valeur_nette", net)
        .with_suggestion(
            "Solder les amortissements des immobilisations cedees ou mises au rebut \
             et revoir les plans d'amortissement",
        )
        .with_reference("Art. 45 Acte uniforme OHADA");
    }
    RuleOutcome::ok(format!("Actif immobilise net: {}", amount(net)))
}

fn equity_subtotal(current: &BalanceSnapshot) -> RuleOutcome {
    let total = equity(current);
    let capital = current.credit_net("101");
    if total < Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!("Capitaux propres negatifs: {}", amount(total)),
        )
        .with_amount("capitaux_propres", total)
        .with_amount("capital", capital)
        .with_suggestion(
            "Regulariser par augmentation de capital, incorporation de comptes courants \
             ou abandon de creances",
        )
        .with_reference("Art. 664 AUSCGIE");
    }
    if capital > Decimal::ZERO && total < capital / dec!(2) {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Capitaux propres ({}) inferieurs a la moitie du capital social ({})",
                amount(total),
                amount(capital)
            ),
        )
        .with_amount("capitaux_propres", total)
        .with_amount("capital", capital)
        .with_suggestion("Consulter les associes sur la dissolution anticipee dans les quatre mois")
        .with_reference("Art. 664 AUSCGIE");
    }
    RuleOutcome::ok(format!("Capitaux propres: {}", amount(total)))
}

fn statement_results(current: &BalanceSnapshot) -> RuleOutcome {
    if !current.has_open_income_statement() || !current.has_balance("13") {
        return RuleOutcome::ok(format!(
            "Resultat porte par un seul etat: {}",
            amount(current.exercise_result())
        ));
    }
    let from_income = current.income_statement_result();
    let from_balance = current.booked_result();
    let outcome = Tolerance::critical(dec!(1)).compare(
        "Resultat compte de resultat / resultat bilan",
        from_income,
        from_balance,
    );
    if !outcome.is_anomaly() {
        return outcome;
    }

    let gap = (from_income - from_balance).abs();
    let correction = if from_income > from_balance {
        EntryDraft::new()
            .debit("120", "Report a nouveau, ajustement", gap)
            .credit("130", "Resultat, correction", gap)
    } else {
        EntryDraft::new()
            .debit("130", "Resultat, correction", gap)
            .credit("120", "Report a nouveau, ajustement", gap)
    };
    outcome
        .with_accounts(codes(current.entries_with_prefix("13")))
        .with_suggestion(
            "Le solde du 13x doit egaler la difference entre produits et charges; \
             verifier les ecritures de determination du resultat",
        )
        .with_reference("Art. 34 Acte uniforme OHADA")
        .with_entry(
            correction
                .comment("Correction ecart resultat compte de resultat / bilan")
                .finish(),
        )
}

fn gross_margin(current: &BalanceSnapshot) -> RuleOutcome {
    let sales = current.credit_net("701");
    let purchases = current.net_balance("601");
    let stock_variation = current.net_balance("6031");
    let margin = sales - purchases - stock_variation;
    if sales > Decimal::ZERO && margin < Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!("Marge brute sur marchandises negative: {}", amount(margin)),
        )
        .with_amount("ventes_marchandises", sales)
        .with_amount("achats_marchandises", purchases)
        .with_amount("variation_stocks", stock_variation)
        .with_amount("marge_brute", margin)
        .with_suggestion("Verifier la coherence entre ventes (701), achats (601) et variation de stocks (6031)")
        .with_reference("Art. 30 a 32 Acte uniforme OHADA, soldes intermediaires de gestion");
    }
    RuleOutcome::ok(format!("Marge brute: {}", amount(margin)))
}

fn value_added(current: &BalanceSnapshot) -> RuleOutcome {
    let production = sum_credit_net(current, &PRODUCTION);
    let consumption = sum_net(current, &CONSUMPTION);
    let added = production - consumption;
    if production > Decimal::ZERO && added < Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!("Valeur ajoutee negative: {}", amount(added)),
        )
        .with_amount("production", production)
        .with_amount("consommations", consumption)
        .with_amount("valeur_ajoutee", added)
        .with_suggestion("Analyser les postes de consommation (achats, services exterieurs) et la politique de prix")
        .with_reference("Art. 30 a 32 Acte uniforme OHADA, soldes intermediaires de gestion");
    }
    RuleOutcome::ok(format!("Valeur ajoutee: {}", amount(added)))
}

fn result_cascade(current: &BalanceSnapshot) -> RuleOutcome {
    if !current.has_open_income_statement() || !current.has_balance("13") {
        return RuleOutcome::ok("Cascade non verifiable: compte de resultat solde ou 13x absent");
    }
    let ordinary = -current.class_net(6..=7);
    let tax = current.net_balance("89");
    let extraordinary: Decimal = current
        .entries_with_prefix("8")
        .filter(|entry| !entry.has_prefix("89"))
        .map(|entry| -entry.net())
        .sum();
    let computed = ordinary + extraordinary - tax;
    let booked = current.booked_result();

    let outcome = Tolerance::critical(dec!(1)).compare("RAO + HAO - impot / resultat 13x", computed, booked);
    let outcome = outcome
        .with_amount("resultat_activites_ordinaires", ordinary)
        .with_amount("resultat_hao", extraordinary)
        .with_amount("impot_resultat", tax);
    if outcome.is_anomaly() {
        outcome
            .with_suggestion("Reconstituer la cascade du resultat etape par etape et verifier l'impot et les operations HAO")
            .with_reference("Art. 32 Acte uniforme OHADA, determination du resultat")
    } else {
        outcome
    }
}

fn closing_cash(current: &BalanceSnapshot) -> RuleOutcome {
    let cash = current.net_balance("5");
    if cash < Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!("Tresorerie nette negative a la cloture: {}", amount(cash)),
        )
        .with_amount("tresorerie_actif", current.debit_balances("5"))
        .with_amount("tresorerie_passif", current.credit_balances("5"))
        .with_amount("tresorerie_nette", cash)
        .with_suggestion("Analyser le besoin en fonds de roulement et le financement des investissements")
        .with_reference("Art. 32 Acte uniforme OHADA, tableau des flux de tresorerie");
    }
    RuleOutcome::ok(format!("Tresorerie nette: {}", amount(cash)))
}

fn self_financing(current: &BalanceSnapshot) -> RuleOutcome {
    let result = current.exercise_result();
    let allowances = sum_net(current, &ALLOWANCES);
    let reversals = sum_credit_net(current, &REVERSALS);
    let capacity = result + allowances - reversals;
    if capacity < Decimal::ZERO && result > Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!(
                "CAF negative ({}) malgre un resultat positif ({})",
                amount(capacity),
                amount(result)
            ),
        )
        .with_amount("caf", capacity)
        .with_amount("resultat", result)
        .with_amount("dotations", allowances)
        .with_amount("reprises", reversals)
        .with_suggestion("Analyser l'effet des reprises de provisions sur le resultat");
    }
    RuleOutcome::ok(format!("CAF estimee: {}", amount(capacity)))
}

/// CAF rebuilt from the result (additive) and from the operating surplus
/// (subtractive). Calculated items (68, 69, 85 and 79, 86) and disposals
/// (81, 82) only appear on the additive side.
fn self_financing_methods(current: &BalanceSnapshot) -> RuleOutcome {
    if !current.has_prefix("13") {
        return RuleOutcome::ok("CAF non calculable sans compte de resultat 13");
    }
    let additive = current.booked_result() + current.absolute_balances_any(&["68", "69", "85"])
        - current.absolute_balances_any(&["79", "86"])
        + current.absolute_balances("81")
        - current.absolute_balances("82");
    let operating_surplus = current.absolute_balances_any(&PRODUCTION)
        - current.absolute_balances_any(&CONSUMPTION)
        - current.absolute_balances("64")
        - current.absolute_balances("66");
    let subtractive = operating_surplus + current.absolute_balances_any(&["75", "77", "78"])
        - current.absolute_balances_any(&["65", "67"])
        + current.absolute_balances_any(&["84", "88"])
        - current.absolute_balances_any(&["83", "87"])
        - current.absolute_balances("89");
    let gap = (additive - subtractive).abs();
    let tolerance = (additive.abs() * dec!(0.05)).max(dec!(10000));
    if gap > tolerance {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Ecart CAF additive ({}) / soustractive ({}): {}",
                amount(additive),
                amount(subtractive),
                amount(gap)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("13")))
        .with_amount("caf_additive", additive)
        .with_amount("caf_soustractive", subtractive)
        .with_amount("excedent_brut_exploitation", operating_surplus)
        .with_amount("ecart", gap)
        .with_suggestion("Verifier le resultat porte au 13x et le classement des produits et charges calcules");
    }
    RuleOutcome::ok(format!("CAF coherente entre les deux methodes: {}", amount(additive)))
}

fn cash_variation(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let now = current.net_balance("5");
    let before = prior.net_balance("5");
    let variation = now - before;
    let share = percent(variation, before.abs());
    if share.abs() > dec!(50) && variation.abs() > dec!(10000) {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!("Variation de tresorerie significative: {} ({share}%)", amount(variation)),
        )
        .with_amount("tresorerie_n", now)
        .with_amount("tresorerie_n1", before)
        .with_amount("variation", variation)
        .with_amount("variation_pct", share)
        .with_suggestion("Expliquer la variation par les flux d'exploitation, d'investissement et de financement");
    }
    RuleOutcome::ok(format!("Variation de tresorerie: {}", amount(variation)))
}

fn equity_variation(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let variation = equity(current) - equity(prior);
    let result = current.exercise_result();
    let outcome = Tolerance::standard(dec!(10000)).compare(
        "Variation des capitaux propres / resultat de l'exercice",
        variation,
        result,
    );
    if outcome.is_anomaly() {
        outcome
            .with_amount("capitaux_propres_n", equity(current))
            .with_amount("capitaux_propres_n1", equity(prior))
            .with_suggestion(
                "Identifier les operations hors resultat (dividendes, augmentation de capital) \
                 dans le tableau de variation des capitaux propres",
            )
    } else {
        outcome
    }
}

fn fixed_assets_note(current: &BalanceSnapshot) -> RuleOutcome {
    let gross: Decimal = current
        .entries_with_prefix("2")
        .filter(|entry| !entry.has_prefix("28") && !entry.has_prefix("29"))
        .map(|entry| entry.net().max(Decimal::ZERO))
        .sum();
    let depreciation = current.absolute_balances("28");
    if gross > Decimal::ZERO && depreciation > gross {
        return RuleOutcome::anomaly(
            Severity::Bloquant,
            format!(
                "Note 3A: amortissements ({}) superieurs aux immobilisations brutes ({})",
                amount(depreciation),
                amount(gross)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("28")))
        .with_amount("immobilisations_brutes", gross)
        .with_amount("amortissements", depreciation)
        .with_amount("immobilisations_nettes", gross - depreciation)
        .with_suggestion("Solder les amortissements des immobilisations sorties et rapprocher le tableau des immobilisations")
        .with_reference("Art. 45 Acte uniforme OHADA");
    }
    RuleOutcome::ok(format!(
        "Immobilisations brutes: {}, amortissements: {}",
        amount(gross),
        amount(depreciation)
    ))
}

fn liabilities_note(current: &BalanceSnapshot) -> RuleOutcome {
    let debts = current.absolute_balances_any(&["16", "40", "42", "43", "44"]);
    let turnover = current.absolute_balances("70");
    if debts.is_zero() && turnover > Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!("Aucune dette au bilan malgre un chiffre d'affaires de {}", amount(turnover)),
        )
        .with_amount("total_dettes", debts)
        .with_amount("chiffre_affaires", turnover)
        .with_suggestion("Verifier l'exhaustivite des dettes fournisseurs, fiscales et sociales de fin d'exercice");
    }
    RuleOutcome::ok(format!("Total dettes: {}", amount(debts)))
}

fn depreciation_note(current: &BalanceSnapshot) -> RuleOutcome {
    let accumulated = current.absolute_balances("28");
    let allowances = current.absolute_balances("681") + current.absolute_balances("682");
    if accumulated > Decimal::ZERO && allowances.is_zero() && current.has_open_income_statement() {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Amortissements cumules ({}) sans dotation de l'exercice",
                amount(accumulated)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("28")))
        .with_amount("amortissements_cumules", accumulated)
        .with_suggestion("Comptabiliser les dotations de l'exercice pour completer la note 3B");
    }
    RuleOutcome::ok(format!(
        "Amortissements cumules: {}, dotations: {}",
        amount(accumulated),
        amount(allowances)
    ))
}

fn receivables_note(current: &BalanceSnapshot) -> RuleOutcome {
    let receivables: Decimal = RECEIVABLES
        .iter()
        .map(|prefix| current.debit_balances(prefix))
        .sum();
    let impairment = current.credit_net("49");
    if receivables > Decimal::ZERO && impairment > receivables {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!(
                "Depreciations des creances ({}) superieures au total des creances ({})",
                amount(impairment),
                amount(receivables)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("49")))
        .with_amount("creances", receivables)
        .with_amount("depreciations", impairment)
        .with_suggestion("Solder les depreciations des creances abandonnees ou recouvrees");
    }
    RuleOutcome::ok(format!("Total creances: {}", amount(receivables)))
}

/// Opening credit-side balance of `prefixes`: N-1 closing when supplied,
/// otherwise the opening columns of the current export.
fn opening_credit(current: &BalanceSnapshot, prior: Option<&BalanceSnapshot>, prefixes: &[&str]) -> Option<Decimal> {
    match prior {
        Some(prior) => Some(sum_credit_net(prior, prefixes)),
        None if current.has_opening_balances() => Some(
            prefixes
                .iter()
                .map(|prefix| -current.opening_net_balance(prefix))
                .sum(),
        ),
        None => None,
    }
}

fn provisions_movement(current: &BalanceSnapshot, prior: Option<&BalanceSnapshot>) -> RuleOutcome {
    if !current.has_open_income_statement() {
        return RuleOutcome::ok("Compte de resultat solde, dotations non observables");
    }
    let Some(opening) = opening_credit(current, prior, &PROVISIONS) else {
        return RuleOutcome::ok("Ni balance N-1 ni soldes d'ouverture: mouvement non calculable");
    };
    let closing = sum_credit_net(current, &PROVISIONS);
    let movement = closing - opening;
    let net_allowances = current.net_balance("69") - current.credit_net("79");

    let outcome = Tolerance::standard(dec!(1500)).compare(
        "Variation des provisions / dotations nettes",
        movement,
        net_allowances,
    );
    if outcome.is_anomaly() {
        outcome
            .with_amount("provisions_ouverture", opening)
            .with_amount("provisions_cloture", closing)
            .with_suggestion("Rapprocher le tableau des provisions (note 3J) des dotations 69x et reprises 79x")
    } else {
        outcome
    }
}

fn depreciation_movement(current: &BalanceSnapshot, prior: Option<&BalanceSnapshot>) -> RuleOutcome {
    if !current.has_open_income_statement() {
        return RuleOutcome::ok("Compte de resultat solde, dotations non observables");
    }
    let Some(opening) = opening_credit(current, prior, &["28"]) else {
        return RuleOutcome::ok("Ni balance N-1 ni soldes d'ouverture: mouvement non calculable");
    };
    let closing = current.credit_net("28");
    let movement = closing - opening;
    let allowances = sum_net(current, &DEPRECIATION_ALLOWANCES);

    let outcome = Tolerance::standard(dec!(2000)).compare(
        "Variation des amortissements / dotations",
        movement,
        allowances,
    );
    if outcome.is_anomaly() {
        outcome
            .with_amount("amortissements_ouverture", opening)
            .with_amount("amortissements_cloture", closing)
            .with_suggestion(
                "Rapprocher le tableau des amortissements des dotations 681 et 852; \
                 une sortie d'actif explique une variation inferieure aux dotations",
            )
    } else {
        outcome
    }
}

//! Level 3: balance direction per account family and aberrant amounts.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::support::{amount, codes, percent};
use super::ControlRule;
use crate::workflows::audit::corrective;
use crate::workflows::audit::domain::{EntrySide, Level, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::{BalanceEntry, BalanceSnapshot};

/// Balances within one currency unit of zero are not flagged.
const DIRECTION_NOISE: Decimal = dec!(1);

/// An account family and the side its balance should sit on.
struct Family {
    prefixes: &'static [&'static str],
    excluded: &'static [&'static str],
    expected: EntrySide,
    label: &'static str,
}

impl Family {
    fn members<'a>(&'a self, snapshot: &'a BalanceSnapshot) -> impl Iterator<Item = &'a BalanceEntry> + 'a {
        snapshot.entries().iter().filter(move |entry| {
            self.prefixes.iter().any(|prefix| entry.has_prefix(prefix))
                && !self.excluded.iter().any(|prefix| entry.has_prefix(prefix))
        })
    }

    fn inverted<'a>(&'a self, snapshot: &'a BalanceSnapshot) -> Vec<&'a BalanceEntry> {
        self.members(snapshot)
            .filter(|entry| match self.expected {
                EntrySide::Debit => entry.net() < -DIRECTION_NOISE,
                EntrySide::Credit => entry.net() > DIRECTION_NOISE,
            })
            .collect()
    }

    fn check(&self, snapshot: &BalanceSnapshot) -> RuleOutcome {
        let inverted = self.inverted(snapshot);
        let expected = match self.expected {
            EntrySide::Debit => "debiteurs",
            EntrySide::Credit => "crediteurs",
        };
        if inverted.is_empty() {
            return RuleOutcome::ok(format!("Tous les comptes {} ont un sens normal", self.label));
        }
        RuleOutcome::anomaly(
            Severity::Mineur,
            format!("{} compte(s) {} a sens inverse", inverted.len(), self.label),
        )
        .with_accounts(codes(inverted))
        .with_suggestion(format!(
            "Les comptes {} sont normalement {expected}",
            self.label
        ))
    }

    /// Wrong-side accounts with a reclassification entry attached.
    fn reclassify(&self, snapshot: &BalanceSnapshot, message: &str, suggestion: &str) -> RuleOutcome {
        let inverted = self.inverted(snapshot);
        if inverted.is_empty() {
            return RuleOutcome::ok(format!("Aucun compte {} de sens inverse", self.label));
        }
        let total: Decimal = inverted.iter().map(|entry| entry.net().abs()).sum();
        let outcome = RuleOutcome::anomaly(
            Severity::Mineur,
            format!("{} {message} pour {}", inverted.len(), amount(total)),
        )
        .with_accounts(inverted.iter().map(|entry| entry.account_code.clone()))
        .with_amount("montant_reclassement", total)
        .with_suggestion(suggestion);
        let entry = corrective::suggest(&outcome, snapshot);
        outcome.with_entry(entry)
    }
}

const FIXED_ASSETS: Family = Family {
    prefixes: &["2"],
    excluded: &["28", "29"],
    expected: EntrySide::Debit,
    label: "d'immobilisations",
};
const STOCKS: Family = Family {
    prefixes: &["3"],
    excluded: &["39"],
    expected: EntrySide::Debit,
    label: "de stocks",
};
const EXPENSES: Family = Family {
    prefixes: &["6"],
    excluded: &["603"],
    expected: EntrySide::Debit,
    label: "de charges",
};
const REVENUES: Family = Family {
    prefixes: &["7"],
    excluded: &["73"],
    expected: EntrySide::Credit,
    label: "de produits",
};
const CLIENTS: Family = Family {
    prefixes: &["411"],
    excluded: &[],
    expected: EntrySide::Debit,
    label: "clients",
};
const SUPPLIERS: Family = Family {
    prefixes: &["401"],
    excluded: &[],
    expected: EntrySide::Credit,
    label: "fournisseurs",
};
const BANKS: Family = Family {
    prefixes: &["52"],
    excluded: &[],
    expected: EntrySide::Debit,
    label: "bancaires",
};
const DEPRECIATION: Family = Family {
    prefixes: &["28"],
    excluded: &[],
    expected: EntrySide::Credit,
    label: "d'amortissements",
};
const IMPAIRMENT: Family = Family {
    prefixes: &["29", "39", "49", "59"],
    excluded: &[],
    expected: EntrySide::Credit,
    label: "de depreciations",
};

pub(super) fn rules() -> Vec<ControlRule> {
    let level = Level::DIRECTION;
    vec![
        ControlRule::new("SS-001", level, "Sens immobilisations", Severity::Mineur, |current, _| {
            FIXED_ASSETS.check(current)
        }),
        ControlRule::new("SS-002", level, "Sens stocks", Severity::Mineur, |current, _| {
            STOCKS.check(current)
        }),
        ControlRule::new("SS-003", level, "Sens charges", Severity::Mineur, |current, _| {
            EXPENSES.check(current)
        }),
        ControlRule::new("SS-004", level, "Sens produits", Severity::Mineur, |current, _| {
            REVENUES.check(current)
        }),
        ControlRule::new("SS-005", level, "Clients crediteurs", Severity::Mineur, |current, _| {
            CLIENTS.reclassify(
                current,
                "client(s) crediteur(s)",
                "Reclasser au passif en avances recues (4191) ou imputer les avoirs",
            )
        }),
        ControlRule::new("SS-006", level, "Fournisseurs debiteurs", Severity::Mineur, |current, _| {
            SUPPLIERS.reclassify(
                current,
                "fournisseur(s) debiteur(s)",
                "Reclasser a l'actif en avances versees (4091) ou verifier les avoirs",
            )
        }),
        ControlRule::new("SS-007", level, "Banques creditrices", Severity::Mineur, |current, _| {
            BANKS.reclassify(
                current,
                "banque(s) creditrice(s) (decouvert)",
                "Reclasser en tresorerie passif (561, concours bancaires)",
            )
        }),
        ControlRule::new("SS-008", level, "Sens amortissements", Severity::Mineur, |current, _| {
            DEPRECIATION.check(current)
        }),
        ControlRule::new("SS-009", level, "Sens depreciations", Severity::Mineur, |current, _| {
            IMPAIRMENT.check(current)
        }),
        ControlRule::new("SS-010", level, "Capital negatif", Severity::Majeur, |current, _| {
            negative_capital(current)
        }),
        ControlRule::new("MA-001", level, "Concentration montants", Severity::Mineur, |current, _| {
            concentration(current)
        }),
        ControlRule::new("MA-002", level, "Centimes suspects", Severity::Info, |current, _| {
            suspicious_cents(current)
        }),
        ControlRule::new("MA-003", level, "Montants negatifs", Severity::Mineur, |current, _| {
            negative_amounts(current)
        }),
        ControlRule::new("MA-004", level, "Deficit vs capital", Severity::Info, |current, _| {
            deficit_against_capital(current)
        }),
        ControlRule::new(
            "MA-005",
            level,
            "Capitaux propres negatifs",
            Severity::Majeur,
            |current, _| negative_equity(current),
        ),
        ControlRule::new("MA-006", level, "Tresorerie nette", Severity::Info, |current, _| {
            net_cash(current)
        }),
    ]
}

fn negative_capital(current: &BalanceSnapshot) -> RuleOutcome {
    let capital = current.credit_net("101");
    if capital < Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!("Capital social negatif: {}", amount(capital)),
        )
        .with_amount("capital_social", capital)
        .with_accounts(codes(current.entries_with_prefix("101")))
        .with_suggestion("Un capital negatif est anormal et doit etre corrige");
    }
    RuleOutcome::ok(format!("Capital social: {}", amount(capital)))
}

fn concentration(current: &BalanceSnapshot) -> RuleOutcome {
    let total = current.balance_sheet_total();
    if total.is_zero() {
        return RuleOutcome::ok("Bilan nul");
    }
    let half = total * dec!(0.5);
    let concentrated: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| entry.in_classes(1..=5) && entry.net().abs() > half)
        .collect();
    if concentrated.is_empty() {
        return RuleOutcome::ok("Pas de concentration excessive");
    }
    let description = concentrated
        .iter()
        .map(|entry| {
            format!(
                "{}: {}% du total bilan",
                entry.account_code,
                percent(entry.net().abs(), total)
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!(
            "{} compte(s) representant plus de 50% du total bilan",
            concentrated.len()
        ),
    )
    .with_accounts(codes(concentrated))
    .with_description(description)
    .with_amount("total_bilan", total)
    .with_suggestion("Forte concentration: verifier la repartition des postes")
}

fn has_suspicious_cents(value: Decimal) -> bool {
    if value <= Decimal::ZERO {
        return false;
    }
    let cents = (value.fract() * dec!(100)).round();
    cents == dec!(1) || cents == dec!(99)
}

fn suspicious_cents(current: &BalanceSnapshot) -> RuleOutcome {
    let suspects: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .flat_map(|entry| {
            [entry.movement_debit, entry.movement_credit]
                .into_iter()
                .filter(|value| has_suspicious_cents(*value))
                .map(move |_| entry)
        })
        .collect();
    if suspects.len() <= 3 {
        return RuleOutcome::ok("Pas de centimes suspects");
    }
    RuleOutcome::anomaly(
        Severity::Info,
        format!(
            "{} montant(s) avec centimes suspects (.01 ou .99)",
            suspects.len()
        ),
    )
    .with_accounts(codes(suspects))
    .with_suggestion("Des montants en .01 ou .99 peuvent indiquer des erreurs d'arrondi")
}

fn negative_amounts(current: &BalanceSnapshot) -> RuleOutcome {
    let negatives: Vec<&BalanceEntry> = current
        .entries()
        .iter()
        .filter(|entry| {
            [
                entry.opening_debit,
                entry.opening_credit,
                entry.movement_debit,
                entry.movement_credit,
                entry.closing_debit,
                entry.closing_credit,
            ]
            .iter()
            .any(|value| value.is_sign_negative() && !value.is_zero())
        })
        .collect();
    if negatives.is_empty() {
        return RuleOutcome::ok("Aucun montant negatif");
    }
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!(
            "{} ligne(s) avec montants negatifs en debit/credit",
            negatives.len()
        ),
    )
    .with_accounts(codes(negatives))
    .with_suggestion("Les montants en debit et credit doivent etre positifs (utiliser le sens oppose)")
}

fn deficit_against_capital(current: &BalanceSnapshot) -> RuleOutcome {
    let capital = current.credit_net("101");
    let result = current.exercise_result();
    if capital > Decimal::ZERO && result < Decimal::ZERO && -result > capital * dec!(0.5) {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!(
                "Deficit ({}) superieur a 50% du capital ({})",
                amount(result),
                amount(capital)
            ),
        )
        .with_amount("resultat", result)
        .with_amount("capital", capital)
        .with_amount("ratio", percent(-result, capital))
        .with_suggestion("Un deficit important peut mettre en cause la continuite d'exploitation");
    }
    RuleOutcome::ok("Deficit dans les limites acceptables")
}

fn negative_equity(current: &BalanceSnapshot) -> RuleOutcome {
    let equity: Decimal = ["10", "11", "12", "13", "14"]
        .iter()
        .map(|prefix| current.credit_net(prefix))
        .sum::<Decimal>()
        + current.pending_result();
    if equity < Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!("Capitaux propres negatifs: {}", amount(equity)),
        )
        .with_amount("capitaux_propres", equity)
        .with_suggestion("Situation d'alerte: obligation legale de regulariser sous deux ans")
        .with_reference("Art. 664 AUSCGIE");
    }
    RuleOutcome::ok(format!("Capitaux propres positifs: {}", amount(equity)))
}

fn net_cash(current: &BalanceSnapshot) -> RuleOutcome {
    let assets = current.debit_balances("5");
    let liabilities = current.credit_balances("5");
    let net = assets - liabilities;
    let total = current.balance_sheet_total();
    if total > Decimal::ZERO && net < Decimal::ZERO && -net > total * dec!(0.3) {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!(
                "Tresorerie nette tres negative: {} ({}% du bilan)",
                amount(net),
                percent(-net, total)
            ),
        )
        .with_amount("tresorerie_nette", net)
        .with_amount("tresorerie_actif", assets)
        .with_amount("tresorerie_passif", liabilities)
        .with_accounts(codes(current.entries_with_prefix("5")))
        .with_suggestion("Risque de tension de tresorerie importante");
    }
    RuleOutcome::ok(format!("Tresorerie nette: {}", amount(net)))
}

//! Level 7: tax-related checks (Côte d'Ivoire CGI defaults).
//!
//! Rates come from [`FiscalParameters`] so that other OHADA member states can
//! plug their own values. Rules reading the income statement are not applicable
//! once classes 6 to 8 have been closed into 13x.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::support::{amount, codes, entries_with_any, percent};
use super::{ControlRule, FiscalParameters};
use crate::workflows::audit::corrective::EntryDraft;
use crate::workflows::audit::domain::{Level, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::BalanceSnapshot;

const VEHICLE_CEILING: Decimal = dec!(25000000);
const SPONSORSHIP_CAP_RATE: Decimal = dec!(0.001);
const FINES: [&str; 2] = ["6471", "6478"];
const PROVISION_ALLOWANCES: [&str; 2] = ["691", "697"];
const SOCIAL_CONTRIBUTIONS: [&str; 2] = ["664", "6413"];

pub(super) fn rules(params: &FiscalParameters) -> Vec<ControlRule> {
    let level = Level::FISCAL;
    let gifts = params.clone();
    let income_tax = params.clone();
    let minimum_tax = params.clone();
    let vat = params.clone();
    let interest = params.clone();
    let effective = params.clone();
    vec![
        ControlRule::new("FI-001", level, "Resultat fiscal", Severity::Info, |current, _| {
            tax_loss(current)
        }),
        ControlRule::new("FI-002", level, "Amort. vehicules tourisme", Severity::Mineur, |current, _| {
            passenger_vehicles(current)
        }),
        ControlRule::new("FI-003", level, "Frais de reception", Severity::Mineur, |current, _| {
            open_statement(current, entertainment_expenses)
        }),
        ControlRule::new("FI-004", level, "Amendes et penalites", Severity::Mineur, |current, _| {
            open_statement(current, fines_and_penalties)
        }),
        ControlRule::new("FI-005", level, "Dons et liberalites", Severity::Mineur, |current, _| {
            open_statement(current, sponsorship_ceiling)
        }),
        ControlRule::new(
            "FI-006",
            level,
            "Provisions non deductibles",
            Severity::Mineur,
            |current, _| open_statement(current, provision_allowances),
        ),
        ControlRule::new(
            "FI-007",
            level,
            "IS calcule vs comptabilise",
            Severity::Majeur,
            move |current, _| open_statement(current, |current| booked_income_tax(current, &income_tax)),
        ),
        ControlRule::new(
            "FI-008",
            level,
            "Minimum forfaitaire (IMF)",
            Severity::Mineur,
            move |current, _| open_statement(current, |current| minimum_tax_floor(current, &minimum_tax)),
        ),
        ControlRule::new("FI-009", level, "TVA a reverser", Severity::Mineur, move |current, _| {
            vat_payable(current, &vat)
        }),
        ControlRule::new(
            "FI-010",
            level,
            "Charges personnel vs cotisations",
            Severity::Info,
            |current, _| open_statement(current, social_contributions),
        ),
        ControlRule::new("FI-011", level, "Dons excedentaires (658)", Severity::Mineur, move |current, _| {
            open_statement(current, |current| gifts_ceiling(current, &gifts))
        }),
        ControlRule::new(
            "FI-012",
            level,
            "Charges somptuaires (6257)",
            Severity::Mineur,
            |current, _| open_statement(current, sumptuary_expenses),
        ),
        ControlRule::new(
            "FI-013",
            level,
            "Interets comptes courants",
            Severity::Mineur,
            move |current, _| open_statement(current, |current| shareholder_interest(current, &interest)),
        ),
        ControlRule::new("FI-014", level, "Loyers vs occupation", Severity::Info, |current, _| {
            open_statement(current, rent_with_own_buildings)
        }),
        ControlRule::new(
            "FI-015",
            level,
            "Taux effectif d'imposition",
            Severity::Info,
            move |current, _| open_statement(current, |current| effective_tax_rate(current, &effective)),
        ),
    ]
}

fn open_statement<F>(current: &BalanceSnapshot, check: F) -> RuleOutcome
where
    F: FnOnce(&BalanceSnapshot) -> RuleOutcome,
{
    if current.has_open_income_statement() {
        check(current)
    } else {
        RuleOutcome::ok("Compte de resultat solde, controle fiscal non applicable")
    }
}

fn turnover(current: &BalanceSnapshot) -> Decimal {
    current.credit_net("70").max(Decimal::ZERO)
}

fn booked_tax(current: &BalanceSnapshot) -> Decimal {
    current.net_balance("89").max(Decimal::ZERO)
}

/// Result before income tax, profit positive.
fn pre_tax_result(current: &BalanceSnapshot) -> Decimal {
    current.exercise_result() + booked_tax(current)
}

fn tax_loss(current: &BalanceSnapshot) -> RuleOutcome {
    let result = current.exercise_result();
    if result < Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!("Resultat deficitaire: {}", amount(result)),
        )
        .with_amount("resultat_net", result)
        .with_suggestion(
            "Constituer le dossier de report deficitaire et verifier le paiement de l'impot minimum forfaitaire",
        )
        .with_reference("Art. 7 CGI, report deficitaire sur cinq exercices");
    }
    RuleOutcome::ok(format!("Resultat: {}", amount(result)))
}

fn passenger_vehicles(current: &BalanceSnapshot) -> RuleOutcome {
    let vehicles = current.absolute_balances("245");
    if vehicles > VEHICLE_CEILING {
        let excess = vehicles - VEHICLE_CEILING;
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Vehicules de tourisme: {} (plafond fiscal {})",
                amount(vehicles),
                amount(VEHICLE_CEILING)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("245")))
        .with_amount("valeur_vehicules", vehicles)
        .with_amount("plafond", VEHICLE_CEILING)
        .with_amount("base_excedentaire", excess)
        .with_suggestion(format!(
            "Reintegrer la fraction d'amortissement calculee sur l'excedent de {} au-dela du plafond",
            amount(excess)
        ))
        .with_reference("Art. 8-1 CGI, plafond d'amortissement des vehicules de tourisme");
    }
    RuleOutcome::ok("Vehicules de tourisme dans les limites")
}

fn entertainment_expenses(current: &BalanceSnapshot) -> RuleOutcome {
    let receptions = current.absolute_balances("627");
    let sales = turnover(current);
    let ceiling = sales * dec!(0.01);
    if sales > Decimal::ZERO && receptions > ceiling {
        let excess = receptions - ceiling;
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Receptions et cadeaux ({}) superieurs a 1% du CA ({})",
                amount(receptions),
                amount(sales)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("627")))
        .with_amount("receptions", receptions)
        .with_amount("chiffre_affaires", sales)
        .with_amount("ratio_pct", percent(receptions, sales))
        .with_amount("excedent_a_reintegrer", excess)
        .with_suggestion(format!(
            "Reintegrer l'excedent de {} dans le passage au resultat fiscal",
            amount(excess)
        ))
        .with_reference("CGI, charges somptuaires");
    }
    RuleOutcome::ok("Frais de reception dans les limites")
}

fn fines_and_penalties(current: &BalanceSnapshot) -> RuleOutcome {
    let fines = current.absolute_balances_any(&FINES);
    if fines > Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!("Amendes et penalites: {} (non deductibles)", amount(fines)),
        )
        .with_accounts(codes(entries_with_any(current, &FINES)))
        .with_amount("amendes", fines)
        .with_suggestion(format!(
            "Reintegrer la totalite des amendes ({}) dans le resultat fiscal",
            amount(fines)
        ))
        .with_reference("Art. 8-d CGI, charges non deductibles");
    }
    RuleOutcome::ok("Aucune amende ou penalite comptabilisee")
}

fn sponsorship_ceiling(current: &BalanceSnapshot) -> RuleOutcome {
    let sponsorship = current.absolute_balances("6234");
    let ceiling = turnover(current) * SPONSORSHIP_CAP_RATE;
    if ceiling > Decimal::ZERO && sponsorship > ceiling {
        let excess = sponsorship - ceiling;
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Dons et liberalites ({}) au-dela de 1 pour mille du CA ({})",
                amount(sponsorship),
                amount(ceiling)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("6234")))
        .with_amount("dons", sponsorship)
        .with_amount("plafond", ceiling)
        .with_amount("excedent_a_reintegrer", excess)
        .with_suggestion(format!(
            "Reintegrer l'excedent de {} dans le resultat fiscal",
            amount(excess)
        ))
        .with_reference("CGI, dons et liberalites");
    }
    RuleOutcome::ok("Dons et liberalites dans les limites")
}

fn gifts_ceiling(current: &BalanceSnapshot, params: &FiscalParameters) -> RuleOutcome {
    let gifts = current.absolute_balances("658");
    let ceiling = turnover(current) * params.gifts_cap_rate;
    if ceiling > Decimal::ZERO && gifts > ceiling {
        let excess = gifts - ceiling;
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Dons (658) de {} au-dela du plafond de deductibilite ({})",
                amount(gifts),
                amount(ceiling)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("658")))
        .with_amount("dons", gifts)
        .with_amount("plafond", ceiling)
        .with_amount("excedent_a_reintegrer", excess)
        .with_suggestion(format!(
            "Reintegrer l'excedent de {} dans le resultat fiscal",
            amount(excess)
        ))
        .with_reference("Art. 18-5 CGI, plafond des dons");
    }
    RuleOutcome::ok("Dons dans les limites du plafond")
}

fn sumptuary_expenses(current: &BalanceSnapshot) -> RuleOutcome {
    let sumptuary = current.absolute_balances("6257");
    if sumptuary > Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Charges somptuaires: {} (non deductibles)",
                amount(sumptuary)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("6257")))
        .with_amount("charges_somptuaires", sumptuary)
        .with_suggestion(format!(
            "Reintegrer la totalite ({}) dans le resultat fiscal et documenter la nature des depenses",
            amount(sumptuary)
        ))
        .with_reference("Art. 18-6 CGI, charges somptuaires");
    }
    RuleOutcome::ok("Aucune charge somptuaire detectee")
}

fn rent_with_own_buildings(current: &BalanceSnapshot) -> RuleOutcome {
    let rent = current.absolute_balances("622");
    let buildings = current.absolute_balances("231");
    if rent > Decimal::ZERO && buildings > Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!(
                "Loyers ({}) et batiments propres ({}) simultanement",
                amount(rent),
                amount(buildings)
            ),
        )
        .with_amount("loyers", rent)
        .with_amount("batiments", buildings)
        .with_suggestion("Documenter la justification economique des loyers payes malgre la possession de batiments");
    }
    RuleOutcome::ok("Loyers coherents avec l'occupation des locaux")
}

fn provision_allowances(current: &BalanceSnapshot) -> RuleOutcome {
    let allowances = current.absolute_balances_any(&PROVISION_ALLOWANCES);
    if allowances > Decimal::ZERO {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Dotations aux provisions: {}, deductibilite a justifier",
                amount(allowances)
            ),
        )
        .with_accounts(codes(entries_with_any(current, &PROVISION_ALLOWANCES)))
        .with_amount("dotations_provisions", allowances)
        .with_suggestion("Examiner chaque provision et reintegrer celles qui ne sont pas deductibles")
        .with_reference("CGI, deductibilite des provisions");
    }
    RuleOutcome::ok("Pas de dotation aux provisions")
}

fn booked_income_tax(current: &BalanceSnapshot, params: &FiscalParameters) -> RuleOutcome {
    let result = pre_tax_result(current);
    if result <= Decimal::ZERO {
        return RuleOutcome::ok("Pas de resultat imposable au taux normal");
    }
    let booked = booked_tax(current);
    let estimate = (result * params.corporate_tax_rate).round_dp(0);
    if booked.is_zero() {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!("Resultat beneficiaire ({}) sans impot comptabilise (89x)", amount(result)),
        )
        .with_amount("resultat_avant_impot", result)
        .with_amount("is_estime", estimate)
        .with_suggestion(format!(
            "Comptabiliser l'impot sur les societes, estime a {}",
            amount(estimate)
        ));
    }
    let gap = (estimate - booked).abs();
    if gap > estimate * dec!(0.3) {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!(
                "IS comptabilise ({}) eloigne de l'estimation ({} au taux de {}%)",
                amount(booked),
                amount(estimate),
                (params.corporate_tax_rate * dec!(100)).normalize()
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("89")))
        .with_amount("is_comptabilise", booked)
        .with_amount("is_estime", estimate)
        .with_amount("resultat_avant_impot", result)
        .with_amount("ecart", gap)
        .with_suggestion(
            "Verifier les reintegrations, deductions, credits d'impot et reports deficitaires",
        );
    }
    RuleOutcome::ok("IS coherent avec le resultat")
}

fn minimum_tax_floor(current: &BalanceSnapshot, params: &FiscalParameters) -> RuleOutcome {
    let sales = turnover(current);
    let booked = booked_tax(current);
    if sales.is_zero() || booked.is_zero() {
        return RuleOutcome::ok("IMF non evaluable: pas de chiffre d'affaires ou pas d'impot");
    }
    let floor = (sales * params.minimum_tax_rate).max(params.minimum_tax_floor);
    if booked < floor {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "IS ({}) inferieur a l'IMF ({})",
                amount(booked),
                amount(floor)
            ),
        )
        .with_amount("is_comptabilise", booked)
        .with_amount("imf", floor)
        .with_amount("chiffre_affaires", sales)
        .with_amount("complement", floor - booked)
        .with_suggestion(format!(
            "Comptabiliser un complement d'impot de {}",
            amount(floor - booked)
        ))
        .with_reference("CGI, impot minimum forfaitaire");
    }
    RuleOutcome::ok("IMF respecte")
}

fn vat_payable(current: &BalanceSnapshot, params: &FiscalParameters) -> RuleOutcome {
    let collected = current.absolute_balances("443");
    let deductible = current.absolute_balances("445");
    let payable = current.absolute_balances("444");
    if collected.is_zero() || deductible.is_zero() {
        return RuleOutcome::ok("TVA collectee ou deductible absente, pas de centralisation a verifier");
    }
    let due = collected - deductible;
    if due > Decimal::ZERO && payable.is_zero() {
        let entry = EntryDraft::new()
            .debit("4431", "TVA facturee, apurement", due)
            .credit("4441", "Etat, TVA due", due)
            .comment("Centralisation TVA: solde de TVA collectee vers TVA due")
            .finish();
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!("TVA due theorique ({}) non comptabilisee en 444x", amount(due)),
        )
        .with_amount("tva_collectee", collected)
        .with_amount("tva_deductible", deductible)
        .with_amount("tva_due", due)
        .with_amount("tva_theorique_sur_ca", turnover(current) * params.vat_rate)
        .with_suggestion("Comptabiliser la TVA due au 444x et rapprocher des declarations mensuelles")
        .with_reference("CGI, declaration et paiement de la TVA")
        .with_entry(entry);
    }
    RuleOutcome::ok("TVA a reverser coherente")
}

fn social_contributions(current: &BalanceSnapshot) -> RuleOutcome {
    let payroll = current.absolute_balances("66");
    if payroll.is_zero() {
        return RuleOutcome::ok("Pas de charges de personnel");
    }
    let contributions = current.absolute_balances_any(&SOCIAL_CONTRIBUTIONS);
    if contributions.is_zero() {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!(
                "Charges de personnel ({}) sans cotisations sociales (664, 6413)",
                amount(payroll)
            ),
        )
        .with_amount("charges_personnel", payroll)
        .with_suggestion("Verifier les declarations sociales et comptabiliser les cotisations patronales en 664");
    }
    let ratio = percent(contributions, payroll);
    if ratio < dec!(10) {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!("Ratio cotisations / charges de personnel faible: {ratio}%"),
        )
        .with_amount("charges_personnel", payroll)
        .with_amount("cotisations", contributions)
        .with_amount("ratio_pct", ratio)
        .with_suggestion("Verifier l'exhaustivite des cotisations: prestations familiales, accidents du travail, retraite");
    }
    RuleOutcome::ok("Coherence charges de personnel / cotisations")
}

fn shareholder_interest(current: &BalanceSnapshot, params: &FiscalParameters) -> RuleOutcome {
    let interest = current.absolute_balances("672");
    let accounts = current.absolute_balances("455");
    if interest.is_zero() || accounts.is_zero() {
        return RuleOutcome::ok("Pas d'interets sur comptes courants d'associes");
    }
    let ceiling = accounts * params.shareholder_interest_cap_rate;
    if interest > ceiling {
        let excess = interest - ceiling;
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Interets de comptes courants ({}) au-dela du plafond ({})",
                amount(interest),
                amount(ceiling)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("672")))
        .with_amount("interets", interest)
        .with_amount("comptes_courants", accounts)
        .with_amount("interets_max", ceiling)
        .with_amount("excedent_a_reintegrer", excess)
        .with_suggestion(format!(
            "Reintegrer {} d'interets excedentaires dans le resultat fiscal",
            amount(excess)
        ))
        .with_reference("Art. 18 CGI, deductibilite des interets de comptes courants");
    }
    RuleOutcome::ok("Interets de comptes courants dans les limites")
}

fn effective_tax_rate(current: &BalanceSnapshot, params: &FiscalParameters) -> RuleOutcome {
    let result = pre_tax_result(current);
    let booked = booked_tax(current);
    if result <= Decimal::ZERO || booked.is_zero() {
        return RuleOutcome::ok("Taux effectif non calculable");
    }
    let effective = percent(booked, result);
    let normal = (params.corporate_tax_rate * dec!(100)).normalize();
    let message = if effective > normal * dec!(1.5) {
        format!("Taux effectif d'imposition eleve: {effective}% (taux normal {normal}%)")
    } else if effective < normal * dec!(0.3) && booked > dec!(100000) {
        format!("Taux effectif d'imposition faible: {effective}% (taux normal {normal}%)")
    } else {
        return RuleOutcome::ok(format!("Taux effectif d'imposition: {effective}%"));
    };
    RuleOutcome::anomaly(Severity::Info, message)
        .with_amount("resultat_avant_impot", result)
        .with_amount("is_comptabilise", booked)
        .with_amount("taux_effectif", effective)
        .with_amount("taux_normal", normal)
        .with_suggestion(
            "Documenter les reintegrations, exonerations, reports deficitaires ou l'application de l'IMF",
        )
}

//! Level 4: consistency between related accounts.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::support::{amount, codes, percent, with_prior};
use super::ControlRule;
use crate::workflows::audit::corrective::EntryDraft;
use crate::workflows::audit::domain::{Level, RuleOutcome, Severity};
use crate::workflows::audit::snapshot::{BalanceEntry, BalanceSnapshot};

const NOISE: Decimal = dec!(1);

pub(super) fn rules() -> Vec<ControlRule> {
    let level = Level::CROSS_ACCOUNT;
    vec![
        ControlRule::new(
            "IC-001",
            level,
            "Amortissements <= valeur brute",
            Severity::Bloquant,
            |current, _| depreciation_within_gross(current),
        ),
        ControlRule::new(
            "IC-002",
            level,
            "Immobilisation sans amortissement",
            Severity::Mineur,
            |current, _| assets_without_depreciation(current),
        ),
        ControlRule::new(
            "IC-003",
            level,
            "Amortissement sans immobilisation",
            Severity::Majeur,
            |current, _| orphan_depreciation(current),
        ),
        ControlRule::new(
            "IC-004",
            level,
            "Amortissements sans dotation",
            Severity::Mineur,
            |current, _| depreciation_without_allowance(current),
        ),
        ControlRule::new(
            "IC-005",
            level,
            "Depreciations <= valeur brute",
            Severity::Bloquant,
            |current, _| impairment_within_gross(current),
        ),
        ControlRule::new(
            "IC-006",
            level,
            "Provisions sans dotation",
            Severity::Mineur,
            |current, _| provisions_without_allowance(current),
        ),
        ControlRule::new("IC-007", level, "Provisions elevees", Severity::Info, |current, _| {
            high_provisions(current)
        }),
        ControlRule::new(
            "IC-008",
            level,
            "Variation stocks coherente",
            Severity::Majeur,
            |current, prior| {
                with_prior(prior, "variation des stocks", |prior| {
                    stock_variation(current, prior)
                })
            },
        ),
        ControlRule::new(
            "IC-009",
            level,
            "Personnel vs dettes sociales",
            Severity::Info,
            |current, _| {
                requires_counterpart(current, "66", "42", |base| {
                    format!("Charges de personnel ({}) sans dettes sociales (42x)", amount(base))
                })
                .unwrap_or_else(|| RuleOutcome::ok("Coherence charges de personnel / dettes sociales"))
            },
        ),
        ControlRule::new("IC-010", level, "CA vs creances clients", Severity::Info, |current, _| {
            requires_counterpart(current, "70", "411", |base| {
                format!("Chiffre d'affaires de {} sans creances clients (411x)", amount(base))
            })
            .map(|outcome| {
                outcome.with_suggestion(
                    "Verifier si l'activite est exclusivement au comptant; sinon comptabiliser les creances",
                )
            })
            .unwrap_or_else(|| RuleOutcome::ok("CA et creances clients coherents"))
        }),
        ControlRule::new(
            "IC-011",
            level,
            "Achats vs dettes fournisseurs",
            Severity::Info,
            |current, _| purchases_without_payables(current),
        ),
        ControlRule::new("IC-012", level, "Interets vs emprunts", Severity::Info, |current, _| {
            requires_counterpart(current, "67", "16", |base| {
                format!("Charges financieres ({}) sans emprunts (16x)", amount(base))
            })
            .map(|outcome| {
                outcome.with_suggestion(
                    "Verifier l'origine des charges financieres: agios, comptes courants ou emprunts rembourses",
                )
            })
            .unwrap_or_else(|| RuleOutcome::ok("Interets et emprunts coherents"))
        }),
        ControlRule::new(
            "IC-013",
            level,
            "Dotations vs immobilisations",
            Severity::Mineur,
            |current, _| allowances_against_assets(current),
        ),
        ControlRule::new("IC-014", level, "Impot vs resultat", Severity::Mineur, |current, _| {
            tax_against_profit(current)
        }),
        ControlRule::new("IC-015", level, "TVA collectee vs CA", Severity::Mineur, |current, _| {
            output_vat(current)
        }),
        ControlRule::new(
            "IC-016",
            level,
            "TVA deductible vs achats",
            Severity::Info,
            |current, _| input_vat(current),
        ),
        ControlRule::new(
            "IC-017",
            level,
            "Effets a recevoir vs clients",
            Severity::Info,
            |current, _| {
                requires_counterpart(current, "412", "411", |base| {
                    format!("Effets a recevoir ({}) sans clients (411x)", amount(base))
                })
                .map(|outcome| {
                    outcome.with_suggestion(
                        "Verifier l'origine des effets a recevoir et leur coherence avec le poste clients",
                    )
                })
                .unwrap_or_else(|| RuleOutcome::ok("Effets et clients coherents"))
            },
        ),
        ControlRule::new(
            "IC-018",
            level,
            "Effets a payer vs fournisseurs",
            Severity::Info,
            |current, _| {
                requires_counterpart(current, "402", "401", |base| {
                    format!("Effets a payer ({}) sans fournisseurs (401x)", amount(base))
                })
                .map(|outcome| {
                    outcome.with_suggestion(
                        "Verifier l'origine des effets a payer et leur coherence avec le poste fournisseurs",
                    )
                })
                .unwrap_or_else(|| RuleOutcome::ok("Effets et fournisseurs coherents"))
            },
        ),
        ControlRule::new(
            "IC-019",
            level,
            "Subventions bilan vs produits",
            Severity::Info,
            |current, _| {
                requires_counterpart(current, "14", "71", |base| {
                    format!("Subventions au bilan ({}) sans reprise au resultat (71x)", amount(base))
                })
                .map(|outcome| {
                    outcome
                        .with_suggestion(
                            "Reprendre la quote-part de subvention au rythme des amortissements (debit 14x, credit 71x)",
                        )
                        .with_reference("Art. 47 Acte uniforme OHADA, subventions d'investissement")
                })
                .unwrap_or_else(|| RuleOutcome::ok("Subventions bilan et produits coherents"))
            },
        ),
        ControlRule::new(
            "IC-020",
            level,
            "Comptes courants associes",
            Severity::Info,
            |current, _| {
                requires_counterpart(current, "455", "672", |base| {
                    format!("Comptes courants associes ({}) sans interets verses (672x)", amount(base))
                })
                .map(|outcome| {
                    outcome.with_suggestion(
                        "Si les comptes courants sont remuneres, comptabiliser les interets au taux convenu",
                    )
                })
                .unwrap_or_else(|| RuleOutcome::ok("Comptes courants associes coherents"))
            },
        ),
        ControlRule::new(
            "IC-021",
            level,
            "Charges constatees d'avance",
            Severity::Mineur,
            |current, _| {
                share_above(current, "476", "6", dec!(20))
                    .map(|(deferred, total, ratio)| {
                        RuleOutcome::anomaly(
                            Severity::Mineur,
                            format!(
                                "Charges constatees d'avance ({}) > 20% des charges ({}), ratio {ratio}%",
                                amount(deferred),
                                amount(total)
                            ),
                        )
                        .with_amount("charges_constatees_avance", deferred)
                        .with_amount("total_charges", total)
                        .with_amount("ratio", ratio)
                        .with_suggestion("Justifier chaque charge constatee d'avance par une piece probante")
                        .with_reference("Art. 49 Acte uniforme OHADA, rattachement des charges")
                    })
                    .unwrap_or_else(|| RuleOutcome::ok("Charges constatees d'avance coherentes"))
            },
        ),
        ControlRule::new(
            "IC-022",
            level,
            "Produits constates d'avance",
            Severity::Mineur,
            |current, _| {
                share_above(current, "477", "7", dec!(20))
                    .map(|(deferred, total, ratio)| {
                        RuleOutcome::anomaly(
                            Severity::Mineur,
                            format!(
                                "Produits constates d'avance ({}) > 20% des produits ({}), ratio {ratio}%",
                                amount(deferred),
                                amount(total)
                            ),
                        )
                        .with_amount("produits_constates_avance", deferred)
                        .with_amount("total_produits", total)
                        .with_amount("ratio", ratio)
                        .with_suggestion("Justifier chaque produit constate d'avance et sa date de realisation")
                    })
                    .unwrap_or_else(|| RuleOutcome::ok("Produits constates d'avance coherents"))
            },
        ),
        ControlRule::new("IC-023", level, "Charges a payer", Severity::Mineur, |current, _| {
            accrued_charges(current)
        }),
        ControlRule::new(
            "IC-024",
            level,
            "Transferts de charges",
            Severity::Mineur,
            |current, _| {
                share_above(current, "78", "6", dec!(15))
                    .map(|(transfers, total, ratio)| {
                        RuleOutcome::anomaly(
                            Severity::Mineur,
                            format!(
                                "Transferts de charges ({}) > 15% des charges ({}), ratio {ratio}%",
                                amount(transfers),
                                amount(total)
                            ),
                        )
                        .with_amount("transferts", transfers)
                        .with_amount("total_charges", total)
                        .with_amount("ratio", ratio)
                        .with_suggestion("Justifier chaque transfert de charges et son imputation")
                    })
                    .unwrap_or_else(|| RuleOutcome::ok("Transferts de charges coherents"))
            },
        ),
        ControlRule::new("IC-025", level, "Ecarts de conversion", Severity::Mineur, |current, _| {
            conversion_gaps(current)
        }),
    ]
}

fn is_gross_asset(entry: &BalanceEntry) -> bool {
    !entry.has_prefix("28") && !entry.has_prefix("29")
}

fn depreciation_within_gross(current: &BalanceSnapshot) -> RuleOutcome {
    let mut breaches = Vec::new();
    let mut description = Vec::new();
    for digit in 0..=9 {
        let gross_prefix = format!("2{digit}");
        if gross_prefix == "28" || gross_prefix == "29" {
            continue;
        }
        let depreciation_prefix = format!("28{digit}");
        let gross: Decimal = current
            .entries_with_prefix(&gross_prefix)
            .map(|entry| entry.net().abs())
            .sum();
        let depreciation = current.absolute_balances(&depreciation_prefix);
        if !depreciation.is_zero() && depreciation > gross + NOISE {
            description.push(format!(
                "Classe {gross_prefix}: amortissements {} > brut {}",
                amount(depreciation),
                amount(gross)
            ));
            breaches.push(depreciation_prefix);
        }
    }
    if breaches.is_empty() {
        return RuleOutcome::ok("Amortissements coherents avec les valeurs brutes");
    }
    RuleOutcome::anomaly(Severity::Bloquant, "Amortissements depassant la valeur brute")
        .with_accounts(breaches)
        .with_description(description.join("; "))
        .with_suggestion("Solder les amortissements des immobilisations sorties et verifier les plans d'amortissement")
        .with_reference("Art. 45 Acte uniforme OHADA, amortissements")
}

fn assets_without_depreciation(current: &BalanceSnapshot) -> RuleOutcome {
    let missing: Vec<String> = ["21", "23", "24"]
        .iter()
        .filter(|prefix| {
            current
                .entries_with_prefix(prefix)
                .any(|entry| is_gross_asset(entry) && entry.net() > Decimal::ZERO)
        })
        .map(|prefix| format!("28{}", &prefix[1..]))
        .filter(|depreciation| !current.has_prefix(depreciation))
        .collect();
    if missing.is_empty() {
        return RuleOutcome::ok("Toutes les immobilisations amortissables ont des amortissements");
    }
    RuleOutcome::anomaly(
        Severity::Mineur,
        format!(
            "Immobilisations sans amortissement correspondant ({})",
            missing.join(", ")
        ),
    )
    .with_accounts(missing)
    .with_suggestion("Comptabiliser les dotations aux amortissements manquantes")
    .with_reference("Art. 44-46 Acte uniforme OHADA, amortissements obligatoires")
}

fn orphan_depreciation(current: &BalanceSnapshot) -> RuleOutcome {
    let orphans: Vec<&BalanceEntry> = current
        .entries_with_prefix("28")
        .filter(|entry| !entry.net().is_zero())
        .filter(|entry| {
            let asset_prefix = match entry.account_code.get(2..3) {
                Some(digit) => format!("2{digit}"),
                None => return false,
            };
            let has_asset = current
                .entries_with_prefix(&asset_prefix)
                .any(is_gross_asset);
            !has_asset
        })
        .collect();
    if orphans.is_empty() {
        return RuleOutcome::ok("Tous les amortissements ont une immobilisation");
    }
    RuleOutcome::anomaly(
        Severity::Majeur,
        format!(
            "{} amortissement(s) sans immobilisation correspondante",
            orphans.len()
        ),
    )
    .with_accounts(codes(orphans))
    .with_suggestion("Solder les amortissements orphelins ou passer l'ecriture de sortie d'immobilisation")
    .with_reference("Art. 45 Acte uniforme OHADA")
}

fn depreciation_without_allowance(current: &BalanceSnapshot) -> RuleOutcome {
    let allowances = current.absolute_balances_any(&["681", "682"]);
    let depreciation = current.absolute_balances("28");
    if allowances.is_zero() && !depreciation.is_zero() {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            "Amortissements au bilan sans dotation au resultat (681/682)",
        )
        .with_amount("amortissements_bilan", depreciation)
        .with_suggestion("Comptabiliser les dotations de l'exercice (debit 681x, credit 28x)")
        .with_reference("Art. 44 Acte uniforme OHADA, dotations aux amortissements");
    }
    RuleOutcome::ok(format!(
        "Dotations aux amortissements: {}",
        amount(allowances)
    ))
}

fn impairment_within_gross(current: &BalanceSnapshot) -> RuleOutcome {
    let contra = ["28", "29", "39", "49"];
    let mut breaches = Vec::new();
    for (impairment_prefix, gross_prefix, label) in
        [("29", "2", "immobilisations"), ("39", "3", "stocks"), ("49", "4", "tiers")]
    {
        let gross: Decimal = current
            .entries_with_prefix(gross_prefix)
            .filter(|entry| !contra.iter().any(|prefix| entry.has_prefix(prefix)))
            .map(|entry| entry.net().abs())
            .sum();
        let impairment = current.absolute_balances(impairment_prefix);
        if gross > Decimal::ZERO && impairment > gross + NOISE {
            breaches.push((impairment_prefix, label, impairment, gross));
        }
    }
    if breaches.is_empty() {
        return RuleOutcome::ok("Depreciations coherentes avec les valeurs brutes");
    }
    let description = breaches
        .iter()
        .map(|(_, label, impairment, gross)| {
            format!("{label}: depreciation {} > brut {}", amount(*impairment), amount(*gross))
        })
        .collect::<Vec<_>>()
        .join("; ");
    RuleOutcome::anomaly(Severity::Bloquant, "Depreciations depassant la valeur brute")
        .with_accounts(breaches.iter().map(|(prefix, ..)| *prefix))
        .with_description(description)
        .with_suggestion("Solder les depreciations des actifs sortis et verifier les taux appliques")
        .with_reference("Art. 46 Acte uniforme OHADA, depreciations")
}

fn provisions_without_allowance(current: &BalanceSnapshot) -> RuleOutcome {
    let allowances = current.absolute_balances_any(&["691", "697"]);
    let provisions = current.absolute_balances("19");
    if allowances.is_zero() && !provisions.is_zero() {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Provisions au bilan ({}) sans dotation (691/697)",
                amount(provisions)
            ),
        )
        .with_amount("provisions", provisions)
        .with_suggestion("Justifier chaque provision et passer les dotations ou reprises necessaires")
        .with_reference("Art. 48 Acte uniforme OHADA, provisions pour risques et charges");
    }
    RuleOutcome::ok("Dotations aux provisions coherentes")
}

fn high_provisions(current: &BalanceSnapshot) -> RuleOutcome {
    let provisions = current.absolute_balances("19");
    let total = current.balance_sheet_total();
    if total > Decimal::ZERO && provisions > total * dec!(0.10) {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!(
                "Provisions ({}) superieures a 10% du bilan ({})",
                amount(provisions),
                amount(total)
            ),
        )
        .with_amount("provisions", provisions)
        .with_amount("total_bilan", total)
        .with_amount("ratio", percent(provisions, total))
        .with_suggestion("Documenter chaque provision dans les notes annexes");
    }
    RuleOutcome::ok("Provisions dans les limites")
}

fn stock_variation(current: &BalanceSnapshot, prior: &BalanceSnapshot) -> RuleOutcome {
    let stocks = current.absolute_balances("3") - current.absolute_balances("39");
    let prior_stocks = prior.absolute_balances("3") - prior.absolute_balances("39");
    let balance_sheet_variation = stocks - prior_stocks;
    // 603 is debited when stock decreases, so it mirrors the balance-sheet variation.
    let booked_variation = current.net_balance("603");
    let gap = (balance_sheet_variation + booked_variation).abs();
    let allowed = (balance_sheet_variation.abs() * dec!(0.1)).max(dec!(10000));
    if gap > allowed {
        return RuleOutcome::anomaly(
            Severity::Majeur,
            format!(
                "Variation des stocks au bilan ({}) incoherente avec le compte 603 ({})",
                amount(balance_sheet_variation),
                amount(booked_variation)
            ),
        )
        .with_amount("variation_bilan", balance_sheet_variation)
        .with_amount("variation_603", booked_variation)
        .with_amount("ecart", gap)
        .with_suggestion("Recalculer la variation de stocks a partir de l'inventaire physique")
        .with_reference("Art. 43 Acte uniforme OHADA, evaluation des stocks");
    }
    RuleOutcome::ok("Variation des stocks coherente")
}

/// INFO anomaly when `base` carries amounts but `counterpart` is empty.
fn requires_counterpart<F>(
    current: &BalanceSnapshot,
    base: &str,
    counterpart: &str,
    message: F,
) -> Option<RuleOutcome>
where
    F: FnOnce(Decimal) -> String,
{
    let base_amount = current.absolute_balances(base);
    if base_amount > Decimal::ZERO && current.absolute_balances(counterpart).is_zero() {
        Some(
            RuleOutcome::anomaly(Severity::Info, message(base_amount))
                .with_amount(format!("solde_{base}"), base_amount),
        )
    } else {
        None
    }
}

fn purchases_without_payables(current: &BalanceSnapshot) -> RuleOutcome {
    let purchases = current.absolute_balances_any(&["601", "602"]);
    if purchases > Decimal::ZERO && current.absolute_balances("401").is_zero() {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!(
                "Achats de {} sans dettes fournisseurs (401x)",
                amount(purchases)
            ),
        )
        .with_amount("achats", purchases)
        .with_suggestion("Verifier la completude des dettes fournisseurs et les factures non parvenues");
    }
    RuleOutcome::ok("Achats et dettes fournisseurs coherents")
}

fn tax_against_profit(current: &BalanceSnapshot) -> RuleOutcome {
    let result = current.exercise_result();
    if result > Decimal::ZERO && current.absolute_balances("89").is_zero() {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Resultat beneficiaire ({}) sans impot sur le resultat (89x)",
                amount(result)
            ),
        )
        .with_amount("resultat", result)
        .with_suggestion("Calculer et comptabiliser l'impot sur les societes ou le minimum forfaitaire")
        .with_reference("CGI, impot sur les societes");
    }
    RuleOutcome::ok("Coherence resultat / impot")
}

fn output_vat(current: &BalanceSnapshot) -> RuleOutcome {
    let turnover = current.absolute_balances("70");
    let vat = current.absolute_balances("443");
    if turnover.is_zero() {
        return RuleOutcome::ok("Pas de chiffre d'affaires");
    }
    if vat.is_zero() {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Chiffre d'affaires de {} sans TVA collectee (443x)",
                amount(turnover)
            ),
        )
        .with_amount("chiffre_affaires", turnover)
        .with_suggestion("Verifier le regime de TVA; si assujetti, comptabiliser la TVA collectee")
        .with_reference("CGI, regime de TVA");
    }
    let ratio = percent(vat, turnover);
    if ratio > dec!(25) || ratio < dec!(10) {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!("Ratio TVA collectee / CA atypique: {ratio}%"),
        )
        .with_amount("chiffre_affaires", turnover)
        .with_amount("tva_collectee", vat)
        .with_amount("ratio", ratio)
        .with_suggestion("Verifier le taux applique et identifier les operations exonerees")
        .with_reference("CGI, taux de TVA");
    }
    RuleOutcome::ok("TVA collectee coherente avec le CA")
}

fn allowances_against_assets(current: &BalanceSnapshot) -> RuleOutcome {
    let allowances = current.absolute_balances_any(&["681", "682"]);
    let assets: Decimal = current
        .entries_with_prefix("2")
        .filter(|entry| is_gross_asset(entry))
        .map(|entry| entry.net().max(Decimal::ZERO))
        .sum();
    if assets > Decimal::ZERO && allowances.is_zero() {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!("Immobilisations ({}) sans dotations (681/682)", amount(assets)),
        )
        .with_amount("immobilisations", assets)
        .with_suggestion("Comptabiliser les dotations de l'exercice selon les plans d'amortissement")
        .with_reference("Art. 44-46 Acte uniforme OHADA, amortissements obligatoires");
    }
    if assets > Decimal::ZERO && allowances > assets * dec!(0.5) {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!(
                "Dotations ({}) > 50% des immobilisations ({})",
                amount(allowances),
                amount(assets)
            ),
        )
        .with_amount("immobilisations", assets)
        .with_amount("dotations", allowances)
        .with_amount("ratio", percent(allowances, assets))
        .with_suggestion("Verifier les durees et taux d'amortissement appliques")
        .with_reference("Art. 45 Acte uniforme OHADA, duree d'amortissement");
    }
    RuleOutcome::ok("Dotations et immobilisations coherentes")
}

fn input_vat(current: &BalanceSnapshot) -> RuleOutcome {
    let purchases = current.absolute_balances_any(&["60", "61", "62"]);
    if purchases > Decimal::ZERO && current.absolute_balances("445").is_zero() {
        return RuleOutcome::anomaly(
            Severity::Info,
            format!(
                "Achats et services ({}) sans TVA deductible (445x)",
                amount(purchases)
            ),
        )
        .with_amount("achats", purchases)
        .with_suggestion("Si l'entreprise est assujettie, comptabiliser la TVA deductible sur les achats eligibles");
    }
    RuleOutcome::ok("TVA deductible coherente")
}

/// `(part, whole, ratio)` when `part` exceeds `threshold` percent of `whole`.
fn share_above(
    current: &BalanceSnapshot,
    part: &str,
    whole: &str,
    threshold: Decimal,
) -> Option<(Decimal, Decimal, Decimal)> {
    let part_amount = current.absolute_balances(part);
    let whole_amount = current.absolute_balances(whole);
    if part_amount > Decimal::ZERO
        && whole_amount > Decimal::ZERO
        && part_amount > whole_amount * threshold / dec!(100)
    {
        Some((part_amount, whole_amount, percent(part_amount, whole_amount)))
    } else {
        None
    }
}

fn accrued_charges(current: &BalanceSnapshot) -> RuleOutcome {
    let accrued = current.absolute_balances_any(&["408", "428", "448"]);
    let turnover = current.absolute_balances("70");
    if turnover > dec!(1000000) && accrued.is_zero() {
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Aucune charge a payer malgre un chiffre d'affaires de {}",
                amount(turnover)
            ),
        )
        .with_amount("chiffre_affaires", turnover)
        .with_suggestion(
            "Passer les ecritures de cloture: factures non parvenues (408), charges sociales (428) et fiscales (448) a payer",
        )
        .with_reference("Art. 48 Acte uniforme OHADA, rattachement des charges");
    }
    RuleOutcome::ok(format!("Charges a payer: {}", amount(accrued)))
}

fn conversion_gaps(current: &BalanceSnapshot) -> RuleOutcome {
    let asset_gap = current.absolute_balances("478");
    let liability_gap = current.absolute_balances("479");
    if asset_gap > Decimal::ZERO && current.absolute_balances("194").is_zero() {
        let entry = EntryDraft::new()
            .debit("6916", "Dotation provision perte de change", asset_gap)
            .credit("194", "Provision pour perte de change", asset_gap)
            .comment("Provision perte de change sur ecarts de conversion actif")
            .finish();
        return RuleOutcome::anomaly(
            Severity::Mineur,
            format!(
                "Ecart de conversion actif ({}) sans provision (194x)",
                amount(asset_gap)
            ),
        )
        .with_accounts(codes(current.entries_with_prefix("478")))
        .with_amount("ecart_actif", asset_gap)
        .with_amount("ecart_passif", liability_gap)
        .with_suggestion("Provisionner la perte latente de change a hauteur de l'ecart de conversion actif")
        .with_entry(entry)
        .with_reference("Art. 54 Acte uniforme OHADA, ecarts de conversion");
    }
    RuleOutcome::ok(format!(
        "Ecarts de conversion: actif {}, passif {}",
        amount(asset_gap),
        amount(liability_gap)
    ))
}

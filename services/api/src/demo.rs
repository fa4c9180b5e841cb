use crate::infra::{load_snapshot, parse_format, parse_level, parse_phase};
use balance_audit::config::AppConfig;
use balance_audit::error::AppError;
use balance_audit::workflows::audit::{
    compare_sessions, export, AuditObserver, AuditPhase, AuditService, BalanceEntry,
    BalanceSnapshot, ChangeKind, ControlResult, EntrySide, InMemorySessionStore,
    JournalEntrySuggestion, Level, Presentation, ReportFormat, RuleCatalog, RunOptions,
    SessionStatus,
};
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AuditRunArgs {
    /// Trial balance of the audited exercise (JSON)
    #[arg(long)]
    pub(crate) current: PathBuf,
    /// Trial balance of the previous exercise (JSON)
    #[arg(long)]
    pub(crate) prior: Option<PathBuf>,
    /// Report format: json, csv or html
    #[arg(long, default_value = "json", value_parser = parse_format)]
    pub(crate) format: ReportFormat,
    /// Write the report to this file instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Audit phase: initial or reaudit
    #[arg(long, default_value = "initial", value_parser = parse_phase)]
    pub(crate) phase: AuditPhase,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RulesArgs {
    /// Restrict the listing to one level (0-8)
    #[arg(long, value_parser = parse_level)]
    pub(crate) level: Option<u8>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Also print the HTML report of the re-audit
    #[arg(long)]
    pub(crate) html: bool,
}

fn catalog_from_env() -> Result<Arc<RuleCatalog>, AppError> {
    let config = AppConfig::load()?;
    Ok(Arc::new(RuleCatalog::standard(
        &config.audit.catalog_settings(),
    )))
}

pub(crate) fn run_audit(args: AuditRunArgs) -> Result<(), AppError> {
    let AuditRunArgs {
        current,
        prior,
        format,
        output,
        phase,
    } = args;

    let current = load_snapshot(&current)?;
    let prior = prior.as_deref().map(load_snapshot).transpose()?;

    let service = AuditService::new(catalog_from_env()?, Arc::new(InMemorySessionStore::new()));
    let options = RunOptions::default().with_phase(phase);
    let run = service.run_audit(&current, prior.as_ref(), &options);
    let session = run.session;

    let report = export(&session, &session.results, format, service.presentation())?;
    match output {
        Some(path) => {
            std::fs::write(&path, &report)?;
            println!(
                "Audit {} of exercise {}: {} ({} controls, score {}/100, {} blocking) -> {}",
                session.id,
                session.exercise,
                session.status.code(),
                session.summary.total_controls,
                session.summary.global_score,
                session.summary.blocking_remaining,
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&report)?;
            stdout.flush()?;
        }
    }

    if let Some(fault) = &session.input_fault {
        eprintln!("Trial balance rejected: {fault}");
    }
    Ok(())
}

pub(crate) fn run_rules(args: RulesArgs) -> Result<(), AppError> {
    let catalog = catalog_from_env()?;
    let presentation = Presentation::default();
    let level = args.level.and_then(Level::new);

    let mut current_level = None;
    for rule in catalog.list_rules(level) {
        if current_level != Some(rule.level()) && level.is_some() {
            println!("Niveau {} - {}", rule.level(), presentation.level_name(rule.level()));
            current_level = Some(rule.level());
        }
        println!(
            "  {:<8} [{}] {:<9} {}",
            rule.reference(),
            rule.level(),
            rule.nominal_severity().code(),
            rule.name()
        );
    }
    println!("{} controls", catalog.list_rules(level).len());
    Ok(())
}

/// Prints one line per finished level.
struct ConsoleObserver<'a> {
    presentation: &'a Presentation,
}

impl AuditObserver for ConsoleObserver<'_> {
    fn on_level_end(&self, level: Level, results: &[ControlResult]) {
        let anomalies = results
            .iter()
            .filter(|result| result.outcome.is_anomaly())
            .count();
        println!(
            "  niveau {} {:<28} {:>3} controles, {:>2} anomalies",
            level,
            self.presentation.level_name(level),
            results.len(),
            anomalies
        );
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let catalog = catalog_from_env()?;
    let service = AuditService::new(catalog, Arc::new(InMemorySessionStore::new()));
    let presentation = Presentation::default();
    let observer = ConsoleObserver {
        presentation: &presentation,
    };

    let prior = demo_prior_exercise();
    let current = demo_current_exercise();

    println!("Balance audit demo: exercise {} against {}", current.exercise(), prior.exercise());
    let options = RunOptions::default().with_observer(&observer);
    let initial = service.run_audit(&current, Some(&prior), &options).session;
    print_session_summary("Initial audit", initial.status, &initial.summary.count_by_severity, initial.summary.global_score);

    let entries: Vec<&JournalEntrySuggestion> = initial
        .results
        .iter()
        .flat_map(|result| result.outcome.corrective_entries.iter())
        .collect();
    println!("\nProposed corrective entries: {}", entries.len());
    for entry in &entries {
        for line in &entry.lines {
            let side = match line.side {
                EntrySide::Debit => "D",
                EntrySide::Credit => "C",
            };
            println!("  {side} {:<8} {:>16}  {}", line.account_code, line.amount, line.label);
        }
        if let Some(comment) = &entry.comment {
            println!("    ({comment})");
        }
    }

    let corrected = entries
        .iter()
        .fold(current.clone(), |snapshot, entry| post_entry(&snapshot, entry));

    println!("\nRe-audit after posting the proposed entries");
    let options = RunOptions::default()
        .with_phase(AuditPhase::Reaudit)
        .with_observer(&observer);
    let reaudit = service.run_audit(&corrected, Some(&prior), &options).session;
    print_session_summary("Re-audit", reaudit.status, &reaudit.summary.count_by_severity, reaudit.summary.global_score);

    let comparison = compare_sessions(&initial, &reaudit, Some(&current), Some(&corrected));
    println!(
        "\nCorrections: {} corrected, {} improved, {} degraded; blocking {} -> {}, score {} -> {}",
        comparison.synthesis.corrected,
        comparison.synthesis.improved,
        comparison.synthesis.degraded,
        comparison.synthesis.blocking_before,
        comparison.synthesis.blocking_after,
        comparison.synthesis.score_before,
        comparison.synthesis.score_after
    );
    for change in comparison.changes_of(ChangeKind::Corrige) {
        println!("  corrige {:<8} {}", change.reference, change.name);
    }
    for change in comparison.changes_of(ChangeKind::Degrade) {
        println!("  degrade {:<8} {}", change.reference, change.message_after);
    }
    for account in &comparison.modified_accounts {
        println!(
            "  compte {:<8} {:>16} -> {:>16}",
            account.account_code, account.net_before, account.net_after
        );
    }

    if args.html {
        let html = export(&reaudit, &reaudit.results, ReportFormat::Html, &presentation)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&html)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_session_summary(
    title: &str,
    status: SessionStatus,
    counts: &BTreeMap<balance_audit::workflows::audit::Severity, usize>,
    score: u8,
) {
    let tallies = counts
        .iter()
        .rev()
        .map(|(severity, count)| format!("{} {count}", severity.code()))
        .collect::<Vec<_>>()
        .join(", ");
    println!("{title}: {} | score {score}/100 | {tallies}", status.code());
}

/// Posts `entry` on the closing balances of `snapshot`.
fn post_entry(snapshot: &BalanceSnapshot, entry: &JournalEntrySuggestion) -> BalanceSnapshot {
    let mut entries = snapshot.entries().to_vec();
    for line in &entry.lines {
        let delta = match line.side {
            EntrySide::Debit => line.amount,
            EntrySide::Credit => -line.amount,
        };
        let position = match entries
            .iter()
            .position(|existing| existing.account_code == line.account_code)
        {
            Some(position) => position,
            None => {
                entries.push(BalanceEntry::closing(
                    line.account_code.clone(),
                    line.label.clone(),
                    Decimal::ZERO,
                    Decimal::ZERO,
                ));
                entries.len() - 1
            }
        };
        let account = &mut entries[position];
        let net = account.net() + delta;
        account.closing_debit = net.max(Decimal::ZERO);
        account.closing_credit = (-net).max(Decimal::ZERO);
        if delta > Decimal::ZERO {
            account.movement_debit += delta;
        } else {
            account.movement_credit -= delta;
        }
    }
    BalanceSnapshot::new(snapshot.exercise(), entries)
}

fn line(code: &str, label: &str, debit: Decimal, credit: Decimal) -> BalanceEntry {
    BalanceEntry::closing(code, label, debit, credit)
}

/// Post-closing balance of 2023: result allocated to 131, income statement closed.
fn demo_prior_exercise() -> BalanceSnapshot {
    BalanceSnapshot::new(
        "2023",
        vec![
            line("1011", "Capital souscrit appele verse", Decimal::ZERO, dec!(10000000)),
            line("1311", "Resultat net benefice", Decimal::ZERO, dec!(500000)),
            line("2441", "Materiel de bureau", dec!(6000000), Decimal::ZERO),
            line("4011", "Fournisseurs", Decimal::ZERO, dec!(1500000)),
            line("4111", "Clients", dec!(3000000), Decimal::ZERO),
            line("5211", "Banque", dec!(3000000), Decimal::ZERO),
        ],
    )
}

/// Pre-closing balance of 2024 with a client account in credit.
fn demo_current_exercise() -> BalanceSnapshot {
    BalanceSnapshot::new(
        "2024",
        vec![
            line("1011", "Capital souscrit appele verse", Decimal::ZERO, dec!(10000000)),
            line("1211", "Report a nouveau crediteur", Decimal::ZERO, dec!(500000)),
            line("2441", "Materiel de bureau", dec!(6000000), Decimal::ZERO),
            line("28441", "Amortissement materiel de bureau", Decimal::ZERO, dec!(1200000)),
            line("4011", "Fournisseurs", Decimal::ZERO, dec!(2300000)),
            line("4111", "Clients", dec!(4500000), Decimal::ZERO),
            line("4112", "Clients groupe", Decimal::ZERO, dec!(300000)),
            line("4431", "TVA facturee sur ventes", Decimal::ZERO, dec!(900000)),
            line("5211", "Banque", dec!(7300000), Decimal::ZERO),
            line("5711", "Caisse", dec!(200000), Decimal::ZERO),
            line("6011", "Achats de marchandises", dec!(8000000), Decimal::ZERO),
            line("6611", "Appointements salaires", dec!(3000000), Decimal::ZERO),
            line("6813", "Dotations aux amortissements", dec!(1200000), Decimal::ZERO),
            line("7011", "Ventes de marchandises", Decimal::ZERO, dec!(15000000)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_balances_are_balanced() {
        for snapshot in [demo_prior_exercise(), demo_current_exercise()] {
            assert_eq!(
                snapshot.total_closing_debit(),
                snapshot.total_closing_credit(),
                "exercise {}",
                snapshot.exercise()
            );
            assert!(snapshot.validate().is_ok());
        }
    }

    #[test]
    fn posting_an_entry_moves_both_accounts() {
        let entry = JournalEntrySuggestion {
            lines: vec![
                balance_audit::workflows::audit::domain::EntryLine {
                    side: EntrySide::Debit,
                    account_code: "4112".to_string(),
                    label: "Clients groupe".to_string(),
                    amount: dec!(300000),
                },
                balance_audit::workflows::audit::domain::EntryLine {
                    side: EntrySide::Credit,
                    account_code: "4191".to_string(),
                    label: "Clients avances recues".to_string(),
                    amount: dec!(300000),
                },
            ],
            comment: None,
        };

        let corrected = post_entry(&demo_current_exercise(), &entry);

        assert!(corrected.entry("4112").expect("kept").is_zero());
        assert_eq!(corrected.entry("4191").expect("created").net(), dec!(-300000));
        assert_eq!(corrected.total_closing_debit(), corrected.total_closing_credit());
    }
}

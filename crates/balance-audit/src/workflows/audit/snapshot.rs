use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One account line of a trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub account_code: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub opening_debit: Decimal,
    #[serde(default)]
    pub opening_credit: Decimal,
    #[serde(default)]
    pub movement_debit: Decimal,
    #[serde(default)]
    pub movement_credit: Decimal,
    #[serde(default)]
    pub closing_debit: Decimal,
    #[serde(default)]
    pub closing_credit: Decimal,
}

impl BalanceEntry {
    /// Closing-only entry, the usual shape of a post-closing trial balance.
    pub fn closing(
        account_code: impl Into<String>,
        label: impl Into<String>,
        closing_debit: Decimal,
        closing_credit: Decimal,
    ) -> Self {
        Self {
            account_code: account_code.into(),
            label: label.into(),
            opening_debit: Decimal::ZERO,
            opening_credit: Decimal::ZERO,
            movement_debit: closing_debit,
            movement_credit: closing_credit,
            closing_debit,
            closing_credit,
        }
    }

    pub fn with_opening(mut self, opening_debit: Decimal, opening_credit: Decimal) -> Self {
        self.opening_debit = opening_debit;
        self.opening_credit = opening_credit;
        let movement = self.net() - (opening_debit - opening_credit);
        self.movement_debit = movement.max(Decimal::ZERO);
        self.movement_credit = (-movement).max(Decimal::ZERO);
        self
    }

    /// Closing net balance, positive when the account is in debit.
    pub fn net(&self) -> Decimal {
        self.closing_debit - self.closing_credit
    }

    pub fn opening_net(&self) -> Decimal {
        self.opening_debit - self.opening_credit
    }

    /// Gap in `closing = opening + movements`; zero for a consistent line.
    pub fn identity_gap(&self) -> Decimal {
        self.net() - (self.opening_net() + self.movement_debit - self.movement_credit)
    }

    /// First character of the code as a SYSCOHADA class digit.
    pub fn class(&self) -> Option<u8> {
        self.account_code
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .map(|digit| digit as u8)
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.account_code.starts_with(prefix)
    }

    pub fn in_classes(&self, classes: std::ops::RangeInclusive<u8>) -> bool {
        self.class().is_some_and(|class| classes.contains(&class))
    }

    pub fn is_zero(&self) -> bool {
        self.closing_debit.is_zero() && self.closing_credit.is_zero()
    }
}

/// Structural precondition failures detected before any rule runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("exercise {exercise}: duplicate account codes {codes:?}")]
    DuplicateAccounts {
        exercise: String,
        codes: Vec<String>,
    },
    #[error("exercise {exercise}: {count} line(s) without an account code")]
    BlankAccountCode { exercise: String, count: usize },
}

/// Immutable trial balance for one exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SnapshotRecord", into = "SnapshotRecord")]
pub struct BalanceSnapshot {
    exercise: String,
    entries: Vec<BalanceEntry>,
    index: HashMap<String, usize>,
    duplicates: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    exercise: String,
    entries: Vec<BalanceEntry>,
}

impl From<SnapshotRecord> for BalanceSnapshot {
    fn from(record: SnapshotRecord) -> Self {
        BalanceSnapshot::new(record.exercise, record.entries)
    }
}

impl From<BalanceSnapshot> for SnapshotRecord {
    fn from(snapshot: BalanceSnapshot) -> Self {
        SnapshotRecord {
            exercise: snapshot.exercise,
            entries: snapshot.entries,
        }
    }
}

impl PartialEq for BalanceSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.exercise == other.exercise && self.entries == other.entries
    }
}

impl BalanceSnapshot {
    /// Keeps entries in supplied order. Codes are trimmed; duplicates are kept
    /// aside for [`BalanceSnapshot::validate`] and the first occurrence wins lookups.
    pub fn new(exercise: impl Into<String>, entries: Vec<BalanceEntry>) -> Self {
        let entries: Vec<BalanceEntry> = entries
            .into_iter()
            .map(|mut entry| {
                let trimmed = entry.account_code.trim();
                if trimmed.len() != entry.account_code.len() {
                    entry.account_code = trimmed.to_string();
                }
                entry
            })
            .collect();

        let mut index = HashMap::with_capacity(entries.len());
        let mut duplicates = BTreeSet::new();
        for (position, entry) in entries.iter().enumerate() {
            if entry.account_code.is_empty() {
                continue;
            }
            if index.contains_key(&entry.account_code) {
                duplicates.insert(entry.account_code.clone());
            } else {
                index.insert(entry.account_code.clone(), position);
            }
        }

        Self {
            exercise: exercise.into(),
            entries,
            index,
            duplicates,
        }
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !self.duplicates.is_empty() {
            return Err(SnapshotError::DuplicateAccounts {
                exercise: self.exercise.clone(),
                codes: self.duplicates.iter().cloned().collect(),
            });
        }
        let blank = self
            .entries
            .iter()
            .filter(|entry| entry.account_code.is_empty())
            .count();
        if blank > 0 {
            return Err(SnapshotError::BlankAccountCode {
                exercise: self.exercise.clone(),
                count: blank,
            });
        }
        Ok(())
    }

    pub fn exercise(&self) -> &str {
        &self.exercise
    }

    pub fn entries(&self) -> &[BalanceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, account_code: &str) -> Option<&BalanceEntry> {
        self.index
            .get(account_code)
            .and_then(|position| self.entries.get(*position))
    }

    pub fn contains(&self, account_code: &str) -> bool {
        self.index.contains_key(account_code)
    }

    pub fn entries_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a BalanceEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.has_prefix(prefix))
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.entries_with_prefix(prefix).next().is_some()
    }

    /// Whether any account under `prefix` carries a non-zero closing balance.
    pub fn has_balance(&self, prefix: &str) -> bool {
        self.entries_with_prefix(prefix)
            .any(|entry| !entry.net().is_zero())
    }

    /// Sum of net balances (debit positive) under `prefix`.
    pub fn net_balance(&self, prefix: &str) -> Decimal {
        self.entries_with_prefix(prefix).map(BalanceEntry::net).sum()
    }

    /// Sum of opening net balances (debit positive) under `prefix`.
    pub fn opening_net_balance(&self, prefix: &str) -> Decimal {
        self.entries_with_prefix(prefix)
            .map(BalanceEntry::opening_net)
            .sum()
    }

    /// Whether the export carried opening balances at all.
    pub fn has_opening_balances(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| !entry.opening_debit.is_zero() || !entry.opening_credit.is_zero())
    }

    /// Sum of net balances seen from the credit side.
    pub fn credit_net(&self, prefix: &str) -> Decimal {
        -self.net_balance(prefix)
    }

    /// Sum of debit-side net balances only.
    pub fn debit_balances(&self, prefix: &str) -> Decimal {
        self.entries_with_prefix(prefix)
            .map(|entry| entry.net().max(Decimal::ZERO))
            .sum()
    }

    /// Sum of credit-side net balances only, as a positive amount.
    pub fn credit_balances(&self, prefix: &str) -> Decimal {
        self.entries_with_prefix(prefix)
            .map(|entry| (-entry.net()).max(Decimal::ZERO))
            .sum()
    }

    pub fn absolute_balances(&self, prefix: &str) -> Decimal {
        self.entries_with_prefix(prefix)
            .map(|entry| entry.net().abs())
            .sum()
    }

    pub fn absolute_balances_any(&self, prefixes: &[&str]) -> Decimal {
        prefixes
            .iter()
            .map(|prefix| self.absolute_balances(prefix))
            .sum()
    }

    pub fn total_closing_debit(&self) -> Decimal {
        self.entries.iter().map(|entry| entry.closing_debit).sum()
    }

    pub fn total_closing_credit(&self) -> Decimal {
        self.entries.iter().map(|entry| entry.closing_credit).sum()
    }

    /// Net balance of all accounts belonging to the given classes.
    pub fn class_net(&self, classes: std::ops::RangeInclusive<u8>) -> Decimal {
        self.entries
            .iter()
            .filter(|entry| entry.in_classes(classes.clone()))
            .map(BalanceEntry::net)
            .sum()
    }

    /// Result read from the income statement accounts (classes 6 to 8), profit positive.
    pub fn income_statement_result(&self) -> Decimal {
        -self.class_net(6..=8)
    }

    /// Result booked on the 13x accounts, profit positive.
    pub fn booked_result(&self) -> Decimal {
        self.credit_net("13")
    }

    /// Whether any class 6 to 8 account still carries a balance, i.e. the
    /// result has not been closed into 13x yet.
    pub fn has_open_income_statement(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.in_classes(6..=8) && !entry.net().is_zero())
    }

    /// Result of the exercise: read from the income statement while it is open,
    /// otherwise from the 13x accounts.
    pub fn exercise_result(&self) -> Decimal {
        if self.has_open_income_statement() {
            self.income_statement_result()
        } else {
            self.booked_result()
        }
    }

    /// Part of the result not yet reflected in classes 1 to 5.
    pub fn pending_result(&self) -> Decimal {
        if self.has_open_income_statement() && !self.has_balance("13") {
            self.income_statement_result()
        } else {
            Decimal::ZERO
        }
    }

    /// Balance-sheet total seen from the asset side (debit balances of classes 1 to 5).
    pub fn balance_sheet_total(&self) -> Decimal {
        self.entries
            .iter()
            .filter(|entry| entry.in_classes(1..=5))
            .map(|entry| entry.net().max(Decimal::ZERO))
            .sum()
    }

    pub fn account_codes(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .map(|entry| entry.account_code.as_str())
            .collect()
    }
}

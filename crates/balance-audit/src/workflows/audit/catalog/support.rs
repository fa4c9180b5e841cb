//! Small helpers shared by the level modules.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::workflows::audit::domain::RuleOutcome;
use crate::workflows::audit::snapshot::{BalanceEntry, BalanceSnapshot};

/// How many account codes a result lists before truncating.
pub(crate) const SAMPLE: usize = 10;

/// Amount rendered with two decimals and a space as thousands separator.
pub(crate) fn amount(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3 + 4);
    for (position, digit) in integer.chars().enumerate() {
        if position > 0 && (integer.len() - position) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }

    format!("{}{grouped}.{fraction}", if negative { "-" } else { "" })
}

/// `part / whole * 100`, zero when `whole` is zero.
pub(crate) fn percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        (part / whole * dec!(100)).round_dp(1)
    }
}

/// OK outcome used by comparative rules when no prior exercise was supplied.
pub(crate) fn not_applicable(subject: &str) -> RuleOutcome {
    RuleOutcome::ok(format!(
        "Balance N-1 absente, controle non applicable ({subject})"
    ))
}

/// Runs `check` against the prior exercise or reports the rule as not applicable.
pub(crate) fn with_prior<F>(
    prior: Option<&BalanceSnapshot>,
    subject: &str,
    check: F,
) -> RuleOutcome
where
    F: FnOnce(&BalanceSnapshot) -> RuleOutcome,
{
    match prior {
        Some(prior) => check(prior),
        None => not_applicable(subject),
    }
}

/// First [`SAMPLE`] account codes of the given entries.
pub(crate) fn codes<'a, I>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a BalanceEntry>,
{
    entries
        .into_iter()
        .take(SAMPLE)
        .map(|entry| entry.account_code.clone())
        .collect()
}

/// Entries under any of `prefixes`, in snapshot order.
pub(crate) fn entries_with_any<'a>(
    snapshot: &'a BalanceSnapshot,
    prefixes: &'a [&'a str],
) -> impl Iterator<Item = &'a BalanceEntry> + 'a {
    snapshot
        .entries()
        .iter()
        .filter(move |entry| prefixes.iter().any(|prefix| entry.has_prefix(prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_groups_thousands_and_keeps_sign() {
        assert_eq!(amount(dec!(1234567.891)), "1 234 567.89");
        assert_eq!(amount(dec!(-1500)), "-1 500.00");
        assert_eq!(amount(dec!(999)), "999.00");
        assert_eq!(amount(dec!(0)), "0.00");
    }

    #[test]
    fn percent_of_zero_whole_is_zero() {
        assert_eq!(percent(dec!(10), dec!(0)), dec!(0));
        assert_eq!(percent(dec!(25), dec!(200)), dec!(12.5));
    }
}

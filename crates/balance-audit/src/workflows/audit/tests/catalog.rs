use std::collections::BTreeSet;

use super::common::*;
use crate::workflows::audit::catalog::{CatalogError, RuleCatalog};
use crate::workflows::audit::domain::{Level, Severity};

#[test]
fn standard_catalog_has_unique_references_on_every_level() {
    let catalog = standard_catalog();

    let references: BTreeSet<&str> = catalog
        .list_rules(None)
        .into_iter()
        .map(|rule| rule.reference())
        .collect();
    assert_eq!(references.len(), catalog.len());

    for level in Level::ordered() {
        let rules = catalog.level_rules(level);
        assert!(!rules.is_empty(), "level {level} has no rules");
        assert!(rules.iter().all(|rule| rule.level() == level));
    }
}

#[test]
fn duplicate_references_are_rejected() {
    let rules = vec![
        ok_rule("D-001", Level::STRUCTURAL),
        ok_rule("D-001", Level::FISCAL),
    ];

    let error = RuleCatalog::new(rules).expect_err("duplicate must fail");
    assert_eq!(error, CatalogError::DuplicateReference("D-001".to_string()));
}

#[test]
fn rules_are_grouped_by_level_then_reference() {
    let catalog = catalog_of(vec![
        ok_rule("B-2", Level::FISCAL),
        ok_rule("A-9", Level::STRUCTURAL),
        ok_rule("B-1", Level::FISCAL),
        ok_rule("A-1", Level::STRUCTURAL),
    ]);

    let fiscal: Vec<&str> = catalog
        .level_rules(Level::FISCAL)
        .iter()
        .map(|rule| rule.reference())
        .collect();
    assert_eq!(fiscal, vec!["B-1", "B-2"]);
    assert!(catalog.level_rules(Level::STATEMENTS).is_empty());

    let all: Vec<&str> = catalog
        .list_rules(None)
        .into_iter()
        .map(|rule| rule.reference())
        .collect();
    assert_eq!(all, vec!["A-1", "A-9", "B-1", "B-2"]);
}

#[test]
fn descriptors_expose_nominal_severity() {
    let catalog = standard_catalog();

    let descriptors = catalog.descriptors(Some(Level::FUNDAMENTAL));
    let equilibrium = descriptors
        .iter()
        .find(|descriptor| descriptor.reference == "F-001")
        .expect("F-001 listed");
    assert_eq!(equilibrium.level, Level::FUNDAMENTAL);
    assert_eq!(equilibrium.nominal_severity, Severity::Bloquant);
    assert!(descriptors.iter().all(|descriptor| descriptor.level == Level::FUNDAMENTAL));

    assert!(catalog.get("F-001").is_some());
    assert!(catalog.get("Z-999").is_none());
}

//! Condensed SYSCOHADA revised chart: the roots the conformity and direction
//! controls need, with the side each root normally sits on.

use self::NormalSide::{Credit, Debit, Either};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NormalSide {
    Debit,
    Credit,
    Either,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ChartAccount {
    pub root: &'static str,
    pub label: &'static str,
    pub side: NormalSide,
}

const fn account(root: &'static str, label: &'static str, side: NormalSide) -> ChartAccount {
    ChartAccount { root, label, side }
}

const CHART: &[ChartAccount] = &[
    account("10", "Capital", Credit),
    account("109", "Actionnaires, capital souscrit non appele", Debit),
    account("11", "Reserves", Credit),
    account("12", "Report a nouveau", Either),
    account("13", "Resultat net de l'exercice", Either),
    account("14", "Subventions d'investissement", Credit),
    account("15", "Provisions reglementees", Credit),
    account("16", "Emprunts et dettes assimilees", Credit),
    account("17", "Dettes de location-acquisition", Credit),
    account("18", "Dettes liees a des participations", Credit),
    account("19", "Provisions pour risques et charges", Credit),
    account("21", "Immobilisations incorporelles", Debit),
    account("22", "Terrains", Debit),
    account("23", "Batiments, installations et agencements", Debit),
    account("24", "Materiel, mobilier et actifs biologiques", Debit),
    account("25", "Avances et acomptes verses sur immobilisations", Debit),
    account("26", "Titres de participation", Debit),
    account("27", "Autres immobilisations financieres", Debit),
    account("28", "Amortissements", Credit),
    account("29", "Depreciations des immobilisations", Credit),
    account("31", "Marchandises", Debit),
    account("32", "Matieres premieres", Debit),
    account("33", "Autres approvisionnements", Debit),
    account("34", "Produits en cours", Debit),
    account("35", "Services en cours", Debit),
    account("36", "Produits finis", Debit),
    account("37", "Produits intermediaires", Debit),
    account("38", "Stocks en cours de route", Debit),
    account("39", "Depreciations des stocks", Credit),
    account("40", "Fournisseurs et comptes rattaches", Credit),
    account("409", "Fournisseurs debiteurs", Debit),
    account("41", "Clients et comptes rattaches", Debit),
    account("419", "Clients crediteurs", Credit),
    account("42", "Personnel", Credit),
    account("43", "Organismes sociaux", Credit),
    account("44", "Etat et collectivites publiques", Either),
    account("45", "Organismes internationaux", Either),
    account("46", "Associes et groupe", Either),
    account("47", "Debiteurs et crediteurs divers", Either),
    account("48", "Creances et dettes hors activites ordinaires", Either),
    account("49", "Depreciations des comptes de tiers", Credit),
    account("50", "Titres de placement", Debit),
    account("51", "Valeurs a encaisser", Debit),
    account("52", "Banques", Debit),
    account("53", "Etablissements financiers", Debit),
    account("54", "Instruments de tresorerie", Either),
    account("55", "Instruments de monnaie electronique", Debit),
    account("56", "Banques, credits de tresorerie et d'escompte", Credit),
    account("57", "Caisse", Debit),
    account("58", "Regies d'avances et virements internes", Debit),
    account("59", "Depreciations des comptes de tresorerie", Credit),
    account("60", "Achats et variations de stocks", Debit),
    account("603", "Variations des stocks", Either),
    account("61", "Transports", Debit),
    account("62", "Services exterieurs A", Debit),
    account("63", "Services exterieurs B", Debit),
    account("64", "Impots et taxes", Debit),
    account("65", "Autres charges", Debit),
    account("66", "Charges de personnel", Debit),
    account("67", "Frais financiers et charges assimilees", Debit),
    account("68", "Dotations aux amortissements", Debit),
    account("69", "Dotations aux provisions", Debit),
    account("70", "Ventes", Credit),
    account("71", "Subventions d'exploitation", Credit),
    account("72", "Production immobilisee", Credit),
    account("73", "Variations des stocks de biens et services produits", Either),
    account("75", "Autres produits", Credit),
    account("77", "Revenus financiers", Credit),
    account("78", "Transferts de charges", Credit),
    account("79", "Reprises de provisions", Credit),
    account("81", "Valeurs comptables des cessions d'immobilisations", Debit),
    account("82", "Produits des cessions d'immobilisations", Credit),
    account("83", "Charges hors activites ordinaires", Debit),
    account("84", "Produits hors activites ordinaires", Credit),
    account("85", "Dotations hors activites ordinaires", Debit),
    account("86", "Reprises hors activites ordinaires", Credit),
    account("87", "Participation des travailleurs", Debit),
    account("88", "Subventions d'equilibre", Credit),
    account("89", "Impots sur le resultat", Debit),
];

/// Longest chart root that prefixes `code`, looking at most four digits deep.
pub(crate) fn lookup(code: &str) -> Option<&'static ChartAccount> {
    let depth = code.len().min(4);
    (2..=depth).rev().find_map(|len| {
        let prefix = code.get(..len)?;
        CHART.iter().find(|account| account.root == prefix)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_prefers_the_most_specific_root() {
        assert_eq!(lookup("409100").map(|a| a.root), Some("409"));
        assert_eq!(lookup("401100").map(|a| a.root), Some("40"));
        assert_eq!(lookup("603200").map(|a| a.side), Some(NormalSide::Either));
    }

    #[test]
    fn lookup_rejects_unknown_roots() {
        assert!(lookup("7400").is_none());
        assert!(lookup("0123").is_none());
        assert!(lookup("9").is_none());
    }
}

use super::views::SessionReportView;
use super::ExportError;

const HEADER: [&str; 9] = [
    "Ref",
    "Nom",
    "Niveau",
    "Statut",
    "Severite",
    "Message",
    "Suggestion",
    "Comptes",
    "Reference",
];

/// Semicolon-separated export: a `key;value` metadata block, then one row per result.
pub(super) fn render(view: &SessionReportView) -> Result<Vec<u8>, ExportError> {
    let mut writer = ::csv::WriterBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_writer(Vec::new());

    let header = &view.session;
    let mut metadata = vec![
        ("Session".to_string(), header.session_id.to_string()),
        ("Exercice".to_string(), header.exercise.clone()),
        ("Phase".to_string(), header.phase.code().to_string()),
        (
            "Statut session".to_string(),
            format!("{} ({})", header.status.code(), header.status_label),
        ),
        ("Debut".to_string(), header.started_at.to_rfc3339()),
        (
            "Fin".to_string(),
            header
                .finished_at
                .map(|finished| finished.to_rfc3339())
                .unwrap_or_default(),
        ),
        ("Score global".to_string(), header.global_score.to_string()),
        ("Controles".to_string(), header.total_controls.to_string()),
        (
            "Bloquants restants".to_string(),
            header.blocking_remaining.to_string(),
        ),
    ];
    if let Some(fault) = &header.input_fault {
        metadata.push(("Defaut d'entree".to_string(), fault.clone()));
    }
    metadata.extend(
        view.severities
            .iter()
            .map(|count| (count.label.clone(), count.count.to_string())),
    );
    for (key, value) in &metadata {
        writer.write_record([key.as_str(), value.as_str()])?;
    }

    writer.write_record(HEADER)?;
    for section in &view.levels {
        for result in &section.results {
            writer.write_record([
                result.reference.as_str(),
                result.name.as_str(),
                &section.level.to_string(),
                result.status.code(),
                result.severity_label.as_str(),
                result.message.as_str(),
                result.suggestion.as_deref().unwrap_or_default(),
                &result.accounts.join(", "),
                result.regulatory_reference.as_deref().unwrap_or_default(),
            ])?;
        }
    }

    writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))
}

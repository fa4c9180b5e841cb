use std::fmt::Write;

use super::views::SessionReportView;
use super::ExportError;

pub(super) fn render(view: &SessionReportView) -> Result<Vec<u8>, ExportError> {
    let header = &view.session;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"fr\">\n<head><meta charset=\"utf-8\">");
    writeln!(
        html,
        "<title>Audit de balance {}</title></head>\n<body>",
        escape_html(&header.exercise)
    )?;
    writeln!(
        html,
        "<h1>Audit de balance, exercice {}</h1>",
        escape_html(&header.exercise)
    )?;
    writeln!(
        html,
        "<p class=\"status status-{}\">Statut: {} ({})</p>",
        header.status.code().to_ascii_lowercase(),
        escape_html(&header.status_label),
        header.status.code()
    )?;
    if let Some(fault) = &header.input_fault {
        writeln!(
            html,
            "<p class=\"input-fault\">Balance rejetee: {}</p>",
            escape_html(fault)
        )?;
    }

    html.push_str("<table class=\"summary\">\n");
    let mut summary_rows = vec![
        ("Session".to_string(), header.session_id.to_string()),
        ("Phase".to_string(), header.phase.code().to_string()),
        ("Debut".to_string(), header.started_at.to_rfc3339()),
    ];
    if let Some(finished) = header.finished_at {
        summary_rows.push(("Fin".to_string(), finished.to_rfc3339()));
    }
    summary_rows.push(("Score global".to_string(), format!("{} / 100", header.global_score)));
    summary_rows.push(("Controles".to_string(), header.total_controls.to_string()));
    summary_rows.push((
        "Bloquants restants".to_string(),
        header.blocking_remaining.to_string(),
    ));
    summary_rows.extend(
        view.severities
            .iter()
            .map(|count| (count.label.clone(), count.count.to_string())),
    );
    for (label, value) in &summary_rows {
        writeln!(
            html,
            "<tr><th>{}</th><td>{}</td></tr>",
            escape_html(label),
            escape_html(value)
        )?;
    }
    html.push_str("</table>\n");

    for section in &view.levels {
        writeln!(
            html,
            "<section class=\"level\" data-level=\"{}\">\n<h2>Niveau {} : {}</h2>",
            section.level,
            section.level,
            escape_html(&section.name)
        )?;
        writeln!(
            html,
            "<p class=\"tally\">{} controles, {} conformes, {} anomalies</p>",
            section.tally.total, section.tally.ok, section.tally.anomalies
        )?;
        html.push_str(
            "<table>\n<tr><th>Ref</th><th>Nom</th><th>Severite</th><th>Message</th>\
             <th>Suggestion</th><th>Comptes</th><th>Reference</th></tr>\n",
        );
        for result in &section.results {
            writeln!(
                html,
                "<tr class=\"severity-{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
                 <td>{}</td><td>{}</td><td>{}</td></tr>",
                result.severity.code().to_ascii_lowercase(),
                escape_html(&result.reference),
                escape_html(&result.name),
                escape_html(&result.severity_label),
                escape_html(&result.message),
                escape_html(result.suggestion.as_deref().unwrap_or_default()),
                escape_html(&result.accounts.join(", ")),
                escape_html(result.regulatory_reference.as_deref().unwrap_or_default()),
            )?;
        }
        html.push_str("</table>\n</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    Ok(html.into_bytes())
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

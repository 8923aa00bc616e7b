// src/claims/report.rs — Markdown gap report rendering

use chrono::Utc;
use minijinja::{context, Environment};
use serde::Serialize;

use super::scorer::ComplianceScore;
use super::types::{Category, ExtractionResult, Severity, Verdict, VerificationReport};
use crate::infra::errors::SpecLoopError;

const TEMPLATE_NAME: &str = "gap_report.md";

const GAP_REPORT_TEMPLATE: &str = r#"# Gap Report: {{ project }}

| | |
|---|---|
| Iteration | {{ iteration }} |
| Document type | {{ document_type }} |
| Codebase | `{{ codebase }}` |
| Generated | {{ generated_at }} |

## Compliance score: {{ score }}%

| PASS | PARTIAL | FAIL | N/A | Total |
|---|---|---|---|---|
| {{ tally.pass }} | {{ tally.partial }} | {{ tally.fail }} | {{ tally.na }} | {{ total }} |

## Gaps

{% if gap_sections %}
{% for section in gap_sections %}
### {{ section.verdict }}

{% for group in section.groups %}
#### {{ group.severity }}

{% for gap in group.gaps %}
- **{{ gap.id }}** ({{ gap.category }}): {{ gap.claim }}
{% if gap.reasoning %}
  - Reasoning: {{ gap.reasoning }}
{% endif %}
{% for e in gap.evidence %}
  - Evidence: `{{ e.location }}`{% if e.snippet %}: `{{ e.snippet }}`{% endif %}

{% endfor %}
{% endfor %}

{% endfor %}
{% endfor %}
{% else %}
No gaps: every assessed claim passed.

{% endif %}
## All claims

{% for group in categories %}
### {{ group.category }}

| ID | Severity | Verdict | Claim |
|---|---|---|---|
{% for row in group.rows %}
| {{ row.id }} | {{ row.severity }} | {{ row.verdict }} | {{ row.claim }} |
{% endfor %}

{% endfor %}
"#;

#[derive(Serialize)]
struct EvidenceView {
    location: String,
    snippet: String,
}

#[derive(Serialize)]
struct GapView {
    id: String,
    category: &'static str,
    claim: String,
    reasoning: String,
    evidence: Vec<EvidenceView>,
}

#[derive(Serialize)]
struct SeverityGroup {
    severity: &'static str,
    gaps: Vec<GapView>,
}

#[derive(Serialize)]
struct GapSection {
    verdict: &'static str,
    groups: Vec<SeverityGroup>,
}

#[derive(Serialize)]
struct ClaimRow {
    id: String,
    severity: &'static str,
    verdict: &'static str,
    claim: String,
}

#[derive(Serialize)]
struct CategoryGroup {
    category: &'static str,
    rows: Vec<ClaimRow>,
}

/// Flatten text into a single markdown table cell.
fn cell(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

fn inline_code(text: &str) -> String {
    cell(text).replace('`', "'")
}

fn gap_sections(extraction: &ExtractionResult, report: &VerificationReport) -> Vec<GapSection> {
    [Verdict::Fail, Verdict::Partial]
        .into_iter()
        .filter_map(|verdict| {
            let groups: Vec<SeverityGroup> = Severity::ALL
                .into_iter()
                .filter_map(|severity| {
                    let gaps: Vec<GapView> = extraction
                        .claims
                        .iter()
                        .filter(|c| c.severity == severity)
                        .filter_map(|c| report.verification(&c.id).map(|v| (c, v)))
                        .filter(|(_, v)| v.verdict == verdict)
                        .map(|(c, v)| GapView {
                            id: c.id.clone(),
                            category: c.category.as_str(),
                            claim: cell(&c.text),
                            reasoning: cell(&v.reasoning),
                            evidence: v
                                .evidence
                                .iter()
                                .map(|e| EvidenceView {
                                    location: match e.line_number {
                                        Some(n) => format!("{}:{}", e.file, n),
                                        None => e.file.clone(),
                                    },
                                    snippet: inline_code(&e.snippet),
                                })
                                .collect(),
                        })
                        .collect();
                    (!gaps.is_empty()).then(|| SeverityGroup {
                        severity: severity.as_str(),
                        gaps,
                    })
                })
                .collect();
            (!groups.is_empty()).then(|| GapSection {
                verdict: verdict.as_str(),
                groups,
            })
        })
        .collect()
}

fn category_groups(
    extraction: &ExtractionResult,
    report: &VerificationReport,
) -> Vec<CategoryGroup> {
    Category::ALL
        .into_iter()
        .filter_map(|category| {
            let rows: Vec<ClaimRow> = extraction
                .claims
                .iter()
                .filter(|c| c.category == category)
                .map(|c| ClaimRow {
                    id: c.id.clone(),
                    severity: c.severity.as_str(),
                    verdict: report
                        .verification(&c.id)
                        .map(|v| v.verdict.as_str())
                        .unwrap_or("-"),
                    claim: cell(&c.text),
                })
                .collect();
            (!rows.is_empty()).then(|| CategoryGroup {
                category: category.as_str(),
                rows,
            })
        })
        .collect()
}

/// Render the markdown gap report for one scored iteration.
pub fn render_gap_report(
    extraction: &ExtractionResult,
    report: &VerificationReport,
    score: &ComplianceScore,
    project: &str,
) -> Result<String, SpecLoopError> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template(TEMPLATE_NAME, GAP_REPORT_TEMPLATE)?;

    let rendered = env.get_template(TEMPLATE_NAME)?.render(context! {
        project => project,
        iteration => extraction.iteration,
        document_type => &extraction.document_type,
        codebase => &report.codebase_path,
        generated_at => Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        score => format!("{:.1}", score.score),
        tally => &score.verdicts,
        total => score.verdicts.total(),
        gap_sections => gap_sections(extraction, report),
        categories => category_groups(extraction, report),
    })?;
    Ok(rendered)
}

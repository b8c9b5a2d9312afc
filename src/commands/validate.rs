use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::ValidateArgs;
use crate::commands::extract::{
    AREAS, CodeMatcher, EF_OUTPUT, EI_OUTPUT, EM_OUTPUT, EXPECTED_OBJECTIVES,
    EXPECTED_SYNTHESIS_ENTRIES, InfantilTree, MEDIO_AREAS, MedioTree, PORTUGUESE,
    PORTUGUESE_EXPECTED, PORTUGUESE_TAG, ResultTree, SUBJECTS, Tier,
};
use crate::util::{now_utc_string, read_json, utc_compact_string, write_json_pretty};

const REPORT_VERSION: u32 = 1;
const EXPERIENCE_FIELD_COUNT: usize = 5;
const AGE_GROUP_KEYS: &[&str] = &["EI01", "EI02", "EI03"];

#[derive(Debug, Clone, Serialize)]
struct QualityCheck {
    check_id: String,
    name: String,
    result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    found: Option<usize>,
}

impl QualityCheck {
    fn count(check_id: impl Into<String>, name: impl Into<String>, expected: usize, found: usize) -> Self {
        Self {
            check_id: check_id.into(),
            name: name.into(),
            result: if expected == found { "pass" } else { "failed" }.to_string(),
            expected: Some(expected),
            found: Some(found),
        }
    }

    fn flag(check_id: &str, name: &str, result: &str) -> Self {
        Self {
            check_id: check_id.to_string(),
            name: name.to_string(),
            result: result.to_string(),
            expected: None,
            found: None,
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct QualitySummary {
    total_checks: usize,
    passed: usize,
    failed: usize,
    pending: usize,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    manifest_version: u32,
    generated_at: String,
    status: String,
    summary: QualitySummary,
    checks: Vec<QualityCheck>,
    issues: Vec<String>,
    recommendations: Vec<String>,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let output_dir = &args.output_dir;
    let report_path = args.report_path.clone().unwrap_or_else(|| {
        output_dir
            .join("manifests")
            .join(format!("validation_report_{}.json", utc_compact_string(Utc::now())))
    });

    let fundamental: ResultTree = read_json(&output_dir.join(EF_OUTPUT))?;
    let infantil: InfantilTree = read_json(&output_dir.join(EI_OUTPUT))?;
    let medio: MedioTree = read_json(&output_dir.join(EM_OUTPUT))?;
    let codes = CodeMatcher::new()?;

    let mut issues = Vec::new();
    let mut checks = fundamental_checks(&fundamental, &codes, &mut issues);
    checks.extend(infantil_checks(&infantil, &mut issues));
    checks.extend(medio_checks(&medio));

    let report = build_report(checks, issues);
    for check in report.checks.iter().filter(|check| check.result == "failed") {
        warn!(
            check_id = %check.check_id,
            name = %check.name,
            expected = ?check.expected,
            found = ?check.found,
            "check failed"
        );
    }

    write_json_pretty(&report_path, &report)?;
    info!(
        output_dir = %output_dir.display(),
        report_path = %report_path.display(),
        status = %report.status,
        passed = report.summary.passed,
        failed = report.summary.failed,
        "validation completed"
    );

    Ok(())
}

fn fundamental_checks(
    tree: &ResultTree,
    codes: &CodeMatcher,
    issues: &mut Vec<String>,
) -> Vec<QualityCheck> {
    let mut by_tag = BTreeMap::<String, HashSet<&str>>::new();
    let mut malformed = 0usize;
    let mut misplaced = 0usize;
    let mut duplicated_leaves = 0usize;
    let mut empty_years = 0usize;

    for profile in SUBJECTS {
        let Some(subject) = tree
            .areas
            .get(profile.area)
            .and_then(|area| area.subjects.get(profile.name))
        else {
            issues.push(format!("{}: component missing from the tree", profile.name));
            continue;
        };
        if subject.periods.is_empty() {
            issues.push(format!("{}: no years", profile.name));
        }

        for (year, period) in &subject.periods {
            let mut year_items = 0usize;
            for unit in period.values() {
                for group in unit.practices.values().flatten().chain(unit.groups.iter()) {
                    let mut leaf = HashSet::new();
                    for item in &group.items {
                        year_items += 1;
                        if !leaf.insert(item.code.as_str()) {
                            duplicated_leaves += 1;
                        }

                        let found = codes.find_all(Tier::Fundamental, &item.code);
                        let Some(parsed) = found.first().filter(|parsed| parsed.code == item.code)
                        else {
                            malformed += 1;
                            continue;
                        };
                        let in_year = parsed
                            .periods()
                            .iter()
                            .any(|number| format!("{number}º Ano") == *year);
                        if parsed.tag != profile.tag || !in_year {
                            misplaced += 1;
                        }
                        by_tag
                            .entry(parsed.tag.clone())
                            .or_default()
                            .insert(item.code.as_str());
                    }
                }
            }
            if year_items == 0 {
                empty_years += 1;
                issues.push(format!("{} > {year}: no skills", profile.name));
            }
        }
    }

    let mut checks = Vec::new();
    for profile in SUBJECTS {
        let found = by_tag.get(profile.tag).map(HashSet::len).unwrap_or(0);
        checks.push(QualityCheck::count(
            format!("EF-{}", profile.tag),
            format!("{} unique skill codes", profile.name),
            profile.expected_codes,
            found,
        ));
    }

    let expected_total = SUBJECTS.iter().map(|profile| profile.expected_codes).sum::<usize>();
    let unique_total = by_tag.values().map(HashSet::len).sum::<usize>();
    checks.push(QualityCheck::count(
        "EF-TOTAL",
        "Ensino Fundamental unique skill codes",
        expected_total,
        unique_total,
    ));
    checks.push(QualityCheck::count(
        "EF-METADATA",
        "Metadata unique code count matches the tree",
        tree.metadata.codigos_unicos,
        tree.items().map(|item| item.code.as_str()).collect::<HashSet<&str>>().len(),
    ));
    checks.push(QualityCheck::count("EF-WELLFORMED", "Skill codes are well formed", 0, malformed));
    checks.push(QualityCheck::count(
        "EF-PLACEMENT",
        "Skills sit under their own component and year",
        0,
        misplaced,
    ));
    checks.push(QualityCheck::count(
        "EF-LEAF-DEDUP",
        "No leaf repeats a skill code",
        0,
        duplicated_leaves,
    ));
    checks.push(QualityCheck::count("EF-YEARS", "Every year holds skills", 0, empty_years));

    let missing_area_competencies = AREAS
        .iter()
        .filter(|area| {
            tree.areas
                .get(area.name)
                .map(|node| node.competencies.is_empty())
                .unwrap_or(true)
        })
        .count();
    let missing_subject_competencies = SUBJECTS
        .iter()
        .filter(|profile| {
            tree.areas
                .get(profile.area)
                .and_then(|area| area.subjects.get(profile.name))
                .map(|subject| subject.competencies.is_empty())
                .unwrap_or(true)
        })
        .count();
    // Competency texts are reference data; their absence is pending, not a failure.
    checks.push(QualityCheck::flag(
        "EF-COMPETENCIES",
        "Area and component competencies present",
        if missing_area_competencies + missing_subject_competencies == 0 {
            "pass"
        } else {
            "pending"
        },
    ));

    checks
}

fn infantil_checks(tree: &InfantilTree, issues: &mut Vec<String>) -> Vec<QualityCheck> {
    let mut incomplete_groups = 0usize;
    for key in AGE_GROUP_KEYS {
        match tree.objetivos_aprendizagem.get(*key) {
            None => {
                incomplete_groups += 1;
                issues.push(format!("educação infantil: age group {key} missing"));
            }
            Some(fields) if fields.len() < EXPERIENCE_FIELD_COUNT => {
                incomplete_groups += 1;
                issues.push(format!(
                    "educação infantil: {key} has {} of {EXPERIENCE_FIELD_COUNT} experience fields",
                    fields.len()
                ));
            }
            Some(_) => {}
        }
    }

    vec![
        QualityCheck::count(
            "EI-OBJECTIVES",
            "Educação Infantil learning objectives",
            EXPECTED_OBJECTIVES,
            tree.objective_count(),
        ),
        QualityCheck::count(
            "EI-SYNTHESIS",
            "Educação Infantil synthesis entries",
            EXPECTED_SYNTHESIS_ENTRIES,
            tree.synthesis_count(),
        ),
        QualityCheck::count(
            "EI-AGE-GROUPS",
            "Every age group covers every experience field",
            0,
            incomplete_groups,
        ),
    ]
}

fn medio_checks(tree: &MedioTree) -> Vec<QualityCheck> {
    let mut checks = Vec::new();

    for area in MEDIO_AREAS {
        let found = tree
            .areas
            .get(area.name)
            .map(|node| {
                node.competencias_especificas
                    .iter()
                    .map(|competency| competency.habilidades.len())
                    .sum::<usize>()
            })
            .unwrap_or(0);
        checks.push(QualityCheck::count(
            format!("EM-{}", area.tag),
            format!("{} skills", area.name),
            area.expected_codes,
            found,
        ));
    }

    let portuguese = tree
        .areas
        .values()
        .filter_map(|area| area.componentes.get(PORTUGUESE))
        .flat_map(|component| component.campos_de_atuacao.values())
        .map(|field| field.habilidades.len())
        .sum::<usize>();
    checks.push(QualityCheck::count(
        format!("EM-{PORTUGUESE_TAG}"),
        format!("{PORTUGUESE} skills"),
        PORTUGUESE_EXPECTED,
        portuguese,
    ));

    let expected_total =
        MEDIO_AREAS.iter().map(|area| area.expected_codes).sum::<usize>() + PORTUGUESE_EXPECTED;
    checks.push(QualityCheck::count(
        "EM-TOTAL",
        "Ensino Médio skills",
        expected_total,
        tree.skills().count(),
    ));

    checks
}

fn summarize_checks(checks: &[QualityCheck]) -> QualitySummary {
    let count = |result: &str| checks.iter().filter(|check| check.result == result).count();
    QualitySummary {
        total_checks: checks.len(),
        passed: count("pass"),
        failed: count("failed"),
        pending: count("pending"),
    }
}

fn build_report(checks: Vec<QualityCheck>, mut issues: Vec<String>) -> ValidationReport {
    let summary = summarize_checks(&checks);
    issues.extend(
        checks
            .iter()
            .filter(|check| check.result == "failed")
            .map(|check| format!("{} failed", check.name)),
    );

    let failed = |prefix: &str| {
        checks
            .iter()
            .any(|check| check.check_id.starts_with(prefix) && check.result == "failed")
    };
    let mut recommendations = Vec::new();
    if failed("EF-") {
        recommendations.push(
            "Review table classification and positional context for the components with missing or extra codes."
                .to_string(),
        );
    }
    if checks
        .iter()
        .any(|check| check.check_id == "EF-COMPETENCIES" && check.result == "pending")
    {
        recommendations
            .push("Pass --competencies with the reference competency texts.".to_string());
    }
    if failed("EI-") {
        recommendations.push(
            "Check the Educação Infantil page range and the synthesis table layout.".to_string(),
        );
    }
    if failed("EM-") {
        recommendations.push(
            "Check the Ensino Médio page range and continuation of wrapped skill lines."
                .to_string(),
        );
    }

    ValidationReport {
        manifest_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        status: if summary.failed > 0 {
            "failed".to_string()
        } else if summary.pending > 0 {
            "partial".to_string()
        } else {
            "passed".to_string()
        },
        summary,
        checks,
        issues,
        recommendations,
    }
}

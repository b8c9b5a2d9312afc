use std::ops::Range;
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::model::{ExtractCounts, ExtractPaths, ExtractRunManifest, TableSettings};
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

mod catalog;
mod classify;
mod codes;
mod context;
mod infantil;
mod labels;
mod medio;
mod normalize;
mod pipeline;
mod segment;
mod source;
mod stats;
mod subjects;
#[cfg(test)]
mod tests;
mod text;
mod tree;

pub use self::codes::{CodeMatcher, Tier};
pub use self::infantil::{EXPECTED_OBJECTIVES, EXPECTED_SYNTHESIS_ENTRIES, InfantilTree};
pub use self::medio::{MEDIO_AREAS, MedioTree, PORTUGUESE, PORTUGUESE_EXPECTED, PORTUGUESE_TAG};
pub use self::subjects::{AREAS, SUBJECTS};
pub use self::tree::ResultTree;

use self::catalog::{CompetencyCatalog, CompetencyHarvester};
use self::infantil::InfantilExtractor;
use self::medio::MedioExtractor;
use self::pipeline::FundamentalPipeline;
use self::source::{DocumentSource, PageContent, PageDumpSource};
use self::stats::{ExtractionStats, build_stats};

/// Zero-based page ranges of each stage in the source document.
pub const EI_PAGES: Range<usize> = 35..57;
pub const EF_PAGES: Range<usize> = 57..460;
pub const EM_PAGES: Range<usize> = 460..600;

pub const EF_OUTPUT: &str = "bncc_ef.json";
pub const EI_OUTPUT: &str = "bncc_ei.json";
pub const EM_OUTPUT: &str = "bncc_em.json";
pub const STATS_OUTPUT: &str = "bncc_ef_estatisticas.json";

const MANIFEST_VERSION: u32 = 1;

/// Everything one pass over the document produces.
#[derive(Debug)]
struct Extraction {
    fundamental: ResultTree,
    infantil: InfantilTree,
    medio: MedioTree,
    stats: ExtractionStats,
    counts: ExtractCounts,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    info!(input = %args.input.display(), run_id = %run_id, "starting extract");

    let source = PageDumpSource::open(&args.input)?;
    let source_sha256 = sha256_file(&args.input)?;
    let catalog = match &args.competencies {
        Some(path) => CompetencyCatalog::load(path)?,
        None => CompetencyCatalog::default(),
    };
    let settings = TableSettings::default();

    let extraction = extract_document(&source, &settings, &catalog, &source_sha256)?;

    let output_dir = &args.output_dir;
    let artifacts = vec![
        write_artifact(output_dir, EF_OUTPUT, &extraction.fundamental)?,
        write_artifact(output_dir, EI_OUTPUT, &extraction.infantil)?,
        write_artifact(output_dir, EM_OUTPUT, &extraction.medio)?,
        write_artifact(output_dir, STATS_OUTPUT, &extraction.stats)?,
    ];

    let warnings = collect_warnings(&extraction);
    for warning in &warnings {
        warn!(warning = %warning, "extraction warning");
    }

    let manifest_path = output_dir
        .join("manifests")
        .join(format!("extract_run_{}.json", utc_compact_string(started_ts)));
    let manifest = ExtractRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        source_sha256,
        table_settings: settings,
        paths: ExtractPaths {
            input_path: args.input.display().to_string(),
            output_dir: output_dir.display().to_string(),
            competencies_path: args
                .competencies
                .as_ref()
                .map(|path| path.display().to_string()),
            artifacts,
        },
        counts: extraction.counts.clone(),
        warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        ef_items = extraction.counts.ef_items_inserted,
        ef_unique_codes = extraction.counts.ef_unique_codes,
        ei_objectives = extraction.counts.ei_objectives,
        em_skills = extraction.counts.em_skills,
        manifest = %manifest_path.display(),
        "extract completed"
    );

    Ok(())
}

/// Single ordered pass over the three page ranges.
fn extract_document(
    source: &dyn DocumentSource,
    settings: &TableSettings,
    catalog: &CompetencyCatalog,
    source_sha256: &str,
) -> Result<Extraction> {
    let codes = CodeMatcher::new()?;
    let harvester = CompetencyHarvester::new()?;
    let mut counts = ExtractCounts {
        page_count: source.page_count(),
        ..ExtractCounts::default()
    };

    let mut infantil = InfantilExtractor::new(&codes);
    for page in stage_pages(source, EI_PAGES) {
        infantil.process_page(&page, settings, &mut counts);
        counts.ei_pages_processed += 1;
    }

    let mut fundamental = FundamentalPipeline::new(&codes, &harvester, catalog);
    for page in stage_pages(source, EF_PAGES) {
        fundamental.process_page(&page, settings, &mut counts);
        counts.ef_pages_processed += 1;
    }

    let mut medio = MedioExtractor::new(&codes)?;
    for page in stage_pages(source, EM_PAGES) {
        medio.process_page(&page);
        counts.em_pages_processed += 1;
    }

    let fundamental = fundamental.finish(source_sha256, &mut counts);
    let stats = build_stats(&fundamental);
    info!(
        pages = counts.ef_pages_processed,
        context_tables = counts.context_tables,
        item_tables = counts.item_tables,
        fallback_tables = counts.fallback_tables,
        unique_codes = counts.ef_unique_codes,
        "ensino fundamental assembled"
    );

    Ok(Extraction {
        infantil: infantil.finish(source_sha256),
        medio: medio.finish(source_sha256, &mut counts),
        fundamental,
        stats,
        counts,
    })
}

fn stage_pages(
    source: &dyn DocumentSource,
    range: Range<usize>,
) -> impl Iterator<Item = PageContent<'_>> {
    let end = range.end.min(source.page_count());
    (range.start..end).filter_map(move |index| source.page(index))
}

fn write_artifact<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<String> {
    let path = dir.join(name);
    write_json_pretty(&path, value)?;
    info!(path = %path.display(), "wrote artifact");
    Ok(path.display().to_string())
}

fn collect_warnings(extraction: &Extraction) -> Vec<String> {
    let mut warnings = Vec::new();
    let counts = &extraction.counts;

    if counts.ef_unknown_tags > 0 {
        warnings.push(format!(
            "{} coded items carried an unrecognized component tag",
            counts.ef_unknown_tags
        ));
    }
    if counts.ef_invalid_periods > 0 {
        warnings.push(format!(
            "{} coded items carried an unrecognized year block",
            counts.ef_invalid_periods
        ));
    }
    for (name, subject) in &extraction.stats.componentes {
        if subject.codigos_unicos != subject.codigos_esperados {
            warnings.push(format!(
                "{name}: {} unique codes, {} expected",
                subject.codigos_unicos, subject.codigos_esperados
            ));
        }
    }
    if counts.ei_objectives != EXPECTED_OBJECTIVES {
        warnings.push(format!(
            "educação infantil: {} objectives, {EXPECTED_OBJECTIVES} expected",
            counts.ei_objectives
        ));
    }

    warnings
}

use tracing::{debug, info};

use crate::model::{ExtractCounts, Table, TableSettings};

use super::catalog::{CompetencyCatalog, CompetencyHarvester};
use super::classify::{Classification, TableKind, classify};
use super::codes::{CodeMatch, CodeMatcher, Tier};
use super::context::{ColumnRoles, ContextEntry, ContextTracker, is_field_heading};
use super::labels::is_label;
use super::normalize::{flatten_cell, keyword_key, normalize_row};
use super::segment::Segmenter;
use super::source::PageContent;
use super::subjects::{AREAS, AreaProfile, SUBJECTS, SubjectProfile, detect_subject};
use super::text::heading_lines;
use super::tree::{InsertOutcome, ResultTree, TreeAssembler};

const COMPETENCY_HEADING: &str = "COMPETENCIAS ESPECIFICAS";
/// Competency lists that spill over a page break are read from this many pages.
const HARVEST_MAX_PAGES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HarvestTarget {
    Area(&'static AreaProfile),
    Subject(&'static SubjectProfile),
}

impl HarvestTarget {
    fn limit(self) -> usize {
        match self {
            HarvestTarget::Area(area) => area.expected_competencies,
            HarvestTarget::Subject(subject) => subject.expected_competencies,
        }
    }

    fn name(self) -> &'static str {
        match self {
            HarvestTarget::Area(area) => area.name,
            HarvestTarget::Subject(subject) => subject.name,
        }
    }
}

#[derive(Debug)]
struct PendingHarvest {
    target: HarvestTarget,
    text: String,
    pages: usize,
}

/// Walks the Ensino Fundamental pages in order and assembles the tree.
#[derive(Debug)]
pub struct FundamentalPipeline<'a> {
    codes: &'a CodeMatcher,
    harvester: &'a CompetencyHarvester,
    tracker: ContextTracker,
    assembler: TreeAssembler,
    subject: Option<&'static SubjectProfile>,
    pending_harvest: Option<PendingHarvest>,
}

impl<'a> FundamentalPipeline<'a> {
    pub fn new(
        codes: &'a CodeMatcher,
        harvester: &'a CompetencyHarvester,
        catalog: &CompetencyCatalog,
    ) -> Self {
        let mut assembler = TreeAssembler::new();
        for area in AREAS {
            if let Some(competencies) = catalog.area(area.name) {
                assembler.set_area_competencies(area.name, competencies.to_vec());
            }
        }
        for subject in SUBJECTS {
            if let Some(competencies) = catalog.subject(subject.name) {
                assembler.set_subject_competencies(subject.area, subject.name, competencies.to_vec());
            }
        }

        Self {
            codes,
            harvester,
            tracker: ContextTracker::new(Segmenter::default()),
            assembler,
            subject: None,
            pending_harvest: None,
        }
    }

    pub fn process_page(
        &mut self,
        page: &PageContent<'_>,
        settings: &TableSettings,
        counts: &mut ExtractCounts,
    ) {
        self.update_subject(page, counts);
        self.collect_competencies(page.text(), counts);

        for (index, table) in page.tables(settings).iter().enumerate() {
            let classification = classify(table, self.codes, Tier::Fundamental);
            debug!(
                page = page.number(),
                table = index,
                kind = classification.kind.as_str(),
                rows = table.rows.len(),
                columns = table.column_count(),
                "classified table"
            );
            self.process_table(table, classification, counts);
        }
    }

    fn update_subject(&mut self, page: &PageContent<'_>, counts: &mut ExtractCounts) {
        let lines = heading_lines(page.styled_chars(), page.text());
        let Some((rule, profile)) = detect_subject(&lines) else {
            return;
        };
        if self.subject == Some(profile) {
            return;
        }

        info!(
            page = page.number(),
            subject = profile.name,
            rule,
            "subject changed"
        );
        self.subject = Some(profile);
        self.tracker.reset();
        counts.subject_changes += 1;
    }

    fn process_table(
        &mut self,
        table: &Table,
        classification: Classification,
        counts: &mut ExtractCounts,
    ) {
        match classification.kind {
            TableKind::Competency => counts.competency_tables += 1,
            TableKind::Context => {
                counts.context_tables += 1;
                let entries = self.tracker.update_from_context_table(
                    table,
                    classification.has_header,
                    self.codes,
                );
                debug!(entries = entries.len(), "context table cached");
            }
            TableKind::Item if table.column_count() <= 1 => {
                counts.item_tables += 1;
                self.zip_item_rows(table, classification.has_header, counts);
            }
            TableKind::Item => {
                counts.item_tables += 1;
                self.read_inline_rows(table, classification.has_header, counts);
            }
            TableKind::Unknown => {
                let columns = table.column_count();
                if (2..=3).contains(&columns) && self.table_has_code(table) {
                    counts.fallback_tables += 1;
                    self.read_inline_rows(table, false, counts);
                } else {
                    counts.skipped_tables += 1;
                    debug!(columns, "uncoded table skipped");
                }
            }
        }
    }

    fn table_has_code(&self, table: &Table) -> bool {
        table.rows.iter().flatten().flatten().any(|cell| {
            self.codes
                .contains_code(Tier::Fundamental, &flatten_cell(cell))
        })
    }

    /// Single-column item tables: row `i` takes the `i`th cached context entry.
    /// Every data row takes its slot, merged and uncoded rows included, so a
    /// field-heading row lines up with the heading row of the context table.
    fn zip_item_rows(&mut self, table: &Table, has_header: bool, counts: &mut ExtractCounts) {
        let mut field_override: Option<String> = None;

        for row in table.rows.iter().skip(usize::from(has_header)) {
            let mut context = self.tracker.next_positional();
            let cell = normalize_row(row).into_iter().next().unwrap_or_default();
            if cell.is_empty() {
                continue;
            }

            let flat = flatten_cell(&cell);
            let found = self.codes.find_all(Tier::Fundamental, &flat);
            if found.is_empty() {
                if is_field_heading(&cell) {
                    self.tracker.set_field(&cell);
                    field_override = self.tracker.current().field.clone();
                }
                continue;
            }

            if field_override.is_some() {
                context.field = field_override.clone();
            }
            self.insert_all(&found, &context, counts);
        }
    }

    /// Item tables that carry their own context columns left of the codes.
    fn read_inline_rows(&mut self, table: &Table, has_header: bool, counts: &mut ExtractCounts) {
        let context_columns = table.column_count().saturating_sub(1);
        let mut rows = table.rows.iter().map(normalize_row);
        let header_roles = if has_header {
            rows.next().and_then(|cells| ColumnRoles::from_header(&cells))
        } else {
            None
        };

        for cells in rows {
            let coded_column = cells.iter().rposition(|cell| {
                !cell.is_empty()
                    && self
                        .codes
                        .contains_code(Tier::Fundamental, &flatten_cell(cell))
            });

            let Some(coded_column) = coded_column else {
                if let Some(heading) = cells.iter().find(|cell| is_field_heading(cell)) {
                    self.tracker.set_field(heading);
                } else if cells
                    .iter()
                    .any(|cell| is_label(&flatten_cell(cell), self.codes))
                {
                    let roles = header_roles
                        .unwrap_or_else(|| ColumnRoles::for_inline_columns(context_columns));
                    self.tracker.apply_inline(&cells, roles, self.codes);
                }
                continue;
            };

            let roles =
                header_roles.unwrap_or_else(|| ColumnRoles::for_inline_columns(coded_column));
            let context = self
                .tracker
                .apply_inline(&cells[..coded_column], roles, self.codes);
            let found = self
                .codes
                .find_all(Tier::Fundamental, &flatten_cell(&cells[coded_column]));
            self.insert_all(&found, &context, counts);
        }
    }

    fn insert_all(&mut self, found: &[CodeMatch], context: &ContextEntry, counts: &mut ExtractCounts) {
        for item in found {
            match self.assembler.insert(item, context) {
                InsertOutcome::Inserted { replicas } => {
                    counts.ef_items_inserted += 1;
                    debug!(code = %item.code, replicas, "item inserted");
                }
                InsertOutcome::Duplicate => counts.ef_duplicates_suppressed += 1,
                InsertOutcome::UnknownTag => counts.ef_unknown_tags += 1,
                InsertOutcome::NoPeriods => counts.ef_invalid_periods += 1,
            }
        }
    }

    fn collect_competencies(&mut self, text: &str, counts: &mut ExtractCounts) {
        if let Some(mut pending) = self.pending_harvest.take() {
            pending.text.push('\n');
            pending.text.push_str(text);
            pending.pages += 1;
            self.advance_harvest(pending, counts);
        }

        let lines = text.lines().collect::<Vec<&str>>();
        for (index, line) in lines.iter().enumerate() {
            let Some(target) = competency_target(line) else {
                continue;
            };
            if self.has_competencies(target) {
                continue;
            }

            if let Some(previous) = self.pending_harvest.take() {
                self.commit_harvest(previous, counts);
            }
            let pending = PendingHarvest {
                target,
                text: lines[index + 1..].join("\n"),
                pages: 1,
            };
            self.advance_harvest(pending, counts);
            break;
        }
    }

    fn advance_harvest(&mut self, pending: PendingHarvest, counts: &mut ExtractCounts) {
        let found = self
            .harvester
            .harvest(&pending.text, pending.target.limit())
            .len();
        if found >= pending.target.limit() || pending.pages >= HARVEST_MAX_PAGES {
            self.commit_harvest(pending, counts);
        } else {
            self.pending_harvest = Some(pending);
        }
    }

    fn commit_harvest(&mut self, pending: PendingHarvest, counts: &mut ExtractCounts) {
        let competencies = self
            .harvester
            .harvest(&pending.text, pending.target.limit());
        if competencies.is_empty() {
            debug!(scope = pending.target.name(), "no numbered competencies found");
            return;
        }

        info!(
            scope = pending.target.name(),
            found = competencies.len(),
            expected = pending.target.limit(),
            "harvested competencies from page text"
        );
        counts.competencies_harvested += competencies.len();
        match pending.target {
            HarvestTarget::Area(area) => self.assembler.set_area_competencies(area.name, competencies),
            HarvestTarget::Subject(subject) => {
                self.assembler
                    .set_subject_competencies(subject.area, subject.name, competencies)
            }
        }
    }

    fn has_competencies(&self, target: HarvestTarget) -> bool {
        let tree = self.assembler.tree();
        match target {
            HarvestTarget::Area(area) => tree
                .areas
                .get(area.name)
                .map(|node| !node.competencies.is_empty())
                .unwrap_or(false),
            HarvestTarget::Subject(subject) => tree
                .areas
                .get(subject.area)
                .and_then(|node| node.subjects.get(subject.name))
                .map(|node| !node.competencies.is_empty())
                .unwrap_or(false),
        }
    }

    pub fn finish(mut self, source_sha256: &str, counts: &mut ExtractCounts) -> ResultTree {
        if let Some(pending) = self.pending_harvest.take() {
            self.commit_harvest(pending, counts);
        }

        // A component that is alone in its area shares the area's competencies.
        for area in AREAS {
            let mut members = SUBJECTS.iter().filter(|subject| subject.area == area.name);
            let (Some(only), None) = (members.next(), members.next()) else {
                continue;
            };
            if self.has_competencies(HarvestTarget::Subject(only)) {
                continue;
            }
            let shared = self
                .assembler
                .tree()
                .areas
                .get(area.name)
                .map(|node| node.competencies.clone())
                .unwrap_or_default();
            if !shared.is_empty() {
                self.assembler
                    .set_subject_competencies(area.name, only.name, shared);
            }
        }

        let tree = self.assembler.finish(source_sha256);
        counts.ef_unique_codes = tree.metadata.codigos_unicos;
        tree
    }
}

/// Area or component named by a `COMPETÊNCIAS ESPECÍFICAS DE …` heading.
fn competency_target(line: &str) -> Option<HarvestTarget> {
    let key = keyword_key(line.trim());
    let rest = key.split_once(COMPETENCY_HEADING)?.1.trim_start();
    let rest = ["DE ", "DA ", "DO "]
        .iter()
        .find_map(|article| rest.strip_prefix(article))
        .unwrap_or(rest);

    let area = AREAS
        .iter()
        .filter(|area| rest.starts_with(area.heading))
        .max_by_key(|area| area.heading.len());
    let subject = SUBJECTS
        .iter()
        .filter(|subject| rest.starts_with(subject.heading))
        .max_by_key(|subject| subject.heading.len());

    match (area, subject) {
        (Some(area), Some(subject)) if subject.heading.len() > area.heading.len() => {
            Some(HarvestTarget::Subject(subject))
        }
        (Some(area), _) => Some(HarvestTarget::Area(area)),
        (None, Some(subject)) => Some(HarvestTarget::Subject(subject)),
        (None, None) => None,
    }
}

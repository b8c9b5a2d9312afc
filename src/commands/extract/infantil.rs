use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{ExtractCounts, Table, TableSettings};

use super::codes::{CodeMatch, CodeMatcher, Tier};
use super::normalize::{flatten_cell, keyword_key, normalize_row};
use super::segment::{Segmenter, SegmenterPolicy};
use super::source::PageContent;
use super::text::coded_runs;
use super::tree::{CodedEntry, TreeMetadata};

pub const EXPECTED_OBJECTIVES: usize = 93;
pub const EXPECTED_SYNTHESIS_ENTRIES: usize = 19;

/// Narrative cells shorter than this are headings, not synthesis text.
const SYNTHESIS_MIN_CHARS: usize = 40;

pub const EXPERIENCE_FIELDS: &[(&str, &str)] = &[
    ("EO", "O eu, o outro e o nós"),
    ("CG", "Corpo, gestos e movimentos"),
    ("TS", "Traços, sons, cores e formas"),
    ("EF", "Escuta, fala, pensamento e imaginação"),
    ("ET", "Espaços, tempos, quantidades, relações e transformações"),
];

pub const AGE_GROUPS: &[(&str, &str)] = &[
    ("EI01", "Bebês (zero a 1 ano e 6 meses)"),
    (
        "EI02",
        "Crianças bem pequenas (1 ano e 7 meses a 3 anos e 11 meses)",
    ),
    ("EI03", "Crianças pequenas (4 anos a 5 anos e 11 meses)"),
];

fn experience_field(tag: &str) -> Option<&'static str> {
    EXPERIENCE_FIELDS
        .iter()
        .find(|(known, _)| *known == tag)
        .map(|(_, name)| *name)
}

fn experience_field_by_name(cell: &str) -> Option<&'static str> {
    let key = keyword_key(cell.trim().trim_end_matches(['.', ':']));
    EXPERIENCE_FIELDS
        .iter()
        .find(|(_, name)| keyword_key(name) == key)
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfantilTree {
    pub metadata: TreeMetadata,
    pub faixas_etarias: IndexMap<String, String>,
    pub campos_de_experiencia: IndexMap<String, String>,
    /// Age group → experience field → objectives.
    pub objetivos_aprendizagem: BTreeMap<String, IndexMap<String, Vec<CodedEntry>>>,
    pub sintese_aprendizagens: IndexMap<String, Vec<String>>,
}

impl InfantilTree {
    pub fn objective_count(&self) -> usize {
        self.objetivos_aprendizagem
            .values()
            .flat_map(IndexMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn synthesis_count(&self) -> usize {
        self.sintese_aprendizagens.values().map(Vec::len).sum()
    }
}

/// Learning objectives and the synthesis of learning for Educação Infantil.
#[derive(Debug)]
pub struct InfantilExtractor<'a> {
    codes: &'a CodeMatcher,
    segmenter: Segmenter,
    tree: InfantilTree,
    seen: HashSet<String>,
}

impl<'a> InfantilExtractor<'a> {
    pub fn new(codes: &'a CodeMatcher) -> Self {
        let tree = InfantilTree {
            metadata: TreeMetadata {
                etapa: "Educação Infantil".to_string(),
                ..TreeMetadata::default()
            },
            faixas_etarias: AGE_GROUPS
                .iter()
                .map(|(key, name)| (key.to_string(), name.to_string()))
                .collect(),
            campos_de_experiencia: EXPERIENCE_FIELDS
                .iter()
                .map(|(tag, name)| (tag.to_string(), name.to_string()))
                .collect(),
            ..InfantilTree::default()
        };

        Self {
            codes,
            segmenter: Segmenter::new(SegmenterPolicy::narrative()),
            tree,
            seen: HashSet::new(),
        }
    }

    pub fn process_page(
        &mut self,
        page: &PageContent<'_>,
        settings: &TableSettings,
        counts: &mut ExtractCounts,
    ) {
        let mut coded_cells = 0usize;
        for table in page.tables(settings) {
            coded_cells += self.read_table(table, counts);
        }

        if coded_cells == 0 {
            let found = coded_runs(page.text(), Tier::Infantil, self.codes);
            debug!(
                page = page.number(),
                objectives = found.len(),
                "no coded tables, read objectives from text"
            );
            for objective in &found {
                self.insert(objective, counts);
            }
        }
    }

    fn read_table(&mut self, table: &Table, counts: &mut ExtractCounts) -> usize {
        let mut coded_cells = 0usize;

        for row in &table.rows {
            let cells = normalize_row(row);
            let mut row_has_code = false;
            for cell in &cells {
                let found = self.codes.find_all(Tier::Infantil, &flatten_cell(cell));
                if found.is_empty() {
                    continue;
                }
                row_has_code = true;
                coded_cells += 1;
                for objective in &found {
                    self.insert(objective, counts);
                }
            }

            if !row_has_code {
                self.read_synthesis_row(&cells, counts);
            }
        }

        coded_cells
    }

    /// `[experience field, narrative]` rows of the synthesis tables.
    fn read_synthesis_row(&mut self, cells: &[String], counts: &mut ExtractCounts) {
        let mut populated = cells.iter().filter(|cell| !cell.is_empty());
        let (Some(head), Some(narrative)) = (populated.next(), populated.next()) else {
            return;
        };
        let Some(field) = experience_field_by_name(&flatten_cell(head)) else {
            return;
        };
        if flatten_cell(narrative).chars().count() < SYNTHESIS_MIN_CHARS {
            return;
        }

        let entries = self
            .tree
            .sintese_aprendizagens
            .entry(field.to_string())
            .or_default();
        for segment in self.segmenter.segment(narrative) {
            if !entries.contains(&segment) {
                entries.push(segment);
                counts.ei_synthesis_entries += 1;
            }
        }
    }

    fn insert(&mut self, found: &CodeMatch, counts: &mut ExtractCounts) {
        let Some(field) = experience_field(&found.tag) else {
            warn!(code = %found.code, tag = %found.tag, "unrecognized experience field, skipped");
            return;
        };
        let age_group = format!("EI{}", found.period_digits);
        if found.periods().is_empty() {
            warn!(code = %found.code, "unrecognized age group, skipped");
            return;
        }
        if !self.seen.insert(found.code.clone()) {
            return;
        }

        self.tree
            .objetivos_aprendizagem
            .entry(age_group)
            .or_default()
            .entry(field.to_string())
            .or_default()
            .push(CodedEntry::from(found));
        counts.ei_objectives += 1;
    }

    pub fn finish(mut self, source_sha256: &str) -> InfantilTree {
        let total = self.tree.objective_count();
        self.tree.metadata.fonte_sha256 = source_sha256.to_string();
        self.tree.metadata.total_habilidades = total;
        self.tree.metadata.codigos_unicos = self.seen.len();
        self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::extract::source::{DocumentSource, PageDumpSource};
    use crate::model::Page;

    fn run_pages(pages: Vec<Page>) -> (InfantilTree, ExtractCounts) {
        let codes = CodeMatcher::new().expect("code regexes compile");
        let source = PageDumpSource::from_pages(pages, TableSettings::default());
        let mut extractor = InfantilExtractor::new(&codes);
        let mut counts = ExtractCounts::default();
        for index in 0..source.page_count() {
            let page = source.page(index).expect("page");
            extractor.process_page(&page, &TableSettings::default(), &mut counts);
        }
        (extractor.finish("sha"), counts)
    }

    fn row(cells: &[Option<&str>]) -> Vec<Option<String>> {
        cells.iter().map(|cell| cell.map(str::to_string)).collect()
    }

    #[test]
    fn table_cells_are_grouped_by_age_and_field() {
        let table = Table::new(vec![
            row(&[Some("BEBÊS"), Some("CRIANÇAS BEM PEQUENAS")]),
            row(&[
                Some("(EI01EO01) Perceber que suas ações têm efeitos\nnas outras crianças."),
                Some("(EI02EO01) Demonstrar atitudes de cuidado."),
            ]),
            row(&[Some("(EI01EO01) Perceber que suas ações têm efeitos nas outras crianças."), None]),
        ]);
        let (tree, counts) = run_pages(vec![Page {
            tables: vec![table],
            ..Page::default()
        }]);

        let bebes = &tree.objetivos_aprendizagem["EI01"]["O eu, o outro e o nós"];
        assert_eq!(bebes.len(), 1);
        assert_eq!(
            bebes[0].description,
            "Perceber que suas ações têm efeitos nas outras crianças."
        );
        assert_eq!(tree.objetivos_aprendizagem["EI02"].len(), 1);
        assert_eq!(counts.ei_objectives, 2);
        assert_eq!(tree.metadata.total_habilidades, 2);
    }

    #[test]
    fn pages_without_coded_tables_fall_back_to_text() {
        let (tree, _) = run_pages(vec![Page {
            text: "CORPO, GESTOS E MOVIMENTOS\n(EI03CG01) Criar com o corpo formas diversificadas\nde expressão de sentimentos.".to_string(),
            ..Page::default()
        }]);

        let entries = &tree.objetivos_aprendizagem["EI03"]["Corpo, gestos e movimentos"];
        assert_eq!(
            entries[0].description,
            "Criar com o corpo formas diversificadas de expressão de sentimentos."
        );
    }

    #[test]
    fn synthesis_rows_are_segmented_into_sentences() {
        let table = Table::new(vec![row(&[
            Some("Traços, sons, cores e formas"),
            Some("Discriminar os diferentes tipos de sons e ritmos e interagir com a música\nExpressar-se por meio das artes visuais, utilizando diferentes materiais."),
        ])]);
        let (tree, counts) = run_pages(vec![Page {
            tables: vec![table],
            ..Page::default()
        }]);

        let synthesis = &tree.sintese_aprendizagens["Traços, sons, cores e formas"];
        assert_eq!(
            synthesis,
            &vec![
                "Discriminar os diferentes tipos de sons e ritmos e interagir com a música.".to_string(),
                "Expressar-se por meio das artes visuais, utilizando diferentes materiais.".to_string(),
            ]
        );
        assert_eq!(counts.ei_synthesis_entries, 2);
        assert_eq!(tree.objective_count(), 0);
    }
}

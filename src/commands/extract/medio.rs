use std::collections::HashSet;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::ExtractCounts;

use super::codes::{CodeMatcher, Tier};
use super::context::field_label;
use super::normalize::{keyword_key, normalize_line};
use super::source::PageContent;
use super::text::{continues_run, ends_sentence};
use super::tree::{CodedEntry, TreeMetadata};

pub const PORTUGUESE_TAG: &str = "LP";
pub const PORTUGUESE: &str = "Língua Portuguesa";
pub const PORTUGUESE_EXPECTED: usize = 54;
const DEFAULT_FIELD: &str = "Todos os campos de atuação";
const FIELD_BANNER_MAX_CHARS: usize = 80;

#[derive(Debug, PartialEq, Eq)]
pub struct MedioArea {
    pub tag: &'static str,
    pub name: &'static str,
    pub expected_codes: usize,
}

pub const MEDIO_AREAS: &[MedioArea] = &[
    MedioArea {
        tag: "LGG",
        name: "Linguagens e suas Tecnologias",
        expected_codes: 28,
    },
    MedioArea {
        tag: "MAT",
        name: "Matemática e suas Tecnologias",
        expected_codes: 43,
    },
    MedioArea {
        tag: "CNT",
        name: "Ciências da Natureza e suas Tecnologias",
        expected_codes: 26,
    },
    MedioArea {
        tag: "CHS",
        name: "Ciências Humanas e Sociais Aplicadas",
        expected_codes: 32,
    },
];

pub fn medio_area(tag: &str) -> Option<&'static MedioArea> {
    MEDIO_AREAS.iter().find(|area| area.tag == tag)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificCompetency {
    pub numero: u32,
    #[serde(default)]
    pub texto: String,
    pub habilidades: Vec<CodedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSkills {
    pub habilidades: Vec<CodedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedioComponent {
    pub campos_de_atuacao: IndexMap<String, FieldSkills>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedioAreaNode {
    pub competencias_especificas: Vec<SpecificCompetency>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub componentes: IndexMap<String, MedioComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedioTree {
    pub metadata: TreeMetadata,
    #[serde(flatten)]
    pub areas: IndexMap<String, MedioAreaNode>,
}

impl MedioTree {
    pub fn skills(&self) -> impl Iterator<Item = &CodedEntry> {
        self.areas.values().flat_map(|area| {
            area.competencias_especificas
                .iter()
                .flat_map(|competency| competency.habilidades.iter())
                .chain(
                    area.componentes
                        .values()
                        .flat_map(|component| component.campos_de_atuacao.values())
                        .flat_map(|field| field.habilidades.iter()),
                )
        })
    }
}

#[derive(Debug)]
struct SkillRun {
    text: String,
    field: String,
}

#[derive(Debug)]
struct CompetencyStatement {
    number: u32,
    text: String,
}

/// Ensino Médio skills read from page text.
#[derive(Debug)]
pub struct MedioExtractor<'a> {
    codes: &'a CodeMatcher,
    competency_heading: Regex,
    field: String,
    runs: Vec<SkillRun>,
    open_run: bool,
    statement: Option<CompetencyStatement>,
    statements: Vec<(u32, String, usize)>,
}

impl<'a> MedioExtractor<'a> {
    pub fn new(codes: &'a CodeMatcher) -> Result<Self> {
        Ok(Self {
            codes,
            competency_heading: Regex::new(r"^COMPETENCIA ESPECIFICA\s+(\d{1,2})\b")
                .context("failed to compile competency heading regex")?,
            field: DEFAULT_FIELD.to_string(),
            runs: Vec::new(),
            open_run: false,
            statement: None,
            statements: Vec::new(),
        })
    }

    /// Lines continue across page breaks; runs are resolved in `finish`.
    pub fn process_page(&mut self, page: &PageContent<'_>) {
        for line in page.text().lines().map(normalize_line).filter(|line| !line.is_empty()) {
            self.read_line(line);
        }
        debug!(page = page.number(), runs = self.runs.len(), "read page text");
    }

    fn read_line(&mut self, line: String) {
        let key = keyword_key(&line);

        if let Some(number) = self
            .competency_heading
            .captures(&key)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<u32>().ok())
        {
            self.close_statement();
            self.statement = Some(CompetencyStatement {
                number,
                text: String::new(),
            });
            self.open_run = false;
            return;
        }

        if is_field_banner(&line, &key) {
            self.close_statement();
            self.field = field_label(&line);
            self.open_run = false;
            return;
        }

        if self.codes.contains_code(Tier::Medio, &line) {
            self.close_statement();
            self.runs.push(SkillRun {
                text: line,
                field: self.field.clone(),
            });
            self.open_run = true;
            return;
        }

        if key.starts_with("HABILIDADES") {
            self.close_statement();
            return;
        }

        if let Some(statement) = self.statement.as_mut() {
            if !statement.text.is_empty() {
                statement.text.push(' ');
            }
            statement.text.push_str(&line);
            return;
        }

        match self.runs.last_mut() {
            Some(run) if self.open_run && continues_run(&run.text, &line, self.codes) => {
                run.text.push(' ');
                run.text.push_str(&line);
            }
            _ => self.open_run = false,
        }
    }

    /// The statement belongs to the area of the first skill read after it.
    fn close_statement(&mut self) {
        if let Some(statement) = self.statement.take()
            && !statement.text.is_empty()
        {
            self.statements
                .push((statement.number, statement.text, self.runs.len()));
        }
    }

    pub fn finish(mut self, source_sha256: &str, counts: &mut ExtractCounts) -> MedioTree {
        self.close_statement();

        let mut tree = MedioTree {
            metadata: TreeMetadata {
                etapa: "Ensino Médio".to_string(),
                ..TreeMetadata::default()
            },
            areas: MEDIO_AREAS
                .iter()
                .map(|area| (area.name.to_string(), MedioAreaNode::default()))
                .collect(),
        };
        let mut seen = HashSet::new();
        let mut run_areas = Vec::with_capacity(self.runs.len());

        for run in &self.runs {
            let found = self.codes.find_all(Tier::Medio, &run.text);
            run_areas.push(found.first().map(|skill| skill.tag.clone()));

            for skill in &found {
                if skill.periods().is_empty() {
                    warn!(code = %skill.code, "unrecognized series block, skipped");
                    continue;
                }
                if !seen.insert(skill.code.clone()) {
                    continue;
                }

                if skill.tag == PORTUGUESE_TAG {
                    tree.areas
                        .entry(MEDIO_AREAS[0].name.to_string())
                        .or_default()
                        .componentes
                        .entry(PORTUGUESE.to_string())
                        .or_default()
                        .campos_de_atuacao
                        .entry(run.field.clone())
                        .or_default()
                        .habilidades
                        .push(CodedEntry::from(skill));
                    counts.em_skills += 1;
                    continue;
                }

                let Some(area) = medio_area(&skill.tag) else {
                    warn!(code = %skill.code, tag = %skill.tag, "unrecognized area, skipped");
                    continue;
                };
                let number = skill
                    .serial
                    .chars()
                    .next()
                    .and_then(|digit| digit.to_digit(10))
                    .unwrap_or(0);
                competency_entry(&mut tree, area.name, number)
                    .habilidades
                    .push(CodedEntry::from(skill));
                counts.em_skills += 1;
            }
        }

        for (number, text, next_run) in &self.statements {
            let area = run_areas
                .iter()
                .skip(*next_run)
                .flatten()
                .find_map(|tag| medio_area(tag));
            if let Some(area) = area {
                let competency = competency_entry(&mut tree, area.name, *number);
                if competency.texto.is_empty() {
                    competency.texto = text.clone();
                }
            }
        }

        for area in tree.areas.values_mut() {
            area.competencias_especificas
                .sort_by_key(|competency| competency.numero);
        }

        tree.metadata.fonte_sha256 = source_sha256.to_string();
        tree.metadata.total_habilidades = tree.skills().count();
        tree.metadata.codigos_unicos = seen.len();
        tree
    }
}

fn competency_entry<'t>(tree: &'t mut MedioTree, area: &str, number: u32) -> &'t mut SpecificCompetency {
    let competencies = &mut tree
        .areas
        .entry(area.to_string())
        .or_default()
        .competencias_especificas;
    let index = match competencies
        .iter()
        .position(|competency| competency.numero == number)
    {
        Some(index) => index,
        None => {
            competencies.push(SpecificCompetency {
                numero: number,
                ..SpecificCompetency::default()
            });
            competencies.len() - 1
        }
    };
    &mut competencies[index]
}

/// Upper-case `CAMPO …` banners of the Portuguese section.
fn is_field_banner(line: &str, key: &str) -> bool {
    if key.starts_with("TODOS OS CAMPOS") {
        return true;
    }
    key.starts_with("CAMPO ")
        && line.chars().count() <= FIELD_BANNER_MAX_CHARS
        && !line.chars().any(char::is_lowercase)
        && !ends_sentence(line)
}

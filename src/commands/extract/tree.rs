use std::collections::{BTreeMap, BTreeSet, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::catalog::Competency;
use super::codes::CodeMatch;
use super::context::ContextEntry;
use super::subjects::{AREAS, SUBJECTS, profile_for_tag};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedItem {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "anos_aplicaveis")]
    pub periods: Vec<u8>,
    /// Labels of the ancestors the item was resolved under.
    #[serde(skip)]
    pub tier_path: Vec<String>,
}

/// A code with its text, for stages where the code alone places the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedEntry {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "descricao")]
    pub description: String,
}

impl From<&CodeMatch> for CodedEntry {
    fn from(found: &CodeMatch) -> Self {
        Self {
            code: found.code.clone(),
            description: found.description.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectGroup {
    #[serde(rename = "objetos")]
    pub objects: Vec<String>,
    #[serde(rename = "habilidades")]
    pub items: Vec<CodedItem>,
}

impl ObjectGroup {
    fn has_object_set(&self, key: &BTreeSet<&str>) -> bool {
        self.objects.iter().map(String::as_str).collect::<BTreeSet<&str>>() == *key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitNode {
    /// Practices under a field of practice, for components organised by field.
    #[serde(rename = "praticas", default, skip_serializing_if = "IndexMap::is_empty")]
    pub practices: IndexMap<String, Vec<ObjectGroup>>,
    #[serde(rename = "grupos", default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ObjectGroup>,
}

pub type PeriodNode = IndexMap<String, UnitNode>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectNode {
    #[serde(rename = "competencias_especificas")]
    pub competencies: Vec<Competency>,
    #[serde(rename = "anos")]
    pub periods: BTreeMap<String, PeriodNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaNode {
    #[serde(rename = "competencias_especificas_area")]
    pub competencies: Vec<Competency>,
    #[serde(rename = "componentes")]
    pub subjects: IndexMap<String, SubjectNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeMetadata {
    pub etapa: String,
    pub fonte_sha256: String,
    pub total_habilidades: usize,
    pub codigos_unicos: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTree {
    pub metadata: TreeMetadata,
    #[serde(flatten)]
    pub areas: IndexMap<String, AreaNode>,
}

impl ResultTree {
    /// Every area and component present up front, in curriculum order.
    pub fn seeded() -> Self {
        let mut areas = IndexMap::new();
        for area in AREAS {
            let mut node = AreaNode::default();
            for subject in SUBJECTS.iter().filter(|subject| subject.area == area.name) {
                node.subjects
                    .insert(subject.name.to_string(), SubjectNode::default());
            }
            areas.insert(area.name.to_string(), node);
        }

        Self {
            metadata: TreeMetadata {
                etapa: "Ensino Fundamental".to_string(),
                ..TreeMetadata::default()
            },
            areas,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &CodedItem> {
        self.areas
            .values()
            .flat_map(|area| area.subjects.values())
            .flat_map(|subject| subject.periods.values())
            .flat_map(|period| period.values())
            .flat_map(|unit| unit.practices.values().flatten().chain(unit.groups.iter()))
            .flat_map(|group| group.items.iter())
    }
}

pub fn period_key(year: u8) -> String {
    format!("{year}º Ano")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { replicas: usize },
    Duplicate,
    UnknownTag,
    NoPeriods,
}

#[derive(Debug)]
pub struct TreeAssembler {
    tree: ResultTree,
}

impl Default for TreeAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeAssembler {
    pub fn new() -> Self {
        Self {
            tree: ResultTree::seeded(),
        }
    }

    pub fn tree(&self) -> &ResultTree {
        &self.tree
    }

    /// Places a coded item under every period its code covers.
    pub fn insert(&mut self, found: &CodeMatch, context: &ContextEntry) -> InsertOutcome {
        let Some(profile) = profile_for_tag(&found.tag) else {
            warn!(code = %found.code, tag = %found.tag, "unrecognized sub-component, skipped");
            return InsertOutcome::UnknownTag;
        };

        let periods = found.periods();
        if periods.is_empty() {
            warn!(code = %found.code, "code has no known period block, skipped");
            return InsertOutcome::NoPeriods;
        }

        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let field = profile.uses_fields.then(|| {
            non_empty(&context.field).unwrap_or_else(|| profile.default_field.to_string())
        });
        let unit = non_empty(&context.unit).unwrap_or_else(|| profile.default_unit.to_string());
        let mut objects = context.objects();
        if objects.is_empty() {
            objects.push(profile.default_object.to_string());
        }
        let object_key = objects.iter().map(String::as_str).collect::<BTreeSet<&str>>();

        let subject = self
            .tree
            .areas
            .entry(profile.area.to_string())
            .or_default()
            .subjects
            .entry(profile.name.to_string())
            .or_default();

        let mut replicas = 0usize;
        for year in &periods {
            let period_label = period_key(*year);
            let period = subject.periods.entry(period_label.clone()).or_default();

            let groups = match &field {
                Some(field) => period
                    .entry(field.clone())
                    .or_default()
                    .practices
                    .entry(unit.clone())
                    .or_default(),
                None => &mut period.entry(unit.clone()).or_default().groups,
            };

            let group_index = match groups
                .iter()
                .position(|group| group.has_object_set(&object_key))
            {
                Some(index) => index,
                None => {
                    groups.push(ObjectGroup {
                        objects: objects.clone(),
                        items: Vec::new(),
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[group_index];

            if group.items.iter().any(|item| item.code == found.code) {
                continue;
            }

            let mut tier_path = vec![
                profile.area.to_string(),
                profile.name.to_string(),
                period_label,
            ];
            tier_path.extend(field.clone());
            tier_path.push(unit.clone());
            tier_path.push(objects.join("; "));

            group.items.push(CodedItem {
                code: found.code.clone(),
                description: found.description.clone(),
                periods: periods.clone(),
                tier_path,
            });
            if let Some(item) = group.items.last() {
                debug!(code = %item.code, path = %item.tier_path.join(" > "), "item placed");
            }
            replicas += 1;
        }

        if replicas == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted { replicas }
        }
    }

    pub fn set_area_competencies(&mut self, area: &str, competencies: Vec<Competency>) {
        self.tree
            .areas
            .entry(area.to_string())
            .or_default()
            .competencies = competencies;
    }

    pub fn set_subject_competencies(
        &mut self,
        area: &str,
        subject: &str,
        competencies: Vec<Competency>,
    ) {
        self.tree
            .areas
            .entry(area.to_string())
            .or_default()
            .subjects
            .entry(subject.to_string())
            .or_default()
            .competencies = competencies;
    }

    pub fn finish(mut self, source_sha256: &str) -> ResultTree {
        let mut unique = HashSet::new();
        let mut total = 0usize;
        for item in self.tree.items() {
            unique.insert(item.code.clone());
            total += 1;
        }

        self.tree.metadata.fonte_sha256 = source_sha256.to_string();
        self.tree.metadata.total_habilidades = total;
        self.tree.metadata.codigos_unicos = unique.len();
        self.tree
    }
}

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::subjects::SUBJECTS;
use super::tree::{ResultTree, UnitNode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectStats {
    pub area: String,
    pub codigos_unicos: usize,
    pub codigos_esperados: usize,
    pub competencias: usize,
    /// Items per year, replicas of multi-year codes included.
    pub habilidades_por_ano: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub etapa: String,
    pub total_habilidades: usize,
    pub codigos_unicos: usize,
    pub codigos_esperados: usize,
    pub componentes: IndexMap<String, SubjectStats>,
}

fn unit_items(unit: &UnitNode) -> impl Iterator<Item = &str> {
    unit.practices
        .values()
        .flatten()
        .chain(unit.groups.iter())
        .flat_map(|group| group.items.iter().map(|item| item.code.as_str()))
}

pub fn build_stats(tree: &ResultTree) -> ExtractionStats {
    let mut stats = ExtractionStats {
        etapa: tree.metadata.etapa.clone(),
        total_habilidades: tree.metadata.total_habilidades,
        codigos_unicos: tree.metadata.codigos_unicos,
        codigos_esperados: SUBJECTS.iter().map(|subject| subject.expected_codes).sum(),
        componentes: IndexMap::new(),
    };

    for profile in SUBJECTS {
        let Some(subject) = tree
            .areas
            .get(profile.area)
            .and_then(|area| area.subjects.get(profile.name))
        else {
            continue;
        };

        let mut unique = HashSet::new();
        let mut per_year = BTreeMap::new();
        for (year, period) in &subject.periods {
            let codes = period.values().flat_map(unit_items).collect::<Vec<&str>>();
            per_year.insert(year.clone(), codes.len());
            unique.extend(codes);
        }

        stats.componentes.insert(
            profile.name.to_string(),
            SubjectStats {
                area: profile.area.to_string(),
                codigos_unicos: unique.len(),
                codigos_esperados: profile.expected_codes,
                competencias: subject.competencies.len(),
                habilidades_por_ano: per_year,
            },
        );
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::extract::codes::{CodeMatcher, Tier};
    use crate::commands::extract::context::ContextEntry;
    use crate::commands::extract::tree::TreeAssembler;

    #[test]
    fn stats_count_replicas_per_year_and_codes_once() {
        let codes = CodeMatcher::new().expect("code regexes compile");
        let mut assembler = TreeAssembler::new();
        for found in codes.find_all(Tier::Fundamental, "(EF12AR01) Explorar (EF01AR02) Criar") {
            assembler.insert(&found, &ContextEntry::default());
        }

        let stats = build_stats(&assembler.finish("sha"));
        let arte = &stats.componentes["Arte"];

        assert_eq!(arte.codigos_unicos, 2);
        assert_eq!(arte.codigos_esperados, 61);
        assert_eq!(arte.habilidades_por_ano["1º Ano"], 2);
        assert_eq!(arte.habilidades_por_ano["2º Ano"], 1);
        assert_eq!(stats.componentes["Matemática"].codigos_unicos, 0);
        assert_eq!(stats.total_habilidades, 3);
    }
}

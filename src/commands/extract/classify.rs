use crate::model::Table;

use super::codes::{CodeMatcher, Tier};
use super::context::is_field_heading;
use super::labels::is_label;
use super::normalize::{flatten_cell, keyword_key, normalize_row};

/// Rows inspected when the header row says nothing useful.
const SCAN_ROWS: usize = 4;
const HEADER_CELL_MAX_CHARS: usize = 60;

const COMPETENCY_KEYWORDS: &[&str] = &["COMPETENCIAS ESPECIFICAS"];
const ITEM_KEYWORDS: &[&str] = &["HABILIDADES", "OBJETIVOS DE APRENDIZAGEM"];
const CONTEXT_KEYWORDS: &[&str] = &[
    "UNIDADES TEMATICAS",
    "UNIDADE TEMATICA",
    "OBJETOS DE CONHECIMENTO",
    "OBJETO DE CONHECIMENTO",
    "PRATICAS DE LINGUAGEM",
    "CAMPOS DE ATUACAO",
    "CAMPO DE ATUACAO",
    "EIXOS",
    "EIXO",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Context,
    Item,
    Competency,
    Unknown,
}

impl TableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TableKind::Context => "context",
            TableKind::Item => "item",
            TableKind::Competency => "competency",
            TableKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: TableKind,
    /// The first row is a column header and carries no data.
    pub has_header: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRole {
    Field,
    Unit,
    Object,
    Items,
}

/// Role of a header cell, if it reads like one of the known column titles.
pub fn header_role(cell: &str) -> Option<HeaderRole> {
    if cell.chars().count() > HEADER_CELL_MAX_CHARS {
        return None;
    }

    let key = keyword_key(cell.trim());
    if ITEM_KEYWORDS.iter().any(|keyword| key.starts_with(keyword)) {
        return Some(HeaderRole::Items);
    }
    if key.starts_with("OBJETO") {
        return Some(HeaderRole::Object);
    }
    if key.starts_with("CAMPO") {
        return Some(HeaderRole::Field);
    }
    if CONTEXT_KEYWORDS.iter().any(|keyword| key.starts_with(keyword)) {
        return Some(HeaderRole::Unit);
    }
    None
}

fn header_kind(cells: &[String]) -> Option<TableKind> {
    let keys = cells
        .iter()
        .filter(|cell| !cell.is_empty() && cell.chars().count() <= HEADER_CELL_MAX_CHARS)
        .map(|cell| keyword_key(&flatten_cell(cell)))
        .collect::<Vec<String>>();

    let has = |keywords: &[&str]| {
        keys.iter()
            .any(|key| keywords.iter().any(|keyword| key.starts_with(keyword)))
    };

    if has(COMPETENCY_KEYWORDS) {
        Some(TableKind::Competency)
    } else if has(ITEM_KEYWORDS) {
        Some(TableKind::Item)
    } else if has(CONTEXT_KEYWORDS) {
        Some(TableKind::Context)
    } else {
        None
    }
}

pub fn classify(table: &Table, codes: &CodeMatcher, tier: Tier) -> Classification {
    let Some(first_row) = table.rows.first() else {
        return Classification {
            kind: TableKind::Unknown,
            has_header: false,
        };
    };

    if let Some(kind) = header_kind(&normalize_row(first_row)) {
        return Classification {
            kind,
            has_header: true,
        };
    }

    let scanned = table
        .rows
        .iter()
        .take(SCAN_ROWS)
        .map(normalize_row)
        .collect::<Vec<Vec<String>>>();

    let has_code = scanned
        .iter()
        .flatten()
        .any(|cell| codes.contains_code(tier, &flatten_cell(cell)));

    let kind = if has_code {
        if table.column_count() <= 1 {
            TableKind::Item
        } else {
            TableKind::Unknown
        }
    } else if scanned
        .iter()
        .flatten()
        .any(|cell| is_field_heading(cell) || is_label(&flatten_cell(cell), codes))
    {
        TableKind::Context
    } else {
        TableKind::Unknown
    };

    Classification {
        kind,
        has_header: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[Option<&str>]]) -> Table {
        Table::new(
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
                .collect(),
        )
    }

    fn kind_of(table: &Table) -> Classification {
        let codes = CodeMatcher::new().expect("code regexes compile");
        classify(table, &codes, Tier::Fundamental)
    }

    #[test]
    fn header_keywords_decide_the_kind() {
        let context = table(&[
            &[Some("UNIDADES TEMÁTICAS"), Some("OBJETOS DE CONHECIMENTO")],
            &[Some("Números"), Some("Contagem")],
        ]);
        assert_eq!(
            kind_of(&context),
            Classification {
                kind: TableKind::Context,
                has_header: true
            }
        );

        let items = table(&[&[Some("HABILIDADES")], &[Some("(EF01MA01) Utilizar números")]]);
        assert_eq!(kind_of(&items).kind, TableKind::Item);

        let competency = table(&[&[Some("COMPETÊNCIAS ESPECÍFICAS DE MATEMÁTICA")]]);
        assert_eq!(kind_of(&competency).kind, TableKind::Competency);
    }

    #[test]
    fn item_keyword_wins_over_context_keywords() {
        let mixed = table(&[&[
            Some("UNIDADES TEMÁTICAS"),
            Some("OBJETOS DE CONHECIMENTO"),
            Some("HABILIDADES"),
        ]]);
        assert_eq!(kind_of(&mixed).kind, TableKind::Item);
    }

    #[test]
    fn headerless_tables_are_scanned_for_codes() {
        let items = table(&[&[Some("(EF02MA03) Comparar quantidades")]]);
        assert_eq!(
            kind_of(&items),
            Classification {
                kind: TableKind::Item,
                has_header: false
            }
        );

        let ambiguous = table(&[&[Some("Geometria"), Some("(EF03MA13) Associar figuras")]]);
        assert_eq!(kind_of(&ambiguous).kind, TableKind::Unknown);

        let context = table(&[&[Some("Grandezas e medidas"), None]]);
        assert_eq!(kind_of(&context).kind, TableKind::Context);

        let noise = table(&[&[Some("245"), Some("")]]);
        assert_eq!(kind_of(&noise).kind, TableKind::Unknown);
    }

    #[test]
    fn header_roles_follow_column_titles() {
        assert_eq!(header_role("PRÁTICAS DE LINGUAGEM"), Some(HeaderRole::Unit));
        assert_eq!(header_role("OBJETOS DE CONHECIMENTO"), Some(HeaderRole::Object));
        assert_eq!(header_role("CAMPOS DE ATUAÇÃO"), Some(HeaderRole::Field));
        assert_eq!(header_role("HABILIDADES"), Some(HeaderRole::Items));
        assert_eq!(header_role("Números"), None);
    }
}

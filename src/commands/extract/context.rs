//! Carry-forward state for merged grid cells.
//!
//! Context tables list fields, units and knowledge objects without codes; the
//! item table that follows is read row by row against the list they produce.
//! Blank cells inherit the last value seen for their column.

use crate::model::Table;

use super::classify::{HeaderRole, header_role};
use super::codes::CodeMatcher;
use super::labels::is_label;
use super::normalize::{flatten_cell, keyword_key, normalize_row};
use super::segment::Segmenter;

/// Joins the knowledge objects of one cell while keeping them apart.
pub const OBJECT_MARKER: &str = "||";

const FIELD_HEADING_MIN_CHARS: usize = 40;
const FIELD_DASHES: &[&str] = &[" – ", " — ", " - "];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextEntry {
    pub field: Option<String>,
    pub unit: Option<String>,
    pub object: Option<String>,
}

impl ContextEntry {
    pub fn objects(&self) -> Vec<String> {
        self.object.as_deref().map(split_objects).unwrap_or_default()
    }
}

pub fn join_objects(objects: &[String]) -> String {
    objects.join(OBJECT_MARKER)
}

pub fn split_objects(joined: &str) -> Vec<String> {
    joined
        .split(OBJECT_MARKER)
        .map(str::trim)
        .filter(|object| !object.is_empty())
        .map(str::to_string)
        .collect()
}

/// `CAMPO DA VIDA COTIDIANA – Campo de atuação relativo…` or the
/// `TODOS OS CAMPOS DE ATUAÇÃO` banner, as opposed to a short practice label.
pub fn is_field_heading(cell: &str) -> bool {
    let flat = flatten_cell(cell);
    if keyword_key(&flat).starts_with("TODOS OS CAMPOS") {
        return true;
    }

    let Some((head, tail)) = split_on_dash(&flat) else {
        return false;
    };
    keyword_key(head).starts_with("CAMPO")
        && !tail.trim().is_empty()
        && flat.chars().count() >= FIELD_HEADING_MIN_CHARS
}

pub fn field_label(cell: &str) -> String {
    let flat = flatten_cell(cell);
    if keyword_key(&flat).starts_with("TODOS OS CAMPOS") {
        return "Todos os campos de atuação".to_string();
    }

    let head = split_on_dash(&flat).map(|(head, _)| head).unwrap_or(&flat);
    sentence_case(head.trim())
}

fn split_on_dash(text: &str) -> Option<(&str, &str)> {
    FIELD_DASHES
        .iter()
        .filter_map(|dash| text.find(dash).map(|index| (index, dash.len())))
        .min_by_key(|(index, _)| *index)
        .map(|(index, len)| (&text[..index], &text[index + len..]))
}

fn sentence_case(text: &str) -> String {
    let has_lowercase = text.chars().any(char::is_lowercase);
    if has_lowercase {
        return text.to_string();
    }

    let lowered = text.to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub field: Option<usize>,
    pub unit: Option<usize>,
    pub object: Option<usize>,
}

impl ColumnRoles {
    /// Roles named by a header row, if it names any context column.
    pub fn from_header(cells: &[String]) -> Option<Self> {
        let mut roles = Self::default();
        for (index, cell) in cells.iter().enumerate() {
            match header_role(&flatten_cell(cell)) {
                Some(HeaderRole::Field) => roles.field = Some(index),
                Some(HeaderRole::Unit) => roles.unit = Some(index),
                Some(HeaderRole::Object) => roles.object = Some(index),
                Some(HeaderRole::Items) | None => {}
            }
        }

        if roles == Self::default() {
            None
        } else {
            Some(roles)
        }
    }

    /// Roles of a context table by column position alone.
    pub fn for_context_columns(column_count: usize) -> Self {
        match column_count {
            0 => Self::default(),
            1 => Self {
                unit: Some(0),
                ..Self::default()
            },
            2 => Self {
                unit: Some(0),
                object: Some(1),
                ..Self::default()
            },
            count => Self {
                field: Some(0),
                unit: Some(count - 2),
                object: Some(count - 1),
            },
        }
    }

    /// Roles of the columns left of the coded column in an item table.
    pub fn for_inline_columns(context_columns: usize) -> Self {
        match context_columns {
            0 => Self::default(),
            1 => Self {
                object: Some(0),
                ..Self::default()
            },
            count => Self::for_context_columns(count),
        }
    }
}

#[derive(Debug, Default)]
pub struct ContextTracker {
    segmenter: Segmenter,
    last: ContextEntry,
    positional: Vec<ContextEntry>,
    cursor: usize,
}

impl ContextTracker {
    pub fn new(segmenter: Segmenter) -> Self {
        Self {
            segmenter,
            ..Self::default()
        }
    }

    pub fn current(&self) -> &ContextEntry {
        &self.last
    }

    pub fn positional(&self) -> &[ContextEntry] {
        &self.positional
    }

    /// Forgets everything; a new subject must not inherit labels.
    pub fn reset(&mut self) {
        self.last = ContextEntry::default();
        self.positional.clear();
        self.cursor = 0;
    }

    pub fn set_field(&mut self, cell: &str) {
        self.last.field = Some(field_label(cell));
    }

    /// Reads a context table into one forward-filled entry per data row and
    /// caches the list as the positional map for the next item rows.
    pub fn update_from_context_table(
        &mut self,
        table: &Table,
        has_header: bool,
        codes: &CodeMatcher,
    ) -> &[ContextEntry] {
        let mut rows = table.rows.iter().map(normalize_row);
        let header_roles = if has_header {
            rows.next().and_then(|cells| ColumnRoles::from_header(&cells))
        } else {
            None
        };
        let roles = header_roles
            .unwrap_or_else(|| ColumnRoles::for_context_columns(table.column_count()));

        // Field-heading rows keep their slot; the item table repeats them.
        let mut entries = Vec::new();
        for cells in rows {
            self.apply_row(&cells, roles, codes);
            entries.push(self.last.clone());
        }

        self.positional = entries;
        self.cursor = 0;
        &self.positional
    }

    /// Entry aligned with the next item-table row. Past the end of the cached
    /// list the last known entry is reused.
    pub fn next_positional(&mut self) -> ContextEntry {
        let entry = self
            .positional
            .get(self.cursor)
            .cloned()
            .unwrap_or_else(|| self.last.clone());
        self.cursor += 1;
        entry
    }

    /// Updates state from context cells carried inline by an item-table row.
    pub fn apply_inline(
        &mut self,
        cells: &[String],
        roles: ColumnRoles,
        codes: &CodeMatcher,
    ) -> ContextEntry {
        self.apply_row(cells, roles, codes);
        self.last.clone()
    }

    fn apply_row(&mut self, cells: &[String], roles: ColumnRoles, codes: &CodeMatcher) {
        let cell_at = |index: Option<usize>| {
            index
                .and_then(|index| cells.get(index))
                .map(String::as_str)
                .filter(|cell| !cell.is_empty())
        };

        if let Some(heading) = cells.iter().find(|cell| is_field_heading(cell)) {
            self.set_field(heading);
        }

        if let Some(cell) = cell_at(roles.field)
            && !is_field_heading(cell)
        {
            let label = flatten_cell(cell);
            if is_label(&label, codes) {
                self.last.field = Some(label);
            }
        }

        if let Some(cell) = cell_at(roles.unit)
            && !is_field_heading(cell)
        {
            let label = flatten_cell(cell);
            if is_label(&label, codes) {
                self.last.unit = Some(label);
            }
        }

        if let Some(cell) = cell_at(roles.object)
            && !is_field_heading(cell)
        {
            let objects = self.object_labels(cell, codes);
            if !objects.is_empty() {
                self.last.object = Some(join_objects(&objects));
            }
        }
    }

    fn object_labels(&self, cell: &str, codes: &CodeMatcher) -> Vec<String> {
        self.segmenter
            .segment(cell)
            .into_iter()
            .filter(|segment| is_label(segment, codes))
            .collect()
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Regular,
    Italic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyledChar {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    pub top: f64,
    #[serde(default)]
    pub font_style: FontStyle,
}

/// A grid row. `None` marks a cell merged with its neighbour above or to the left.
pub type Row = Vec<Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    /// One-based page number in the source document; 0 when the dump omits it.
    #[serde(default)]
    pub number: usize,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub chars: Vec<StyledChar>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridStrategy {
    Lines,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSettings {
    pub vertical_strategy: GridStrategy,
    pub horizontal_strategy: GridStrategy,
    pub intersection_y_tolerance: f64,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            vertical_strategy: GridStrategy::Lines,
            horizontal_strategy: GridStrategy::Lines,
            intersection_y_tolerance: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractPaths {
    pub input_path: String,
    pub output_dir: String,
    pub competencies_path: Option<String>,
    pub artifacts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractCounts {
    pub page_count: usize,
    pub ef_pages_processed: usize,
    pub ei_pages_processed: usize,
    pub em_pages_processed: usize,
    pub context_tables: usize,
    pub item_tables: usize,
    pub competency_tables: usize,
    pub fallback_tables: usize,
    pub skipped_tables: usize,
    pub subject_changes: usize,
    pub ef_items_inserted: usize,
    pub ef_duplicates_suppressed: usize,
    pub ef_unknown_tags: usize,
    pub ef_invalid_periods: usize,
    pub competencies_harvested: usize,
    pub ef_unique_codes: usize,
    pub ei_objectives: usize,
    pub ei_synthesis_entries: usize,
    pub em_skills: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub source_sha256: String,
    pub table_settings: TableSettings,
    pub paths: ExtractPaths,
    pub counts: ExtractCounts,
    pub warnings: Vec<String>,
}

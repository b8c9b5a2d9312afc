use std::cell::Cell;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{info, warn};

use crate::model::{Page, StyledChar, Table, TableSettings};
use crate::util::read_json;

/// Page-level access to the source document.
pub trait DocumentSource {
    fn page_count(&self) -> usize;
    fn page(&self, index: usize) -> Option<PageContent<'_>>;
}

/// Read-only view of one page.
#[derive(Debug, Clone, Copy)]
pub struct PageContent<'a> {
    page: &'a Page,
    produced_with: &'a TableSettings,
    mismatch_reported: &'a Cell<bool>,
}

impl<'a> PageContent<'a> {
    pub fn number(&self) -> usize {
        self.page.number
    }

    pub fn text(&self) -> &'a str {
        &self.page.text
    }

    /// Tables of the page. A dump only holds the grids it was produced with;
    /// asking for other settings returns those grids and warns once.
    pub fn tables(&self, settings: &TableSettings) -> &'a [Table] {
        if settings != self.produced_with && !self.mismatch_reported.replace(true) {
            warn!(
                requested = ?settings,
                produced_with = ?self.produced_with,
                "table settings differ from the ones the page dump was produced with"
            );
        }
        &self.page.tables
    }

    pub fn styled_chars(&self) -> &'a [StyledChar] {
        &self.page.chars
    }
}

#[derive(Debug, Deserialize)]
struct PageDump {
    #[serde(default)]
    table_settings: TableSettings,
    pages: Vec<Page>,
}

/// Pages read from a JSON dump written by an external PDF extractor.
#[derive(Debug)]
pub struct PageDumpSource {
    settings: TableSettings,
    pages: Vec<Page>,
    mismatch_reported: Cell<bool>,
}

impl PageDumpSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("input page dump not found: {}", path.display());
        }

        let dump: PageDump =
            read_json(path).with_context(|| format!("invalid page dump {}", path.display()))?;
        info!(
            path = %path.display(),
            pages = dump.pages.len(),
            "loaded page dump"
        );
        Ok(Self::from_pages(dump.pages, dump.table_settings))
    }

    pub fn from_pages(mut pages: Vec<Page>, settings: TableSettings) -> Self {
        for (index, page) in pages.iter_mut().enumerate() {
            if page.number == 0 {
                page.number = index + 1;
            }
        }

        Self {
            settings,
            pages,
            mismatch_reported: Cell::new(false),
        }
    }
}

impl DocumentSource for PageDumpSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Option<PageContent<'_>> {
        self.pages.get(index).map(|page| PageContent {
            page,
            produced_with: &self.settings,
            mismatch_reported: &self.mismatch_reported,
        })
    }
}

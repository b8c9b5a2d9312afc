use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::read_json;

use super::labels::{is_page_number, is_running_line};
use super::text::ends_sentence;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competency {
    #[serde(rename = "numero")]
    pub number: u32,
    #[serde(rename = "descricao")]
    pub description: String,
}

/// Competency statements keyed by area and by component name. The source
/// renders these blocks as graphics, so they come from reference data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetencyCatalog {
    #[serde(default, rename = "areas")]
    pub areas: IndexMap<String, Vec<Competency>>,
    #[serde(default, rename = "componentes")]
    pub subjects: IndexMap<String, Vec<Competency>>,
}

impl CompetencyCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path).with_context(|| format!("failed to load competencies {}", path.display()))
    }

    pub fn area(&self, name: &str) -> Option<&[Competency]> {
        self.areas
            .get(name)
            .map(Vec::as_slice)
            .filter(|list| !list.is_empty())
    }

    pub fn subject(&self, name: &str) -> Option<&[Competency]> {
        self.subjects
            .get(name)
            .map(Vec::as_slice)
            .filter(|list| !list.is_empty())
    }
}

/// Pulls `1. …`, `2. …` statements out of page text when the catalog has no
/// entry for a block.
#[derive(Debug)]
pub struct CompetencyHarvester {
    numbered: Regex,
}

impl CompetencyHarvester {
    pub fn new() -> Result<Self> {
        Ok(Self {
            numbered: Regex::new(r"^\s*(\d{1,2})\s*[\.\)]\s+(.+)$")
                .context("failed to compile numbered competency regex")?,
        })
    }

    pub fn harvest(&self, text: &str, limit: usize) -> Vec<Competency> {
        let mut found = Vec::<Competency>::new();

        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if is_page_number(line) || is_running_line(line) {
                continue;
            }
            if found.len() == limit
                && found
                    .last()
                    .is_some_and(|last| ends_sentence(&last.description))
            {
                break;
            }

            if let Some(captures) = self.numbered.captures(line) {
                let number = captures
                    .get(1)
                    .and_then(|value| value.as_str().parse::<u32>().ok());
                let body = captures.get(2).map(|value| value.as_str().trim());
                if let (Some(number), Some(body)) = (number, body)
                    && number as usize == found.len() + 1
                {
                    if found.len() == limit {
                        break;
                    }
                    found.push(Competency {
                        number,
                        description: body.to_string(),
                    });
                    continue;
                }
            }

            if let Some(last) = found.last_mut() {
                last.description.push(' ');
                last.description.push_str(line);
            }
        }

        found
    }
}

use std::ops::Range;

use anyhow::{Context, Result};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Infantil,
    Fundamental,
    Medio,
}

impl Tier {
    fn pattern(self) -> &'static str {
        match self {
            Tier::Infantil => r"\(?\b(EI(\d{2})([A-Z]{2})(\d{2}))\b\)?",
            Tier::Fundamental => r"\(?\b(EF(\d{2})([A-Z]{2})(\d{2}))\b\)?",
            Tier::Medio => r"\(?\b(EM(\d{2})([A-Z]{2,3})(\d{2,3}))\b\)?",
        }
    }

    /// Periods a code's digit block applies to; empty when the block is unknown.
    pub fn periods(self, digits: &str) -> Vec<u8> {
        match self {
            Tier::Fundamental => match digits {
                "12" => vec![1, 2],
                "15" => vec![1, 2, 3, 4, 5],
                "35" => vec![3, 4, 5],
                "67" => vec![6, 7],
                "69" => vec![6, 7, 8, 9],
                "89" => vec![8, 9],
                single => match single.parse::<u8>() {
                    Ok(year @ 1..=9) => vec![year],
                    _ => Vec::new(),
                },
            },
            Tier::Infantil => match digits {
                "01" => vec![1],
                "02" => vec![2],
                "03" => vec![3],
                _ => Vec::new(),
            },
            Tier::Medio => match digits {
                "13" => vec![1, 2, 3],
                _ => Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMatch {
    pub tier: Tier,
    pub code: String,
    /// Sub-component tag: subject for EF, experience field for EI, area for EM.
    pub tag: String,
    pub period_digits: String,
    pub serial: String,
    /// Byte span of the whole match, parentheses included.
    pub span: Range<usize>,
    /// Byte span from the end of this match to the start of the next one.
    pub description_span: Range<usize>,
    pub description: String,
}

impl CodeMatch {
    pub fn periods(&self) -> Vec<u8> {
        self.tier.periods(&self.period_digits)
    }
}

#[derive(Debug)]
pub struct CodeMatcher {
    infantil: Regex,
    fundamental: Regex,
    medio: Regex,
}

impl CodeMatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            infantil: Regex::new(Tier::Infantil.pattern())
                .context("failed to compile EI code regex")?,
            fundamental: Regex::new(Tier::Fundamental.pattern())
                .context("failed to compile EF code regex")?,
            medio: Regex::new(Tier::Medio.pattern()).context("failed to compile EM code regex")?,
        })
    }

    fn regex(&self, tier: Tier) -> &Regex {
        match tier {
            Tier::Infantil => &self.infantil,
            Tier::Fundamental => &self.fundamental,
            Tier::Medio => &self.medio,
        }
    }

    pub fn contains_code(&self, tier: Tier, text: &str) -> bool {
        self.regex(tier).is_match(text)
    }

    pub fn contains_any_code(&self, text: &str) -> bool {
        [Tier::Infantil, Tier::Fundamental, Tier::Medio]
            .into_iter()
            .any(|tier| self.contains_code(tier, text))
    }

    /// All non-overlapping codes in `cell`, left to right. The description of
    /// each code runs up to the start of the next code.
    pub fn find_all(&self, tier: Tier, cell: &str) -> Vec<CodeMatch> {
        let regex = self.regex(tier);
        let spans = regex
            .captures_iter(cell)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                Some((
                    whole.range(),
                    captures.get(1)?.as_str().to_string(),
                    captures.get(2)?.as_str().to_string(),
                    captures.get(3)?.as_str().to_string(),
                    captures.get(4)?.as_str().to_string(),
                ))
            })
            .collect::<Vec<_>>();

        let mut matches = Vec::with_capacity(spans.len());
        for (index, (span, code, period_digits, tag, serial)) in spans.iter().enumerate() {
            let description_end = spans
                .get(index + 1)
                .map(|(next, ..)| next.start)
                .unwrap_or(cell.len());
            let description_span = span.end..description_end;
            let description = strip_leading_residue(&cell[description_span.clone()]).to_string();

            matches.push(CodeMatch {
                tier,
                code: code.clone(),
                tag: tag.clone(),
                period_digits: period_digits.clone(),
                serial: serial.clone(),
                span: span.clone(),
                description_span,
                description,
            });
        }

        matches
    }
}

pub fn strip_leading_residue(text: &str) -> &str {
    text.trim_start_matches(|character: char| {
        character.is_whitespace()
            || matches!(character, ')' | ']' | '-' | '–' | '—' | '.' | ':' | ',' | ';')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> CodeMatcher {
        CodeMatcher::new().expect("code regexes compile")
    }

    #[test]
    fn find_all_splits_adjacent_codes_in_one_cell() {
        let cell = "(EF01MA01) desc one (EF01MA02) desc two";
        let matches = matcher().find_all(Tier::Fundamental, cell);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].code, "EF01MA01");
        assert_eq!(matches[0].tag, "MA");
        assert_eq!(matches[0].description, "desc one ");
        assert_eq!(matches[1].code, "EF01MA02");
        assert_eq!(matches[1].description, "desc two");
    }

    #[test]
    fn description_spans_are_contiguous_and_exhaustive() {
        let cells = [
            "(EF15LP01) Identificar a função social (EF15LP02) Estabelecer expectativas",
            "EF67EF01 - Experimentar EF67EF02) Praticar EF67EF03",
            "prefix text (EF69AR01) único",
        ];

        for cell in cells {
            let matches = matcher().find_all(Tier::Fundamental, cell);
            assert!(!matches.is_empty());
            for pair in matches.windows(2) {
                assert_eq!(pair[0].description_span.start, pair[0].span.end);
                assert_eq!(pair[0].description_span.end, pair[1].span.start);
            }
            let last = matches.last().expect("at least one match");
            assert_eq!(last.description_span.end, cell.len());

            let rebuilt = matches
                .iter()
                .map(|found| {
                    format!(
                        "{}{}",
                        &cell[found.span.clone()],
                        &cell[found.description_span.clone()]
                    )
                })
                .collect::<String>();
            assert_eq!(rebuilt, &cell[matches[0].span.start..]);
        }
    }

    #[test]
    fn leading_punctuation_is_stripped_from_descriptions() {
        let matches = matcher().find_all(Tier::Fundamental, "EF05CI01 – . Explorar materiais");
        assert_eq!(matches[0].description, "Explorar materiais");
    }

    #[test]
    fn no_match_yields_empty_result() {
        assert!(matcher().find_all(Tier::Fundamental, "Números").is_empty());
        assert!(matcher().find_all(Tier::Fundamental, "EF1MA01").is_empty());
    }

    #[test]
    fn tier_patterns_capture_tags() {
        let ei = matcher().find_all(Tier::Infantil, "EI02TS03 Explorar sons");
        assert_eq!(ei[0].tag, "TS");
        assert_eq!(ei[0].period_digits, "02");

        let em = matcher().find_all(Tier::Medio, "(EM13LGG103) Analisar (EM13LP01) Relacionar");
        assert_eq!(em.len(), 2);
        assert_eq!(em[0].code, "EM13LGG103");
        assert_eq!(em[0].tag, "LGG");
        assert_eq!(em[0].serial, "103");
        assert_eq!(em[1].tag, "LP");
        assert_eq!(em[1].serial, "01");
    }

    #[test]
    fn fundamental_blocks_expand_to_years() {
        assert_eq!(Tier::Fundamental.periods("15"), vec![1, 2, 3, 4, 5]);
        assert_eq!(Tier::Fundamental.periods("69"), vec![6, 7, 8, 9]);
        assert_eq!(Tier::Fundamental.periods("04"), vec![4]);
        assert!(Tier::Fundamental.periods("00").is_empty());
        assert!(Tier::Fundamental.periods("10").is_empty());
        assert_eq!(Tier::Medio.periods("13"), vec![1, 2, 3]);
    }
}

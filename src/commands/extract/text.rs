use crate::model::{FontStyle, StyledChar};

use super::codes::{CodeMatch, CodeMatcher, Tier};
use super::labels::is_label;
use super::normalize::normalize_line;

/// Distance from the top edge, in points, where running headings are printed.
const HEADING_BAND_TOP: f64 = 120.0;
const LINE_TOLERANCE: f64 = 2.0;
const WORD_GAP: f64 = 1.0;
const FALLBACK_HEADING_LINES: usize = 6;

/// Lines that may carry a subject heading: regular-style text in the top
/// band of the page, or the first text lines when no characters are known.
pub fn heading_lines(chars: &[StyledChar], text: &str) -> Vec<String> {
    let mut band = chars
        .iter()
        .filter(|character| {
            character.font_style == FontStyle::Regular && character.top < HEADING_BAND_TOP
        })
        .collect::<Vec<&StyledChar>>();

    if band.is_empty() {
        return text
            .lines()
            .map(normalize_line)
            .filter(|line| !line.is_empty())
            .take(FALLBACK_HEADING_LINES)
            .collect();
    }

    band.sort_by(|left, right| {
        left.top
            .total_cmp(&right.top)
            .then(left.x0.total_cmp(&right.x0))
    });

    let mut rows = Vec::<Vec<&StyledChar>>::new();
    for character in band {
        match rows.last_mut() {
            Some(row) if (row[0].top - character.top).abs() <= LINE_TOLERANCE => {
                row.push(character)
            }
            _ => rows.push(vec![character]),
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|left, right| left.x0.total_cmp(&right.x0));
            let mut line = String::new();
            let mut previous_end: Option<f64> = None;
            for character in row {
                if let Some(end) = previous_end
                    && character.x0 - end > WORD_GAP
                {
                    line.push(' ');
                }
                line.push_str(&character.text);
                previous_end = Some(character.x1);
            }
            normalize_line(&line)
        })
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '!', '?', ';'])
}

/// Whether an uncoded line extends the coded run before it.
pub fn continues_run(run: &str, line: &str, codes: &CodeMatcher) -> bool {
    !ends_sentence(run) && is_label(line, codes)
}

/// Coded entries in running text. A line with a code opens a run; the lines
/// after it are appended until the run reads as a finished sentence.
pub fn coded_runs(text: &str, tier: Tier, codes: &CodeMatcher) -> Vec<CodeMatch> {
    let mut runs = Vec::<String>::new();
    let mut open = false;

    for line in text.lines().map(normalize_line).filter(|line| !line.is_empty()) {
        if codes.contains_code(tier, &line) {
            runs.push(line);
            open = true;
            continue;
        }

        match runs.last_mut() {
            Some(run) if open && continues_run(run, &line, codes) => {
                run.push(' ');
                run.push_str(&line);
            }
            _ => open = false,
        }
    }

    runs.iter()
        .flat_map(|run| codes.find_all(tier, run))
        .collect()
}

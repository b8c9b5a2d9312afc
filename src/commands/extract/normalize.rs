use crate::model::Row;

/// Cleans one cell: whitespace and unicode variants are collapsed per line,
/// blank lines dropped, intra-cell line breaks kept.
pub fn normalize_cell(raw: &str) -> String {
    raw.split(['\n', '\r'])
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .collect::<Vec<String>>()
        .join("\n")
}

pub fn normalize_line(raw: &str) -> String {
    let mut mapped = String::with_capacity(raw.len());
    for character in raw.chars() {
        match character {
            '\u{a0}' | '\u{2007}' | '\u{202f}' | '\u{2009}' | '\u{200a}' | '\t' => {
                mapped.push(' ')
            }
            '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' | '\u{ad}' => {}
            '\u{fb01}' => mapped.push_str("fi"),
            '\u{fb02}' => mapped.push_str("fl"),
            '\u{2018}' | '\u{2019}' => mapped.push('\''),
            '\u{201c}' | '\u{201d}' => mapped.push('"'),
            other => mapped.push(other),
        }
    }

    let collapsed = mapped.split_whitespace().collect::<Vec<&str>>().join(" ");
    canonical_ordinals(&collapsed)
}

/// Normalized cells of a row; merged (absent) cells become empty strings.
pub fn normalize_row(row: &Row) -> Vec<String> {
    row.iter()
        .map(|cell| cell.as_deref().map(normalize_cell).unwrap_or_default())
        .collect()
}

/// Single-line view of a normalized cell, for matching codes across wraps.
pub fn flatten_cell(cell: &str) -> String {
    cell.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Upper-cased, accent-folded form used for keyword comparisons.
pub fn keyword_key(text: &str) -> String {
    text.to_uppercase().chars().map(fold_accent).collect()
}

fn fold_accent(character: char) -> char {
    match character {
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ç' => 'C',
        other => other,
    }
}

/// Rewrites `1o ano`, `1° ano`, `1ᵒ` and `1a série` into `1º ano` / `1ª série`.
fn canonical_ordinals(line: &str) -> String {
    let chars = line.chars().collect::<Vec<char>>();
    let mut out = String::with_capacity(line.len());

    for (index, &character) in chars.iter().enumerate() {
        let after_digit = index > 0 && chars[index - 1].is_ascii_digit();
        if !after_digit {
            out.push(character);
            continue;
        }

        let rest = chars[index + 1..].iter().collect::<String>();
        let replacement = match character {
            '°' | '˚' | 'ᵒ' => Some('º'),
            'ᵃ' => Some('ª'),
            'o' | 'O' if followed_by_word(&rest, &["ANO", "ANOS"]) => Some('º'),
            'a' | 'A' if followed_by_word(&rest, &["SERIE", "SERIES"]) => Some('ª'),
            _ => None,
        };
        out.push(replacement.unwrap_or(character));
    }

    out
}

fn followed_by_word(rest: &str, words: &[&str]) -> bool {
    let Some(stripped) = rest.strip_prefix(' ') else {
        return false;
    };
    let next = stripped
        .split(|character: char| !character.is_alphabetic())
        .next()
        .unwrap_or("");
    let key = keyword_key(next);
    words.iter().any(|word| *word == key)
}

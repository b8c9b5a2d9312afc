use super::codes::CodeMatcher;
use super::normalize::keyword_key;

pub const MIN_LABEL_CHARS: usize = 3;
pub const MAX_LABEL_CHARS: usize = 400;
const SHORT_CAPS_TOKEN_CHARS: usize = 4;

/// Column headers that are never structural labels themselves.
const HEADER_PHRASES: &[&str] = &[
    "UNIDADES TEMATICAS",
    "UNIDADE TEMATICA",
    "OBJETOS DE CONHECIMENTO",
    "OBJETO DE CONHECIMENTO",
    "HABILIDADES",
    "PRATICAS DE LINGUAGEM",
    "PRATICAS",
    "CAMPOS DE ATUACAO",
    "CAMPO DE ATUACAO",
    "EIXOS",
    "EIXO",
    "COMPETENCIAS ESPECIFICAS",
    "OBJETIVOS DE APRENDIZAGEM E DESENVOLVIMENTO",
    "ENSINO FUNDAMENTAL",
    "ENSINO MEDIO",
    "EDUCACAO INFANTIL",
];

/// Running titles and footers printed on every page.
const RUNNING_PHRASES: &[&str] = &["BASE NACIONAL COMUM CURRICULAR", "A ETAPA DO ENSINO"];

pub fn is_label(text: &str, codes: &CodeMatcher) -> bool {
    let trimmed = text.trim();
    let char_count = trimmed.chars().count();
    if !(MIN_LABEL_CHARS..=MAX_LABEL_CHARS).contains(&char_count) {
        return false;
    }

    if !trimmed.chars().any(char::is_alphabetic) {
        return false;
    }

    if codes.contains_any_code(trimmed) {
        return false;
    }

    let key = keyword_key(trimmed.trim_end_matches(['.', ':', ';']));
    if HEADER_PHRASES.contains(&key.as_str()) {
        return false;
    }
    if is_running_line(trimmed) {
        return false;
    }

    let single_token = !trimmed.contains(char::is_whitespace);
    let all_caps = trimmed
        .chars()
        .filter(|character| character.is_alphabetic())
        .all(char::is_uppercase);
    if single_token && all_caps && char_count < SHORT_CAPS_TOKEN_CHARS {
        return false;
    }

    true
}

/// Page titles and footers repeated across the document.
pub fn is_running_line(text: &str) -> bool {
    let key = keyword_key(text);
    RUNNING_PHRASES.iter().any(|phrase| key.contains(phrase))
}

/// Bare page numbers such as `12` or `- 12 -`.
pub fn is_page_number(text: &str) -> bool {
    let core = text.trim().trim_matches(['-', '–', ' ']);
    !core.is_empty() && core.chars().all(|character| character.is_ascii_digit())
}

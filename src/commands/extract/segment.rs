//! Splits multi-line cells into entries.
//!
//! A physical line either continues the entry being built or starts a new
//! one. When the signals disagree the line is treated as a continuation:
//! fewer, longer entries are preferred over fabricated ones.

const DANGLING_WORDS: &[&str] = &[
    "a", "à", "ao", "aos", "as", "às", "com", "como", "da", "das", "de", "do", "dos", "e", "em",
    "entre", "na", "nas", "no", "nos", "o", "os", "ou", "para", "pela", "pelas", "pelo", "pelos",
    "por", "que", "sem", "sob", "sobre", "um", "uma", "an", "and", "at", "by", "for", "from", "in",
    "of", "on", "or", "the", "to", "with",
];

const PREPOSITIONS: &[&str] = &[
    "a", "ao", "até", "com", "contra", "da", "das", "de", "do", "dos", "em", "entre", "na", "nas",
    "no", "nos", "para", "pela", "pelo", "por", "sem", "sob", "sobre", "at", "by", "for", "from",
    "in", "of", "on", "to", "with",
];

const BULLETS: &[char] = &['•', '●', '◦', '▪', '■', '*', '-', '–', '—'];

#[derive(Debug, Clone)]
pub struct SegmenterPolicy {
    pub min_entry_chars: usize,
    pub short_line_chars: usize,
    pub long_buffer_chars: usize,
    pub terminal_punctuation: bool,
    /// A one-word line joins the entry before it.
    pub single_word_continues: bool,
    pub dangling_words: &'static [&'static str],
    pub prepositions: &'static [&'static str],
}

impl Default for SegmenterPolicy {
    fn default() -> Self {
        Self {
            min_entry_chars: 3,
            short_line_chars: 20,
            long_buffer_chars: 30,
            terminal_punctuation: false,
            single_word_continues: false,
            dangling_words: DANGLING_WORDS,
            prepositions: PREPOSITIONS,
        }
    }
}

impl SegmenterPolicy {
    /// Narrative cells: entries read as sentences.
    pub fn narrative() -> Self {
        Self {
            terminal_punctuation: true,
            single_word_continues: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    policy: SegmenterPolicy,
}

impl Segmenter {
    pub fn new(policy: SegmenterPolicy) -> Self {
        Self { policy }
    }

    pub fn segment(&self, raw: &str) -> Vec<String> {
        let mut entries = Vec::<String>::new();
        let mut buffer = String::new();

        for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if buffer.is_empty() {
                buffer.push_str(line);
                continue;
            }

            if self.is_continuation(&buffer, line) {
                buffer.push(' ');
                buffer.push_str(line);
                continue;
            }

            entries.extend(self.finish(&buffer));
            buffer.clear();
            buffer.push_str(line);
        }

        if !buffer.is_empty() {
            entries.extend(self.finish(&buffer));
        }

        entries
    }

    fn is_continuation(&self, buffer: &str, line: &str) -> bool {
        let last_word = buffer
            .split_whitespace()
            .last()
            .map(str::to_lowercase)
            .unwrap_or_default();
        if self.policy.dangling_words.contains(&last_word.as_str()) {
            return true;
        }

        if buffer.ends_with([',', '-', '–', '—', ':', '/']) {
            return true;
        }

        let first = line.chars().next().unwrap_or(' ');
        if first.is_lowercase() || BULLETS.contains(&first) {
            return true;
        }

        let short_line = line.chars().count() < self.policy.short_line_chars;
        let long_buffer = buffer.chars().count() > self.policy.long_buffer_chars;
        if short_line && long_buffer && self.contains_preposition(line) {
            return true;
        }

        self.policy.single_word_continues && !line.contains(char::is_whitespace)
    }

    fn contains_preposition(&self, line: &str) -> bool {
        line.split_whitespace()
            .map(|word| word.trim_matches(|character: char| !character.is_alphabetic()))
            .any(|word| self.policy.prepositions.contains(&word.to_lowercase().as_str()))
    }

    fn finish(&self, buffer: &str) -> Option<String> {
        let cleaned = buffer
            .trim()
            .trim_start_matches(|character: char| {
                BULLETS.contains(&character) || character.is_whitespace()
            })
            .trim_end();
        if cleaned.chars().count() < self.policy.min_entry_chars {
            return None;
        }

        let mut entry = cleaned.to_string();
        if self.policy.terminal_punctuation && !entry.ends_with(['.', '!', '?', ';', ':']) {
            entry.push('.');
        }
        Some(entry)
    }
}

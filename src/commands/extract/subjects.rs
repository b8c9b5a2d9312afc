use super::normalize::keyword_key;

#[derive(Debug, PartialEq, Eq)]
pub struct SubjectProfile {
    /// Two-letter component tag inside EF codes.
    pub tag: &'static str,
    pub area: &'static str,
    pub name: &'static str,
    /// Accent-folded upper-case heading as printed on the page.
    pub heading: &'static str,
    pub uses_fields: bool,
    pub default_field: &'static str,
    pub default_unit: &'static str,
    pub default_object: &'static str,
    pub expected_competencies: usize,
    pub expected_codes: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub struct AreaProfile {
    pub name: &'static str,
    pub heading: &'static str,
    pub expected_competencies: usize,
}

const UNKNOWN_OBJECT: &str = "Objeto de conhecimento não identificado";
const UNKNOWN_UNIT: &str = "Unidade temática não identificada";

pub const AREAS: &[AreaProfile] = &[
    AreaProfile {
        name: "Linguagens",
        heading: "LINGUAGENS",
        expected_competencies: 6,
    },
    AreaProfile {
        name: "Matemática",
        heading: "MATEMATICA",
        expected_competencies: 8,
    },
    AreaProfile {
        name: "Ciências da Natureza",
        heading: "CIENCIAS DA NATUREZA",
        expected_competencies: 8,
    },
    AreaProfile {
        name: "Ciências Humanas",
        heading: "CIENCIAS HUMANAS",
        expected_competencies: 7,
    },
    AreaProfile {
        name: "Ensino Religioso",
        heading: "ENSINO RELIGIOSO",
        expected_competencies: 6,
    },
];

pub const SUBJECTS: &[SubjectProfile] = &[
    SubjectProfile {
        tag: "LP",
        area: "Linguagens",
        name: "Língua Portuguesa",
        heading: "LINGUA PORTUGUESA",
        uses_fields: true,
        default_field: "Todos os campos de atuação",
        default_unit: "Prática de linguagem não identificada",
        default_object: UNKNOWN_OBJECT,
        expected_competencies: 10,
        expected_codes: 391,
    },
    SubjectProfile {
        tag: "AR",
        area: "Linguagens",
        name: "Arte",
        heading: "ARTE",
        uses_fields: false,
        default_field: "",
        default_unit: UNKNOWN_UNIT,
        default_object: UNKNOWN_OBJECT,
        expected_competencies: 9,
        expected_codes: 61,
    },
    SubjectProfile {
        tag: "EF",
        area: "Linguagens",
        name: "Educação Física",
        heading: "EDUCACAO FISICA",
        uses_fields: false,
        default_field: "",
        default_unit: UNKNOWN_UNIT,
        default_object: UNKNOWN_OBJECT,
        expected_competencies: 10,
        expected_codes: 69,
    },
    SubjectProfile {
        tag: "LI",
        area: "Linguagens",
        name: "Língua Inglesa",
        heading: "LINGUA INGLESA",
        uses_fields: false,
        default_field: "",
        default_unit: "Eixo não identificado",
        default_object: UNKNOWN_OBJECT,
        expected_competencies: 6,
        expected_codes: 88,
    },
    SubjectProfile {
        tag: "MA",
        area: "Matemática",
        name: "Matemática",
        heading: "MATEMATICA",
        uses_fields: false,
        default_field: "",
        default_unit: UNKNOWN_UNIT,
        default_object: UNKNOWN_OBJECT,
        expected_competencies: 8,
        expected_codes: 247,
    },
    SubjectProfile {
        tag: "CI",
        area: "Ciências da Natureza",
        name: "Ciências",
        heading: "CIENCIAS",
        uses_fields: false,
        default_field: "",
        default_unit: UNKNOWN_UNIT,
        default_object: UNKNOWN_OBJECT,
        expected_competencies: 8,
        expected_codes: 111,
    },
    SubjectProfile {
        tag: "GE",
        area: "Ciências Humanas",
        name: "Geografia",
        heading: "GEOGRAFIA",
        uses_fields: false,
        default_field: "",
        default_unit: UNKNOWN_UNIT,
        default_object: UNKNOWN_OBJECT,
        expected_competencies: 7,
        expected_codes: 123,
    },
    SubjectProfile {
        tag: "HI",
        area: "Ciências Humanas",
        name: "História",
        heading: "HISTORIA",
        uses_fields: false,
        default_field: "",
        default_unit: UNKNOWN_UNIT,
        default_object: UNKNOWN_OBJECT,
        expected_competencies: 7,
        expected_codes: 151,
    },
    SubjectProfile {
        tag: "ER",
        area: "Ensino Religioso",
        name: "Ensino Religioso",
        heading: "ENSINO RELIGIOSO",
        uses_fields: false,
        default_field: "",
        default_unit: UNKNOWN_UNIT,
        default_object: UNKNOWN_OBJECT,
        expected_competencies: 6,
        expected_codes: 63,
    },
];

pub fn profile_for_tag(tag: &str) -> Option<&'static SubjectProfile> {
    SUBJECTS.iter().find(|profile| profile.tag == tag)
}

/// A heading cue evaluated against one page line.
pub struct SubjectRule {
    pub name: &'static str,
    pub detect: fn(&str) -> Option<&'static SubjectProfile>,
}

/// Evaluated in order; the first rule that fires on any line wins.
pub const SUBJECT_RULES: &[SubjectRule] = &[
    SubjectRule {
        name: "name_with_separator",
        detect: name_with_separator,
    },
    SubjectRule {
        name: "bare_name",
        detect: bare_name,
    },
];

pub fn detect_subject(lines: &[String]) -> Option<(&'static str, &'static SubjectProfile)> {
    SUBJECT_RULES.iter().find_map(|rule| {
        lines
            .iter()
            .find_map(|line| (rule.detect)(line))
            .map(|profile| (rule.name, profile))
    })
}

const SEPARATORS: &[char] = &['–', '—', '-', '|', '/', '•', ':'];

fn name_with_separator(line: &str) -> Option<&'static SubjectProfile> {
    let key = keyword_key(line.trim());

    longest_headings_first().find(|profile| {
        let leading = key
            .strip_prefix(profile.heading)
            .map(|rest| rest.trim_start().starts_with(SEPARATORS))
            .unwrap_or(false);
        let trailing = key
            .strip_suffix(profile.heading)
            .map(|rest| rest.trim_end().ends_with(SEPARATORS))
            .unwrap_or(false);
        leading || trailing
    })
}

fn bare_name(line: &str) -> Option<&'static SubjectProfile> {
    let key = keyword_key(line.trim().trim_end_matches(['.', ':']));
    SUBJECTS.iter().find(|profile| profile.heading == key)
}

fn longest_headings_first() -> impl Iterator<Item = &'static SubjectProfile> {
    let mut ordered = SUBJECTS.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|profile| std::cmp::Reverse(profile.heading.len()));
    ordered.into_iter()
}

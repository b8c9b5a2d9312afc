use std::fs;
use std::path::PathBuf;

use super::tree::SubjectNode;
use super::*;
use crate::model::{Page, Table};

fn row(cells: &[Option<&str>]) -> Vec<Option<String>> {
    cells.iter().map(|cell| cell.map(str::to_string)).collect()
}

fn table(rows: &[&[Option<&str>]]) -> Table {
    Table::new(rows.iter().map(|cells| row(cells)).collect())
}

fn page(text: &str, tables: Vec<Table>) -> Page {
    Page {
        text: text.to_string(),
        tables,
        ..Page::default()
    }
}

fn run_fundamental(pages: Vec<Page>, catalog: &CompetencyCatalog) -> (ResultTree, ExtractCounts) {
    let codes = CodeMatcher::new().expect("code regexes compile");
    let harvester = CompetencyHarvester::new().expect("harvest regex compiles");
    let source = PageDumpSource::from_pages(pages, TableSettings::default());
    let mut pipeline = FundamentalPipeline::new(&codes, &harvester, catalog);
    let mut counts = ExtractCounts::default();

    for index in 0..source.page_count() {
        let page = source.page(index).expect("page in range");
        pipeline.process_page(&page, &TableSettings::default(), &mut counts);
    }

    let tree = pipeline.finish("sha", &mut counts);
    (tree, counts)
}

fn mathematics(tree: &ResultTree) -> &SubjectNode {
    &tree.areas["Matemática"].subjects["Matemática"]
}

#[test]
fn context_table_feeds_the_following_item_table() {
    let pages = vec![page(
        "MATEMÁTICA",
        vec![
            table(&[&[Some("Unit X"), Some("Object 1\nObject 2")]]),
            table(&[&[Some("(EF01MA01) desc one (EF01MA02) desc two")]]),
        ],
    )];

    let (tree, counts) = run_fundamental(pages, &CompetencyCatalog::default());

    let unit = &mathematics(&tree).periods["1º Ano"]["Unit X"];
    assert_eq!(unit.groups.len(), 1);
    let group = &unit.groups[0];
    assert_eq!(group.objects, vec!["Object 1", "Object 2"]);
    let items = group
        .items
        .iter()
        .map(|item| (item.code.as_str(), item.description.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        items,
        vec![("EF01MA01", "desc one "), ("EF01MA02", "desc two")]
    );
    assert_eq!(counts.context_tables, 1);
    assert_eq!(counts.item_tables, 1);
    assert_eq!(counts.ef_items_inserted, 2);
}

#[test]
fn positional_map_carries_across_a_page_break() {
    let pages = vec![
        page(
            "MATEMÁTICA",
            vec![
                table(&[
                    &[Some("Números"), Some("Contagem de rotina")],
                    &[Some("Álgebra"), Some("Padrões figurais e numéricos")],
                ]),
                table(&[&[Some("(EF01MA01) Utilizar números naturais.")]]),
            ],
        ),
        page(
            "",
            vec![table(&[
                &[Some("(EF01MA09) Organizar e ordenar objetos.")],
                &[Some("(EF01MA10) Descrever padrões.")],
            ])],
        ),
    ];

    let (tree, _) = run_fundamental(pages, &CompetencyCatalog::default());
    let first_year = &mathematics(&tree).periods["1º Ano"];

    assert_eq!(first_year["Números"].groups[0].items[0].code, "EF01MA01");
    let algebra = &first_year["Álgebra"].groups[0];
    assert_eq!(algebra.objects, vec!["Padrões figurais e numéricos"]);
    let codes = algebra
        .items
        .iter()
        .map(|item| item.code.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(codes, vec!["EF01MA09", "EF01MA10"]);
}

#[test]
fn merged_item_rows_keep_their_positional_slot() {
    let pages = vec![page(
        "MATEMÁTICA",
        vec![
            table(&[
                &[Some("Números"), Some("Contagem de rotina")],
                &[None, None],
                &[Some("Geometria"), Some("Figuras planas")],
            ]),
            table(&[
                &[Some("(EF01MA01) Utilizar números naturais.")],
                &[None],
                &[Some("(EF01MA13) Relacionar figuras geométricas espaciais.")],
            ]),
        ],
    )];

    let (tree, _) = run_fundamental(pages, &CompetencyCatalog::default());
    let first_year = &mathematics(&tree).periods["1º Ano"];

    let units = first_year.keys().cloned().collect::<Vec<String>>();
    assert_eq!(units, vec!["Números", "Geometria"]);
    assert_eq!(first_year["Números"].groups[0].items[0].code, "EF01MA01");
    let geometry = &first_year["Geometria"].groups[0];
    assert_eq!(geometry.objects, vec!["Figuras planas"]);
    assert_eq!(geometry.items[0].code, "EF01MA13");
}

#[test]
fn one_word_object_lines_stay_separate_objects() {
    let pages = vec![page(
        "MATEMÁTICA",
        vec![
            table(&[&[Some("Números"), Some("Frações\nPorcentagens")]]),
            table(&[&[Some("(EF05MA06) Associar as representações 10%, 25%, 50%.")]]),
        ],
    )];

    let (tree, _) = run_fundamental(pages, &CompetencyCatalog::default());
    let group = &mathematics(&tree).periods["5º Ano"]["Números"].groups[0];

    assert_eq!(group.objects, vec!["Frações", "Porcentagens"]);
}

#[test]
fn subject_change_drops_carried_context() {
    let pages = vec![
        page(
            "MATEMÁTICA",
            vec![table(&[&[Some("Números"), Some("Contagem de rotina")]])],
        ),
        page(
            "GEOGRAFIA",
            vec![table(&[&[Some("(EF06GE01) Comparar modificações das paisagens.")]])],
        ),
    ];

    let (tree, counts) = run_fundamental(pages, &CompetencyCatalog::default());
    let geography = &tree.areas["Ciências Humanas"].subjects["Geografia"];
    let unit = &geography.periods["6º Ano"]["Unidade temática não identificada"];

    assert_eq!(
        unit.groups[0].objects,
        vec!["Objeto de conhecimento não identificado"]
    );
    assert_eq!(counts.subject_changes, 2);
}

#[test]
fn multi_year_codes_are_replicated_once_per_year() {
    let pages = vec![page(
        "ARTE",
        vec![
            table(&[&[Some("Artes visuais"), Some("Contextos e práticas")]]),
            table(&[
                &[Some("(EF15AR01) Identificar e apreciar formas distintas das artes visuais.")],
                &[Some("(EF15AR01) Identificar e apreciar formas distintas das artes visuais.")],
            ]),
        ],
    )];

    let (tree, counts) = run_fundamental(pages, &CompetencyCatalog::default());
    let arte = &tree.areas["Linguagens"].subjects["Arte"];

    let years = arte.periods.keys().cloned().collect::<Vec<String>>();
    assert_eq!(years, vec!["1º Ano", "2º Ano", "3º Ano", "4º Ano", "5º Ano"]);
    for period in arte.periods.values() {
        assert_eq!(period["Artes visuais"].groups[0].items.len(), 1);
    }
    assert_eq!(counts.ef_duplicates_suppressed, 1);
    assert_eq!(tree.metadata.total_habilidades, 5);
    assert_eq!(tree.metadata.codigos_unicos, 1);
}

#[test]
fn item_tables_with_context_columns_are_read_inline() {
    let pages = vec![page(
        "MATEMÁTICA",
        vec![table(&[
            &[
                Some("UNIDADES TEMÁTICAS"),
                Some("OBJETOS DE CONHECIMENTO"),
                Some("HABILIDADES"),
            ],
            &[
                Some("Números"),
                Some("Contagem de rotina"),
                Some("(EF01MA01) Utilizar números naturais."),
            ],
            &[None, None, Some("(EF01MA02) Contar de maneira exata.")],
        ])],
    )];

    let (tree, _) = run_fundamental(pages, &CompetencyCatalog::default());
    let group = &mathematics(&tree).periods["1º Ano"]["Números"].groups[0];

    assert_eq!(group.objects, vec!["Contagem de rotina"]);
    assert_eq!(group.items.len(), 2);
}

#[test]
fn ambiguous_two_column_tables_fall_back_to_column_positions() {
    let pages = vec![page(
        "MATEMÁTICA",
        vec![
            table(&[&[Some("Geometria"), Some("Figuras geométricas espaciais")]]),
            table(&[&[
                Some("Figuras geométricas planas"),
                Some("(EF03MA15) Classificar e comparar figuras planas."),
            ]]),
        ],
    )];

    let (tree, counts) = run_fundamental(pages, &CompetencyCatalog::default());
    let unit = &mathematics(&tree).periods["3º Ano"]["Geometria"];

    assert_eq!(unit.groups[0].objects, vec!["Figuras geométricas planas"]);
    assert_eq!(counts.fallback_tables, 1);
}

#[test]
fn headerless_three_column_tables_keep_the_last_column_for_codes() {
    let pages = vec![page(
        "MATEMÁTICA",
        vec![table(&[
            &[Some("Geometria"), Some("Figuras planas"), None],
            &[None, None, Some("(EF03MA15) Classificar e comparar figuras planas.")],
        ])],
    )];

    let (tree, _) = run_fundamental(pages, &CompetencyCatalog::default());
    let third_year = &mathematics(&tree).periods["3º Ano"];

    assert_eq!(third_year.keys().cloned().collect::<Vec<String>>(), vec!["Geometria"]);
    let group = &third_year["Geometria"].groups[0];
    assert_eq!(group.objects, vec!["Figuras planas"]);
    assert_eq!(group.items[0].code, "EF03MA15");
}

#[test]
fn portuguese_items_nest_under_field_and_practice() {
    let pages = vec![page(
        "LÍNGUA PORTUGUESA – 1º E 2º ANOS",
        vec![table(&[
            &[
                Some("CAMPOS DE ATUAÇÃO"),
                Some("PRÁTICAS DE LINGUAGEM"),
                Some("OBJETOS DE CONHECIMENTO"),
                Some("HABILIDADES"),
            ],
            &[
                Some("CAMPO DA VIDA COTIDIANA – Campo de atuação relativo à participação em situações de leitura"),
                None,
                None,
                None,
            ],
            &[
                None,
                Some("Leitura/escuta (compartilhada e autônoma)"),
                Some("Protocolos de leitura"),
                Some("(EF01LP01) Reconhecer que textos são lidos e escritos da esquerda para a direita."),
            ],
        ])],
    )];

    let (tree, _) = run_fundamental(pages, &CompetencyCatalog::default());
    let period = &tree.areas["Linguagens"].subjects["Língua Portuguesa"].periods["1º Ano"];
    let practices = &period["Campo da vida cotidiana"].practices;
    let groups = &practices["Leitura/escuta (compartilhada e autônoma)"];

    assert_eq!(groups[0].objects, vec!["Protocolos de leitura"]);
    assert_eq!(groups[0].items[0].code, "EF01LP01");
}

#[test]
fn competencies_come_from_the_catalog_before_page_text() {
    let catalog: CompetencyCatalog = serde_json::from_str(
        r#"{"areas": {"Matemática": [{"numero": 1, "descricao": "Reconhecer que a Matemática é uma ciência humana."}]}}"#,
    )
    .expect("catalog parses");
    let pages = vec![page(
        "COMPETÊNCIAS ESPECÍFICAS DE MATEMÁTICA PARA O ENSINO FUNDAMENTAL\n1. Texto da página.",
        Vec::new(),
    )];

    let (tree, counts) = run_fundamental(pages, &catalog);

    let area = &tree.areas["Matemática"];
    assert_eq!(
        area.competencies[0].description,
        "Reconhecer que a Matemática é uma ciência humana."
    );
    assert_eq!(area.subjects["Matemática"].competencies.len(), 1);
    assert_eq!(counts.competencies_harvested, 0);
}

#[test]
fn missing_competencies_are_harvested_from_page_text() {
    let pages = vec![
        page(
            "COMPETÊNCIAS ESPECÍFICAS DE GEOGRAFIA PARA O ENSINO FUNDAMENTAL\n1. Utilizar os conhecimentos geográficos\npara entender a interação sociedade/natureza.\n2. Estabelecer conexões entre diferentes temas.",
            Vec::new(),
        ),
        page("3. Desenvolver autonomia e senso crítico.", Vec::new()),
    ];

    let (tree, counts) = run_fundamental(pages, &CompetencyCatalog::default());
    let geography = &tree.areas["Ciências Humanas"].subjects["Geografia"];

    assert_eq!(geography.competencies.len(), 3);
    assert_eq!(
        geography.competencies[0].description,
        "Utilizar os conhecimentos geográficos para entender a interação sociedade/natureza."
    );
    assert_eq!(counts.competencies_harvested, 3);
}

fn document_pages() -> Vec<Page> {
    let mut pages = vec![Page::default(); EF_PAGES.start];
    pages[EI_PAGES.start] = page(
        "",
        vec![table(&[&[Some("(EI01EO01) Perceber que suas ações têm efeitos nas outras crianças.")]])],
    );
    pages.push(page(
        "MATEMÁTICA",
        vec![
            table(&[&[Some("Números"), Some("Contagem de rotina\nQuantificação de elementos")]]),
            table(&[&[Some("(EF12MA01) Utilizar números naturais (EF01MA02) Contar")]]),
        ],
    ));
    pages
}

fn write_dump(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("dump.json");
    let dump = serde_json::json!({ "pages": document_pages() });
    fs::write(&path, serde_json::to_vec(&dump).expect("dump serializes")).expect("write dump");
    path
}

#[test]
fn extraction_is_deterministic() {
    let source = PageDumpSource::from_pages(document_pages(), TableSettings::default());
    let catalog = CompetencyCatalog::default();
    let settings = TableSettings::default();

    let first = extract_document(&source, &settings, &catalog, "sha").expect("first pass");
    let second = extract_document(&source, &settings, &catalog, "sha").expect("second pass");

    assert_eq!(
        serde_json::to_string_pretty(&first.fundamental).expect("serializes"),
        serde_json::to_string_pretty(&second.fundamental).expect("serializes")
    );
    assert_eq!(first.infantil, second.infantil);
    assert_eq!(first.counts.ef_unique_codes, 2);
    assert_eq!(first.counts.ei_objectives, 1);
}

#[test]
fn run_writes_identical_artifacts_on_rerun() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_dump(dir.path());
    let output_dir = dir.path().join("out");
    let args = ExtractArgs {
        input,
        output_dir: output_dir.clone(),
        competencies: None,
    };

    run(args.clone()).expect("first run");
    let first = fs::read(output_dir.join(EF_OUTPUT)).expect("ef artifact");
    run(args).expect("second run");
    let second = fs::read(output_dir.join(EF_OUTPUT)).expect("ef artifact");

    assert_eq!(first, second);
    for name in [EI_OUTPUT, EM_OUTPUT, STATS_OUTPUT] {
        assert!(output_dir.join(name).is_file(), "{name} written");
    }

    let manifests = fs::read_dir(output_dir.join("manifests"))
        .expect("manifest dir")
        .collect::<Result<Vec<_>, _>>()
        .expect("manifest entries");
    assert!(!manifests.is_empty());
    let manifest: serde_json::Value =
        crate::util::read_json(&manifests[0].path()).expect("manifest parses");
    assert_eq!(manifest["status"], "completed");
    assert_eq!(manifest["counts"]["ef_unique_codes"], 2);
}

#[test]
fn run_fails_before_writing_when_input_is_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output_dir = dir.path().join("out");
    let args = ExtractArgs {
        input: dir.path().join("absent.json"),
        output_dir: output_dir.clone(),
        competencies: None,
    };

    assert!(run(args).is_err());
    assert!(!output_dir.join(EF_OUTPUT).exists());
}

#[test]
fn run_accepts_page_dumps_without_page_numbers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("dump.json");
    fs::write(
        &input,
        r#"{"pages": [{"text": "primeira"}, {"text": "segunda", "tables": [[["(EF01MA01) Contar"]]]}]}"#,
    )
    .expect("write dump");
    let output_dir = dir.path().join("out");

    run(ExtractArgs {
        input,
        output_dir: output_dir.clone(),
        competencies: None,
    })
    .expect("run succeeds");

    assert!(output_dir.join(EF_OUTPUT).is_file());
}

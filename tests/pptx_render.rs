//! End-to-end rendering of PowerPoint templates.

mod common;

use common::{context, group_shape, numbered_shape, presentation, split_shape, table_shape, text_shape};
use office_templates::PresentationTemplate;
use office_templates::common::XmlElement;
use office_templates::ooxml::PackURI;
use office_templates::template::{IssueKind, OnError, RenderError, RenderOptions, Value};

fn render(slides: &[String], json: &str, options: &RenderOptions) -> (PresentationTemplate, office_templates::Report) {
    let mut deck = PresentationTemplate::from_bytes(&presentation(slides)).unwrap();
    let report = deck.render(&context(json), options).unwrap();
    (deck, report)
}

// =============================================================================
// Values
// =============================================================================

#[test]
fn test_placeholder_split_across_runs() {
    let slides = [split_shape("Title 1", &[&["Hello {{ user.", "name | upper }}", "!"]])];
    let (deck, report) = render(&slides, r#"{"user": {"name": "ana"}}"#, &RenderOptions::default());
    assert!(report.is_empty());
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["Hello ANA!"]]);
}

#[test]
fn test_filters_with_arguments() {
    let slides = [text_shape(
        "Body",
        &["{{ total | number(2) }}", "{{ day | date(\"dd/MM/YYYY\") }}", "{{ tags | join(\" + \") }}"],
    )];
    let (deck, report) = render(
        &slides,
        r#"{"total": 1234.5, "day": "2024-03-05", "tags": ["a", "b"]}"#,
        &RenderOptions::default().with_locale("en"),
    );
    assert!(report.is_empty(), "{:?}", report);
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["1,234.50", "05/03/2024", "a + b"]]);
}

#[test]
fn test_missing_value_is_blank_and_reported() {
    let slides = [text_shape("Title 1", &["[{{ missing.name }}]"])];
    let (deck, report) = render(&slides, "{}", &RenderOptions::default());
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["[]"]]);

    assert_eq!(report.len(), 1);
    let issue = &report.issues()[0];
    assert_eq!(issue.kind, IssueKind::MissingValue);
    assert_eq!(issue.location.to_string(), "slide 1, shape 'Title 1'");
    assert_eq!(issue.raw, "{{ missing.name }}");
}

#[test]
fn test_strict_missing_value_fails() {
    let bytes = presentation(&[text_shape("Title 1", &["{{ missing }}"])]);
    let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
    let err = deck
        .render(&Value::None, &RenderOptions::default().with_strict(true))
        .unwrap_err();
    assert!(matches!(err, RenderError::Resolution { .. }));
    // Nothing was written back
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["{{ missing }}"]]);
}

#[test]
fn test_unknown_filter_is_fatal() {
    let bytes = presentation(&[text_shape("Title 1", &["{{ name | shout }}"])]);
    let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
    let err = deck.render(&context(r#"{"name": "x"}"#), &RenderOptions::default()).unwrap_err();
    assert!(matches!(err, RenderError::UnknownFilter { ref name, .. } if name == "shout"));
}

// =============================================================================
// Blocks
// =============================================================================

#[test]
fn test_paragraph_loop_with_inline_conditional() {
    let slides = [text_shape(
        "Body",
        &[
            "{% for row in rows %}",
            "{% if row.active %}A{% else %}B{% endif %}: {{ row.name }}",
            "{% endfor %}",
        ],
    )];
    let (deck, report) = render(
        &slides,
        r#"{"rows": [{"name": "x", "active": true}, {"name": "y", "active": false}]}"#,
        &RenderOptions::default(),
    );
    assert!(report.is_empty());
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["A: x", "B: y"]]);
}

#[test]
fn test_loop_helper_and_mapping_pairs() {
    let slides = [text_shape(
        "Body",
        &["{% for region, total in totals %}", "{{ loop.index }}/{{ loop.length }} {{ region }}={{ total }}", "{% endfor %}"],
    )];
    let (deck, _) = render(&slides, r#"{"totals": {"north": 3, "south": 5}}"#, &RenderOptions::default());
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["1/2 north=3", "2/2 south=5"]]);
}

#[test]
fn test_empty_loop_leaves_an_empty_paragraph() {
    let slides = [text_shape("Body", &["{% for row in rows %}", "{{ row }}", "{% endfor %}"])];
    let (deck, report) = render(&slides, r#"{"rows": []}"#, &RenderOptions::default());
    assert!(report.is_empty());
    assert_eq!(deck.slide_texts().unwrap(), vec![vec![""]]);
}

#[test]
fn test_table_rows_repeat() {
    let slides = [table_shape(
        "Table 1",
        &[&["Name"], &["{% for p in people %}"], &["{{ p.name }}"], &["{% endfor %}"]],
    )];
    let (deck, _) = render(
        &slides,
        r#"{"people": [{"name": "Ana"}, {"name": "Bo"}]}"#,
        &RenderOptions::default(),
    );
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["Name", "Ana", "Bo"]]);
}

#[test]
fn test_loop_path_is_reported() {
    let slides = [text_shape("Body", &["{% for p in people %}", "{{ p.name }}", "{% endfor %}"])];
    let (_, report) = render(&slides, r#"{"people": [{"name": "Ana"}, {}]}"#, &RenderOptions::default());
    assert_eq!(report.len(), 1);
    let issue = &report.issues()[0];
    assert_eq!(issue.kind, IssueKind::MissingValue);
    assert_eq!(issue.loop_path.len(), 1);
    assert_eq!(issue.loop_path[0].binding, "p");
    assert_eq!(issue.loop_path[0].index, 1);
}

#[test]
fn test_strict_collect_aborts_one_iteration() {
    let slides = [text_shape("Body", &["{% for p in people %}", "{{ p.name }}", "{% endfor %}"])];
    let (deck, report) = render(
        &slides,
        r#"{"people": [{"name": "Ana"}, {}, {"name": "Cy"}]}"#,
        &RenderOptions::default().with_strict(true),
    );
    let texts = deck.slide_texts().unwrap().remove(0);
    assert_eq!(texts.first().map(String::as_str), Some("Ana"));
    assert_eq!(texts.last().map(String::as_str), Some("Cy"));
    assert_eq!(report.of_kind(IssueKind::AbortedIteration).count(), 1);
}

#[test]
fn test_fail_fast_stops_on_first_issue() {
    let bytes = presentation(&[text_shape("Body", &["{{ a }}", "{{ b }}"])]);
    let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
    let options = RenderOptions::default().with_on_error(OnError::FailFast);
    let err = deck.render(&Value::None, &options).unwrap_err();
    assert!(matches!(err, RenderError::Resolution { ref raw, .. } if raw == "{{ a }}"));
}

#[test]
fn test_unmatched_block_is_an_error() {
    let bytes = presentation(&[text_shape("Body", &["{% for p in people %}", "{{ p }}"])]);
    let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
    let err = deck.render(&context(r#"{"people": [1]}"#), &RenderOptions::default()).unwrap_err();
    assert!(matches!(err, RenderError::UnmatchedBlock { .. }));
}

// =============================================================================
// Shapes
// =============================================================================

fn shape_ids(deck: &PresentationTemplate, slide: usize) -> Vec<String> {
    fn collect(el: &XmlElement, out: &mut Vec<String>) {
        for child in el.elements() {
            if child.is("cNvPr") {
                out.push(child.attr("id").unwrap_or_default().to_string());
            }
            collect(child, out);
        }
    }
    let part = PackURI::new(format!("/ppt/slides/slide{}.xml", slide)).unwrap();
    let doc = deck.package().xml_part(&part).unwrap();
    let mut ids = Vec::new();
    collect(&doc.root, &mut ids);
    ids
}

#[test]
fn test_shape_loop_gives_clones_fresh_ids() {
    let slide = [
        numbered_shape(2, "Title", &["Team"]),
        numbered_shape(3, "Loop", &["{% for p in people %}"]),
        numbered_shape(4, "Name", &["{{ p.name }}"]),
        numbered_shape(5, "End", &["{% endfor %}"]),
    ]
    .concat();
    let (deck, report) = render(
        &[slide],
        r#"{"people": [{"name": "Ana"}, {"name": "Bo"}, {"name": "Cy"}]}"#,
        &RenderOptions::default(),
    );
    assert!(report.is_empty());
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["Team", "Ana", "Bo", "Cy"]]);
    assert_eq!(shape_ids(&deck, 1), ["1", "2", "4", "5", "6"]);

    // Ids survive a save and reload
    let reloaded = PresentationTemplate::from_bytes(&deck.to_bytes().unwrap()).unwrap();
    assert_eq!(shape_ids(&reloaded, 1), ["1", "2", "4", "5", "6"]);
}

#[test]
fn test_shape_conditional_inside_group() {
    let slide = [
        numbered_shape(2, "Title", &["Status"]),
        group_shape(
            3,
            "Group",
            &[
                numbered_shape(4, "If", &["{% if ok %}"]),
                numbered_shape(5, "Good", &["All good"]),
                numbered_shape(6, "Else", &["{% else %}"]),
                numbered_shape(7, "Bad", &["Problems: {{ count }}"]),
                numbered_shape(8, "End", &["{% endif %}"]),
            ],
        ),
    ]
    .concat();

    let (deck, report) = render(&[slide.clone()], r#"{"ok": false, "count": 2}"#, &RenderOptions::default());
    assert!(report.is_empty());
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["Status", "Problems: 2"]]);
    assert_eq!(shape_ids(&deck, 1), ["1", "2", "3", "7"]);

    let (deck, _) = render(&[slide], r#"{"ok": true}"#, &RenderOptions::default());
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["Status", "All good"]]);
    assert_eq!(shape_ids(&deck, 1), ["1", "2", "3", "5"]);
}

#[test]
fn test_shape_loop_inside_group() {
    let slide = [
        numbered_shape(2, "Heading", &["List"]),
        group_shape(
            3,
            "Items",
            &[
                numbered_shape(4, "Loop", &["{% for i in items %}"]),
                numbered_shape(5, "Item", &["- {{ i }}"]),
                numbered_shape(6, "End", &["{% endfor %}"]),
            ],
        ),
        numbered_shape(7, "Footer", &["{{ items | length }} items"]),
    ]
    .concat();
    let (deck, report) = render(&[slide], r#"{"items": ["x", "y"]}"#, &RenderOptions::default());
    assert!(report.is_empty());
    assert_eq!(
        deck.slide_texts().unwrap(),
        vec![vec!["List", "- x", "- y", "2 items"]]
    );
    assert_eq!(shape_ids(&deck, 1), ["1", "2", "3", "5", "8", "7"]);
}

// =============================================================================
// Slides
// =============================================================================

#[test]
fn test_slide_loop_with_slide_numbers() {
    let slides = [
        text_shape("Cover", &["Team"]),
        text_shape("Loop", &["{% for person in people %}"]),
        text_shape("Name", &["{{ person.name }} on slide {{ slide_number }}"]),
        text_shape("End", &["{% endfor %}"]),
        text_shape("Outro", &["Bye"]),
    ];
    let (deck, report) = render(
        &slides,
        r#"{"people": [{"name": "Ana"}, {"name": "Bo"}]}"#,
        &RenderOptions::default(),
    );
    assert!(report.is_empty());
    assert_eq!(
        deck.slide_texts().unwrap(),
        vec![
            vec!["Team"],
            vec!["Ana on slide 2"],
            vec!["Bo on slide 3"],
            vec!["Bye"],
        ]
    );
}

#[test]
fn test_slide_conditional_drops_slides() {
    let slides = [
        text_shape("If", &["{% if show_appendix %}"]),
        text_shape("Appendix", &["Appendix"]),
        text_shape("End", &["{% endif %}"]),
        text_shape("Last", &["Last"]),
    ];
    let (deck, _) = render(&slides, r#"{"show_appendix": false}"#, &RenderOptions::default());
    assert_eq!(deck.slide_count().unwrap(), 1);
    assert_eq!(deck.slide_texts().unwrap(), vec![vec!["Last"]]);
}

#[test]
fn test_plain_deck_is_unchanged() {
    let slides = [
        text_shape("Title 1", &["Quarterly review", "Draft"]),
        table_shape("Table 1", &[&["a"], &["b"]]),
    ];
    let bytes = presentation(&slides);
    let before = PresentationTemplate::from_bytes(&bytes).unwrap().slide_texts().unwrap();

    let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
    let report = deck.render(&context(r#"{"unused": 1}"#), &RenderOptions::default()).unwrap();
    assert!(report.is_empty());
    assert_eq!(deck.slide_texts().unwrap(), before);

    let reloaded = PresentationTemplate::from_bytes(&deck.to_bytes().unwrap()).unwrap();
    assert_eq!(reloaded.slide_texts().unwrap(), before);
}

#[test]
fn test_save_and_reopen() {
    let slides = [
        text_shape("Loop", &["{% for n in numbers %}"]),
        text_shape("Body", &["#{{ n }}"]),
        text_shape("End", &["{% endfor %}"]),
    ];
    let (deck, _) = render(&slides, r#"{"numbers": [1, 2, 3]}"#, &RenderOptions::default());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.pptx");
    deck.save(&path).unwrap();

    let reopened = PresentationTemplate::open(&path).unwrap();
    assert_eq!(reopened.slide_count().unwrap(), 3);
    assert_eq!(reopened.slide_texts().unwrap(), vec![vec!["#1"], vec!["#2"], vec!["#3"]]);
}

#[test]
fn test_workbook_is_not_a_presentation() {
    let bytes = common::workbook(&[common::SheetFixture {
        name: "Sheet1",
        rows: &[&["x"]],
    }]);
    assert!(PresentationTemplate::from_bytes(&bytes).is_err());
}

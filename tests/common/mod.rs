//! In-memory builders for small .pptx and .xlsx templates.

#![allow(dead_code)]

use office_templates::template::Value;
use std::io::{Cursor, Write};
use zip::write::{SimpleFileOptions, ZipWriter};

const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const RELS_CT: &str = "application/vnd.openxmlformats-package.relationships+xml";
const OFFICE_DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const PML_NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

pub fn context(json: &str) -> Value {
    serde_json::from_str(json).expect("valid JSON context")
}

fn zip(files: Vec<(String, String)>) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

// =============================================================================
// PresentationML
// =============================================================================

/// A text shape with one single-run paragraph per entry.
pub fn text_shape(name: &str, paragraphs: &[&str]) -> String {
    numbered_shape(2, name, paragraphs)
}

/// A text shape with an explicit `cNvPr` id.
pub fn numbered_shape(id: u32, name: &str, paragraphs: &[&str]) -> String {
    let runs: Vec<Vec<&str>> = paragraphs.iter().map(|p| vec![*p]).collect();
    let runs: Vec<&[&str]> = runs.iter().map(Vec::as_slice).collect();
    shape_xml(id, name, &runs)
}

/// A text shape whose paragraphs are split into the given runs.
pub fn split_shape(name: &str, paragraphs: &[&[&str]]) -> String {
    shape_xml(2, name, paragraphs)
}

/// A group shape around `shapes`.
pub fn group_shape(id: u32, name: &str, shapes: &[String]) -> String {
    format!(
        r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="{}" name="{}"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:grpSp>"#,
        id,
        name,
        shapes.concat()
    )
}

fn shape_xml(id: u32, name: &str, paragraphs: &[&[&str]]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|runs| {
            let runs: String = runs
                .iter()
                .map(|text| format!(r#"<a:r><a:rPr lang="en-US"/><a:t>{}</a:t></a:r>"#, escape(text)))
                .collect();
            format!("<a:p>{}</a:p>", runs)
        })
        .collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/>{}</p:txBody></p:sp>"#,
        id, name, body
    )
}

/// A table shape with one paragraph per cell.
pub fn table_shape(name: &str, rows: &[&[&str]]) -> String {
    let rows: String = rows
        .iter()
        .map(|cells| {
            let cells: String = cells
                .iter()
                .map(|text| {
                    format!(
                        r#"<a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></a:txBody><a:tcPr/></a:tc>"#,
                        escape(text)
                    )
                })
                .collect();
            format!(r#"<a:tr h="370840">{}</a:tr>"#, cells)
        })
        .collect();
    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="4" name="{}"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblGrid><a:gridCol w="3048000"/></a:tblGrid>{}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
        name, rows
    )
}

/// A deck with one slide per entry, each holding the given shapes.
pub fn presentation(slides: &[String]) -> Vec<u8> {
    let slide_ct = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
    let slide_rel = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

    let mut files = Vec::new();
    let (mut overrides, mut ids, mut rels) = (String::new(), String::new(), String::new());
    for (i, shapes) in slides.iter().enumerate() {
        let n = i + 1;
        overrides.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="{}"/>"#,
            n, slide_ct
        ));
        ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="slides/slide{}.xml"/>"#,
            n, slide_rel, n
        ));
        files.push((
            format!("ppt/slides/slide{}.xml", n),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#,
                PML_NS, shapes
            ),
        ));
    }

    files.push((
        "[Content_Types].xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="{}"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>{}</Types>"#,
            RELS_CT, overrides
        ),
    ));
    files.push((
        "_rels/.rels".into(),
        format!(
            r#"<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}" Target="ppt/presentation.xml"/></Relationships>"#,
            RELS_NS, OFFICE_DOCUMENT
        ),
    ));
    files.push((
        "ppt/presentation.xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {}><p:sldIdLst>{}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/></p:presentation>"#,
            PML_NS, ids
        ),
    ));
    files.push((
        "ppt/_rels/presentation.xml.rels".into(),
        format!(r#"<Relationships xmlns="{}">{}</Relationships>"#, RELS_NS, rels),
    ));
    zip(files)
}

// =============================================================================
// SpreadsheetML
// =============================================================================

/// One worksheet: its name and rows of cells, starting at row 1.
///
/// Cells that parse as numbers are stored as numbers, other non-empty
/// cells as shared strings. An empty row leaves a blank gap.
pub struct SheetFixture<'a> {
    pub name: &'a str,
    pub rows: &'a [&'a [&'a str]],
}

fn column(index: usize) -> String {
    let mut index = index + 1;
    let mut name = String::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        name.insert(0, (b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    name
}

pub fn workbook(sheets: &[SheetFixture<'_>]) -> Vec<u8> {
    const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    let worksheet_ct = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
    let worksheet_rel = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

    let mut strings: Vec<String> = Vec::new();
    let mut files = Vec::new();
    let (mut overrides, mut entries, mut rels) = (String::new(), String::new(), String::new());

    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        let mut data = String::new();
        for (r, cells) in sheet.rows.iter().enumerate() {
            if cells.is_empty() {
                continue;
            }
            let row = r + 1;
            data.push_str(&format!(r#"<row r="{}">"#, row));
            for (c, text) in cells.iter().enumerate() {
                if text.is_empty() {
                    continue;
                }
                let reference = format!("{}{}", column(c), row);
                if text.parse::<f64>().is_ok() {
                    data.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, text));
                } else {
                    let index = strings.len();
                    strings.push(escape(text));
                    data.push_str(&format!(r#"<c r="{}" t="s"><v>{}</v></c>"#, reference, index));
                }
            }
            data.push_str("</row>");
        }

        files.push((
            format!("xl/worksheets/sheet{}.xml", n),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{}" xmlns:r="{}"><dimension ref="A1"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetData>{}</sheetData></worksheet>"#,
                MAIN_NS, R_NS, data
            ),
        ));
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="{}"/>"#,
            n, worksheet_ct
        ));
        entries.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(sheet.name),
            n,
            n
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}" Target="worksheets/sheet{}.xml"/>"#,
            n, worksheet_rel, n
        ));
    }

    let shared: String = strings.iter().map(|s| format!("<si><t>{}</t></si>", s)).collect();
    files.push((
        "xl/sharedStrings.xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="{}" count="{2}" uniqueCount="{2}">{}</sst>"#,
            MAIN_NS,
            shared,
            strings.len()
        ),
    ));
    rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
        sheets.len() + 1
    ));

    files.push((
        "[Content_Types].xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="{}"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>{}</Types>"#,
            RELS_CT, overrides
        ),
    ));
    files.push((
        "_rels/.rels".into(),
        format!(
            r#"<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}" Target="xl/workbook.xml"/></Relationships>"#,
            RELS_NS, OFFICE_DOCUMENT
        ),
    ));
    files.push((
        "xl/workbook.xml".into(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{}" xmlns:r="{}"><bookViews><workbookView activeTab="0"/></bookViews><sheets>{}</sheets></workbook>"#,
            MAIN_NS, R_NS, entries
        ),
    ));
    files.push((
        "xl/_rels/workbook.xml.rels".into(),
        format!(r#"<Relationships xmlns="{}">{}</Relationships>"#, RELS_NS, rels),
    ));
    zip(files)
}

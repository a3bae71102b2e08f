/// Package implementation for PowerPoint templates.
use crate::common::xml::{XmlDocument, XmlElement, XmlNode};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::{OpcPackage, PackURI, Relationships};
use crate::ooxml::pptx::dialect::{SlideDialect, ensure_paragraphs, renumber_shape_ids};
use crate::template::adapter::block_text;
use crate::template::{self, Dialect, Part, RenderOptions, Renderer, Report, Scope, Value, Walk, XmlWalker};
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;

/// Name bound to the 1-based position of the slide in the rendered deck.
pub const SLIDE_NUMBER: &str = "slide_number";

/// Slide IDs below this value are reserved.
const MIN_SLIDE_ID: u32 = 256;

/// One `p:sldId` entry of the presentation.
#[derive(Debug, Clone)]
struct SlideEntry {
    element: XmlElement,
    /// Qualified name of the relationship attribute (usually `r:id`)
    r_id_attr: String,
    r_id: String,
    partname: PackURI,
}

/// A slide while the deck is rendered; `origin` indexes the template slide it
/// was cloned from.
#[derive(Debug, Clone)]
struct SlideUnit {
    origin: usize,
    doc: XmlDocument,
}

/// Walks the slide list as the outermost structural level.
struct SlideWalker {
    rendered: usize,
}

impl Walk<SlideUnit> for SlideWalker {
    fn unit_text(&self, slide: &SlideUnit) -> String {
        block_text(&SlideDialect, &slide.doc.root)
    }

    fn render_unit(
        &mut self,
        slide: &mut SlideUnit,
        renderer: &mut Renderer<'_>,
        scope: &Scope<'_>,
    ) -> template::Result<()> {
        self.rendered += 1;
        let number = self.rendered;
        let previous = renderer.set_part(Some(Part::Slide(number)));

        let mut scope = scope.child();
        scope.bind(SLIDE_NUMBER, Value::Int(number as i64));
        debug!(slide = number, template_slide = slide.origin + 1, "rendering slide");

        let result = XmlWalker::new(&SlideDialect).render_element(&mut slide.doc.root, renderer, &scope);
        renderer.set_part(previous);
        result
    }
}

/// A PowerPoint (.pptx) template.
///
/// # Examples
///
/// ```rust,no_run
/// use office_templates::ooxml::pptx::PresentationTemplate;
/// use office_templates::template::{RenderOptions, Value};
///
/// let mut deck = PresentationTemplate::open("report.pptx")?;
/// let context: Value = serde_json::from_str(r#"{"title": "Q3"}"#)?;
/// let report = deck.render(&context, &RenderOptions::default())?;
/// for issue in &report {
///     eprintln!("{}", issue);
/// }
/// deck.save("report-q3.pptx")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct PresentationTemplate {
    package: OpcPackage,
    presentation: PackURI,
}

impl PresentationTemplate {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_package(OpcPackage::open(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_package(OpcPackage::from_bytes(bytes)?)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_package(OpcPackage::from_reader(reader)?)
    }

    /// Wrap a package, verifying that its main part is a presentation.
    pub fn from_package(package: OpcPackage) -> Result<Self> {
        let presentation = package.main_document_part()?;
        let content_type = package.content_types().get(&presentation).unwrap_or_default();
        // Support regular, template and macro-enabled presentations
        if ![ct::PML_PRESENTATION_MAIN, ct::PML_TEMPLATE_MAIN, ct::PML_PRES_MACRO_MAIN].contains(&content_type) {
            return Err(OoxmlError::InvalidContentType {
                expected: ct::PML_PRESENTATION_MAIN.to_string(),
                got: content_type.to_string(),
            });
        }
        Ok(Self { package, presentation })
    }

    #[inline]
    pub fn package(&self) -> &OpcPackage {
        &self.package
    }

    pub fn into_package(self) -> OpcPackage {
        self.package
    }

    pub fn slide_count(&self) -> Result<usize> {
        Ok(self.slide_entries()?.1.len())
    }

    /// Paragraph texts of every slide, in deck order.
    pub fn slide_texts(&self) -> Result<Vec<Vec<String>>> {
        let (_, entries) = self.slide_entries()?;
        entries
            .iter()
            .map(|entry| -> Result<Vec<String>> {
                let doc = self.package.xml_part(&entry.partname)?;
                let mut paragraphs = Vec::new();
                collect_paragraphs(&doc.root, &mut paragraphs);
                Ok(paragraphs)
            })
            .collect()
    }

    /// Render the deck in place.
    ///
    /// The slide list is the outermost structural level: a slide whose whole
    /// text is one block tag repeats or drops the slides up to its matching
    /// end slide. On error the package is left as it was.
    pub fn render(&mut self, context: &Value, options: &RenderOptions) -> template::Result<Report> {
        let mut renderer = Renderer::new(options)?;
        let (presentation, entries) = self.slide_entries()?;
        let mut slides = entries
            .iter()
            .enumerate()
            .map(|(origin, entry)| -> Result<SlideUnit> {
                Ok(SlideUnit {
                    origin,
                    doc: self.package.xml_part(&entry.partname)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(slides = slides.len(), "rendering presentation");

        let mut walker = SlideWalker { rendered: 0 };
        renderer.expand(&mut walker, &mut slides, &Scope::new(context))?;

        self.write_slides(presentation, &entries, slides)?;
        Ok(renderer.finish())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.package.to_bytes()?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Ok(self.package.save(path)?)
    }

    fn slide_entries(&self) -> Result<(XmlDocument, Vec<SlideEntry>)> {
        let doc = self.package.xml_part(&self.presentation)?;
        let rels = self.package.rels_for(&self.presentation)?;
        let base = self.presentation.base_uri();

        let mut entries = Vec::new();
        let Some(list) = doc.root.child("sldIdLst") else {
            return Ok((doc, entries));
        };
        for el in list.elements().filter(|el| el.is("sldId")) {
            let Some((r_id_attr, r_id)) = el
                .attrs
                .iter()
                .find(|(key, _)| key.split_once(':').is_some_and(|(_, local)| local == "id"))
            else {
                return Err(OoxmlError::InvalidFormat("slide entry without relationship ID".into()));
            };
            let rel = rels.get(r_id).ok_or_else(|| {
                OoxmlError::InvalidFormat(format!("slide relationship {} not found", r_id))
            })?;
            entries.push(SlideEntry {
                element: el.clone(),
                r_id_attr: r_id_attr.clone(),
                r_id: r_id.clone(),
                partname: rel.target_partname(base)?,
            });
        }
        Ok((doc, entries))
    }

    /// Lowest index above every numbered part next to the template slides.
    fn next_slide_index(&self, entries: &[SlideEntry]) -> u32 {
        let dirs: Vec<&str> = entries.iter().map(|e| e.partname.base_uri()).collect();
        self.package
            .partnames()
            .filter_map(|name| PackURI::new(name).ok())
            .filter(|uri| dirs.contains(&uri.base_uri()))
            .filter_map(|uri| uri.idx())
            .max()
            .map_or(1, |idx| idx + 1)
    }

    fn write_slides(&mut self, mut presentation: XmlDocument, entries: &[SlideEntry], slides: Vec<SlideUnit>) -> Result<()> {
        let base = self.presentation.base_uri().to_string();
        let mut rels = self.package.rels_for(&self.presentation)?;
        let mut next_id = entries
            .iter()
            .filter_map(|e| e.element.attr("id")?.parse::<u32>().ok())
            .max()
            .map_or(MIN_SLIDE_ID, |id| (id + 1).max(MIN_SLIDE_ID));
        let mut next_idx = self.next_slide_index(entries);

        let mut kept = vec![false; entries.len()];
        let mut output_ids: HashMap<String, Vec<String>> = HashMap::new();
        let mut list = Vec::with_capacity(slides.len());

        for SlideUnit { origin, mut doc } in slides {
            let entry = &entries[origin];
            ensure_paragraphs(&mut doc.root);
            renumber_shape_ids(&mut doc.root);

            let element = if !kept[origin] {
                kept[origin] = true;
                self.package.set_xml_part(&entry.partname, &doc);
                entry.element.clone()
            } else {
                let mut partname = entry.partname.with_idx(next_idx);
                while self.package.contains(&partname) {
                    next_idx += 1;
                    partname = entry.partname.with_idx(next_idx);
                }
                next_idx += 1;

                let mut slide_rels = self.package.rels_for(&entry.partname)?;
                slide_rels.retain(|rel| rel.reltype != rt::NOTES_SLIDE);
                self.package.set_xml_part(&partname, &doc);
                if !slide_rels.is_empty() {
                    self.package.set_rels(&partname, &slide_rels);
                }
                let content_type = self
                    .package
                    .content_types()
                    .get(&entry.partname)
                    .unwrap_or(ct::PML_SLIDE)
                    .to_string();
                self.package.content_types_mut().add_override(&partname, &content_type);

                let r_id = rels.add(rt::SLIDE, &partname.relative_ref(&base));
                let mut element = entry.element.clone();
                element.set_attr("id", itoa::Buffer::new().format(next_id));
                element.set_attr(&entry.r_id_attr, r_id);
                next_id += 1;
                debug!(template_slide = %entry.partname, clone = %partname, "cloned slide");
                element
            };

            if let Some(id) = entry.element.attr("id") {
                output_ids
                    .entry(id.to_string())
                    .or_default()
                    .extend(element.attr("id").map(str::to_string));
            }
            list.push(XmlNode::Element(element));
        }

        for (entry, _) in entries.iter().zip(&kept).filter(|(_, kept)| !**kept) {
            self.remove_slide(entry, &mut rels)?;
            if let Some(id) = entry.element.attr("id") {
                output_ids.entry(id.to_string()).or_default();
            }
        }

        if let Some(sld_id_lst) = presentation.root.child_mut("sldIdLst") {
            sld_id_lst.children = list;
        }
        if let Some(ext) = presentation.root.child_mut("extLst") {
            remap_sections(ext, &output_ids);
        }
        self.package.set_xml_part(&self.presentation, &presentation);
        self.package.set_rels(&self.presentation, &rels);
        Ok(())
    }

    fn remove_slide(&mut self, entry: &SlideEntry, rels: &mut Relationships) -> Result<()> {
        let slide_rels = self.package.rels_for(&entry.partname)?;
        for rel in slide_rels.of_type(rt::NOTES_SLIDE) {
            let notes = rel.target_partname(entry.partname.base_uri())?;
            self.package.remove_part(&notes);
        }
        self.package.remove_part(&entry.partname);
        rels.remove(&entry.r_id);
        debug!(slide = %entry.partname, "removed slide");
        Ok(())
    }
}

/// Rewrite section slide lists so they name the rendered slides.
///
/// Template IDs map to the IDs of their output slides, clones included;
/// IDs of removed slides map to nothing.
fn remap_sections(ext: &mut XmlElement, output_ids: &HashMap<String, Vec<String>>) {
    ext.visit_mut(&mut |el| {
        if !el.is("sldIdLst") {
            return;
        }
        for node in std::mem::take(&mut el.children) {
            match node {
                XmlNode::Element(sld_id) => match sld_id.attr("id").and_then(|id| output_ids.get(id)) {
                    Some(ids) => {
                        for id in ids {
                            let mut copy = sld_id.clone();
                            copy.set_attr("id", id.as_str());
                            el.push_element(copy);
                        }
                    },
                    None => el.push_element(sld_id),
                },
                other => el.children.push(other),
            }
        }
    });
}

fn collect_paragraphs(el: &XmlElement, out: &mut Vec<String>) {
    for child in el.elements() {
        if SlideDialect.is_text_block(child) {
            out.push(block_text(&SlideDialect, child));
        } else {
            collect_paragraphs(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{OnError, RenderError};
    use std::io::{Cursor, Write};
    use zip::write::{SimpleFileOptions, ZipWriter};

    const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

    fn shape(name: &str, paragraphs: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|text| format!("<a:p><a:r><a:rPr lang=\"en-US\"/><a:t>{}</a:t></a:r></a:p>", text))
            .collect();
        format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="{}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/>{}</p:txBody></p:sp>"#,
            name, body
        )
    }

    /// A deck with one slide per entry; slide `notes_on` gets a notes slide.
    fn deck(slides: &[String], notes_on: Option<usize>) -> Vec<u8> {
        let mut files: Vec<(String, String)> = Vec::new();
        let mut overrides = String::new();
        let mut ids = String::new();
        let mut pres_rels = String::new();

        for (i, shapes) in slides.iter().enumerate() {
            let n = i + 1;
            overrides.push_str(&format!(
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="{}"/>"#,
                n,
                ct::PML_SLIDE
            ));
            ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 1));
            pres_rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="{}" Target="slides/slide{}.xml"/>"#,
                n + 1,
                rt::SLIDE,
                n
            ));
            files.push((
                format!("ppt/slides/slide{}.xml", n),
                format!(
                    r#"<p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#,
                    NS, shapes
                ),
            ));
            if notes_on == Some(i) {
                files.push((
                    format!("ppt/slides/_rels/slide{}.xml.rels", n),
                    format!(
                        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="../notesSlides/notesSlide1.xml"/></Relationships>"#,
                        rt::NOTES_SLIDE
                    ),
                ));
                files.push(("ppt/notesSlides/notesSlide1.xml".into(), format!("<p:notes {}/>", NS)));
            }
        }

        files.push((
            "[Content_Types].xml".into(),
            format!(
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="{}"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="{}"/>{}</Types>"#,
                ct::OPC_RELATIONSHIPS,
                ct::PML_PRESENTATION_MAIN,
                overrides
            ),
        ));
        files.push((
            "_rels/.rels".into(),
            format!(
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="ppt/presentation.xml"/></Relationships>"#,
                rt::OFFICE_DOCUMENT
            ),
        ));
        files.push((
            "ppt/presentation.xml".into(),
            format!(r#"<p:presentation {}><p:sldIdLst>{}</p:sldIdLst></p:presentation>"#, NS, ids),
        ));
        files.push((
            "ppt/_rels/presentation.xml.rels".into(),
            format!(
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
                pres_rels
            ),
        ));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in files {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn context(json: &str) -> Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_values_and_slide_number() {
        let bytes = deck(&[shape("Title 1", &["{{ title | upper }}", "Slide {{ slide_number }}"])], None);
        let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
        let report = deck.render(&context(r#"{"title": "q3 review"}"#), &RenderOptions::default()).unwrap();
        assert!(report.is_empty());
        assert_eq!(deck.slide_texts().unwrap(), vec![vec!["Q3 REVIEW", "Slide 1"]]);
    }

    #[test]
    fn test_slide_loop_clones_slides() {
        let bytes = deck(
            &[
                shape("Loop", &["{% for person in people %}"]),
                shape("Name", &["{{ person.name }} ({{ slide_number }})"]),
                shape("End", &["{% endfor %}"]),
            ],
            Some(1),
        );
        let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
        deck.render(
            &context(r#"{"people": [{"name": "Ana"}, {"name": "Bo"}, {"name": "Cy"}]}"#),
            &RenderOptions::default(),
        )
        .unwrap();

        assert_eq!(
            deck.slide_texts().unwrap(),
            vec![vec!["Ana (1)"], vec!["Bo (2)"], vec!["Cy (3)"]]
        );

        let reloaded = PresentationTemplate::from_bytes(&deck.to_bytes().unwrap()).unwrap();
        let package = reloaded.package();
        assert!(!package.contains(&PackURI::new("/ppt/slides/slide1.xml").unwrap()));
        assert!(!package.contains(&PackURI::new("/ppt/slides/slide3.xml").unwrap()));
        let clone = PackURI::new("/ppt/slides/slide4.xml").unwrap();
        assert_eq!(package.content_types().get(&clone), Some(ct::PML_SLIDE));
        assert!(package.rels_for(&clone).unwrap().is_empty());
        assert!(package.contains(&PackURI::new("/ppt/notesSlides/notesSlide1.xml").unwrap()));

        let (presentation, entries) = reloaded.slide_entries().unwrap();
        let ids: Vec<&str> = entries.iter().filter_map(|e| e.element.attr("id")).collect();
        assert_eq!(ids, vec!["257", "259", "260"]);
        assert_eq!(presentation.root.child("sldIdLst").unwrap().elements().count(), 3);
    }

    #[test]
    fn test_empty_loop_removes_slides_and_notes() {
        let bytes = deck(
            &[
                shape("Intro", &["Intro"]),
                shape("Loop", &["{% for person in people %}"]),
                shape("Name", &["{{ person.name }}"]),
                shape("End", &["{% endfor %}"]),
            ],
            Some(2),
        );
        let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
        deck.render(&context(r#"{"people": []}"#), &RenderOptions::default())
            .unwrap();
        assert_eq!(deck.slide_count().unwrap(), 1);
        assert!(!deck.package().contains(&PackURI::new("/ppt/notesSlides/notesSlide1.xml").unwrap()));
        assert_eq!(deck.package().rels_for(&deck.presentation).unwrap().len(), 1);
    }

    #[test]
    fn test_shape_level_conditional() {
        let bytes = deck(
            &[[
                shape("If", &["{% if show %}"]),
                shape("Body", &["shown"]),
                shape("Else", &["{% else %}"]),
                shape("Other", &["hidden"]),
                shape("End", &["{% endif %}"]),
            ]
            .concat()],
            None,
        );
        let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
        deck.render(&context(r#"{"show": true}"#), &RenderOptions::default())
            .unwrap();
        assert_eq!(deck.slide_texts().unwrap(), vec![vec!["shown"]]);
    }

    #[test]
    fn test_strict_error_names_slide_and_shape() {
        let bytes = deck(&[shape("Intro", &["ok"]), shape("Title 2", &["{{ missing }}"])], None);
        let mut deck = PresentationTemplate::from_bytes(&bytes).unwrap();
        let options = RenderOptions::default().with_strict(true).with_on_error(OnError::FailFast);
        let err = deck.render(&Value::None, &options).unwrap_err();
        assert!(matches!(err, RenderError::Resolution { .. }));
        assert_eq!(err.location().unwrap().to_string(), "slide 2, shape 'Title 2'");
        assert_eq!(
            PresentationTemplate::from_bytes(&bytes).unwrap().slide_texts().unwrap(),
            deck.slide_texts().unwrap()
        );
    }

    #[test]
    fn test_remap_sections() {
        let mut ext = XmlDocument::parse(
            br#"<p:extLst><p:ext><p14:sectionLst><p14:section name="A"><p14:sldIdLst><p14:sldId id="256"/><p14:sldId id="257"/><p14:sldId id="300"/></p14:sldIdLst></p14:section></p14:sectionLst></p:ext></p:extLst>"#,
        )
        .unwrap();
        let mut ids = HashMap::new();
        ids.insert("256".to_string(), vec![]);
        ids.insert("257".to_string(), vec!["257".to_string(), "301".to_string()]);
        remap_sections(&mut ext.root, &ids);
        let mut out = String::new();
        ext.root.write_to(&mut out);
        assert!(out.contains(r#"<p14:sldIdLst><p14:sldId id="257"/><p14:sldId id="301"/><p14:sldId id="300"/></p14:sldIdLst>"#));
    }

    #[test]
    fn test_rejects_other_documents() {
        let bytes = deck(&[], None);
        let mut package = OpcPackage::from_bytes(&bytes).unwrap();
        let main = package.main_document_part().unwrap();
        package.content_types_mut().add_override(&main, ct::SML_SHEET_MAIN);
        assert!(matches!(
            PresentationTemplate::from_package(package),
            Err(OoxmlError::InvalidContentType { .. })
        ));
    }
}

//! Excel workbook templates.
//!
//! The sheet list is the outermost structural level, then each worksheet's
//! rows. Cells are rendered inline after shared strings holding template
//! markup were inlined.

use crate::common::xml::{XmlDocument, XmlElement, XmlNode};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::{OpcPackage, PackURI, Relationships};
use crate::ooxml::xlsx::dialect::SheetDialect;
use crate::ooxml::xlsx::rows;
use crate::ooxml::xlsx::shared_strings::SharedStrings;
use crate::template::adapter::block_text;
use crate::template::{self, Part, RenderOptions, Renderer, Report, Scope, Value, Walk, XmlWalker};
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;

/// Longest sheet name Excel accepts.
pub const MAX_SHEET_NAME: usize = 31;

/// Relationship types that must not be shared between two sheets.
const UNSHAREABLE: [&str; 2] = [rt::TABLE, rt::PIVOT_TABLE];

/// One `sheet` entry of the workbook.
#[derive(Debug, Clone)]
struct SheetEntry {
    element: XmlElement,
    r_id_attr: String,
    r_id: String,
    partname: PackURI,
}

/// A sheet while the workbook is rendered. `doc` is `None` for chart and
/// dialog sheets, which are moved and cloned but never rendered.
#[derive(Debug, Clone)]
struct SheetUnit {
    origin: usize,
    name: String,
    doc: Option<XmlDocument>,
}

struct SheetWalker;

impl SheetWalker {
    fn render_sheet(sheet: &mut SheetUnit, renderer: &mut Renderer<'_>, scope: &Scope<'_>) -> template::Result<()> {
        sheet.name = renderer.render_string(&sheet.name, scope)?;
        renderer.set_part(Some(Part::Sheet(sheet.name.clone())));
        debug!(sheet = %sheet.name, "rendering sheet");

        let Some(doc) = sheet.doc.as_mut() else {
            return Ok(());
        };
        let template_rows = rows::template_rows(&doc.root);
        XmlWalker::new(&SheetDialect).render_element(&mut doc.root, renderer, scope)?;
        rows::renumber(&mut doc.root, &template_rows);
        Ok(())
    }
}

impl Walk<SheetUnit> for SheetWalker {
    fn unit_text(&self, sheet: &SheetUnit) -> String {
        sheet
            .doc
            .as_ref()
            .map(|doc| block_text(&SheetDialect, &doc.root))
            .unwrap_or_default()
    }

    fn render_unit(
        &mut self,
        sheet: &mut SheetUnit,
        renderer: &mut Renderer<'_>,
        scope: &Scope<'_>,
    ) -> template::Result<()> {
        let previous = renderer.set_part(Some(Part::Sheet(sheet.name.clone())));
        let result = Self::render_sheet(sheet, renderer, scope);
        renderer.set_part(previous);
        result
    }
}

/// An Excel (.xlsx) template.
///
/// # Examples
///
/// ```rust,no_run
/// use office_templates::ooxml::xlsx::WorkbookTemplate;
/// use office_templates::template::{RenderOptions, Value};
///
/// let mut book = WorkbookTemplate::open("orders.xlsx")?;
/// let context: Value = serde_json::from_str(r#"{"orders": [{"id": 1, "total": 9.5}]}"#)?;
/// book.render(&context, &RenderOptions::default())?;
/// book.save("orders-filled.xlsx")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct WorkbookTemplate {
    package: OpcPackage,
    workbook: PackURI,
}

impl WorkbookTemplate {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_package(OpcPackage::open(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_package(OpcPackage::from_bytes(bytes)?)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_package(OpcPackage::from_reader(reader)?)
    }

    /// Wrap a package, verifying that its main part is a workbook.
    pub fn from_package(package: OpcPackage) -> Result<Self> {
        let workbook = package.main_document_part()?;
        let content_type = package.content_types().get(&workbook).unwrap_or_default();
        // Support regular, template and macro-enabled workbooks
        if ![ct::SML_SHEET_MAIN, ct::SML_TEMPLATE_MAIN, ct::SML_SHEET_MACRO_MAIN].contains(&content_type) {
            return Err(OoxmlError::InvalidContentType {
                expected: ct::SML_SHEET_MAIN.to_string(),
                got: content_type.to_string(),
            });
        }
        Ok(Self { package, workbook })
    }

    #[inline]
    pub fn package(&self) -> &OpcPackage {
        &self.package
    }

    pub fn into_package(self) -> OpcPackage {
        self.package
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Result<Vec<String>> {
        let (_, entries) = self.sheet_entries()?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry.element.attr("name").map(str::to_string))
            .collect())
    }

    /// Cell references and display texts of a worksheet, in document order.
    ///
    /// Shared strings are resolved; other cells show their stored value.
    pub fn cells(&self, sheet: &str) -> Result<Vec<(String, String)>> {
        let (_, entries) = self.sheet_entries()?;
        let entry = entries
            .iter()
            .find(|entry| entry.element.attr("name") == Some(sheet))
            .ok_or_else(|| OoxmlError::InvalidFormat(format!("no sheet named '{}'", sheet)))?;
        let doc = self.package.xml_part(&entry.partname)?;
        let strings = self.shared_strings()?;

        let mut cells = Vec::new();
        let Some(sheet_data) = doc.root.child("sheetData") else {
            return Ok(cells);
        };
        for cell in sheet_data.elements().flat_map(|row| row.elements()).filter(|el| el.is("c")) {
            let text = match cell.attr("t") {
                Some("inlineStr") => block_text(&SheetDialect, cell),
                Some("s") => cell
                    .child("v")
                    .and_then(|v| v.text().trim().parse().ok())
                    .and_then(|index| strings.text(index))
                    .unwrap_or_default(),
                _ => cell.child("v").map(|v| v.text()).unwrap_or_default(),
            };
            cells.push((cell.attr("r").unwrap_or_default().to_string(), text));
        }
        Ok(cells)
    }

    /// Render the workbook in place.
    ///
    /// A sheet whose whole text is one block tag repeats or drops the sheets
    /// up to its matching end sheet. Sheet names may hold placeholders;
    /// repeated sheets get unique names. On error the package is left as it
    /// was.
    pub fn render(&mut self, context: &Value, options: &RenderOptions) -> template::Result<Report> {
        let mut renderer = Renderer::new(options)?;
        let (workbook, entries) = self.sheet_entries()?;
        let strings = self.shared_strings()?;
        let workbook_rels = self.package.rels_for(&self.workbook)?;

        let markers = renderer.markers().clone();
        let contains_markup =
            |text: &str| text.contains(markers.value_open.as_str()) || text.contains(markers.block_open.as_str());

        let mut sheets = Vec::with_capacity(entries.len());
        for (origin, entry) in entries.iter().enumerate() {
            let is_worksheet = workbook_rels
                .get(&entry.r_id)
                .is_some_and(|rel| rel.reltype == rt::WORKSHEET);
            let doc = if is_worksheet {
                let mut doc = self.package.xml_part(&entry.partname)?;
                let inlined = strings.inline_cells(&mut doc.root, contains_markup);
                debug!(sheet = %entry.partname, inlined, "inlined shared strings");
                Some(doc)
            } else {
                None
            };
            sheets.push(SheetUnit {
                origin,
                name: entry.element.attr("name").unwrap_or_default().to_string(),
                doc,
            });
        }
        debug!(sheets = sheets.len(), "rendering workbook");

        renderer.expand(&mut SheetWalker, &mut sheets, &Scope::new(context))?;

        self.write_sheets(workbook, workbook_rels, &entries, sheets)?;
        Ok(renderer.finish())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.package.to_bytes()?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Ok(self.package.save(path)?)
    }

    fn shared_strings(&self) -> Result<SharedStrings> {
        let rels = self.package.rels_for(&self.workbook)?;
        let Some(rel) = rels.part_with_reltype(rt::SHARED_STRINGS) else {
            return Ok(SharedStrings::new());
        };
        let partname = rel.target_partname(self.workbook.base_uri())?;
        Ok(SharedStrings::parse(self.package.part(&partname)?)?)
    }

    fn sheet_entries(&self) -> Result<(XmlDocument, Vec<SheetEntry>)> {
        let doc = self.package.xml_part(&self.workbook)?;
        let rels = self.package.rels_for(&self.workbook)?;
        let base = self.workbook.base_uri();

        let mut entries = Vec::new();
        let Some(sheets) = doc.root.child("sheets") else {
            return Ok((doc, entries));
        };
        for el in sheets.elements().filter(|el| el.is("sheet")) {
            let Some((r_id_attr, r_id)) = el
                .attrs
                .iter()
                .find(|(key, _)| key.split_once(':').is_some_and(|(_, local)| local == "id"))
            else {
                return Err(OoxmlError::InvalidFormat("sheet entry without relationship ID".into()));
            };
            let rel = rels.get(r_id).ok_or_else(|| {
                OoxmlError::InvalidFormat(format!("sheet relationship {} not found", r_id))
            })?;
            entries.push(SheetEntry {
                element: el.clone(),
                r_id_attr: r_id_attr.clone(),
                r_id: r_id.clone(),
                partname: rel.target_partname(base)?,
            });
        }
        Ok((doc, entries))
    }

    fn next_part_index(&self, dir: &str) -> u32 {
        self.package
            .partnames()
            .filter_map(|name| PackURI::new(name).ok())
            .filter(|uri| uri.base_uri() == dir)
            .filter_map(|uri| uri.idx())
            .max()
            .map_or(1, |idx| idx + 1)
    }

    fn write_sheets(
        &mut self,
        mut workbook: XmlDocument,
        mut rels: Relationships,
        entries: &[SheetEntry],
        sheets: Vec<SheetUnit>,
    ) -> Result<()> {
        if sheets.is_empty() {
            return Err(OoxmlError::InvalidFormat("rendering removed every sheet".into()));
        }
        let base = self.workbook.base_uri().to_string();
        let mut next_sheet_id = entries
            .iter()
            .filter_map(|e| e.element.attr("sheetId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;

        let mut kept = vec![false; entries.len()];
        // First output position of every template sheet
        let mut positions: Vec<Option<usize>> = vec![None; entries.len()];
        let mut names: Vec<String> = Vec::with_capacity(sheets.len());
        let mut list = Vec::with_capacity(sheets.len());

        for (position, SheetUnit { origin, name, doc }) in sheets.into_iter().enumerate() {
            let entry = &entries[origin];
            let name = unique_sheet_name(&name, &names);

            let mut element = entry.element.clone();
            element.set_attr("name", name.as_str());
            if !kept[origin] {
                kept[origin] = true;
                positions[origin] = Some(position);
                if let Some(doc) = doc {
                    self.package.set_xml_part(&entry.partname, &doc);
                }
            } else {
                let r_id = self.clone_sheet(entry, doc, &mut rels, &base)?;
                element.set_attr("sheetId", itoa::Buffer::new().format(next_sheet_id));
                element.set_attr(&entry.r_id_attr, r_id);
                next_sheet_id += 1;
            }
            names.push(name);
            list.push(XmlNode::Element(element));
        }

        for (entry, _) in entries.iter().zip(&kept).filter(|(_, kept)| !**kept) {
            self.package.remove_part(&entry.partname);
            rels.remove(&entry.r_id);
            debug!(sheet = %entry.partname, "removed sheet");
        }

        // Cell positions changed, so the calculation chain is stale.
        let chains: Vec<String> = rels.of_type(rt::CALC_CHAIN).map(|rel| rel.r_id.clone()).collect();
        for r_id in chains {
            if let Some(rel) = rels.remove(&r_id)
                && let Ok(partname) = rel.target_partname(&base)
            {
                self.package.remove_part(&partname);
            }
        }

        if let Some(sheets) = workbook.root.child_mut("sheets") {
            sheets.children = list;
        }
        fix_sheet_indices(&mut workbook.root, &positions, names.len());
        self.package.set_xml_part(&self.workbook, &workbook);
        self.package.set_rels(&self.workbook, &rels);
        Ok(())
    }

    /// Store a copy of a template sheet under a new part name and return the
    /// workbook relationship ID pointing at it.
    fn clone_sheet(
        &mut self,
        entry: &SheetEntry,
        doc: Option<XmlDocument>,
        rels: &mut Relationships,
        base: &str,
    ) -> Result<String> {
        let dir = entry.partname.base_uri();
        let mut idx = self.next_part_index(dir);
        let mut partname = entry.partname.with_idx(idx);
        while self.package.contains(&partname) {
            idx += 1;
            partname = entry.partname.with_idx(idx);
        }

        let mut sheet_rels = self.package.rels_for(&entry.partname)?;
        sheet_rels.retain(|rel| !UNSHAREABLE.contains(&rel.reltype.as_str()));
        match doc {
            Some(mut doc) => {
                prepare_clone(&mut doc.root);
                self.package.set_xml_part(&partname, &doc);
            },
            None => {
                let data = self.package.part(&entry.partname)?.to_vec();
                self.package.set_part(&partname, data);
            },
        }
        if !sheet_rels.is_empty() {
            self.package.set_rels(&partname, &sheet_rels);
        }
        let content_type = self
            .package
            .content_types()
            .get(&entry.partname)
            .unwrap_or(ct::SML_WORKSHEET)
            .to_string();
        self.package.content_types_mut().add_override(&partname, &content_type);

        let reltype = rels
            .get(&entry.r_id)
            .map_or(rt::WORKSHEET.to_string(), |rel| rel.reltype.clone());
        debug!(template_sheet = %entry.partname, clone = %partname, "cloned sheet");
        Ok(rels.add(&reltype, &partname.relative_ref(base)))
    }
}

/// Remove what a second copy of a sheet must not carry: table parts (their
/// relationships are dropped) and tab selection.
fn prepare_clone(root: &mut XmlElement) {
    root.children
        .retain(|node| !matches!(node, XmlNode::Element(el) if el.is("tableParts")));
    if let Some(views) = root.child_mut("sheetViews") {
        for view in views.elements_mut() {
            view.remove_attr("tabSelected");
        }
    }
}

/// Remap sheet positions in defined names and book views.
fn fix_sheet_indices(root: &mut XmlElement, positions: &[Option<usize>], count: usize) {
    if let Some(defined_names) = root.child_mut("definedNames") {
        defined_names.children.retain_mut(|node| {
            let XmlNode::Element(name) = node else {
                return true;
            };
            let Some(local) = name.attr("localSheetId").and_then(|id| id.parse::<usize>().ok()) else {
                return true;
            };
            match positions.get(local).copied().flatten() {
                Some(position) => {
                    name.set_attr("localSheetId", itoa::Buffer::new().format(position));
                    true
                },
                None => false,
            }
        });
    }
    if let Some(views) = root.child_mut("bookViews") {
        for view in views.elements_mut() {
            for attr in ["activeTab", "firstSheet"] {
                let out_of_range = view
                    .attr(attr)
                    .and_then(|tab| tab.parse::<usize>().ok())
                    .is_some_and(|tab| tab >= count);
                if out_of_range {
                    view.set_attr(attr, "0");
                }
            }
        }
    }
}

/// A valid sheet name, unique (case-insensitively) among `taken`.
///
/// Characters Excel rejects become `_`, and names are cut to 31 characters
/// with room left for a ` (n)` suffix when needed.
fn unique_sheet_name(name: &str, taken: &[String]) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('\'');
    let base = if cleaned.is_empty() { "Sheet" } else { cleaned };

    let is_taken = |candidate: &str| taken.iter().any(|t| t.to_lowercase() == candidate.to_lowercase());
    let first: String = base.chars().take(MAX_SHEET_NAME).collect();
    if !is_taken(&first) {
        return first;
    }
    for n in 2.. {
        let suffix = format!(" ({})", n);
        let stem: String = base.chars().take(MAX_SHEET_NAME - suffix.len()).collect();
        let candidate = format!("{}{}", stem, suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
    }
    first
}

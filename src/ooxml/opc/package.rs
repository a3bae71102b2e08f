/// In-memory OPC package.
///
/// All members are loaded eagerly. Template rendering rewrites most XML parts
/// and clones some, so the package keeps raw bytes per part and lets callers
/// parse the parts they touch. Binary parts (media, embeddings) pass through
/// untouched.
use crate::common::xml::XmlDocument;
use crate::ooxml::opc::constants::relationship_type;
use crate::ooxml::opc::content_types::ContentTypes;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::{CONTENT_TYPES_MEMBER, PackURI};
use crate::ooxml::opc::rel::Relationships;
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::debug;
use zip::write::{SimpleFileOptions, ZipWriter};

#[derive(Debug, Clone)]
pub struct OpcPackage {
    content_types: ContentTypes,
    /// Part name -> content, in archive order
    parts: IndexMap<String, Vec<u8>>,
}

impl OpcPackage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut content_types = None;
        let mut parts = IndexMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;

            if name == CONTENT_TYPES_MEMBER {
                content_types = Some(ContentTypes::from_xml(&data)?);
            } else {
                parts.insert(PackURI::from_member(&name).as_str().to_string(), data);
            }
        }

        let content_types =
            content_types.ok_or_else(|| OpcError::PartNotFound(CONTENT_TYPES_MEMBER.to_string()))?;
        debug!(parts = parts.len(), "loaded OPC package");
        Ok(Self { content_types, parts })
    }

    #[inline]
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    #[inline]
    pub fn content_types_mut(&mut self) -> &mut ContentTypes {
        &mut self.content_types
    }

    pub fn contains(&self, partname: &PackURI) -> bool {
        self.parts.contains_key(partname.as_str())
    }

    /// Part names in archive order.
    pub fn partnames(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn part(&self, partname: &PackURI) -> Result<&[u8]> {
        self.parts
            .get(partname.as_str())
            .map(Vec::as_slice)
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))
    }

    pub fn xml_part(&self, partname: &PackURI) -> Result<XmlDocument> {
        XmlDocument::parse(self.part(partname)?).map_err(|source| OpcError::Xml {
            part: partname.to_string(),
            source,
        })
    }

    /// Insert or replace a part. New parts are appended to the archive order.
    pub fn set_part(&mut self, partname: &PackURI, data: Vec<u8>) {
        self.parts.insert(partname.as_str().to_string(), data);
    }

    pub fn set_xml_part(&mut self, partname: &PackURI, doc: &XmlDocument) {
        self.set_part(partname, doc.to_bytes());
    }

    /// Remove a part together with its relationships and content-type override.
    pub fn remove_part(&mut self, partname: &PackURI) -> Option<Vec<u8>> {
        self.parts.shift_remove(partname.rels_uri().as_str());
        self.content_types.remove_override(partname);
        self.parts.shift_remove(partname.as_str())
    }

    /// Relationships of a part; empty when it has no `.rels` part.
    pub fn rels_for(&self, partname: &PackURI) -> Result<Relationships> {
        let rels_uri = partname.rels_uri();
        match self.parts.get(rels_uri.as_str()) {
            Some(data) => Relationships::from_xml(data, rels_uri.as_str()),
            None => Ok(Relationships::new()),
        }
    }

    pub fn set_rels(&mut self, partname: &PackURI, rels: &Relationships) {
        self.set_part(&partname.rels_uri(), rels.to_xml());
    }

    /// Relationships of the package itself (`/_rels/.rels`).
    pub fn package_rels(&self) -> Result<Relationships> {
        self.rels_for(&PackURI::from_member(""))
    }

    /// The part targeted by the package's officeDocument relationship.
    pub fn main_document_part(&self) -> Result<PackURI> {
        let rels = self.package_rels()?;
        let rel = rels
            .part_with_reltype(relationship_type::OFFICE_DOCUMENT)
            .ok_or_else(|| OpcError::RelationshipNotFound(relationship_type::OFFICE_DOCUMENT.to_string()))?;
        rel.target_partname("/")
    }

    /// Write the package as a ZIP archive.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(CONTENT_TYPES_MEMBER, options)?;
        zip.write_all(&self.content_types.to_xml())?;
        for (name, data) in &self.parts {
            zip.start_file(&name[1..], options)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::content_type as CT;

    fn minimal() -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let files: [(&str, &str); 3] = [
            (
                "[Content_Types].xml",
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#,
            ),
            (
                "_rels/.rels",
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
            ),
            ("xl/workbook.xml", "<workbook/>"),
        ];
        for (name, body) in files {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_load_and_locate_main_part() {
        let pkg = OpcPackage::from_bytes(&minimal()).unwrap();
        let main = pkg.main_document_part().unwrap();
        assert_eq!(main.as_str(), "/xl/workbook.xml");
        assert_eq!(pkg.content_types().get(&main), Some(CT::SML_SHEET_MAIN));
        assert_eq!(pkg.xml_part(&main).unwrap().root.name, "workbook");
        assert!(pkg.rels_for(&main).unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_through_zip() {
        let mut pkg = OpcPackage::from_bytes(&minimal()).unwrap();
        let sheet = PackURI::new("/xl/worksheets/sheet1.xml").unwrap();
        pkg.set_part(&sheet, b"<worksheet/>".to_vec());
        pkg.content_types_mut().add_override(&sheet, CT::SML_WORKSHEET);

        let reloaded = OpcPackage::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        assert_eq!(reloaded.part(&sheet).unwrap(), b"<worksheet/>");
        assert_eq!(reloaded.content_types().get(&sheet), Some(CT::SML_WORKSHEET));
        assert_eq!(reloaded.partnames().count(), 3);
    }

    #[test]
    fn test_remove_part_drops_rels_and_override() {
        let mut pkg = OpcPackage::from_bytes(&minimal()).unwrap();
        let main = pkg.main_document_part().unwrap();
        let mut rels = Relationships::new();
        rels.add(relationship_type::WORKSHEET, "worksheets/sheet1.xml");
        pkg.set_rels(&main, &rels);
        assert!(pkg.contains(&main.rels_uri()));

        assert!(pkg.remove_part(&main).is_some());
        assert!(!pkg.contains(&main.rels_uri()));
        assert_eq!(pkg.content_types().get(&main), Some(CT::XML));
    }

    #[test]
    fn test_missing_content_types_is_an_error() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("a.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<a/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(OpcPackage::from_bytes(&bytes), Err(OpcError::PartNotFound(_))));
    }
}

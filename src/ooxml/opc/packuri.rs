/// Part names inside an OPC package.
///
/// A part name always starts with a forward slash and uses forward slashes as
/// separators (`/ppt/slides/slide1.xml`). The ZIP member name is the same
/// string without the leading slash.
use super::error::{OpcError, Result};
use std::fmt;

/// The `[Content_Types].xml` member
pub const CONTENT_TYPES_MEMBER: &str = "[Content_Types].xml";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackURI {
    uri: String,
}

impl PackURI {
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(OpcError::InvalidPartName(format!(
                "part name must begin with '/', got '{}'",
                uri
            )));
        }
        Ok(Self { uri })
    }

    /// Part name of a ZIP member.
    pub fn from_member(member: &str) -> Self {
        Self {
            uri: format!("/{}", member.trim_start_matches('/')),
        }
    }

    /// Resolve a relationship target against the directory of its source part.
    ///
    /// Absolute targets (`/xl/workbook.xml`) are taken as they are.
    pub fn from_rel_ref(base_uri: &str, target: &str) -> Result<Self> {
        let joined = if target.starts_with('/') {
            target.to_string()
        } else if base_uri.ends_with('/') {
            format!("{}{}", base_uri, target)
        } else {
            format!("{}/{}", base_uri, target)
        };

        let mut segments: Vec<&str> = Vec::new();
        for segment in joined.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    if segments.pop().is_none() {
                        return Err(OpcError::InvalidPartName(format!(
                            "'{}' escapes the package root from '{}'",
                            target, base_uri
                        )));
                    }
                },
                other => segments.push(other),
            }
        }
        Self::new(format!("/{}", segments.join("/")))
    }

    /// Directory of the part (`/ppt/slides` for `/ppt/slides/slide1.xml`).
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    pub fn filename(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or_default()
    }

    /// Extension without the dot.
    pub fn ext(&self) -> &str {
        self.filename().rsplit_once('.').map_or("", |(_, ext)| ext)
    }

    /// Trailing number of the file stem (21 for `slide21.xml`).
    pub fn idx(&self) -> Option<u32> {
        let stem = self.filename().split('.').next().unwrap_or_default();
        let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 || digits == stem.len() {
            return None;
        }
        stem[stem.len() - digits..].parse().ok()
    }

    /// Same directory and stem prefix with another index
    /// (`/ppt/slides/slide1.xml` -> `/ppt/slides/slide7.xml`).
    pub fn with_idx(&self, idx: u32) -> Self {
        let filename = self.filename();
        let (stem, ext) = match filename.split_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (filename, None),
        };
        let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());
        let mut name = String::with_capacity(self.uri.len() + 4);
        if self.base_uri() != "/" {
            name.push_str(self.base_uri());
        }
        name.push('/');
        name.push_str(prefix);
        name.push_str(itoa::Buffer::new().format(idx));
        if let Some(ext) = ext {
            name.push('.');
            name.push_str(ext);
        }
        Self { uri: name }
    }

    /// ZIP member name (no leading slash).
    pub fn membername(&self) -> &str {
        &self.uri[1..]
    }

    /// Relative reference from `base_uri` to this part.
    pub fn relative_ref(&self, base_uri: &str) -> String {
        let from: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();
        let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

        let mut parts: Vec<&str> = vec![".."; from.len() - common];
        parts.extend_from_slice(&to[common..]);
        parts.join("/")
    }

    /// The `.rels` part holding this part's relationships.
    pub fn rels_uri(&self) -> Self {
        let base = self.base_uri();
        let base = if base == "/" { "" } else { base };
        Self {
            uri: format!("{}/_rels/{}.rels", base, self.filename()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

impl fmt::Display for PackURI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

//! Issues collected during a render pass.

use serde::Serialize;
use std::fmt;

/// Container part in which an issue occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// 1-based position in the rendered deck.
    Slide(usize),
    Sheet(String),
}

/// Element inside a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Shape(String),
    Cell(String),
}

/// Where in the document something happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub part: Option<Part>,
    pub element: Option<Element>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.part {
            Some(Part::Slide(n)) => write!(f, "slide {}", n)?,
            Some(Part::Sheet(name)) => write!(f, "sheet '{}'", name)?,
            None => f.write_str("document")?,
        }
        match &self.element {
            Some(Element::Shape(name)) => write!(f, ", shape '{}'", name),
            Some(Element::Cell(reference)) => write!(f, ", cell {}", reference),
            None => Ok(()),
        }
    }
}

/// One loop level enclosing an issue: the binding names and 0-based index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopStep {
    pub binding: String,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A context path did not resolve; blank text was substituted.
    MissingValue,
    /// A loop over something that cannot be iterated.
    NotIterable,
    /// A filter rejected its input; the unfiltered text was substituted.
    FilterApplication,
    /// A strict-mode failure that aborted one loop iteration.
    AbortedIteration,
    /// The viewer may not see an object; it was blanked or left out of its sequence.
    PermissionDenied,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
    /// Placeholder text as written in the template.
    pub raw: String,
    pub location: Location,
    pub loop_path: Vec<LoopStep>,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ('{}')", self.location, self.message, self.raw)?;
        for step in &self.loop_path {
            write!(f, " [{} #{}]", step.binding, step.index)?;
        }
        Ok(())
    }
}

/// Outcome of a render pass that did not abort.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    issues: Vec<Issue>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.issues.iter()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Issues of one kind.
    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.iter()
    }
}

//! Parallel rendering of independent documents.
//!
//! A render pass is single-threaded and owns its document. Batches clone the
//! template once per context and render the copies on rayon's thread pool;
//! nothing is shared between jobs except the read-only template and options.

use crate::ooxml::pptx::PresentationTemplate;
use crate::ooxml::xlsx::WorkbookTemplate;
use crate::template::{RenderOptions, Report, Result, Value};
use rayon::prelude::*;
use tracing::debug;

/// A document type the batch functions can render.
pub trait Renderable: Clone + Send + Sync {
    fn render(&mut self, context: &Value, options: &RenderOptions) -> Result<Report>;
}

impl Renderable for PresentationTemplate {
    fn render(&mut self, context: &Value, options: &RenderOptions) -> Result<Report> {
        PresentationTemplate::render(self, context, options)
    }
}

impl Renderable for WorkbookTemplate {
    fn render(&mut self, context: &Value, options: &RenderOptions) -> Result<Report> {
        WorkbookTemplate::render(self, context, options)
    }
}

/// A rendered copy of a template and the issues collected while rendering it.
#[derive(Debug, Clone)]
pub struct Rendered<T> {
    pub document: T,
    pub report: Report,
}

/// Render `template` once per context, in parallel. Results keep the order
/// of `contexts`; one failing job does not affect the others.
pub fn render_all<T: Renderable>(template: &T, contexts: &[Value], options: &RenderOptions) -> Vec<Result<Rendered<T>>> {
    debug!(jobs = contexts.len(), "rendering batch");
    contexts
        .par_iter()
        .map(|context| {
            let mut document = template.clone();
            let report = document.render(context, options)?;
            Ok(Rendered { document, report })
        })
        .collect()
}

pub fn render_presentations(
    template: &PresentationTemplate,
    contexts: &[Value],
    options: &RenderOptions,
) -> Vec<Result<Rendered<PresentationTemplate>>> {
    render_all(template, contexts, options)
}

pub fn render_workbooks(
    template: &WorkbookTemplate,
    contexts: &[Value],
    options: &RenderOptions,
) -> Vec<Result<Rendered<WorkbookTemplate>>> {
    render_all(template, contexts, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::RenderError;

    /// Renders the context's `n` into a string.
    #[derive(Debug, Clone, Default)]
    struct Note(String);

    impl Renderable for Note {
        fn render(&mut self, context: &Value, options: &RenderOptions) -> Result<Report> {
            let (text, report) = crate::template::render_str("n={{ n }}", context, options)?;
            self.0 = text;
            Ok(report)
        }
    }

    #[test]
    fn test_results_keep_context_order() {
        let contexts: Vec<Value> = (0..32)
            .map(|n| serde_json::from_str(&format!(r#"{{"n": {}}}"#, n)).unwrap())
            .collect();
        let results = render_all(&Note::default(), &contexts, &RenderOptions::default());
        let texts: Vec<String> = results.into_iter().map(|r| r.unwrap().document.0).collect();
        let expected: Vec<String> = (0..32).map(|n| format!("n={}", n)).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn test_failures_are_per_job() {
        let contexts = vec![serde_json::from_str(r#"{"n": 1}"#).unwrap(), Value::None];
        let options = RenderOptions::default().with_strict(true);
        let results = render_all(&Note::default(), &contexts, &options);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(RenderError::Resolution { .. })));
    }
}

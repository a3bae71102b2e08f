//! The render engine.
//!
//! A [`Renderer`] carries the options, the current document location and the
//! issue report through one render pass. Document adapters drive it through
//! [`Renderer::expand`] for structural levels and [`Renderer::render_text`]
//! for the innermost text blocks.

mod expand;
mod inline;

pub use expand::Walk;
pub use inline::TextOutcome;

use super::context::Scope;
use super::error::{RenderError, Result};
use super::options::{OnError, RenderOptions};
use super::report::{Element, Issue, IssueKind, Location, LoopStep, Part, Report};
use super::scanner::{Markers, ScanError};
use super::token::{Binding, Comparison, Condition, Expression, MarkerKind, Token, TokenError};
use super::value::{Map, Value};
use tracing::{trace, warn};

/// Names bound by one loop iteration.
type Frame = Vec<(String, Value)>;

/// State of one render pass.
#[derive(Debug)]
pub struct Renderer<'o> {
    options: &'o RenderOptions,
    markers: Markers,
    report: Report,
    location: Location,
    loop_path: Vec<LoopStep>,
}

impl<'o> Renderer<'o> {
    /// Create a renderer after validating `options`.
    pub fn new(options: &'o RenderOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            markers: options.markers(),
            report: Report::new(),
            location: Location::default(),
            loop_path: Vec::new(),
        })
    }

    #[inline]
    pub fn options(&self) -> &RenderOptions {
        self.options
    }

    #[inline]
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    #[inline]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Set the current part, returning the previous one.
    pub fn set_part(&mut self, part: Option<Part>) -> Option<Part> {
        std::mem::replace(&mut self.location.part, part)
    }

    /// Set the current element, returning the previous one.
    pub fn set_element(&mut self, element: Option<Element>) -> Option<Element> {
        std::mem::replace(&mut self.location.element, element)
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Finish the pass and hand over the collected issues.
    pub fn finish(self) -> Report {
        self.report
    }

    #[inline]
    fn fail_fast(&self) -> bool {
        self.options.on_error == OnError::FailFast
    }

    /// Record an issue, or turn it into an error under fail-fast.
    fn issue(&mut self, kind: IssueKind, message: String, raw: &str) -> Result<()> {
        let issue = Issue {
            kind,
            message,
            raw: raw.to_string(),
            location: self.location.clone(),
            loop_path: self.loop_path.clone(),
        };
        if self.fail_fast() {
            return Err(issue.into());
        }
        warn!(location = %issue.location, raw = %issue.raw, "{}", issue.message);
        self.report.push(issue);
        Ok(())
    }

    /// Handle an error raised inside one loop iteration.
    ///
    /// Recoverable errors are recorded and the loop moves on; anything else
    /// (or any error under fail-fast) keeps propagating.
    fn absorb(&mut self, err: RenderError) -> Result<()> {
        if self.fail_fast() || !err.is_recoverable() {
            return Err(err);
        }
        let issue = Issue {
            kind: IssueKind::AbortedIteration,
            message: err.to_string(),
            raw: err.raw().unwrap_or_default().to_string(),
            location: err.location().cloned().unwrap_or_else(|| self.location.clone()),
            loop_path: self.loop_path.clone(),
        };
        warn!(location = %issue.location, "loop iteration aborted: {}", issue.message);
        self.report.push(issue);
        Ok(())
    }

    fn parse_error(&self, message: impl Into<String>, raw: &str) -> RenderError {
        RenderError::Parse {
            message: message.into(),
            raw: raw.to_string(),
            location: self.location.clone(),
        }
    }

    fn unmatched(&self, raw: &str, message: &str) -> RenderError {
        RenderError::UnmatchedBlock {
            message: message.to_string(),
            raw: raw.to_string(),
            location: self.location.clone(),
        }
    }

    fn scan_error(&self, err: ScanError) -> RenderError {
        let raw = match &err {
            ScanError::Unclosed(raw) | ScanError::Nested(raw) => raw.clone(),
        };
        self.parse_error(err.to_string(), &raw)
    }

    fn token(&self, raw: &str, inner: &str, kind: MarkerKind) -> Result<Token> {
        Token::parse(raw, inner, kind).map_err(|err| match err {
            TokenError::Syntax(message) => self.parse_error(message, raw),
            TokenError::UnknownFilter(name) => RenderError::UnknownFilter {
                name,
                raw: raw.to_string(),
                location: self.location.clone(),
            },
        })
    }

    /// Resolve and filter an expression.
    ///
    /// Returns `None` for a missing path in non-strict mode after recording an
    /// issue (unless `quiet`).
    fn evaluate_with(
        &mut self,
        expr: &Expression,
        raw: &str,
        scope: &Scope<'_>,
        quiet: bool,
    ) -> Result<Option<Value>> {
        let resolved = scope.resolve_as(&expr.path, self.options.viewer());
        if let Some(at) = &resolved.withheld {
            self.issue(IssueKind::PermissionDenied, format!("permission denied for '{}'", at), raw)?;
        }
        if !resolved.found {
            let missing = resolved.missing.as_deref().unwrap_or(expr.path.root());
            let message = match &resolved.error {
                Some(error) => format!("cannot resolve '{}': {}", missing, error),
                None => format!("'{}' not found", missing),
            };
            if self.options.strict {
                return Err(RenderError::Resolution {
                    message,
                    raw: raw.to_string(),
                    location: self.location.clone(),
                });
            }
            if !quiet {
                self.issue(IssueKind::MissingValue, message, raw)?;
            }
            return Ok(None);
        }

        if expr.filters.is_empty() {
            return Ok(Some(resolved.value));
        }
        let options = self.options;
        let env = options.filter_env();
        let mut value = resolved.value.clone();
        for filter in &expr.filters {
            match filter.apply(&value, &env) {
                Ok(next) => value = next,
                Err(message) => {
                    self.issue(IssueKind::FilterApplication, message, raw)?;
                    return Ok(Some(resolved.value));
                },
            }
        }
        Ok(Some(value))
    }

    /// Resolve a value placeholder.
    pub(crate) fn evaluate(&mut self, expr: &Expression, raw: &str, scope: &Scope<'_>) -> Result<Option<Value>> {
        self.evaluate_with(expr, raw, scope, false)
    }

    /// Evaluate an `if` condition; a missing path is falsy.
    pub(crate) fn condition(&mut self, cond: &Condition, raw: &str, scope: &Scope<'_>) -> Result<bool> {
        let value = self.evaluate_with(&cond.expr, raw, scope, true)?.unwrap_or_default();
        let result = match &cond.compare {
            Some((Comparison::Eq, literal)) => literal.matches(&value),
            Some((Comparison::Ne, literal)) => !literal.matches(&value),
            None => value.truthy(),
        };
        Ok(result != cond.negated)
    }

    /// Bindings for each iteration of a `for` block.
    pub(crate) fn iterate(
        &mut self,
        binding: &Binding,
        iterable: &Expression,
        raw: &str,
        scope: &Scope<'_>,
    ) -> Result<Vec<Frame>> {
        let Some(value) = self.evaluate(iterable, raw, scope)? else {
            return Ok(Vec::new());
        };

        let frames = match (binding, value) {
            (_, Value::None) => Vec::new(),
            (Binding::Single(name), Value::Seq(items)) => items
                .into_iter()
                .map(|item| vec![(name.clone(), item)])
                .collect(),
            (Binding::Single(name), Value::Map(map)) => map
                .into_iter()
                .map(|(_, item)| vec![(name.clone(), item)])
                .collect(),
            (Binding::Pair(k, v), Value::Map(map)) => map
                .into_iter()
                .map(|(key, item)| vec![(k.clone(), Value::String(key)), (v.clone(), item)])
                .collect(),
            (Binding::Pair(k, v), Value::Seq(items)) => {
                let mut frames = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Seq(pair) if pair.len() == 2 => {
                            let mut pair = pair.into_iter();
                            let first = pair.next().unwrap_or_default();
                            let second = pair.next().unwrap_or_default();
                            frames.push(vec![(k.clone(), first), (v.clone(), second)]);
                        },
                        other => {
                            let message = format!(
                                "cannot unpack {} into '{}'",
                                other.kind(),
                                binding.names()
                            );
                            return self.not_iterable(message, raw);
                        },
                    }
                }
                frames
            },
            (_, other) => {
                let message = format!("cannot iterate over {}", other.kind());
                return self.not_iterable(message, raw);
            },
        };
        Ok(frames)
    }

    fn not_iterable(&mut self, message: String, raw: &str) -> Result<Vec<Frame>> {
        if self.options.strict {
            return Err(RenderError::Resolution {
                message,
                raw: raw.to_string(),
                location: self.location.clone(),
            });
        }
        self.issue(IssueKind::NotIterable, message, raw)?;
        Ok(Vec::new())
    }

    /// Bind one iteration's names plus the `loop` helper.
    fn bind_frame(scope: &mut Scope<'_>, frame: Frame, index: usize, length: usize) {
        for (name, value) in frame {
            scope.bind(name, value);
        }
        let mut info = Map::new();
        info.insert("index".to_string(), Value::from(index + 1));
        info.insert("index0".to_string(), Value::from(index));
        info.insert("first".to_string(), Value::Bool(index == 0));
        info.insert("last".to_string(), Value::Bool(index + 1 == length));
        info.insert("length".to_string(), Value::from(length));
        scope.bind("loop", Value::Map(info));
    }

    /// Run `f` for one loop iteration, tracking the loop path and absorbing
    /// recoverable failures.
    fn iteration<T>(
        &mut self,
        binding: &Binding,
        index: usize,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        self.loop_path.push(LoopStep {
            binding: binding.names(),
            index,
        });
        let result = match f(self) {
            Ok(value) => Ok(Some(value)),
            Err(err) => self.absorb(err).map(|()| None),
        };
        self.loop_path.pop();
        trace!(index, "loop iteration done");
        result
    }
}

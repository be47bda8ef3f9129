#![forbid(unsafe_code)]

//! CSS 2D transform parsing and translation rewriting.
//!
//! Browsers report computed transforms as `none` or `matrix(a, b, c, d, e, f)`;
//! authored inline styles may also use `translate(...)`/`translate3d(...)`.
//! Only the translation is ever rewritten. Rotation, scale, and skew pass
//! through untouched, whether they live in matrix coefficients or in other
//! functions of the raw text.
//!
//! The codec is fail-soft: text it does not understand degrades to a zero
//! translation with the raw text kept for passthrough.

use std::sync::LazyLock;

use regex_lite::{NoExpand, Regex};

use crate::host::DomHost;

static MATRIX: LazyLock<Regex> = LazyLock::new(|| compile(r"matrix\(([^)]+)\)"));
static TRANSLATE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)translate(?:3d)?\(([-\d.]+)px(?:,\s*([-\d.]+)px)?"));
static TRANSLATE_3D_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)translate3d\(([-\d.]+)px,\s*([-\d.]+)px,\s*([-\d.]+)px\)")
});
static TRANSLATE_2D_ARGS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)translate\(([-\d.]+)px(?:,\s*([-\d.]+)px)?\)"));

// Patterns are literals; a failure here is a programming error caught by tests.
fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => panic!("invalid built-in transform pattern {pattern:?}: {err}"),
    }
}

/// The linear (non-translation) part of a 2D affine matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearPart {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

/// A decomposed transform: translation plus whatever else must be preserved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformDescriptor {
    /// Horizontal translation in pixels.
    pub x: f64,
    /// Vertical translation in pixels.
    pub y: f64,
    /// Matrix coefficients, when the source was `matrix(...)`.
    pub linear: Option<LinearPart>,
    /// Source text, kept for passthrough. Empty for `none`.
    pub raw: String,
}

impl TransformDescriptor {
    /// Parse a transform value. Never fails.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.is_empty() || text == "none" {
            return Self::default();
        }

        if let Some(values) = MATRIX
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|args| parse_matrix_args(args.as_str()))
        {
            let [a, b, c, d, x, y] = values;
            return Self {
                x,
                y,
                linear: Some(LinearPart { a, b, c, d }),
                raw: text.to_owned(),
            };
        }

        if let Some(caps) = TRANSLATE.captures(text) {
            let axis = |idx: usize| {
                caps.get(idx)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0)
            };
            return Self {
                x: axis(1),
                y: axis(2),
                linear: None,
                raw: text.to_owned(),
            };
        }

        Self {
            raw: text.to_owned(),
            ..Self::default()
        }
    }

    /// New absolute translation after moving by a delta.
    ///
    /// Corrections compose with the existing translation, so repeated calls
    /// accumulate.
    #[must_use]
    pub fn apply(&self, dx: f64, dy: f64) -> (f64, f64) {
        (self.x + dx, self.y + dy)
    }

    /// Emit a transform with the translation replaced by `(x, y)`.
    #[must_use]
    pub fn serialize(&self, x: f64, y: f64) -> String {
        let (nx, ny) = (css_number(x), css_number(y));

        if let Some(LinearPart { a, b, c, d }) = self.linear {
            return format!(
                "matrix({}, {}, {}, {}, {nx}, {ny})",
                css_number(a),
                css_number(b),
                css_number(c),
                css_number(d)
            );
        }

        if self.raw.to_ascii_lowercase().contains("translate") {
            let with_3d = TRANSLATE_3D_ARGS.replace(
                &self.raw,
                format!("translate3d({nx}px, {ny}px, ${{3}}px)").as_str(),
            );
            let translate_2d = format!("translate({nx}px, {ny}px)");
            return TRANSLATE_2D_ARGS
                .replace(&with_3d, NoExpand(&translate_2d))
                .into_owned();
        }

        format!("translate({nx}px, {ny}px)")
    }
}

fn parse_matrix_args(args: &str) -> Option<[f64; 6]> {
    let mut out = [0.0; 6];
    let mut count = 0;
    for part in args.split(',') {
        if count == out.len() {
            return None;
        }
        let value = part.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
        out[count] = value;
        count += 1;
    }
    (count == out.len()).then_some(out)
}

/// Shortest round-trip decimal, with negative zero printed as `0`.
fn css_number(v: f64) -> String {
    if v == 0.0 {
        "0".to_owned()
    } else {
        v.to_string()
    }
}

/// Translate an element by `(dx, dy)` on top of its computed transform.
///
/// Returns `false` without touching the page when the element is missing or
/// either delta is not finite. The result is written as an inline style, which
/// overrides stylesheet transforms.
pub fn move_by_delta<H: DomHost>(
    host: &H,
    element: Option<&H::Element>,
    dx: f64,
    dy: f64,
) -> bool {
    let Some(element) = element else {
        return false;
    };
    if !dx.is_finite() || !dy.is_finite() {
        tracing::debug!(dx, dy, "ignoring non-finite move");
        return false;
    }

    let computed = host.computed_transform(element).unwrap_or_default();
    let parsed = TransformDescriptor::parse(&computed);
    let (x, y) = parsed.apply(dx, dy);
    let next = parsed.serialize(x, y);

    match host.set_inline_transform(element, &next) {
        Ok(()) => {
            tracing::debug!(transform = %next, dx, dy, "applied transform");
            true
        }
        Err(err) => {
            tracing::warn!(%err, "transform write rejected");
            false
        }
    }
}

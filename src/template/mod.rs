//! Per-file templating driven by host, OS, architecture and category.
//!
//! Files are only treated as templates when their text references one of
//! the known [`IDENTIFIERS`]; everything else passes through byte-for-byte,
//! so ordinary files containing unrelated `{{ … }}` text are never parsed.
//!
//! The macro language is a small subset of Go-style text templates:
//!
//! ```text
//! {{ if eq $.Dotfiles.OS "linux" -}}
//! export BROWSER=firefox
//! {{- else if $.Dotfiles.HasCategory "work" }}
//! export BROWSER={{ $.Dotfiles.Env "WORK_BROWSER" }}
//! {{- end }}
//! ```
mod eval;
mod params;
mod parse;

pub use params::{IDENTIFIERS, PREFIX, Param, TemplateParameters, expand_env};

use crate::error::TemplateError;
use parse::Segment;

/// Returns `true` if `text` references the parameter surface.
#[must_use]
pub fn is_templated(text: &str) -> bool {
    IDENTIFIERS.iter().any(|ident| text.contains(ident))
}

/// Render file contents, passing them through untouched when they are not
/// UTF-8 or do not reference the parameter surface.
///
/// # Errors
///
/// Returns [`TemplateError::Mixed`] if the file also carries foreign macros,
/// or a parse/exec error from the macro text itself.
pub fn render(input: Vec<u8>, params: &TemplateParameters) -> Result<Vec<u8>, TemplateError> {
    let text = match String::from_utf8(input) {
        Ok(text) => text,
        Err(e) => return Ok(e.into_bytes()),
    };
    if !is_templated(&text) {
        return Ok(text.into_bytes());
    }
    tracing::debug!("rendering template ({} bytes)", text.len());
    Ok(render_str(&text, params)?.into_bytes())
}

/// Render `text` unconditionally.
///
/// # Errors
///
/// See [`render`].
pub fn render_str(text: &str, params: &TemplateParameters) -> Result<String, TemplateError> {
    let segments = parse::split(text)?;
    check_mixing(&segments)?;
    let nodes = parse::build(segments)?;
    eval::execute(&nodes, params)
}

/// Every action must be a bare control keyword or reference the parameter
/// surface.
fn check_mixing(segments: &[Segment]) -> Result<(), TemplateError> {
    let foreign = segments.iter().any(|seg| match seg {
        Segment::Text(_) => false,
        Segment::Action { body, .. } => {
            !(body == "else" || body == "end" || body.contains(PREFIX))
        }
    });
    if foreign {
        return Err(TemplateError::Mixed);
    }
    Ok(())
}

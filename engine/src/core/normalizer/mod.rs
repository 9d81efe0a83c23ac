//! Specification normalization
//!
//! REST and SOAP documents are converted into the one canonical
//! [`ApiModel`] shape here; this is the only protocol-aware parsing
//! boundary in the pipeline. All schema references are resolved and
//! inlined so later stages never touch a pointer.

mod rest;
mod soap;

use shared::{ApiModel, ProtocolKind};

use crate::error::{EngineError, EngineResult};

/// Parse a raw specification document into the canonical model.
///
/// Fails with `MalformedSpec` when the document cannot be parsed at all
/// and with `UnsupportedFeature` when it parses but uses constructs
/// outside the supported subset. Pure transform, no side effects.
pub fn normalize(raw: &[u8], kind: ProtocolKind) -> EngineResult<ApiModel> {
    let text = std::str::from_utf8(raw).map_err(|e| EngineError::MalformedSpec {
        message: format!("specification is not valid UTF-8: {e}"),
    })?;

    let model = match kind {
        ProtocolKind::Rest => rest::parse(text)?,
        ProtocolKind::Soap => soap::parse(text)?,
    };

    model.validate().map_err(|e| EngineError::MalformedSpec {
        message: e.to_string(),
    })?;

    Ok(model)
}

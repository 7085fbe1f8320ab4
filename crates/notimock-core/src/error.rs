//! Error types for the value codec.

use thiserror::Error;

use crate::value::HintKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("invalid hint syntax {raw:?}: use TYPE:NAME:VALUE")]
    HintSyntax { raw: String },

    #[error(
        "invalid hint type {kind:?}: valid types are string, int, double, byte, boolean and variant"
    )]
    UnknownHintKind { kind: String },

    #[error("value {value:?} could not be parsed as hint type {kind}")]
    MalformedHint { kind: HintKind, value: String },

    #[error("unknown urgency {value:?}: known urgency levels: low, normal, critical")]
    UnknownUrgency { value: String },
}

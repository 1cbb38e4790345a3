use crate::field::FieldType;
use crate::key::ParamKey;

/// Errors raised by the parameter registry.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    /// A setter was given a value outside the field's domain.
    #[error("invalid value for {key} field '{field}': {reason}")]
    Validation {
        key: ParamKey,
        field: String,
        reason: String,
    },

    /// A label or wire code does not name a member of a closed set.
    #[error("'{value}' is not a valid {kind}")]
    InvalidEnum { kind: &'static str, value: String },

    /// Text could not be parsed as the declared field type.
    #[error("cannot parse '{value}' as {expected}")]
    InvalidValue { expected: FieldType, value: String },

    /// A write was attempted on a read-only parameter.
    #[error("parameter {0} is read-only")]
    ReadOnly(ParamKey),

    /// A field was given a value of the wrong primitive type.
    #[error("field '{field}' of {key} is {expected}, got {found}")]
    FieldType {
        key: ParamKey,
        field: String,
        expected: FieldType,
        found: FieldType,
    },

    /// The parameter has no field with this name.
    #[error("parameter {key} has no field '{field}'")]
    UnknownField { key: ParamKey, field: String },

    /// A whole-value write did not match the parameter's value shape.
    #[error("parameter {key} holds {expected} values, got {found}")]
    Shape {
        key: ParamKey,
        expected: &'static str,
        found: &'static str,
    },

    /// An incoming payload does not match the parameter's layout.
    #[error("malformed payload for {key}: {reason}")]
    Protocol { key: ParamKey, reason: String },

    /// No parameter is registered under this key.
    #[error("no parameter registered at {0}")]
    UnknownParameter(ParamKey),

    /// Observers can only be attached to streamed parameters.
    #[error("parameter {0} is not streamed")]
    NotStreaming(ParamKey),

    /// The callback is already registered on this parameter.
    #[error("callback already registered on {0}")]
    DuplicateObserver(ParamKey),

    /// The callback is not registered on this parameter.
    #[error("callback not registered on {0}")]
    UnknownObserver(ParamKey),

    /// The outbound frame could not be queued.
    #[error(transparent)]
    Frame(#[from] mcl_frame::FrameError),

    /// A dispatch thread could not be started.
    #[error("failed to spawn observer thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl ParamError {
    /// True for caller errors detected before any state changed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ParamError::Validation { .. }
                | ParamError::InvalidEnum { .. }
                | ParamError::InvalidValue { .. }
                | ParamError::ReadOnly(_)
                | ParamError::FieldType { .. }
                | ParamError::UnknownField { .. }
                | ParamError::Shape { .. }
        )
    }

    pub(crate) fn protocol(key: ParamKey, reason: impl Into<String>) -> Self {
        ParamError::Protocol {
            key,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParamError>;

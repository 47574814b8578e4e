use thiserror::Error;

/// Construction-time validation failures for message entities.
///
/// These are `InvalidArgument` conditions: always surfaced to the
/// caller, never silently coerced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Attribute name is outside the owning entity's allowed set.
    #[error("provided attribute \"{attribute}\" is not in allowed range for {owner}")]
    AttributeNotAllowed {
        /// Rejected attribute name as it appeared on the wire
        attribute: String,
        /// Owning entity kind
        owner: &'static str,
    },

    /// Extension parameter is not defined for the extension kind.
    #[error("provided parameter \"{parameter}\" is not in allowed range for {extension}")]
    ParameterNotAllowed {
        /// Rejected parameter name
        parameter: String,
        /// Extension kind name
        extension: &'static str,
    },

    /// Payload does not decode under the attribute's value grammar.
    #[error("provided payload \"{payload}\" is not valid for attribute \"{attribute}\"")]
    InvalidPayload {
        /// Attribute whose grammar rejected the payload
        attribute: &'static str,
        /// Offending payload
        payload: String,
    },
}

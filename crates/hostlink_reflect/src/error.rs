//! Error types for class and member resolution.

use crate::host::HostError;
use compact_str::CompactString;

/// Failures raised while resolving host classes and members.
///
/// Everything except [`ReflectError::Access`] is a wiring-time failure: it
/// means the running host does not have the expected shape, usually because
/// its version is unsupported.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReflectError {
    /// No candidate name for a symbolic id exists in the host
    #[error("class '{id}' not found (tried: {})", candidates.join(", "))]
    ClassNotFound {
        id: CompactString,
        candidates: Vec<String>,
    },

    /// A structural query matched nothing
    #[error("no member of {class} matches {query}")]
    MemberNotFound { class: CompactString, query: String },

    #[error("enum {class} has no constant with ordinal {ordinal}")]
    EnumConstantMissing { class: CompactString, ordinal: usize },

    /// A method query carried no name, return type or parameters
    #[error("incomplete query on {class}: {query}")]
    IncompleteQuery { class: CompactString, query: String },

    #[error("{0} is not an enum")]
    NotAnEnum(CompactString),

    /// The host refused an operation on a resolved member
    #[error("host access to {member} failed: {source}")]
    Access {
        member: String,
        #[source]
        source: HostError,
    },

    #[error("invalid host version '{0}'")]
    InvalidVersion(String),
}

impl ReflectError {
    pub(crate) fn access(member: impl Into<String>, source: HostError) -> Self {
        ReflectError::Access {
            member: member.into(),
            source,
        }
    }
}

pub type Result<T, E = ReflectError> = std::result::Result<T, E>;

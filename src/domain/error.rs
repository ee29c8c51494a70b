//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::MemberId;

/// Domain errors represent business logic violations.
/// Inconsistent relation data is not among them: the builder repairs it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("member already exists: {0}")]
    DuplicateMember(MemberId),

    #[error("member cannot be related to itself: {0}")]
    SelfRelation(MemberId),

    #[error("member already has two parents: {0}")]
    TooManyParents(MemberId),

    #[error("invalid relation '{0}', expected none or parent|child|spouse|sibling:<id>")]
    InvalidRelation(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

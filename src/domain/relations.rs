//! Relation linking on a member list.
//!
//! Mirrors how the family editor records relations: every relation is
//! expressed by editing `parents` or `spouseId` of the records involved.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, instrument};

use crate::domain::entities::{Member, MemberId};
use crate::domain::error::{DomainError, DomainResult};

/// Parents a record may hold.
pub const MAX_PARENTS: usize = 2;

/// Relation of a subject member to a target member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// Explicitly unrelated
    None,
    /// Subject is a parent of the target
    Parent(MemberId),
    /// Subject is a child of the target
    Child(MemberId),
    /// Subject and target are married
    Spouse(MemberId),
    /// Subject shares the target's parents
    Sibling(MemberId),
}

impl Relation {
    pub fn target(&self) -> Option<&MemberId> {
        match self {
            Relation::None => None,
            Relation::Parent(t) | Relation::Child(t) | Relation::Spouse(t) | Relation::Sibling(t) => {
                Some(t)
            }
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::None => f.write_str("none"),
            Relation::Parent(t) => write!(f, "parent:{t}"),
            Relation::Child(t) => write!(f, "child:{t}"),
            Relation::Spouse(t) => write!(f, "spouse:{t}"),
            Relation::Sibling(t) => write!(f, "sibling:{t}"),
        }
    }
}

/// Parses `none` or `TYPE:TARGET`.
impl FromStr for Relation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") {
            return Ok(Relation::None);
        }
        let invalid = || DomainError::InvalidRelation(s.to_string());
        let (kind, target) = s.split_once(':').ok_or_else(invalid)?;
        let target = target.trim();
        if target.is_empty() {
            return Err(invalid());
        }
        let target = MemberId::from(target);
        match kind.trim().to_ascii_lowercase().as_str() {
            "parent" => Ok(Relation::Parent(target)),
            "child" => Ok(Relation::Child(target)),
            "spouse" => Ok(Relation::Spouse(target)),
            "sibling" => Ok(Relation::Sibling(target)),
            _ => Err(invalid()),
        }
    }
}

fn position(members: &[Member], id: &MemberId) -> DomainResult<usize> {
    members
        .iter()
        .position(|m| &m.id == id)
        .ok_or_else(|| DomainError::MemberNotFound(id.clone()))
}

fn add_parent(member: &mut Member, parent: &MemberId) -> DomainResult<()> {
    if member.parents.contains(parent) {
        return Ok(());
    }
    if member.parents.len() >= MAX_PARENTS {
        return Err(DomainError::TooManyParents(member.id.clone()));
    }
    member.parents.push(parent.clone());
    Ok(())
}

/// Records `relation` between `subject` and its target in `members`.
///
/// Parent lists behave as sets. Nothing is changed when an error is returned.
#[instrument(level = "debug", skip(members))]
pub fn apply_relation(
    members: &mut [Member],
    subject: &MemberId,
    relation: &Relation,
) -> DomainResult<()> {
    let subject_pos = position(members, subject)?;
    let Some(target) = relation.target() else {
        return Ok(());
    };
    if target == subject {
        return Err(DomainError::SelfRelation(subject.clone()));
    }
    let target_pos = position(members, target)?;

    match relation {
        Relation::None => {}
        Relation::Parent(_) => add_parent(&mut members[target_pos], subject)?,
        Relation::Child(_) => add_parent(&mut members[subject_pos], target)?,
        Relation::Spouse(_) => {
            members[subject_pos].spouse_id = Some(target.clone());
            members[target_pos].spouse_id = Some(subject.clone());
        }
        Relation::Sibling(_) => {
            let parents = members[target_pos].parents.clone();
            if !parents.is_empty() {
                members[subject_pos].parents = parents;
            }
        }
    }
    debug!("linked {} as {}", subject, relation);
    Ok(())
}

/// Clears `subject`'s parents and spouse link, including the spouse's back link.
#[instrument(level = "debug", skip(members))]
pub fn unlink(members: &mut [Member], subject: &MemberId) -> DomainResult<()> {
    let subject_pos = position(members, subject)?;
    let spouse = members[subject_pos].spouse_id.take();
    members[subject_pos].parents.clear();

    if let Some(spouse) = spouse {
        for member in members.iter_mut().filter(|m| m.id == spouse) {
            if member.spouse_id.as_ref() == Some(subject) {
                member.spouse_id = None;
            }
        }
    }
    Ok(())
}

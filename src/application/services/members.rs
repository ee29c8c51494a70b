//! Member editing service
//!
//! Adds members and records relations in the member document. Changes are
//! applied in memory first; the document is only written when all succeed.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::application::{ApplicationResult, IoResultExt, MemberDocument};
use crate::domain::{apply_relation, unlink, DomainError, Gender, Member, MemberId, Relation};
use crate::infrastructure::traits::FileSystem;

/// Fields entered for a new member.
#[derive(Debug, Clone, Default)]
pub struct NewMember {
    pub name: String,
    pub gender: Gender,
    pub birth_year: Option<i32>,
    pub photo_url: Option<String>,
}

/// Service for mutating a member document.
pub struct MemberService {
    fs: Arc<dyn FileSystem>,
}

impl MemberService {
    /// Create a new member service.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Missing documents read as an empty family so the first member can be added.
    fn load(&self, path: &Path) -> ApplicationResult<MemberDocument> {
        if !self.fs.exists(path) {
            debug!("load: {} does not exist, starting empty", path.display());
            return Ok(MemberDocument::default());
        }
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read member document", path)?;
        MemberDocument::parse(&content, path)
    }

    fn save(&self, path: &Path, document: &MemberDocument) -> ApplicationResult<()> {
        let json = document.to_json()?;
        self.fs
            .write(path, &format!("{json}\n"))
            .with_path_context("write member document", path)
    }

    /// Append a member and apply `relations` in order.
    ///
    /// Returns the generated id.
    #[instrument(level = "debug", skip(self, new_member))]
    pub fn add_member(
        &self,
        path: &Path,
        new_member: NewMember,
        relations: &[Relation],
    ) -> ApplicationResult<MemberId> {
        let mut document = self.load(path)?;
        let members = document.members_mut();

        let id = MemberId::generate();
        if members.iter().any(|m| m.id == id) {
            return Err(DomainError::DuplicateMember(id).into());
        }

        let mut member = Member::new(id.clone(), new_member.name)
            .with_gender(new_member.gender)
            .with_created_at(Utc::now());
        member.birth_year = new_member.birth_year;
        member.photo_url = new_member.photo_url;
        members.push(member);

        for relation in relations {
            apply_relation(members, &id, relation)?;
        }

        self.save(path, &document)?;
        info!("added member {} to {}", id, path.display());
        Ok(id)
    }

    /// Record one relation for an existing member.
    #[instrument(level = "debug", skip(self))]
    pub fn link(&self, path: &Path, subject: &MemberId, relation: &Relation) -> ApplicationResult<()> {
        let mut document = self.load(path)?;
        apply_relation(document.members_mut(), subject, relation)?;
        self.save(path, &document)
    }

    /// Clear a member's parents and spouse link.
    #[instrument(level = "debug", skip(self))]
    pub fn unlink(&self, path: &Path, subject: &MemberId) -> ApplicationResult<()> {
        let mut document = self.load(path)?;
        unlink(document.members_mut(), subject)?;
        self.save(path, &document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::traits::MemoryFileSystem;

    #[test]
    fn test_add_to_missing_document_creates_it() {
        let fs = Arc::new(MemoryFileSystem::new());
        let service = MemberService::new(fs.clone());
        let path = Path::new("/fam/members.json");

        let id = service
            .add_member(
                path,
                NewMember {
                    name: "Ann".into(),
                    ..NewMember::default()
                },
                &[],
            )
            .unwrap();

        let content = fs.read_to_string(path).unwrap();
        assert!(content.contains(id.as_str()));
        assert!(content.contains("createdAt"));
    }

    #[test]
    fn test_failed_relation_leaves_document_untouched() {
        let original = r#"[{"id":"a","name":"Ann"}]"#;
        let fs = Arc::new(MemoryFileSystem::new().with_file("/m.json", original));
        let service = MemberService::new(fs.clone());

        let result = service.add_member(
            Path::new("/m.json"),
            NewMember::default(),
            &[Relation::Child("ghost".into())],
        );

        assert!(result.is_err());
        assert_eq!(fs.read_to_string(Path::new("/m.json")).unwrap(), original);
    }
}

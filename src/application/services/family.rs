//! Family tree service
//!
//! Loads a member document and turns it into a genogram, a layout or a
//! member's detail view. The document is read fresh on every call.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::application::{ApplicationResult, IoResultExt, MemberDocument};
use crate::domain::{
    build_genogram, layout, DomainError, Genogram, Layout, LayoutParams, Member, MemberId,
    PhotoFallback,
};
use crate::infrastructure::traits::FileSystem;

/// What the details view shows for one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberDetails {
    pub id: MemberId,
    pub name: String,
    pub gender: String,
    pub role: String,
    pub is_admin: bool,
    pub photo: String,
    /// Spouse name, or its raw id when the spouse is not in the document
    pub spouse: Option<String>,
    pub parents: Vec<String>,
    pub custom_fields: Vec<(String, String)>,
}

/// Service building genograms from member documents.
pub struct FamilyService {
    fs: Arc<dyn FileSystem>,
}

impl FamilyService {
    /// Create a new family service.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Read and parse the member document.
    pub fn load_document(&self, path: &Path) -> ApplicationResult<MemberDocument> {
        debug!("load_document: {}", path.display());
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read member document", path)?;
        MemberDocument::parse(&content, path)
    }

    pub fn load_members(&self, path: &Path) -> ApplicationResult<Vec<Member>> {
        let members = match self.load_document(path)? {
            MemberDocument::Bare(members) | MemberDocument::Wrapped { members, .. } => members,
        };
        debug!("load_members: {} record(s)", members.len());
        Ok(members)
    }

    /// Build the genogram; `None` when the family has no members.
    pub fn build(&self, path: &Path) -> ApplicationResult<Option<Genogram>> {
        let members = self.load_members(path)?;
        Ok(build_genogram(&members))
    }

    pub fn layout(&self, path: &Path, params: &LayoutParams) -> ApplicationResult<Option<Layout>> {
        Ok(self.build(path)?.map(|genogram| layout(&genogram, params)))
    }

    pub fn member_details(
        &self,
        path: &Path,
        id: &MemberId,
        photos: &PhotoFallback,
    ) -> ApplicationResult<MemberDetails> {
        let members = self.load_members(path)?;
        let member = members
            .iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| DomainError::MemberNotFound(id.clone()))?;

        let name_of = |other: &MemberId| {
            members
                .iter()
                .find(|m| &m.id == other)
                .map(|m| m.display_name().to_string())
                .unwrap_or_else(|| other.to_string())
        };

        Ok(MemberDetails {
            id: member.id.clone(),
            name: member.display_name().to_string(),
            gender: member.gender.to_string(),
            role: member.role_label().to_string(),
            is_admin: member.is_admin(),
            photo: member.photo(photos).to_string(),
            spouse: member
                .spouse_id
                .as_ref()
                .filter(|s| !s.is_blank())
                .map(name_of),
            parents: member.parents.iter().map(name_of).collect(),
            custom_fields: member.custom_fields(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::traits::MemoryFileSystem;

    const DOC: &str = r#"[
        {"id": "a", "name": "Ann", "gender": "female", "spouseId": "b", "custom_home_town": "Pune"},
        {"id": "b", "name": "Bob", "gender": "male", "spouseId": "a"},
        {"id": "c", "name": "Cid", "parents": ["a", "b"], "role": "Admin"}
    ]"#;

    fn service() -> FamilyService {
        let fs = MemoryFileSystem::new().with_file("/fam/members.json", DOC);
        FamilyService::new(Arc::new(fs))
    }

    #[test]
    fn test_build_reads_document() {
        let genogram = service()
            .build(Path::new("/fam/members.json"))
            .unwrap()
            .unwrap();
        assert_eq!(genogram.member_count(), 3);
        assert_eq!(genogram.unions().count(), 1);
    }

    #[test]
    fn test_missing_document_fails() {
        assert!(service().build(Path::new("/fam/other.json")).is_err());
    }

    #[test]
    fn test_member_details_resolve_names() {
        let details = service()
            .member_details(Path::new("/fam/members.json"), &"c".into(), &PhotoFallback::default())
            .unwrap();
        assert_eq!(details.parents, vec!["Ann", "Bob"]);
        assert!(details.is_admin);
        assert_eq!(details.photo, "img/default-neutral.svg");

        let ann = service()
            .member_details(Path::new("/fam/members.json"), &"a".into(), &PhotoFallback::default())
            .unwrap();
        assert_eq!(ann.spouse.as_deref(), Some("Bob"));
        assert_eq!(ann.photo, "img/female.jpg");
        assert_eq!(ann.custom_fields, vec![("Home Town".to_string(), "Pune".to_string())]);
    }
}

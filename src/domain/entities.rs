//! Domain entities: core data structures

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Prefix marking user-defined member fields.
pub const CUSTOM_FIELD_PREFIX: &str = "custom_";

/// Opaque member identifier issued by the document store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for members created locally.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty or whitespace-only ids never resolve to a member.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Member gender as stored. Unrecognised text is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Gender {
    Male,
    Female,
    Other(String),
    #[default]
    Unspecified,
}

impl From<Option<String>> for Gender {
    fn from(value: Option<String>) -> Self {
        let Some(raw) = value else {
            return Gender::Unspecified;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            "" => Gender::Unspecified,
            _ => Gender::Other(raw),
        }
    }
}

impl From<Gender> for Option<String> {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => Some("male".to_string()),
            Gender::Female => Some("female".to_string()),
            Gender::Other(raw) => Some(raw),
            Gender::Unspecified => None,
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unspecified" | "n/a" => Ok(Gender::Unspecified),
            _ => Ok(Gender::from(Some(s.to_string()))),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("male"),
            Gender::Female => f.write_str("female"),
            Gender::Other(_) | Gender::Unspecified => f.write_str("N/A"),
        }
    }
}

/// One person of a family as held by the document store.
///
/// Relations are loose id references that may dangle or disagree with each
/// other. Fields this crate does not interpret are kept in `extra` and written
/// back unchanged, as are `birthYear` and `createdAt` values it cannot read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "MemberRecord")]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spouse_id: Option<MemberId>,
    pub parents: Vec<MemberId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Member record as read, before `birthYear` and `createdAt` are interpreted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    id: MemberId,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default)]
    gender: Gender,
    #[serde(default)]
    spouse_id: Option<MemberId>,
    #[serde(default, deserialize_with = "null_as_default")]
    parents: Vec<MemberId>,
    #[serde(default)]
    birth_year: Option<Value>,
    #[serde(default)]
    created_at: Option<Value>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl From<MemberRecord> for Member {
    fn from(record: MemberRecord) -> Self {
        let mut extra = record.extra;
        let birth_year = read_or_keep(&mut extra, "birthYear", record.birth_year, read_year);
        let created_at = read_or_keep(&mut extra, "createdAt", record.created_at, read_timestamp);
        Self {
            id: record.id,
            name: record.name,
            gender: record.gender,
            spouse_id: record.spouse_id,
            parents: record.parents,
            birth_year,
            created_at,
            photo_url: record.photo_url,
            role: record.role,
            extra,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Unreadable values go to `extra` under their original key.
fn read_or_keep<T>(
    extra: &mut BTreeMap<String, Value>,
    key: &str,
    raw: Option<Value>,
    read: fn(&Value) -> Option<T>,
) -> Option<T> {
    let raw = raw.filter(|v| !v.is_null())?;
    let value = read(&raw);
    if value.is_none() {
        extra.insert(key.to_string(), raw);
    }
    value
}

fn read_year(raw: &Value) -> Option<i32> {
    match raw {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    raw.as_str().and_then(|s| s.parse::<DateTime<Utc>>().ok())
}

impl Member {
    pub fn new(id: impl Into<MemberId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gender: Gender::Unspecified,
            spouse_id: None,
            parents: Vec::new(),
            birth_year: None,
            created_at: None,
            photo_url: None,
            role: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }

    pub fn with_parents<I, T>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<MemberId>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_spouse(mut self, spouse: impl Into<MemberId>) -> Self {
        self.spouse_id = Some(spouse.into());
        self
    }

    pub fn with_birth_year(mut self, year: i32) -> Self {
        self.birth_year = Some(year);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Display name, "Unknown" when the record has none.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }

    /// Role label, `User` when unset.
    pub fn role_label(&self) -> &str {
        self.role.as_deref().unwrap_or("User")
    }

    pub fn is_admin(&self) -> bool {
        self.role_label().contains("Admin")
    }

    /// Photo to show: the stored url or the gender fallback.
    pub fn photo<'a>(&'a self, fallback: &'a PhotoFallback) -> &'a str {
        match self.photo_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url,
            _ => fallback.for_gender(&self.gender),
        }
    }

    /// User-defined fields as `(label, value)` pairs, ordered by key.
    pub fn custom_fields(&self) -> Vec<(String, String)> {
        self.extra
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(CUSTOM_FIELD_PREFIX)?;
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((custom_field_label(name), value))
            })
            .collect()
    }
}

/// `home_town` -> `Home Town`
pub fn custom_field_label(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Default portrait paths per gender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoFallback {
    pub male: String,
    pub female: String,
    pub neutral: String,
}

impl Default for PhotoFallback {
    fn default() -> Self {
        Self {
            male: "img/male.png".into(),
            female: "img/female.jpg".into(),
            neutral: "img/default-neutral.svg".into(),
        }
    }
}

impl PhotoFallback {
    pub fn for_gender(&self, gender: &Gender) -> &str {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
            Gender::Other(_) | Gender::Unspecified => &self.neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("male", Gender::Male)]
    #[case("Female", Gender::Female)]
    #[case(" MALE ", Gender::Male)]
    #[case("other", Gender::Other("other".to_string()))]
    #[case("", Gender::Unspecified)]
    fn test_gender_parsing(#[case] input: &str, #[case] expected: Gender) {
        assert_eq!(Gender::from(Some(input.to_string())), expected);
    }

    #[test]
    fn test_member_deserializes_store_record() {
        let json = r#"{
            "id": "m1",
            "name": "Asha",
            "gender": "female",
            "spouseId": null,
            "parents": null,
            "birthYear": 1950,
            "createdAt": "2024-03-01T10:00:00Z",
            "custom_home_town": "Pune",
            "relation": "grandmother"
        }"#;
        let member: Member = serde_json::from_str(json).unwrap();
        assert_eq!(member.id, MemberId::from("m1"));
        assert_eq!(member.gender, Gender::Female);
        assert!(member.spouse_id.is_none());
        assert!(member.parents.is_empty());
        assert_eq!(member.birth_year, Some(1950));
        assert!(member.created_at.is_some());
        assert_eq!(member.extra.len(), 2);
        assert_eq!(
            member.custom_fields(),
            vec![("Home Town".to_string(), "Pune".to_string())]
        );
    }

    #[test]
    fn test_record_without_id_reads_as_blank() {
        let member: Member = serde_json::from_str(r#"{"name":"Nobody","id":null}"#).unwrap();
        assert!(member.id.is_blank());
        let member: Member = serde_json::from_str(r#"{"name":"Nobody"}"#).unwrap();
        assert!(member.id.is_blank());
    }

    #[test]
    fn test_unreadable_dates_kept_verbatim() {
        let json = r#"{
            "id": "m1",
            "birthYear": "circa 1950",
            "createdAt": {"seconds": 1700000000, "nanoseconds": 0}
        }"#;
        let member: Member = serde_json::from_str(json).unwrap();
        assert!(member.birth_year.is_none());
        assert!(member.created_at.is_none());

        let back = serde_json::to_value(&member).unwrap();
        assert_eq!(back["birthYear"], "circa 1950");
        assert_eq!(back["createdAt"]["seconds"], 1700000000);
        assert!(member.custom_fields().is_empty());
    }

    #[rstest]
    #[case(r#"{"id":"a","birthYear":"1950"}"#, Some(1950))]
    #[case(r#"{"id":"a","birthYear":1950}"#, Some(1950))]
    #[case(r#"{"id":"a","birthYear":null}"#, None)]
    #[case(r#"{"id":"a","birthYear":19.5}"#, None)]
    fn test_birth_year_reading(#[case] json: &str, #[case] expected: Option<i32>) {
        let member: Member = serde_json::from_str(json).unwrap();
        assert_eq!(member.birth_year, expected);
    }

    #[test]
    fn test_other_gender_written_back_unchanged() {
        let member: Member = serde_json::from_str(r#"{"id":"a","gender":"Other"}"#).unwrap();
        assert_eq!(member.gender, Gender::Other("Other".to_string()));
        assert_eq!(member.gender.to_string(), "N/A");
        assert_eq!(serde_json::to_value(&member).unwrap()["gender"], "Other");
    }

    #[test]
    fn test_member_keeps_unknown_fields_on_write() {
        let json = r#"{"id":"m1","name":"Ravi","gender":null,"familyNote":"x"}"#;
        let member: Member = serde_json::from_str(json).unwrap();
        let back = serde_json::to_value(&member).unwrap();
        assert_eq!(back["familyNote"], "x");
        assert_eq!(back["id"], "m1");
        assert!(back.get("spouseId").is_none());
    }

    #[test]
    fn test_photo_falls_back_by_gender() {
        let fallback = PhotoFallback::default();
        let male = Member::new("a", "A").with_gender(Gender::Male);
        let anon = Member::new("b", "B");
        let mut pictured = Member::new("c", "C");
        pictured.photo_url = Some("https://cdn/c.png".into());

        assert_eq!(male.photo(&fallback), "img/male.png");
        assert_eq!(anon.photo(&fallback), "img/default-neutral.svg");
        let other = Member::new("d", "D").with_gender(Gender::Other("nb".into()));
        assert_eq!(other.photo(&fallback), "img/default-neutral.svg");
        assert_eq!(pictured.photo(&fallback), "https://cdn/c.png");
    }

    #[rstest]
    #[case("home_town", "Home Town")]
    #[case("blood_group", "Blood Group")]
    #[case("nickname", "Nickname")]
    fn test_custom_field_label(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(custom_field_label(raw), expected);
    }

    #[test]
    fn test_role_defaults_to_user() {
        let mut member = Member::new("a", "A");
        assert_eq!(member.role_label(), "User");
        assert!(!member.is_admin());
        member.role = Some("Family Admin".into());
        assert!(member.is_admin());
    }
}

//! Semantic field groups and the partial updates they produce.

use crate::entity::{Resume, SectionEntry, SkillItem, SocialLink};
use crate::form::{FormError, Result};
use richtext_sync::DocumentSnapshot;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionGroup {
    PersonalDetails,
    Experience,
    Skills,
    Education,
    Proficiencies,
    CustomSections,
}

impl SectionGroup {
    pub const ALL: [SectionGroup; 6] = [
        SectionGroup::PersonalDetails,
        SectionGroup::Experience,
        SectionGroup::Skills,
        SectionGroup::Education,
        SectionGroup::Proficiencies,
        SectionGroup::CustomSections,
    ];

    /// Top-level form fields owned by this group.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            SectionGroup::PersonalDetails => &[
                "profileImage",
                "showProfileImage",
                "firstName",
                "lastName",
                "jobTitle",
                "summary",
                "phone",
                "email",
                "links",
            ],
            SectionGroup::Experience => &["experience"],
            SectionGroup::Skills => &["skills"],
            SectionGroup::Education => &["education"],
            SectionGroup::Proficiencies => &["proficiencies"],
            SectionGroup::CustomSections => &["customSections"],
        }
    }

    /// The group owning the field at `path`, by its first segment.
    pub fn from_path(path: &str) -> Option<Self> {
        let field = path.split('.').next()?;
        Self::ALL
            .into_iter()
            .find(|group| group.fields().contains(&field))
    }

    /// A patch carrying the current form values of every field in this group.
    pub fn patch(self, values: &Value) -> Result<ResumePatch> {
        let patch = match self {
            SectionGroup::PersonalDetails => ResumePatch {
                profile_image: Some(field(values, "profileImage")?),
                show_profile_image: Some(field_or(values, "showProfileImage", true)?),
                first_name: Some(field(values, "firstName")?),
                last_name: Some(field(values, "lastName")?),
                job_title: Some(field(values, "jobTitle")?),
                summary: Some(read_document("summary", values.get("summary"))),
                phone: Some(field(values, "phone")?),
                email: Some(field(values, "email")?),
                links: Some(field(values, "links")?),
                ..ResumePatch::default()
            },
            SectionGroup::Experience => ResumePatch {
                experience: Some(field(values, "experience")?),
                ..ResumePatch::default()
            },
            SectionGroup::Skills => ResumePatch {
                skills: Some(field(values, "skills")?),
                ..ResumePatch::default()
            },
            SectionGroup::Education => ResumePatch {
                education: Some(field(values, "education")?),
                ..ResumePatch::default()
            },
            SectionGroup::Proficiencies => ResumePatch {
                proficiencies: Some(field(values, "proficiencies")?),
                ..ResumePatch::default()
            },
            SectionGroup::CustomSections => ResumePatch {
                custom_sections: Some(field(values, "customSections")?),
                ..ResumePatch::default()
            },
        };
        Ok(patch)
    }
}

/// Absent or null decodes as the type's default.
fn field<T: DeserializeOwned + Default>(values: &Value, key: &str) -> Result<T> {
    field_or(values, key, T::default())
}

fn field_or<T: DeserializeOwned>(values: &Value, key: &str, default: T) -> Result<T> {
    match values.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => {
            serde_json::from_value(value.clone()).map_err(|source| FormError::InvalidField {
                field: key.to_string(),
                source,
            })
        }
    }
}

/// A rich-text field's document. Null, `""` and unparsable values read as no document.
pub(crate) fn read_document(field: &str, value: Option<&Value>) -> Option<DocumentSnapshot> {
    match value? {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        value => match DocumentSnapshot::from_value(value.clone()) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Field {} does not hold a document: {}", field, e);
                None
            }
        },
    }
}

/// A partial resume update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumePatch {
    pub profile_image: Option<Option<String>>,
    pub show_profile_image: Option<bool>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub summary: Option<Option<DocumentSnapshot>>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub links: Option<Vec<SocialLink>>,
    pub experience: Option<Vec<SectionEntry>>,
    pub skills: Option<Vec<SkillItem>>,
    pub education: Option<Vec<SectionEntry>>,
    pub proficiencies: Option<Vec<SectionEntry>>,
    pub custom_sections: Option<Vec<SectionEntry>>,
}

impl ResumePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow merge into `resume`: every present field replaces the old value.
    pub fn apply(&self, resume: &mut Resume) {
        macro_rules! merge {
            ($($field:ident),*) => {
                $(
                    if let Some(value) = &self.$field {
                        resume.$field = value.clone();
                    }
                )*
            };
        }
        merge!(
            profile_image,
            show_profile_image,
            first_name,
            last_name,
            job_title,
            summary,
            phone,
            email,
            links,
            experience,
            skills,
            education,
            proficiencies,
            custom_sections
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_path() {
        assert_eq!(
            SectionGroup::from_path("firstName"),
            Some(SectionGroup::PersonalDetails)
        );
        assert_eq!(
            SectionGroup::from_path("links.0.url"),
            Some(SectionGroup::PersonalDetails)
        );
        assert_eq!(
            SectionGroup::from_path("experience.2.description"),
            Some(SectionGroup::Experience)
        );
        assert_eq!(
            SectionGroup::from_path("customSections"),
            Some(SectionGroup::CustomSections)
        );
        assert_eq!(SectionGroup::from_path("design.font"), None);
        assert_eq!(SectionGroup::from_path("nickname"), None);
    }

    #[test]
    fn test_personal_details_patch_carries_whole_group() {
        let values = json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "profileImage": null,
            "links": [{"url": "https://ada.example", "name": "site"}],
            "experience": [{"title": "ignored"}]
        });

        let patch = SectionGroup::PersonalDetails.patch(&values).unwrap();
        assert_eq!(patch.first_name.as_deref(), Some("Ada"));
        assert_eq!(patch.profile_image, Some(None));
        assert_eq!(patch.show_profile_image, Some(true));
        assert_eq!(patch.email.as_deref(), Some(""));
        assert_eq!(patch.links.as_ref().map(Vec::len), Some(1));
        assert!(patch.experience.is_none());
    }

    #[test]
    fn test_empty_summary_reads_as_no_document() {
        for summary in [json!(""), json!(null), json!("plain text"), json!(3)] {
            let values = json!({"firstName": "Ada", "summary": summary});
            let patch = SectionGroup::PersonalDetails.patch(&values).unwrap();
            assert_eq!(patch.first_name.as_deref(), Some("Ada"));
            assert_eq!(patch.summary, Some(None), "summary: {summary}");
        }

        let values = json!({"summary": {"root": {"children": [
            {"type": "paragraph", "children": [{"type": "text", "text": "Hi"}]}
        ]}}});
        let patch = SectionGroup::PersonalDetails.patch(&values).unwrap();
        let summary = patch.summary.flatten().unwrap();
        assert_eq!(summary.plain_text(), "Hi");
    }

    #[test]
    fn test_invalid_field_value() {
        let values = json!({"skills": [{"skill": 3}]});
        let err = SectionGroup::Skills.patch(&values).unwrap_err();
        assert!(matches!(err, FormError::InvalidField { ref field, .. } if field == "skills"));
    }

    #[test]
    fn test_apply_is_a_shallow_merge() {
        let mut resume = Resume::default_resume();
        resume.first_name = "Ada".into();
        resume.skills.push(SkillItem {
            skill: "Rust".into(),
            ..SkillItem::default()
        });

        let patch = ResumePatch {
            last_name: Some("Lovelace".into()),
            skills: Some(Vec::new()),
            ..ResumePatch::default()
        };
        patch.apply(&mut resume);

        assert_eq!(resume.first_name, "Ada");
        assert_eq!(resume.last_name, "Lovelace");
        assert!(resume.skills.is_empty());
        assert!(ResumePatch::default().is_empty());
        assert!(!patch.is_empty());
    }
}

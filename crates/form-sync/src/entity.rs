//! The resume entity as owned outside the form.

use richtext_sync::DocumentSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
}

impl SocialLink {
    /// The empty link a fresh form starts with.
    pub fn blank() -> Self {
        Self::default()
    }
}

/// An entry of the experience, education, proficiency, or custom sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<DocumentSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_present: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_date: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_internship: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub skill: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
}

/// A resume. Fields missing on input take the same defaults a fresh form uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub summary: Option<DocumentSnapshot>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default = "default_true")]
    pub show_profile_image: bool,
    #[serde(default = "default_links")]
    pub links: Vec<SocialLink>,
    #[serde(default)]
    pub experience: Vec<SectionEntry>,
    #[serde(default)]
    pub skills: Vec<SkillItem>,
    #[serde(default)]
    pub education: Vec<SectionEntry>,
    #[serde(default)]
    pub proficiencies: Vec<SectionEntry>,
    #[serde(default)]
    pub custom_sections: Vec<SectionEntry>,
    /// Layout and styling. Opaque to synchronization.
    #[serde(default)]
    pub design: Value,
}

fn default_true() -> bool {
    true
}

fn default_links() -> Vec<SocialLink> {
    vec![SocialLink::blank()]
}

impl Default for Resume {
    fn default() -> Self {
        Self::default_resume()
    }
}

impl Resume {
    /// A new, empty resume with the standard section layout.
    pub fn default_resume() -> Self {
        let section = |id: &str, key: &str, name: &str| {
            json!({
                "id": id,
                "sectionKey": key,
                "sectionName": name,
                "isVisible": true,
                "showInSidebar": false,
            })
        };

        Self {
            id: "temp-id".to_string(),
            name: "New Resume".to_string(),
            job_title: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            summary: None,
            profile_image: None,
            show_profile_image: true,
            links: default_links(),
            experience: Vec::new(),
            skills: Vec::new(),
            education: Vec::new(),
            proficiencies: Vec::new(),
            custom_sections: Vec::new(),
            design: json!({
                "layout": "sidebarLeft",
                "sections": [
                    section("personal-details", "personalDetails", "Personal Details"),
                    section("experience", "experience", "Experience"),
                    section("skills", "skills", "Skills"),
                    section("education", "education", "Education"),
                    section("proficiencies", "proficiencies", "Proficiencies"),
                    section("custom-sections", "customSections", "Custom Sections"),
                ],
                "spacing": "normal",
                "sidebarStyle": "normal",
                "palette": {"primary": "electric", "accent": "cloud"},
                "font": "timeless",
                "headerStyle": "default",
                "accentStyle": "none",
                "shape": "rounded",
                "pageNumbers": false,
            }),
        }
    }

    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

/// Form values for `resume`: everything except `id`, `name`, and `design`.
pub fn form_defaults(resume: &Resume) -> serde_json::Result<Value> {
    Ok(json!({
        "profileImage": resume.profile_image,
        "showProfileImage": resume.show_profile_image,
        "firstName": resume.first_name,
        "lastName": resume.last_name,
        "jobTitle": resume.job_title,
        "summary": serde_json::to_value(&resume.summary)?,
        "phone": resume.phone,
        "email": resume.email,
        "links": serde_json::to_value(&resume.links)?,
        "experience": serde_json::to_value(&resume.experience)?,
        "skills": serde_json::to_value(&resume.skills)?,
        "education": serde_json::to_value(&resume.education)?,
        "proficiencies": serde_json::to_value(&resume.proficiencies)?,
        "customSections": serde_json::to_value(&resume.custom_sections)?,
    }))
}

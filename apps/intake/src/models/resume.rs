use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub website: String,
}

impl ContactInfo {
    pub fn has_any_channel(&self) -> bool {
        !self.email.is_empty() || !self.phone.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkExperience {
    pub job_title: String,
    pub employer: String,
    pub start_date: String,
    /// Empty when `is_current`.
    pub end_date: String,
    pub is_current: bool,
    pub location: String,
    pub remote: bool,
    /// Remaining entry text after title, employer, dates, and location are removed.
    pub accomplishments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub degree: String,
    pub field_of_study: String,
    pub institution: String,
    pub graduation_year: Option<u16>,
    pub gpa: String,
}

impl Education {
    pub fn is_empty(&self) -> bool {
        self.degree.is_empty() && self.institution.is_empty() && self.graduation_year.is_none()
    }
}

/// Output of the extraction pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedResumeData {
    pub contact: ContactInfo,
    pub work_experiences: Vec<WorkExperience>,
    pub education: Education,
    pub skills: Vec<String>,
    pub summary: String,
}

/// Document shape consumed by the résumé builder. Sections the parser never fills
/// (projects, certifications, languages) are present and empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeData {
    pub contact: ContactInfo,
    pub summary: String,
    pub work_experiences: Vec<WorkExperience>,
    pub education: Vec<Education>,
    pub skills: Vec<String>,
    pub projects: Vec<serde_json::Value>,
    pub certifications: Vec<serde_json::Value>,
    pub languages: Vec<serde_json::Value>,
    pub active_sections: BTreeMap<String, bool>,
}

impl From<ParsedResumeData> for ResumeData {
    fn from(parsed: ParsedResumeData) -> Self {
        let education: Vec<Education> = if parsed.education.is_empty() {
            Vec::new()
        } else {
            vec![parsed.education]
        };

        let mut active_sections = BTreeMap::new();
        active_sections.insert("contact".to_string(), true);
        active_sections.insert("summary".to_string(), !parsed.summary.trim().is_empty());
        active_sections.insert("experience".to_string(), !parsed.work_experiences.is_empty());
        active_sections.insert("education".to_string(), !education.is_empty());
        active_sections.insert("skills".to_string(), !parsed.skills.is_empty());
        active_sections.insert("projects".to_string(), false);
        active_sections.insert("certifications".to_string(), false);
        active_sections.insert("languages".to_string(), false);

        Self {
            contact: parsed.contact,
            summary: parsed.summary,
            work_experiences: parsed.work_experiences,
            education,
            skills: parsed.skills,
            projects: Vec::new(),
            certifications: Vec::new(),
            languages: Vec::new(),
            active_sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_flags_active_sections() {
        let parsed = ParsedResumeData {
            work_experiences: vec![WorkExperience {
                job_title: "Engineer".into(),
                ..Default::default()
            }],
            skills: vec!["Rust".into()],
            ..Default::default()
        };
        let resume = ResumeData::from(parsed);
        assert_eq!(resume.active_sections["experience"], true);
        assert_eq!(resume.active_sections["skills"], true);
        assert_eq!(resume.active_sections["education"], false);
        assert_eq!(resume.active_sections["projects"], false);
        assert!(resume.education.is_empty());
        assert!(resume.certifications.is_empty());
    }

    #[test]
    fn test_fields_serialize_camel_case() {
        let json = serde_json::to_value(WorkExperience {
            job_title: "PM".into(),
            is_current: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["jobTitle"], "PM");
        assert_eq!(json["isCurrent"], true);
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let contact: ContactInfo = serde_json::from_str(r#"{"email":"a@b.co"}"#).unwrap();
        assert_eq!(contact.email, "a@b.co");
        assert!(contact.first_name.is_empty());
    }
}

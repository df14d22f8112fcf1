//! Appraisal form schema.
//!
//! The form is a closed set of sections. Each section's content is a JSON
//! object owned by the frontend; this module only fixes which sections exist,
//! bounds their size and tracks the schema version records were written with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;

/// Version of the section layout below. Bump when sections are added,
/// removed or renamed so stored records can be migrated.
pub const FORM_SCHEMA_VERSION: i32 = 1;

/// Upper bound for one serialized section.
pub const MAX_SECTION_BYTES: usize = 64 * 1024;

/// Content of a single section, keyed by field name.
pub type SectionContent = Map<String, Value>;

/// Sections of the faculty appraisal form, in the order the form presents them.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum FormSection {
    /// Name, designation, department and appointment details.
    GeneralInformation,
    /// Courses taught, lectures planned and delivered.
    TeachingProcess,
    /// Aggregated student feedback per course.
    StudentsFeedback,
    /// Departmental duties (labs, committees, coordination).
    DepartmentalActivities,
    /// Institute level duties and responsibilities.
    InstituteActivities,
    /// Journal and conference publications, books, patents.
    ResearchPublications,
    /// Sponsored research and consultancy projects.
    ResearchProjects,
    /// Supervision of PhD and PG theses.
    ResearchGuidance,
    /// Outreach, extension and contribution to society.
    ContributionToSociety,
    /// Self assessment and declaration.
    SelfAssessment,
}

impl FormSection {
    pub const ALL: [Self; 10] = [
        Self::GeneralInformation,
        Self::TeachingProcess,
        Self::StudentsFeedback,
        Self::DepartmentalActivities,
        Self::InstituteActivities,
        Self::ResearchPublications,
        Self::ResearchProjects,
        Self::ResearchGuidance,
        Self::ContributionToSociety,
        Self::SelfAssessment,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GeneralInformation => "general-information",
            Self::TeachingProcess => "teaching-process",
            Self::StudentsFeedback => "students-feedback",
            Self::DepartmentalActivities => "departmental-activities",
            Self::InstituteActivities => "institute-activities",
            Self::ResearchPublications => "research-publications",
            Self::ResearchProjects => "research-projects",
            Self::ResearchGuidance => "research-guidance",
            Self::ContributionToSociety => "contribution-to-society",
            Self::SelfAssessment => "self-assessment",
        }
    }
}

impl fmt::Display for FormSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormSection {
    type Err = ContentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == trimmed)
            .ok_or_else(|| ContentError::UnknownSection(trimmed.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("unknown form section: {0}")]
    UnknownSection(String),
    #[error("section content must be a JSON object")]
    NotAnObject,
    #[error("section content exceeds {} bytes", MAX_SECTION_BYTES)]
    TooLarge,
}

/// Accept a section payload if it is a JSON object within the size bound.
///
/// # Errors
/// Returns [`ContentError::NotAnObject`] or [`ContentError::TooLarge`].
pub fn validate_content(value: Value) -> Result<SectionContent, ContentError> {
    let Value::Object(content) = value else {
        return Err(ContentError::NotAnObject);
    };

    let size = serde_json::to_vec(&content).map_or(usize::MAX, |bytes| bytes.len());
    if size > MAX_SECTION_BYTES {
        return Err(ContentError::TooLarge);
    }

    Ok(content)
}

/// Projection of a form record used to drive the step indicator.
///
/// A user without a record gets [`Progress::empty`], which carries no
/// `finalSubmit` field at all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed_steps: Vec<FormSection>,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_submit: Option<bool>,
}

impl Progress {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A faculty member's form record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub email: String,
    pub completed_steps: Vec<FormSection>,
    #[schema(value_type = Object)]
    pub data: BTreeMap<FormSection, SectionContent>,
    pub final_submit: bool,
    pub schema_version: i32,
    pub last_updated: Option<DateTime<Utc>>,
}

impl FormSubmission {
    /// Placeholder returned to users who have not saved anything yet.
    #[must_use]
    pub fn empty(email: &str) -> Self {
        Self {
            email: email.to_string(),
            completed_steps: Vec::new(),
            data: BTreeMap::new(),
            final_submit: false,
            schema_version: FORM_SCHEMA_VERSION,
            last_updated: None,
        }
    }

    /// Record a section save: first saves append to `completed_steps`,
    /// repeated saves only replace the content.
    pub fn apply_section(&mut self, section: FormSection, content: SectionContent) {
        if !self.completed_steps.contains(&section) {
            self.completed_steps.push(section);
        }
        self.data.insert(section, content);
        self.schema_version = FORM_SCHEMA_VERSION;
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            completed_steps: self.completed_steps.clone(),
            last_updated: self.last_updated,
            final_submit: Some(self.final_submit),
        }
    }
}

/// Parse stored step identifiers, rejecting anything outside the schema.
///
/// # Errors
/// Returns [`ContentError::UnknownSection`] for the first unknown identifier.
pub fn parse_steps<S: AsRef<str>>(steps: &[S]) -> Result<Vec<FormSection>, ContentError> {
    steps.iter().map(|step| step.as_ref().parse()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn section_round_trips_through_its_identifier() {
        for section in FormSection::ALL {
            assert_eq!(section.as_str().parse::<FormSection>(), Ok(section));
            assert_eq!(
                serde_json::to_value(section).unwrap(),
                json!(section.as_str())
            );
        }
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert_eq!(
            "hobbies".parse::<FormSection>(),
            Err(ContentError::UnknownSection("hobbies".to_string()))
        );
    }

    #[test]
    fn content_must_be_an_object() {
        assert_eq!(validate_content(json!([1, 2])), Err(ContentError::NotAnObject));
        assert_eq!(validate_content(json!("text")), Err(ContentError::NotAnObject));
        assert!(validate_content(json!({"courses": []})).is_ok());
    }

    #[test]
    fn oversized_content_is_rejected() {
        let blob = "x".repeat(MAX_SECTION_BYTES);
        assert_eq!(
            validate_content(json!({ "notes": blob })),
            Err(ContentError::TooLarge)
        );
    }

    #[test]
    fn empty_progress_omits_final_submit() {
        let value = serde_json::to_value(Progress::empty()).unwrap();
        assert_eq!(value, json!({"completedSteps": [], "lastUpdated": null}));
    }

    #[test]
    fn apply_section_keeps_first_save_order() {
        let mut form = FormSubmission::empty("a@nitp.ac.in");
        form.apply_section(FormSection::TeachingProcess, SectionContent::new());
        form.apply_section(FormSection::GeneralInformation, SectionContent::new());

        let mut content = SectionContent::new();
        content.insert("lectures".to_string(), json!(42));
        form.apply_section(FormSection::TeachingProcess, content.clone());

        assert_eq!(
            form.completed_steps,
            vec![FormSection::TeachingProcess, FormSection::GeneralInformation]
        );
        assert_eq!(form.data.get(&FormSection::TeachingProcess), Some(&content));
    }

    #[test]
    fn submission_serializes_sections_by_identifier() {
        let mut form = FormSubmission::empty("a@nitp.ac.in");
        form.apply_section(FormSection::SelfAssessment, SectionContent::new());
        let value = serde_json::to_value(&form).unwrap();
        assert_eq!(value["data"], json!({"self-assessment": {}}));
        assert_eq!(value["finalSubmit"], json!(false));
    }

    #[test]
    fn parse_steps_rejects_unknown_entries() {
        assert_eq!(
            parse_steps(&["teaching-process", "self-assessment"]),
            Ok(vec![FormSection::TeachingProcess, FormSection::SelfAssessment])
        );
        assert!(parse_steps(&["teaching-process", "legacy"]).is_err());
    }
}

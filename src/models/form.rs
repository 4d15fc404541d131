use chrono::NaiveDate;
use uuid::Uuid;

use super::CaseStudy;
use super::CaseStudyPayload;
use super::DEFAULT_AUTHOR;
use super::Tags;
use super::derive_slug;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_CONTENT: &str = r#"## Client Information

**Client:** Client Name, Company

**Industry:** Industry Name

**Project Value:** $X,XXX

**Platform:** [example.com](https://example.com)

---

## The Challenge

Describe the client's challenge here.

### Pain Points:

- Pain point 1
- Pain point 2
- Pain point 3

---

## The Solution

Describe the solution you provided.

### Key Features Implemented:

- **Feature 1:** Description
- **Feature 2:** Description
- **Feature 3:** Description

---

## Measurable Results

> "Client testimonial quote here."
>
> **Client Name, Title**

---

## Technical Excellence

| Metric | Result |
|--------|--------|
| **Performance** | Value |
| **Cost** | Value |
| **Availability** | Value |
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(Uuid),
}

/// State of the admin editor, as typed by the user
///
/// Every field is kept verbatim so that a failed submission can re-render the form
/// exactly as it was sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaseStudyForm {
    pub slug: String,
    pub title: String,
    /// The title `slug` was last derived from
    pub previous_title: String,
    pub description: String,
    pub date: String,
    pub tags: String,
    pub featured: bool,
    pub read_time: String,
    pub author: String,
    pub thumbnail: String,
    pub content: String,
    /// Identifies one rendering of the form, see [crate::views::submission]
    pub submission_token: String,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("The {field} field is required")]
    MissingField { field: &'static str },
    #[error("Invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn required(value: &str, field: &'static str) -> Result<String, FormError> {
    optional(value).ok_or(FormError::MissingField { field })
}

pub fn new_submission_token() -> String {
    Uuid::new_v4().to_string()
}

impl CaseStudyForm {
    /// An empty editor, dated `today`
    pub fn blank(today: NaiveDate) -> Self {
        Self {
            date: today.format(DATE_FORMAT).to_string(),
            author: DEFAULT_AUTHOR.to_owned(),
            content: DEFAULT_CONTENT.to_owned(),
            submission_token: new_submission_token(),
            ..Default::default()
        }
    }

    pub fn from_case_study(case_study: &CaseStudy) -> Self {
        Self {
            slug: case_study.slug.clone(),
            title: case_study.title.clone(),
            previous_title: case_study.title.clone(),
            description: case_study.description.clone(),
            date: case_study.date.format(DATE_FORMAT).to_string(),
            tags: case_study.tags.to_input(),
            featured: case_study.featured,
            read_time: case_study.read_time.clone().unwrap_or_default(),
            author: case_study.author.clone().unwrap_or_default(),
            thumbnail: case_study.thumbnail.clone().unwrap_or_default(),
            content: case_study.content.clone(),
            submission_token: new_submission_token(),
        }
    }

    /// Keeps the slug in sync with the title while creating
    ///
    /// Any title change recomputes the slug, replacing a hand-edited one. An empty
    /// slug is derived as well. When editing an existing case study it is left alone.
    pub fn refresh_slug(&mut self, mode: FormMode) {
        if mode != FormMode::Create {
            return;
        }
        if self.title != self.previous_title || self.slug.trim().is_empty() {
            self.slug = derive_slug(&self.title);
        }
        self.previous_title = self.title.clone();
    }

    /// Builds the store payload. Empty optional fields become `null`.
    pub fn payload(&self) -> Result<CaseStudyPayload, FormError> {
        let title = required(&self.title, "title")?;
        let slug = required(&self.slug, "slug")?;
        let description = required(&self.description, "description")?;
        let date = required(&self.date, "date")?;
        let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|_| FormError::InvalidDate { value: date })?;
        Ok(CaseStudyPayload {
            slug,
            title,
            description,
            date,
            tags: Tags::parse(&self.tags),
            featured: self.featured,
            read_time: optional(&self.read_time),
            author: optional(&self.author),
            thumbnail: optional(&self.thumbnail),
            content: self.content.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::case_study::fixtures::case_study;

    fn filled_form() -> CaseStudyForm {
        CaseStudyForm {
            title: "Acme Corp: 3x ROI!".to_owned(),
            description: "How Acme tripled its ROI".to_owned(),
            tags: "ai, , automation".to_owned(),
            ..CaseStudyForm::blank(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        }
    }

    #[test]
    fn blank_form_defaults() {
        let form = CaseStudyForm::blank(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(form.date, "2024-06-01");
        assert_eq!(form.author, "rapidxai");
        assert!(form.content.starts_with("## Client Information"));
        assert!(!form.featured);
        assert!(Uuid::parse_str(&form.submission_token).is_ok());
    }

    #[test]
    fn slug_follows_the_title_while_creating() {
        let mut form = filled_form();
        form.refresh_slug(FormMode::Create);
        assert_eq!(form.slug, "acme-corp-3x-roi");

        form.title = "Acme Corp: 4x ROI".to_owned();
        form.refresh_slug(FormMode::Create);
        assert_eq!(form.slug, "acme-corp-4x-roi");
    }

    #[test]
    fn title_change_replaces_a_hand_edited_slug() {
        let mut form = CaseStudyForm {
            previous_title: "Acme".to_owned(),
            slug: "my-custom".to_owned(),
            ..filled_form()
        };
        form.refresh_slug(FormMode::Create);
        assert_eq!(form.slug, "acme-corp-3x-roi");
        assert_eq!(form.previous_title, "Acme Corp: 3x ROI!");
    }

    #[test]
    fn slug_edited_after_the_title_is_kept() {
        let mut form = filled_form();
        form.refresh_slug(FormMode::Create);
        form.slug = "custom".to_owned();
        form.refresh_slug(FormMode::Create);
        assert_eq!(form.slug, "custom");
    }

    #[test]
    fn slug_is_never_derived_while_editing() {
        let existing = case_study("legacy-slug", "2024-01-01", &["ai"]);
        let mut form = CaseStudyForm::from_case_study(&existing);
        form.title = "Brand new title".to_owned();
        form.refresh_slug(FormMode::Edit(existing.id));
        assert_eq!(form.slug, "legacy-slug");
    }

    #[test]
    fn payload_parses_tags_and_nulls_empty_optionals() {
        let mut form = filled_form();
        form.refresh_slug(FormMode::Create);
        form.author = "  ".to_owned();
        form.read_time = "5 min read".to_owned();
        let payload = form.payload().unwrap();
        assert_eq!(payload.slug, "acme-corp-3x-roi");
        assert_eq!(payload.tags, Tags::parse("ai, automation"));
        assert_eq!(payload.author, None);
        assert_eq!(payload.thumbnail, None);
        assert_eq!(payload.read_time.as_deref(), Some("5 min read"));
        assert_eq!(payload.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn payload_rejects_missing_and_malformed_fields() {
        let mut form = filled_form();
        assert_eq!(
            form.payload(),
            Err(FormError::MissingField { field: "slug" })
        );
        form.slug = "acme".to_owned();
        form.date = "01/06/2024".to_owned();
        assert_eq!(
            form.payload(),
            Err(FormError::InvalidDate {
                value: "01/06/2024".to_owned()
            })
        );
        form.date = "2024-06-01".to_owned();
        form.title = " ".to_owned();
        assert_eq!(
            form.payload(),
            Err(FormError::MissingField { field: "title" })
        );
    }

    #[test]
    fn existing_case_study_round_trips_through_the_form() {
        let mut existing = case_study("acme", "2024-01-01", &["ai", "voice"]);
        existing.thumbnail = Some("https://cdn.example.com/a.png".to_owned());
        let payload = CaseStudyForm::from_case_study(&existing).payload().unwrap();
        assert_eq!(payload.slug, existing.slug);
        assert_eq!(payload.tags, existing.tags);
        assert_eq!(payload.thumbnail, existing.thumbnail);
        assert_eq!(payload.content, existing.content);
    }
}

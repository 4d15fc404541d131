mod author;
pub mod case_study;
pub mod form;
mod slug;
mod tags;
pub mod thumbnail;

pub use author::Author;
pub use author::AuthorDirectory;
pub use author::DEFAULT_AUTHOR;
pub use case_study::CaseStudy;
pub use case_study::CaseStudyPayload;
pub use form::CaseStudyForm;
pub use form::FormError;
pub use form::FormMode;
pub use slug::derive_slug;
pub use tags::Tags;

//! form-sync: keeps a field-path form consistent with an externally owned resume.
//!
//! This crate provides:
//! - The resume entity and the form values derived from it (`entity`)
//! - Dotted-path form state with change watchers (`form`)
//! - Semantic field groups and partial updates (`groups`)
//! - The resume owner with undo/redo (`store`)
//! - Form ↔ resume synchronization and rich-text field bindings (`sync`)

pub mod entity;
pub mod form;
pub mod groups;
pub mod store;
pub mod sync;

pub use entity::{Resume, SectionEntry, SkillItem, SocialLink, form_defaults};
pub use form::{ChangeKind, FieldChange, FormError, FormState};
pub use groups::{ResumePatch, SectionGroup};
pub use store::{ResumeStore, StoreError};
pub use sync::{FormSync, RichTextField};

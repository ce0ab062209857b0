//! Multi-step forms
//!
//! Entries describe the fields, the stepper walks a conversation through them
//! and the catalog keeps named forms that can be started or restored.

pub mod entry;
pub mod labels;
pub mod steps;
pub mod machine;
pub mod catalog;

pub use entry::{AnswerValue, BaseType, Entry, EntryKind, Reply, DATE_FORMATS};
pub use labels::NavigationLabels;
pub use steps::StepIdentifiers;
pub use machine::{
    validate_form, FormContext, FormOutcome, FormResults, ReplyOutcome, StepState, Stepper,
    StepperBuilder,
};
pub use catalog::{FormCatalog, FormDefinition};

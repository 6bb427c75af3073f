/// Project management module
///
/// Project model, the store that owns project documents, and its error taxonomy.

pub mod error;
pub mod store;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use store::{ProjectStore, RetryPolicy, StoreSettings};
pub use types::{Customization, NewProject, Project, ProjectPatch, PROJECT_TYPE};

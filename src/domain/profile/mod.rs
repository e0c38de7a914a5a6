pub mod error;
pub mod model;
pub mod settings;

pub use error::ProfileError;
pub use model::{FieldMapping, Profile};
pub use settings::{ConfigDocument, ProfilesDocument};

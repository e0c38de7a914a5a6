pub mod model;

pub use model::{sound_reference, Record, RecordId, SOUND_TAG_PREFIX};

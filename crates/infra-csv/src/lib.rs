// Contactsync CSV Adapter
//
// LinkedIn export parsing (CandidateSource) and upload staging.

pub mod linkedin;
pub mod staging;

pub use linkedin::{parse_export, LinkedInCsvSource};
pub use staging::UploadStaging;

//! OTP extraction from scraped SMS records.
//!
//! Upstream message formats vary wildly, so extraction applies an ordered
//! rule list and takes the first match. Service labels and destination
//! country metadata are normalized here so downstream formatting never has
//! to touch raw upstream text.

pub mod country_codes;
pub mod extract_rules;
pub mod records;
pub mod service_labels;

pub use country_codes::country_for_number;
pub use extract_rules::extract;
pub use records::{OtpRecord, RawMessage};
pub use service_labels::canonical_service;

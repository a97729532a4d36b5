pub mod follow_up;
pub mod period;
pub mod student;

pub use follow_up::FollowUp;
pub use period::ReportingPeriod;
pub use student::{CollectionStatus, StatusHistoryEntry, Student};

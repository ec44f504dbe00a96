pub mod announcements;
pub mod attendance;
pub mod dashboard;
pub mod holidays;
pub mod leave;
pub mod requests;
pub mod users;
pub mod wfh;

pub mod announcement;
pub mod attendance;
pub mod holiday;
pub mod role;
pub mod time_off;
pub mod user;

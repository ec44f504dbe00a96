pub mod db_utils;
pub mod email_filter;
pub mod employee_id;
pub mod holiday_cache;
pub mod pagination;

pub mod account_cache;
pub mod account_filter;
pub mod audit;
pub mod db_utils;
pub mod notify;

pub mod compile;
pub mod config;
pub mod db_user;
pub mod run;

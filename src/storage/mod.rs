pub mod database;
pub mod local_store;

pub use database::Database;
pub use local_store::{Clock, LocalStore, system_clock};

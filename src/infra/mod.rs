pub mod db;
pub mod locks;
pub mod store;

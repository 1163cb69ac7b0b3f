pub mod api;
pub mod b64;
pub mod limits;
pub mod models;
pub mod time;

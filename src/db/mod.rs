pub mod schema;
pub mod store;
pub mod task_repo;

pub use schema::open_db;
pub use store::Store;

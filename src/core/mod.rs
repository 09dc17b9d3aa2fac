pub mod propagation;
pub mod schedule;
pub mod task_service;
pub mod tree_ops;

pub use schedule::{Calendar, DayRange};
pub use task_service::TaskService;

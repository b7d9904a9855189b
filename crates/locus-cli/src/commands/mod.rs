pub mod config;
pub mod flatten;
pub mod guid;
pub mod jobs;
pub mod task;
pub mod tm;

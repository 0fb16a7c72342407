pub mod config;
pub mod games;
pub mod new;
pub mod resume;
pub mod show;

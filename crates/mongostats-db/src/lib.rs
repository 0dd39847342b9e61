pub mod catalog;
pub mod convert;
pub mod mongo_config;
pub mod mongo_source;
pub mod topology;

pub mod analyze;
pub mod completion;
pub mod serve;
pub mod show;

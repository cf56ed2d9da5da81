pub mod get;
pub mod push;
pub mod show;
pub mod watch;

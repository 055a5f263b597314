mod build;
mod check;
mod dot;
mod info;
mod list;

pub use build::{BuildArgs, OnError, cmd_build};
pub use check::cmd_check;
pub use dot::cmd_dot;
pub use info::cmd_info;
pub use list::cmd_list;

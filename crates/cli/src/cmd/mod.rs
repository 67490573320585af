mod info;
mod ls;
mod rebase;

pub use info::cmd_info;
pub use ls::cmd_ls;
pub use rebase::cmd_rebase;

mod apply;
mod destroy;
mod plan;
mod status;

pub use apply::cmd_apply;
pub use destroy::cmd_destroy;
pub use plan::cmd_plan;
pub use status::cmd_status;

mod plan;
mod run;
mod validate;

pub use plan::cmd_plan;
pub use run::{RunArgs, cmd_run};
pub use validate::cmd_validate;

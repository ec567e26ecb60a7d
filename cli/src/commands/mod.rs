mod helpers;
mod import;
mod stats;
mod user;
mod weight;

use weighboard_core::service::Board;
use weighboard_core::store::TableStore;

pub(crate) use helpers::authenticate;
pub(crate) use import::cmd_import;
pub(crate) use stats::cmd_stats;
pub(crate) use user::{cmd_user_add, cmd_user_list};
pub(crate) use weight::{cmd_records, cmd_rejected, cmd_weight_delete, cmd_weight_log};

/// Board over whichever sheet backend the config points at.
pub(crate) type SheetBoard = Board<Box<dyn TableStore>>;

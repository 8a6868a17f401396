use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::PlayerId;

/// Identity value carried into the engine. Only used for roster membership
/// and score attribution; authentication happens before it gets here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub karma: i32,
}

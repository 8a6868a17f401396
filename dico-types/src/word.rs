use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::WordId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Word {
    pub id: WordId,
    pub name: String,
    pub definition: String,
    pub locale: String,
}

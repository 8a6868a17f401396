use sea_orm::entity::prelude::*;

/// One row per room. Columns other than `document` are projections kept for
/// filtering; `document` holds the whole room as JSON.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "rooms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub status: String,
    pub is_private: bool,
    pub code: Option<String>,
    pub locale: String,
    pub version: i64,
    #[sea_orm(column_type = "Text")]
    pub document: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

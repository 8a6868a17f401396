use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use tracing::debug;

use crate::entities::{prelude::*, rooms};
use dico_core::settings::normalize_code;
use dico_core::{RoomPage, RoomQuery, RoomStore, StoreError};
use dico_types::{Room, RoomId};

/// `RoomStore` backed by the `rooms` table. The room is stored as a JSON
/// document; `version` lives in its own column so the conditional update can
/// filter on it.
pub struct RoomRepository {
    db: DatabaseConnection,
}

impl RoomRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_room(model: rooms::Model) -> Result<Room, StoreError> {
        let mut room: Room = serde_json::from_str(&model.document)
            .map_err(|e| StoreError::Corrupt(format!("room {}: {}", model.id, e)))?;
        room.version = model.version as u64;
        Ok(room)
    }

    fn encode(room: &Room) -> Result<String, StoreError> {
        serde_json::to_string(room).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

fn backend(err: DbErr) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn parse_timestamp(value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value).unwrap_or_else(|_| chrono::Utc::now().into())
}

#[async_trait]
impl RoomStore for RoomRepository {
    async fn insert(&self, room: &Room) -> Result<(), StoreError> {
        let existing = Rooms::find_by_id(room.id.as_uuid())
            .one(&self.db)
            .await
            .map_err(backend)?;
        if existing.is_some() {
            return Err(StoreError::Duplicate(room.id));
        }

        let room_model = rooms::ActiveModel {
            id: ActiveValue::Set(room.id.as_uuid()),
            name: ActiveValue::Set(room.name.clone()),
            owner_id: ActiveValue::Set(room.owner_id.as_uuid()),
            status: ActiveValue::Set(room.status.as_str().to_string()),
            is_private: ActiveValue::Set(room.is_private),
            code: ActiveValue::Set(room.code.clone()),
            locale: ActiveValue::Set(room.locale.clone()),
            version: ActiveValue::Set(room.version as i64),
            document: ActiveValue::Set(Self::encode(room)?),
            created_at: ActiveValue::Set(parse_timestamp(&room.created_at)),
            updated_at: ActiveValue::Set(parse_timestamp(&room.updated_at)),
        };

        Rooms::insert(room_model).exec(&self.db).await.map_err(backend)?;
        debug!("Inserted room {}", room.id);
        Ok(())
    }

    async fn find_by_id(&self, room_id: RoomId) -> Result<Option<Room>, StoreError> {
        let room_model = Rooms::find_by_id(room_id.as_uuid())
            .one(&self.db)
            .await
            .map_err(backend)?;
        room_model.map(Self::model_to_room).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Room>, StoreError> {
        let room_model = Rooms::find()
            .filter(rooms::Column::Code.eq(normalize_code(code)))
            .one(&self.db)
            .await
            .map_err(backend)?;
        room_model.map(Self::model_to_room).transpose()
    }

    async fn find(&self, query: &RoomQuery) -> Result<RoomPage, StoreError> {
        let mut select = Rooms::find().order_by_desc(rooms::Column::CreatedAt);
        if let Some(status) = query.status {
            select = select.filter(rooms::Column::Status.eq(status.as_str()));
        }
        if !query.include_private {
            select = select.filter(rooms::Column::IsPrivate.eq(false));
        }

        // Roster membership lives inside the document
        let models = select.all(&self.db).await.map_err(backend)?;
        let mut matching = Vec::with_capacity(models.len());
        for model in models {
            let room = Self::model_to_room(model)?;
            if query.matches(&room) {
                matching.push(room);
            }
        }

        Ok(query.page(matching))
    }

    async fn replace_if_version(
        &self,
        room: &Room,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let next_version = expected_version + 1;
        let mut next = room.clone();
        next.version = next_version;
        let document = Self::encode(&next)?;

        let result = Rooms::update_many()
            .col_expr(rooms::Column::Name, Expr::value(next.name.clone()))
            .col_expr(rooms::Column::Status, Expr::value(next.status.as_str()))
            .col_expr(rooms::Column::Version, Expr::value(next_version as i64))
            .col_expr(rooms::Column::Document, Expr::value(document))
            .col_expr(
                rooms::Column::UpdatedAt,
                Expr::value(parse_timestamp(&next.updated_at)),
            )
            .filter(rooms::Column::Id.eq(room.id.as_uuid()))
            .filter(rooms::Column::Version.eq(expected_version as i64))
            .exec(&self.db)
            .await
            .map_err(backend)?;

        if result.rows_affected != 1 {
            debug!(
                "Conditional update of room {} at version {} matched nothing",
                room.id, expected_version
            );
        }
        Ok(result.rows_affected == 1)
    }
}

use serde::Deserialize;
use std::sync::Arc;
use warp::Filter;
use warp::http::StatusCode;

use crate::auth::AuthService;
use crate::engine::RoomEngine;
use crate::websocket::ConnectionManager;
use dico_types::{PlayerId, RoomError, RoomId, RoomPageView, RoomSettings, RoomView};

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod websocket;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Deserialize)]
struct RoomListQuery {
    skip: Option<u64>,
    take: Option<u64>,
}

#[derive(Deserialize)]
struct CodeQuery {
    code: String,
}

#[derive(serde::Serialize)]
struct UserScoreResponse {
    user_id: PlayerId,
    score: u32,
}

type JsonReply = warp::reply::WithStatus<warp::reply::Json>;

pub fn create_routes(
    engine: RoomEngine,
    connection_manager: Arc<ConnectionManager>,
    auth_service: Arc<AuthService>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let engine_filter = warp::any().map(move || engine.clone());

    let connection_manager_filter = warp::any().map(move || connection_manager.clone());

    let auth_filter = warp::any().map(move || auth_service.clone());

    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connection_manager_filter)
        .and(engine_filter.clone())
        .and(auth_filter.clone())
        .map(|ws: warp::ws::Ws, conn_mgr, engine, auth| {
            ws.on_upgrade(move |socket| {
                websocket::handle_connection(socket, conn_mgr, engine, auth)
            })
        });

    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let list_rooms = warp::path!("rooms")
        .and(warp::get())
        .and(warp::query::<RoomListQuery>())
        .and(engine_filter.clone())
        .and_then(handle_list_rooms);

    let create_room = warp::path!("rooms")
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::body::json::<RoomSettings>())
        .and(engine_filter.clone())
        .and(auth_filter)
        .and_then(handle_create_room);

    let private_room = warp::path!("rooms" / "private")
        .and(warp::get())
        .and(warp::query::<CodeQuery>())
        .and(engine_filter.clone())
        .and_then(handle_private_room);

    let get_room = warp::path!("rooms" / RoomId)
        .and(warp::get())
        .and(engine_filter.clone())
        .and_then(handle_get_room);

    let user_score = warp::path!("users" / PlayerId / "score")
        .and(warp::get())
        .and(engine_filter)
        .and_then(handle_user_score);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST"]);

    websocket
        .or(health)
        .or(list_rooms)
        .or(create_room)
        .or(private_room)
        .or(get_room)
        .or(user_score)
        .with(cors)
        .with(warp::log("dico"))
}

pub fn status_for(error: &RoomError) -> StatusCode {
    match error {
        RoomError::NotFound(_) => StatusCode::NOT_FOUND,
        RoomError::InvalidState(_) => StatusCode::CONFLICT,
        RoomError::Forbidden(_) => StatusCode::FORBIDDEN,
        RoomError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        RoomError::CapacityExceeded { .. } => StatusCode::CONFLICT,
        RoomError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RoomError::Conflict(_) => StatusCode::CONFLICT,
        RoomError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(error: &RoomError) -> JsonReply {
    if matches!(error, RoomError::Store(_)) {
        tracing::error!("Request failed: {}", error);
    }
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": error.to_string(),
            "kind": error.kind(),
        })),
        status_for(error),
    )
}

fn json_reply<T: serde::Serialize>(body: &T, status: StatusCode) -> JsonReply {
    warp::reply::with_status(warp::reply::json(body), status)
}

async fn handle_list_rooms(
    query: RoomListQuery,
    engine: RoomEngine,
) -> Result<JsonReply, warp::Rejection> {
    let skip = query.skip.unwrap_or(0);
    let take = query.take.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    match engine.list_public_rooms(skip, Some(take)).await {
        Ok(page) => {
            let view = RoomPageView {
                rooms: page.rooms.iter().map(RoomView::from).collect(),
                total: page.total,
            };
            Ok(json_reply(&view, StatusCode::OK))
        }
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn handle_create_room(
    auth_header: Option<String>,
    settings: RoomSettings,
    engine: RoomEngine,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let Some(auth_header) = auth_header else {
        return Ok(json_reply(
            &serde_json::json!({ "error": "Authentication required" }),
            StatusCode::UNAUTHORIZED,
        ));
    };

    let owner = match auth_service.validate_token(&auth_header).await {
        Ok(player) => player,
        Err(_) => {
            return Ok(json_reply(
                &serde_json::json!({ "error": "Invalid authentication token" }),
                StatusCode::UNAUTHORIZED,
            ));
        }
    };

    // The owner gets the full room, join code included
    match engine.create_room(&owner, &settings).await {
        Ok(room) => Ok(json_reply(&room, StatusCode::CREATED)),
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn handle_private_room(
    query: CodeQuery,
    engine: RoomEngine,
) -> Result<JsonReply, warp::Rejection> {
    match engine.find_room_by_code(&query.code).await {
        Ok(room) => Ok(json_reply(&RoomView::from(&room), StatusCode::OK)),
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn handle_get_room(
    room_id: RoomId,
    engine: RoomEngine,
) -> Result<JsonReply, warp::Rejection> {
    match engine.get_room(room_id).await {
        Ok(room) => Ok(json_reply(&RoomView::from(&room), StatusCode::OK)),
        Err(e) => Ok(error_reply(&e)),
    }
}

async fn handle_user_score(
    user_id: PlayerId,
    engine: RoomEngine,
) -> Result<JsonReply, warp::Rejection> {
    match engine.get_user_score(user_id).await {
        Ok(score) => Ok(json_reply(&UserScoreResponse { user_id, score }, StatusCode::OK)),
        Err(e) => Ok(error_reply(&e)),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::engine::EngineConfig;
    use dico_core::{InMemoryWordCorpus, RoomEventBus};
    use dico_persistence::RoomRepository;
    use dico_types::{ClientMessage, Room, ServerMessage};
    use migration::{Migrator, MigratorTrait};

    async fn create_test_app()
    -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let db = dico_persistence::connection::connect_to_memory_database()
            .await
            .unwrap();
        Migrator::up(&db, None).await.unwrap();

        let engine = RoomEngine::new(
            Arc::new(RoomRepository::new(db)),
            Arc::new(InMemoryWordCorpus::new_with_test_words()),
            RoomEventBus::default(),
            EngineConfig::default(),
        );
        let connection_manager = Arc::new(ConnectionManager::new());
        broadcast::spawn_event_dispatcher(&engine, connection_manager.clone());

        create_routes(
            engine,
            connection_manager,
            Arc::new(AuthService::new_dev_mode()),
        )
    }

    fn dev_token(name: &str) -> (PlayerId, String) {
        let id = PlayerId::new();
        (id, format!("{}:{}", id, name))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "OK");
    }

    #[tokio::test]
    async fn test_create_and_fetch_room() {
        let app = create_test_app().await;
        let (owner_id, token) = dev_token("alice");

        let response = warp::test::request()
            .method("POST")
            .path("/rooms")
            .header("authorization", format!("Bearer {}", token))
            .json(&serde_json::json!({ "name": "Lobby", "max_players": 4 }))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 201);
        let room: Room = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(room.owner_id, owner_id);
        assert_eq!(room.max_players, 4);

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/rooms/{}", room.id))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 200);

        let response = warp::test::request()
            .method("GET")
            .path("/rooms?skip=0&take=5")
            .reply(&app)
            .await;
        let page: RoomPageView = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rooms[0].id, room.id);
    }

    #[tokio::test]
    async fn test_private_room_lookup_hides_from_lobby() {
        let app = create_test_app().await;
        let (_, token) = dev_token("alice");

        let response = warp::test::request()
            .method("POST")
            .path("/rooms")
            .header("authorization", token)
            .json(&serde_json::json!({ "name": "Secret", "is_private": true }))
            .reply(&app)
            .await;
        let room: Room = serde_json::from_slice(response.body()).unwrap();
        let code = room.code.clone().unwrap();

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/rooms/private?code={}", code.to_lowercase()))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["id"], serde_json::json!(room.id));
        assert!(body.get("code").is_none());

        let response = warp::test::request()
            .method("GET")
            .path("/rooms")
            .reply(&app)
            .await;
        let page: RoomPageView = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("POST")
            .path("/rooms")
            .json(&serde_json::json!({ "name": "Lobby" }))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 401);

        let (_, token) = dev_token("alice");
        let response = warp::test::request()
            .method("POST")
            .path("/rooms")
            .header("authorization", token)
            .json(&serde_json::json!({ "name": "ab" }))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 422);

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/rooms/{}", RoomId::new()))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 404);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["kind"], "NotFound");
    }

    #[tokio::test]
    async fn test_user_score_starts_at_zero() {
        let app = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/users/{}/score", PlayerId::new()))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["score"], 0);
    }

    #[tokio::test]
    async fn test_websocket_requires_authentication() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        let message = ClientMessage::StartRoom {
            room_id: RoomId::new(),
        };
        ws.send_text(serde_json::to_string(&message).unwrap()).await;

        let reply = ws.recv().await.unwrap();
        let server_msg: ServerMessage = serde_json::from_str(reply.to_str().unwrap()).unwrap();
        assert_eq!(
            server_msg,
            ServerMessage::Error {
                message: "Authentication required".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_websocket_invalid_json() {
        let app = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        ws.send_text("invalid json").await;

        let reply = ws.recv().await.unwrap();
        let server_msg: ServerMessage = serde_json::from_str(reply.to_str().unwrap()).unwrap();
        match server_msg {
            ServerMessage::Error { message } => assert!(message.contains("Invalid JSON message")),
            other => panic!("Expected error message, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_websocket_join_and_game_error() {
        let app = create_test_app().await;
        let (_, owner_token) = dev_token("alice");

        let response = warp::test::request()
            .method("POST")
            .path("/rooms")
            .header("authorization", owner_token)
            .json(&serde_json::json!({ "name": "Lobby", "max_players": 2 }))
            .reply(&app)
            .await;
        let room: Room = serde_json::from_slice(response.body()).unwrap();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        let (bob_id, bob_token) = dev_token("bob");
        let authenticate = ClientMessage::Authenticate { token: bob_token };
        ws.send_text(serde_json::to_string(&authenticate).unwrap())
            .await;
        let reply = ws.recv().await.unwrap();
        let server_msg: ServerMessage = serde_json::from_str(reply.to_str().unwrap()).unwrap();
        assert!(matches!(server_msg, ServerMessage::AuthenticationSuccess { .. }));

        ws.send_text(
            serde_json::to_string(&ClientMessage::JoinRoom {
                room_id: room.id,
                code: None,
            })
            .unwrap(),
        )
        .await;
        let reply = ws.recv().await.unwrap();
        let server_msg: ServerMessage = serde_json::from_str(reply.to_str().unwrap()).unwrap();
        match server_msg {
            ServerMessage::NewPlayer { room_id, player } => {
                assert_eq!(room_id, room.id);
                assert_eq!(player.id, bob_id);
            }
            other => panic!("Expected NewPlayer, got {:?}", other),
        }

        // Bob is not the owner
        ws.send_text(serde_json::to_string(&ClientMessage::StartRoom { room_id: room.id }).unwrap())
            .await;
        let reply = ws.recv().await.unwrap();
        let server_msg: ServerMessage = serde_json::from_str(reply.to_str().unwrap()).unwrap();
        match server_msg {
            ServerMessage::GameError { event, kind, .. } => {
                assert_eq!(event, "startRoom");
                assert_eq!(kind, "Forbidden");
            }
            other => panic!("Expected GameError, got {:?}", other),
        }
    }
}

use super::*;
use axum::{
    body::{self, Body},
    http::Request,
};
use futures::{SinkExt, StreamExt};
use server_api::{create_game, GameLimits, GameOptions};
use shared::{
    domain::{Phase, PlayerId, SessionCode},
    protocol::ServerEvent,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;
use wordgen::WordSupplier;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn test_state() -> Arc<AppState> {
    Arc::new(AppState {
        api: ApiContext::new(WordSupplier::fallback_only(), GameLimits::default()),
    })
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = build_router(test_state());
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn unknown_session_state_is_not_found() {
    let app = build_router(test_state());
    let request = Request::get("/sessions/ZZZZ")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let error: ApiError = serde_json::from_slice(&body).expect("json");
    assert_eq!(error.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn session_state_route_returns_snapshot() {
    let state = test_state();
    let created = create_game(
        &state.api,
        GameOptions {
            player_name: Some("Ada".into()),
            ..Default::default()
        },
    )
    .await
    .expect("create");
    let app = build_router(state);

    let path = format!("/sessions/{}", created.session_code().as_str().to_lowercase());
    let request = Request::get(path).body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let snapshot: GameSnapshot = serde_json::from_slice(&body).expect("json");
    assert_eq!(snapshot.phase, Phase::TeamSelect);
    assert_eq!(snapshot.unassigned_players[0].name, "Ada");
}

#[test]
fn error_codes_map_to_http_statuses() {
    assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(status_for(ErrorCode::InvalidAction), StatusCode::CONFLICT);
    assert_eq!(status_for(ErrorCode::Validation), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(ErrorCode::Internal), StatusCode::INTERNAL_SERVER_ERROR);
}

async fn spawn_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = build_router(test_state());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect")
        .0
}

async fn send(socket: &mut Socket, request: serde_json::Value) {
    socket
        .send(Message::Text(request.to_string()))
        .await
        .expect("send");
}

async fn recv(socket: &mut Socket) -> ServerEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("event in time")
            .expect("socket open")
            .expect("frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("server event");
        }
    }
}

async fn recv_state(socket: &mut Socket) -> GameSnapshot {
    match recv(socket).await {
        ServerEvent::UpdateState { state } => state,
        other => panic!("expected updateState, got {other:?}"),
    }
}

async fn create(socket: &mut Socket, name: &str) -> (SessionCode, PlayerId) {
    send(
        socket,
        serde_json::json!({ "type": "createGame", "payload": { "playerName": name } }),
    )
    .await;
    match recv(socket).await {
        ServerEvent::GameCreated {
            session_code,
            player_id,
            ..
        } => (session_code, player_id),
        other => panic!("expected gameCreated, got {other:?}"),
    }
}

async fn join(socket: &mut Socket, code: &str, name: &str) -> PlayerId {
    send(
        socket,
        serde_json::json!({
            "type": "joinGame",
            "payload": { "sessionCode": code, "playerName": name }
        }),
    )
    .await;
    match recv(socket).await {
        ServerEvent::GameJoined { player_id, .. } => player_id,
        other => panic!("expected gameJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn errors_go_only_to_the_requesting_connection() {
    let addr = spawn_server().await;
    let mut host = connect(addr).await;
    let mut guest = connect(addr).await;

    let (code, _) = create(&mut host, "Ada").await;
    let guest_id = join(&mut guest, &code.as_str().to_lowercase(), "Bob").await;
    let joined = recv_state(&mut host).await;
    assert_eq!(joined.unassigned_players.len(), 2);

    send(
        &mut guest,
        serde_json::json!({
            "type": "cardClick",
            "payload": { "sessionCode": code, "cardIndex": 0 }
        }),
    )
    .await;
    match recv(&mut guest).await {
        ServerEvent::Error(error) => assert_eq!(error.code, ErrorCode::InvalidAction),
        other => panic!("expected error, got {other:?}"),
    }

    send(
        &mut guest,
        serde_json::json!({
            "type": "joinTeam",
            "payload": { "sessionCode": code, "playerId": guest_id, "team": "RED" }
        }),
    )
    .await;
    let host_view = recv_state(&mut host).await;
    assert_eq!(host_view.red_team.players[0].id, guest_id);
    let guest_view = recv_state(&mut guest).await;
    assert_eq!(guest_view, host_view);
}

#[tokio::test]
async fn malformed_and_unknown_requests_are_reported() {
    let addr = spawn_server().await;
    let mut socket = connect(addr).await;

    socket
        .send(Message::Text("{\"type\":\"danceParty\"}".into()))
        .await
        .expect("send");
    match recv(&mut socket).await {
        ServerEvent::Error(error) => assert_eq!(error.code, ErrorCode::Validation),
        other => panic!("expected error, got {other:?}"),
    }

    send(
        &mut socket,
        serde_json::json!({ "type": "joinGame", "payload": { "sessionCode": "QQQQ" } }),
    )
    .await;
    match recv(&mut socket).await {
        ServerEvent::Error(error) => assert_eq!(error.code, ErrorCode::NotFound),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn closing_a_lobby_connection_removes_its_player() {
    let addr = spawn_server().await;
    let mut host = connect(addr).await;
    let mut guest = connect(addr).await;

    let (code, host_id) = create(&mut host, "Ada").await;
    join(&mut guest, code.as_str(), "Bob").await;
    assert_eq!(recv_state(&mut host).await.unassigned_players.len(), 2);

    guest.close(None).await.expect("close");

    let after = recv_state(&mut host).await;
    assert_eq!(after.unassigned_players.len(), 1);
    assert_eq!(after.unassigned_players[0].id, host_id);
}

#[tokio::test]
async fn start_is_broadcast_to_every_player() {
    let addr = spawn_server().await;
    let mut sockets = Vec::new();
    for _ in 0..4 {
        sockets.push(connect(addr).await);
    }

    let (code, host_id) = create(&mut sockets[0], "P0").await;
    let mut ids = vec![host_id];
    for (i, socket) in sockets.iter_mut().enumerate().skip(1) {
        ids.push(join(socket, code.as_str(), &format!("P{i}")).await);
    }

    let teams = ["RED", "RED", "BLUE", "BLUE"];
    for (id, team) in ids.iter().zip(teams) {
        send(
            &mut sockets[0],
            serde_json::json!({
                "type": "joinTeam",
                "payload": { "sessionCode": code, "playerId": id, "team": team }
            }),
        )
        .await;
    }
    for id in [ids[0], ids[2]] {
        send(
            &mut sockets[0],
            serde_json::json!({
                "type": "becomeSpymaster",
                "payload": { "sessionCode": code, "playerId": id }
            }),
        )
        .await;
    }
    send(
        &mut sockets[0],
        serde_json::json!({ "type": "requestStartGame", "payload": { "sessionCode": code } }),
    )
    .await;

    for socket in &mut sockets {
        let started = loop {
            let state = recv_state(socket).await;
            if state.phase == Phase::InProgress {
                break state;
            }
        };
        let board = started.board.expect("board");
        assert_eq!(board.cards.len(), 25);
        assert!(board.cards.iter().all(|card| !card.revealed));
        assert_eq!(board.current_turn, board.starting_team);
        assert!(started.red_team.spymaster_id.is_some());
        assert!(started.blue_team.spymaster_id.is_some());
    }

    // An off-grid click is ignored without an error; the next event is the turn pass.
    send(
        &mut sockets[1],
        serde_json::json!({
            "type": "cardClick",
            "payload": { "sessionCode": code, "cardIndex": -1 }
        }),
    )
    .await;
    send(
        &mut sockets[1],
        serde_json::json!({ "type": "endTurn", "payload": { "sessionCode": code } }),
    )
    .await;
    let passed = recv_state(&mut sockets[1]).await;
    let board = passed.board.expect("board");
    assert_eq!(board.current_turn, board.starting_team.other());
    assert!(board.cards.iter().all(|card| !card.revealed));
}

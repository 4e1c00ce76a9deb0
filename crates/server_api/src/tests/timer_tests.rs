use std::sync::Arc;

use super::*;
use crate::{registry::SessionHandle, test_support::started_session};
use engine::Session;
use shared::{
    domain::{CardKind, Phase, Team},
    protocol::ServerEvent,
};
use tokio::sync::broadcast::error::TryRecvError;

async fn running(registry: &SessionRegistry, turn_timer_secs: Option<u32>) -> Arc<SessionHandle> {
    let handle = registry
        .create(|code| started_session(code, turn_timer_secs))
        .await
        .expect("session");
    sync_turn_timer(registry, &mut *handle.lock().await);
    handle
}

fn current_token(handle_slot: &SessionSlot) -> u64 {
    handle_slot
        .timer
        .armed
        .as_ref()
        .map(|armed| armed.token)
        .expect("armed timer")
}

fn trap_index(session: &Session) -> usize {
    session
        .round()
        .expect("round")
        .cards()
        .iter()
        .position(|card| card.kind == CardKind::Trap)
        .expect("trap card")
}

#[tokio::test(start_paused = true)]
async fn expiry_passes_the_turn_and_rearms() {
    let registry = SessionRegistry::new();
    let handle = running(&registry, Some(30)).await;
    let mut events = handle.subscribe();
    {
        let slot = handle.lock().await;
        assert!(slot.timer_armed());
        assert!(slot.session().turn_deadline().is_some());
    }

    let event = tokio::time::timeout(Duration::from_secs(31), events.recv())
        .await
        .expect("turn should expire")
        .expect("event");
    let ServerEvent::UpdateState { state } = event else {
        panic!("unexpected event {event:?}");
    };
    let board = state.board.expect("board");
    assert_eq!(board.current_turn, Team::Blue);
    assert!(board.turn_end_time.is_some());
    assert_eq!(state.message, "Turn passed to the Blue team.");
    assert!(handle.lock().await.timer_armed());
}

#[tokio::test(start_paused = true)]
async fn disarmed_timer_never_fires() {
    let registry = SessionRegistry::new();
    let handle = running(&registry, Some(30)).await;
    let mut events = handle.subscribe();
    handle.lock().await.timer.disarm();

    let waited = tokio::time::timeout(Duration::from_secs(120), events.recv()).await;
    assert!(waited.is_err(), "no event expected");
    let slot = handle.lock().await;
    assert_eq!(slot.session().round().expect("round").current_turn(), Team::Red);
}

#[tokio::test]
async fn stale_token_is_ignored() {
    let registry = SessionRegistry::new();
    let handle = running(&registry, Some(30)).await;
    let mut events = handle.subscribe();
    let stale = current_token(&*handle.lock().await) + 1_000;

    expire_turn(registry.clone(), handle.code().clone(), stale, Duration::ZERO).await;

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    let slot = handle.lock().await;
    assert_eq!(slot.session().round().expect("round").current_turn(), Team::Red);
    assert!(slot.timer_armed());
}

#[tokio::test]
async fn expiry_after_game_over_is_a_no_op() {
    let registry = SessionRegistry::new();
    let handle = running(&registry, Some(30)).await;
    let mut events = handle.subscribe();
    let token = {
        let mut slot = handle.lock().await;
        let trap = trap_index(slot.session());
        slot.session.reveal(trap).expect("reveal");
        current_token(&slot)
    };

    expire_turn(registry.clone(), handle.code().clone(), token, Duration::ZERO).await;

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    let slot = handle.lock().await;
    assert_eq!(slot.session().phase(), Phase::GameOver);
    assert_eq!(slot.session().winner(), Some(Team::Blue));
}

#[tokio::test]
async fn expiry_after_session_removal_is_a_no_op() {
    let registry = SessionRegistry::new();
    let handle = running(&registry, Some(30)).await;
    let token = current_token(&*handle.lock().await);
    registry.remove(handle.code()).await.expect("removed");

    expire_turn(registry.clone(), handle.code().clone(), token, Duration::ZERO).await;

    let slot = handle.lock().await;
    assert_eq!(slot.session().round().expect("round").current_turn(), Team::Red);
}

#[tokio::test]
async fn sync_without_configured_timer_leaves_no_deadline() {
    let registry = SessionRegistry::new();
    let handle = running(&registry, None).await;
    let slot = handle.lock().await;
    assert!(!slot.timer_armed());
    assert!(slot.session().turn_deadline().is_none());
}

#[tokio::test]
async fn sync_after_game_over_disarms() {
    let registry = SessionRegistry::new();
    let handle = running(&registry, Some(30)).await;
    let mut slot = handle.lock().await;
    let trap = trap_index(slot.session());
    slot.session.reveal(trap).expect("reveal");

    sync_turn_timer(&registry, &mut slot);

    assert!(!slot.timer_armed());
    assert!(slot.session().turn_deadline().is_none());
    assert!(slot.session().snapshot().board.expect("board").turn_end_time.is_none());
}

use std::sync::Arc;

use engine::{GameError, Outcome, Session, SessionSettings, WordSource, GRID_SIZE};
use rand::Rng;
use shared::{
    domain::{Phase, PlayerId, PlayerInfo, SessionCode, Team},
    error::ApiError,
    protocol::{GameSnapshot, ServerEvent},
};
use tokio::sync::broadcast;
use tracing::{debug, info};
use wordgen::WordSupplier;

pub mod config;
pub mod registry;
pub mod timer;

pub use registry::{SessionHandle, SessionRegistry, SessionSlot};
pub use timer::TurnTimer;

use timer::sync_turn_timer;

pub const DEFAULT_MAX_TURN_SECS: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameLimits {
    pub max_turn_secs: u32,
}

impl Default for GameLimits {
    fn default() -> Self {
        Self {
            max_turn_secs: DEFAULT_MAX_TURN_SECS,
        }
    }
}

#[derive(Clone)]
pub struct ApiContext {
    pub registry: SessionRegistry,
    pub words: WordSupplier,
    pub limits: GameLimits,
}

impl ApiContext {
    pub fn new(words: WordSupplier, limits: GameLimits) -> Self {
        Self {
            registry: SessionRegistry::new(),
            words,
            limits,
        }
    }
}

/// Options a creator picks for a new session.
#[derive(Debug, Clone, Default)]
pub struct GameOptions {
    pub theme_hint: Option<String>,
    pub custom_words: Option<Vec<String>>,
    pub timer_duration: Option<u32>,
    pub player_name: Option<String>,
}

/// A connection's membership in a session after create or join. `events` was
/// subscribed under the session lock, so it misses nothing after `state`.
pub struct Joined {
    pub session: Arc<SessionHandle>,
    pub player_id: PlayerId,
    pub state: GameSnapshot,
    pub events: broadcast::Receiver<ServerEvent>,
}

impl Joined {
    pub fn session_code(&self) -> &SessionCode {
        self.session.code()
    }
}

pub async fn create_game(ctx: &ApiContext, options: GameOptions) -> Result<Joined, ApiError> {
    let turn_timer = validate_timer(options.timer_duration, ctx.limits)?;
    let settings = SessionSettings::new(turn_timer, options.theme_hint, options.custom_words)
        .map_err(GameError::from)?;
    let player_id = ctx.registry.alloc_player_id();
    let creator = PlayerInfo {
        id: player_id,
        name: display_name(player_id, options.player_name.as_deref()),
    };
    let session = ctx
        .registry
        .create(move |code| Session::new(code, creator, settings))
        .await
        .ok_or_else(|| ApiError::internal("no free session code, try again later"))?;

    let (state, events) = {
        let slot = session.lock().await;
        (slot.session().snapshot(), session.subscribe())
    };
    info!(session = %session.code(), %player_id, timer_secs = ?turn_timer, "session created");
    Ok(Joined {
        session,
        player_id,
        state,
        events,
    })
}

pub async fn join_game(
    ctx: &ApiContext,
    session_code: &str,
    player_name: Option<&str>,
) -> Result<Joined, ApiError> {
    let session = find_session(ctx, session_code).await?;
    let player_id = ctx.registry.alloc_player_id();
    let player = PlayerInfo {
        id: player_id,
        name: display_name(player_id, player_name),
    };

    let (state, events) = {
        let mut slot = session.lock().await;
        let outcome = slot.session.add_player(player);
        commit(ctx, &session, &mut slot, outcome);
        // Subscribed after the publish above: the joiner gets its state in the reply.
        (slot.session().snapshot(), session.subscribe())
    };
    info!(session = %session.code(), %player_id, "player joined");
    Ok(Joined {
        session,
        player_id,
        state,
        events,
    })
}

pub async fn set_player_name(
    ctx: &ApiContext,
    session_code: &str,
    player_id: PlayerId,
    name: &str,
) -> Result<(), ApiError> {
    mutate(ctx, session_code, |session| {
        Ok(session.rename_player(player_id, name))
    })
    .await?;
    Ok(())
}

pub async fn join_team(
    ctx: &ApiContext,
    session_code: &str,
    player_id: PlayerId,
    team: Team,
) -> Result<(), ApiError> {
    let outcome = mutate(ctx, session_code, |session| {
        Ok(session.join_team(player_id, team))
    })
    .await?;
    if outcome.is_changed() {
        info!(session = session_code, %player_id, %team, "player joined team");
    }
    Ok(())
}

pub async fn become_spymaster(
    ctx: &ApiContext,
    session_code: &str,
    player_id: PlayerId,
) -> Result<(), ApiError> {
    let outcome = mutate(ctx, session_code, |session| {
        Ok(session.become_spymaster(player_id))
    })
    .await?;
    if outcome.is_changed() {
        info!(session = session_code, %player_id, "spymaster assigned");
    }
    Ok(())
}

pub async fn remove_player(
    ctx: &ApiContext,
    session_code: &str,
    player_id: PlayerId,
) -> Result<(), ApiError> {
    let outcome = mutate(ctx, session_code, |session| {
        Ok(session.remove_player(player_id))
    })
    .await?;
    if outcome.is_changed() {
        info!(session = session_code, %player_id, "player removed");
    }
    Ok(())
}

/// Validates, fetches words without holding the session lock, then builds the
/// board. The start conditions are re-checked once the lock is taken again.
pub async fn request_start_game(ctx: &ApiContext, session_code: &str) -> Result<(), ApiError> {
    let session = find_session(ctx, session_code).await?;
    let source = session.lock().await.session.prepare_start()?;
    let words = match source {
        WordSource::Custom(words) => words,
        WordSource::Supplier { theme_hint } => {
            ctx.words.supply(theme_hint.as_deref(), GRID_SIZE).await
        }
    };

    let mut slot = session.lock().await;
    let (starting_team, outcome) = {
        let mut rng = rand::thread_rng();
        let starting_team = if rng.gen_bool(0.5) {
            Team::Red
        } else {
            Team::Blue
        };
        let outcome = slot.session.start(&words, starting_team, &mut rng)?;
        (starting_team, outcome)
    };
    commit(ctx, &session, &mut slot, outcome);
    info!(session = %session.code(), %starting_team, "game started");
    Ok(())
}

pub async fn reveal_card(
    ctx: &ApiContext,
    session_code: &str,
    card_index: usize,
) -> Result<(), ApiError> {
    mutate(ctx, session_code, |session| {
        let outcome = session.reveal(card_index)?;
        if !outcome.is_changed() {
            debug!(session = session_code, card_index, "reveal ignored");
        } else if let Some(winner) = session.winner() {
            info!(session = session_code, %winner, "game over");
        }
        Ok(outcome)
    })
    .await?;
    Ok(())
}

pub async fn end_turn(ctx: &ApiContext, session_code: &str) -> Result<(), ApiError> {
    mutate(ctx, session_code, |session| session.end_turn()).await?;
    Ok(())
}

pub async fn snapshot(ctx: &ApiContext, session_code: &str) -> Result<GameSnapshot, ApiError> {
    let session = find_session(ctx, session_code).await?;
    let slot = session.lock().await;
    Ok(slot.session().snapshot())
}

pub async fn subscribe(
    ctx: &ApiContext,
    session_code: &str,
) -> Result<broadcast::Receiver<ServerEvent>, ApiError> {
    Ok(find_session(ctx, session_code).await?.subscribe())
}

/// A connection went away. Its player leaves a session still forming teams;
/// once a game is running the player keeps their seat.
pub async fn handle_disconnect(ctx: &ApiContext, session_code: &SessionCode, player_id: PlayerId) {
    let Some(session) = ctx.registry.get(session_code).await else {
        return;
    };
    let mut slot = session.lock().await;
    if slot.session().phase() != Phase::TeamSelect {
        debug!(session = %session_code, %player_id, "player disconnected mid-game");
        return;
    }
    let outcome = slot.session.remove_player(player_id);
    commit(ctx, &session, &mut slot, outcome);
    if outcome.is_changed() {
        info!(session = %session_code, %player_id, "disconnected player removed");
    }
}

async fn find_session(ctx: &ApiContext, raw: &str) -> Result<Arc<SessionHandle>, ApiError> {
    let not_found = || ApiError::not_found(format!("session {} not found", raw.trim()));
    let code = SessionCode::parse(raw).ok_or_else(not_found)?;
    ctx.registry.get(&code).await.ok_or_else(not_found)
}

/// Runs one operation under the session lock and commits its outcome.
async fn mutate<F>(ctx: &ApiContext, session_code: &str, op: F) -> Result<Outcome, ApiError>
where
    F: FnOnce(&mut Session) -> Result<Outcome, GameError>,
{
    let session = find_session(ctx, session_code).await?;
    let mut slot = session.lock().await;
    let outcome = op(&mut slot.session)?;
    commit(ctx, &session, &mut slot, outcome);
    Ok(outcome)
}

/// Re-arms the turn timer on a boundary and publishes any change. Runs under the
/// session lock.
fn commit(ctx: &ApiContext, session: &SessionHandle, slot: &mut SessionSlot, outcome: Outcome) {
    if !outcome.is_changed() {
        return;
    }
    slot.touch();
    if outcome.is_turn_boundary() {
        sync_turn_timer(&ctx.registry, slot);
    }
    session.publish(slot);
}

fn validate_timer(requested: Option<u32>, limits: GameLimits) -> Result<Option<u32>, ApiError> {
    match requested {
        Some(secs) if secs > limits.max_turn_secs => Err(ApiError::validation(format!(
            "timer duration must be at most {} seconds",
            limits.max_turn_secs
        ))),
        Some(0) | None => Ok(None),
        Some(secs) => Ok(Some(secs)),
    }
}

fn display_name(player_id: PlayerId, requested: Option<&str>) -> String {
    requested
        .and_then(engine::clean_name)
        .unwrap_or_else(|| format!("Player {}", player_id.0))
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

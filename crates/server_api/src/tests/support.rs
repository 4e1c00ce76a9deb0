use engine::{Session, SessionSettings, GRID_SIZE};
use rand::{rngs::StdRng, SeedableRng};
use shared::domain::{PlayerId, PlayerInfo, SessionCode, Team};

fn player(id: u64) -> PlayerInfo {
    PlayerInfo {
        id: PlayerId(id),
        name: format!("Player {id}"),
    }
}

/// A session already in progress with red to play: players 1 and 2 on red,
/// 3 and 4 on blue, 1 and 3 spymasters.
pub(crate) fn started_session(code: SessionCode, turn_timer_secs: Option<u32>) -> Session {
    let mut session = Session::new(
        code,
        player(1),
        SessionSettings::new(turn_timer_secs, None, None).expect("settings"),
    );
    for id in 2..=4 {
        session.add_player(player(id));
    }
    for (id, team) in [(1, Team::Red), (2, Team::Red), (3, Team::Blue), (4, Team::Blue)] {
        session.join_team(PlayerId(id), team);
    }
    session.become_spymaster(PlayerId(1));
    session.become_spymaster(PlayerId(3));
    let words: Vec<String> = (0..GRID_SIZE).map(|i| format!("WORD{i}")).collect();
    session
        .start(&words, Team::Red, &mut StdRng::seed_from_u64(11))
        .expect("start");
    session
}

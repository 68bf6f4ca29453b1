use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use takeout_game::ledger::StoreError;
use takeout_game::{
    AnnouncementKind, Difficulty, EmbeddedContent, GameConfig, GameEngine, GameError,
    GameSession, MemoryPlayerStore, PlayerState, PlayerStore, RecordingAnnouncer, SessionState,
    SubmissionOutcome,
};

type Session = GameSession<MemoryPlayerStore, RecordingAnnouncer>;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 18, 0, 0).unwrap()
}

fn at(seconds: i64) -> DateTime<Utc> {
    t0() + TimeDelta::seconds(seconds)
}

fn engine() -> GameEngine<MemoryPlayerStore> {
    GameEngine::embedded(MemoryPlayerStore::new()).unwrap()
}

fn first_order_id<S: PlayerStore>(session: &GameSession<S, RecordingAnnouncer>) -> String {
    session
        .active_orders()
        .next()
        .unwrap()
        .order_id()
        .to_string()
}

fn submit_expected(session: &mut Session, now: DateTime<Utc>) -> SubmissionOutcome {
    let order_id = first_order_id(session);
    let expected = session.expected_order(&order_id).unwrap();
    session.submit(&order_id, &expected, now).unwrap()
}

#[test]
fn active_and_pending_orders_always_add_up() {
    let engine = engine();
    let mut session = engine.create_session("steady", RecordingAnnouncer::new(), 11);
    session.start(t0()).unwrap();

    for second in 0..600 {
        let now = at(second);
        session.advance(now).unwrap();
        if second % 45 == 44 && session.active_count() > 0 {
            assert!(matches!(
                submit_expected(&mut session, now),
                SubmissionOutcome::Scored(_)
            ));
        }
        assert_eq!(
            session.active_count() + session.pending_spawns(),
            3,
            "at t+{second}s"
        );
    }
    assert!(engine.player_state("steady").unwrap().completed_for("Pizzaria") >= 13);
}

#[test]
fn announcements_follow_the_active_orders() {
    let engine = engine();
    let announcer = RecordingAnnouncer::new();
    let mut session = engine.create_session("herald", announcer.clone(), 12);
    session.start(t0()).unwrap();
    session.advance(at(60)).unwrap();
    assert_eq!(announcer.live_of(AnnouncementKind::Order).len(), 3);

    let order_id = first_order_id(&session);
    session.discard(&order_id, at(61)).unwrap();
    let live = announcer.live_of(AnnouncementKind::Order);
    assert_eq!(live.len(), 2);
    assert!(live
        .iter()
        .all(|posted| posted.context.order_id.as_deref() != Some(order_id.as_str())));
    let retracted_orders = announcer
        .retracted()
        .into_iter()
        .filter(|posted| posted.context.kind == AnnouncementKind::Order)
        .count();
    assert_eq!(retracted_orders, 1);
}

#[test]
fn difficulty_escalates_with_completed_orders() {
    let engine = engine();
    let mut completed = BTreeMap::new();
    completed.insert("Pizzaria".to_string(), 19);
    let veteran = PlayerState {
        coins: 0,
        restaurants: vec!["Pizzaria".into()],
        completed_orders: completed,
    };
    engine.store().save_player("veteran", &veteran).unwrap();

    let mut session = engine.create_session("veteran", RecordingAnnouncer::new(), 13);
    session.start(t0()).unwrap();
    let first = session.active_orders().next().unwrap();
    assert_eq!(first.difficulty, Difficulty::Medium);

    assert!(matches!(
        submit_expected(&mut session, at(1)),
        SubmissionOutcome::Scored(_)
    ));
    assert_eq!(
        engine.player_state("veteran").unwrap().completed_for("Pizzaria"),
        20
    );

    session.advance(at(60)).unwrap();
    assert_eq!(session.active_count(), 3);
    assert!(session
        .active_orders()
        .all(|active| active.difficulty == Difficulty::Hard));
}

#[test]
fn stopped_sessions_reject_submissions() {
    let engine = engine();
    let announcer = RecordingAnnouncer::new();
    let mut session = engine.create_session("closing", announcer.clone(), 14);
    session.start(t0()).unwrap();
    session.advance(at(60)).unwrap();
    let order_id = first_order_id(&session);
    let expected = session.expected_order(&order_id).unwrap();

    session.stop();
    session.stop();
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.active_count(), 0);
    assert_eq!(session.pending_spawns(), 0);
    assert!(session.next_due().is_none());
    assert!(announcer.live().is_empty());

    let outcome = session.submit(&order_id, &expected, at(61)).unwrap();
    assert!(matches!(outcome, SubmissionOutcome::Rejected { .. }));
    assert_eq!(session.advance(at(600)).unwrap(), 0);
    assert_eq!(engine.player_state("closing").unwrap().coins, 0);
}

#[test]
fn unknown_order_ids_change_nothing() {
    let engine = engine();
    let mut session = engine.create_session("lost", RecordingAnnouncer::new(), 15);
    session.start(t0()).unwrap();
    let expected = session.expected_order(&first_order_id(&session)).unwrap();

    let outcome = session.submit("zzzz", &expected, at(5)).unwrap();
    let SubmissionOutcome::Rejected { message } = outcome else {
        panic!("expected a rejection, got {outcome:?}");
    };
    assert!(message.contains("zzzz"));
    assert_eq!(session.active_count(), 1);
    assert_eq!(engine.player_state("lost").unwrap().coins, 0);
}

#[test]
fn failed_announcements_are_retried_without_losing_the_order() {
    let engine = engine();
    let announcer = RecordingAnnouncer::new();
    announcer.fail_next(1);
    let mut session = engine.create_session("flaky", announcer.clone(), 16);
    session.start(t0()).unwrap();

    let order_id = first_order_id(&session);
    assert!(session.get_order_by_id(&order_id).unwrap().announcement.is_none());
    assert!(announcer.live_of(AnnouncementKind::Order).is_empty());

    session.advance(at(2)).unwrap();
    assert!(session.get_order_by_id(&order_id).unwrap().announcement.is_some());
    assert_eq!(announcer.live_of(AnnouncementKind::Order).len(), 1);
}

#[test]
fn announcements_keep_retrying_past_the_attempt_limit() {
    let mut config = GameConfig::default();
    config.lifecycle.active_orders = 1;
    config.lifecycle.announce_retry_attempts = 2;
    config.lifecycle.announce_retry_base_seconds = 1;
    let engine = GameEngine::new(&EmbeddedContent, MemoryPlayerStore::new(), config).unwrap();
    let announcer = RecordingAnnouncer::new();
    // Attempts at 0, 1, 3, 5 and 7 seconds fail; the one at 9 seconds goes through.
    announcer.fail_next(5);
    let mut session = engine.create_session("stubborn", announcer.clone(), 18);
    session.start(t0()).unwrap();
    let order_id = first_order_id(&session);

    session.advance(at(8)).unwrap();
    assert!(session.get_order_by_id(&order_id).unwrap().announcement.is_none());
    assert!(announcer.live_of(AnnouncementKind::Order).is_empty());

    session.advance(at(9)).unwrap();
    assert!(session.get_order_by_id(&order_id).unwrap().announcement.is_some());
    assert_eq!(announcer.live_of(AnnouncementKind::Order).len(), 1);
}

/// Memory store whose writes can be switched off.
#[derive(Debug, Clone, Default)]
struct FlakyStore {
    inner: MemoryPlayerStore,
    failing: Arc<AtomicBool>,
}

impl FlakyStore {
    fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Poisoned)
        } else {
            Ok(())
        }
    }
}

impl PlayerStore for FlakyStore {
    type Error = StoreError;

    fn load_player(&self, player_id: &str) -> Result<Option<PlayerState>, Self::Error> {
        self.inner.load_player(player_id)
    }

    fn save_player(&self, player_id: &str, state: &PlayerState) -> Result<(), Self::Error> {
        self.check()?;
        self.inner.save_player(player_id, state)
    }

    fn update_player<F, T>(
        &self,
        player_id: &str,
        fresh: PlayerState,
        apply: F,
    ) -> Result<T, Self::Error>
    where
        F: FnOnce(&mut PlayerState) -> T,
    {
        self.check()?;
        self.inner.update_player(player_id, fresh, apply)
    }
}

#[test]
fn store_failures_leave_the_order_in_place() {
    let store = FlakyStore::default();
    let engine = GameEngine::embedded(store.clone()).unwrap();
    let mut session = engine.create_session("unlucky", RecordingAnnouncer::new(), 19);
    session.start(t0()).unwrap();
    let order_id = first_order_id(&session);
    let truth = session.expected_order(&order_id).unwrap();

    store.fail_writes(true);
    assert!(matches!(
        session.submit(&order_id, &truth, at(2)),
        Err(GameError::ExternalService { .. })
    ));
    assert!(matches!(
        session.discard(&order_id, at(2)),
        Err(GameError::ExternalService { .. })
    ));
    assert!(session.get_order_by_id(&order_id).is_some());
    let state = engine.player_state("unlucky").unwrap();
    assert_eq!(state.coins, 0);
    assert_eq!(state.completed_for("Pizzaria"), 0);

    store.fail_writes(false);
    let outcome = session.submit(&order_id, &truth, at(3)).unwrap();
    let SubmissionOutcome::Scored(report) = outcome else {
        panic!("expected a scored submission, got {outcome:?}");
    };
    assert_eq!(report.reward, 15);
    let state = engine.player_state("unlucky").unwrap();
    assert_eq!(state.coins, 15);
    assert_eq!(state.completed_for(&report.restaurant), 1);
    assert!(session.get_order_by_id(&order_id).is_none());
}

#[test]
fn players_without_restaurants_cannot_open() {
    let engine = engine();
    engine
        .store()
        .save_player("broke", &PlayerState::default())
        .unwrap();
    let mut session = engine.create_session("broke", RecordingAnnouncer::new(), 17);
    assert!(matches!(
        session.start(t0()),
        Err(GameError::InvariantViolation(_))
    ));
    assert_eq!(session.state(), SessionState::Idle);
}

//! Scheduler tests: silence detection, improvisation exclusivity, capture and
//! control pitches. Everything runs on loopback devices and manual ticks.

use crossbeam_channel::{bounded, Receiver, Sender};
use encore::ai::{ContinuationImproviser, Error as ImproviserError, Improviser, ImproviserConfig};
use encore::midi::{loopback, CollectingSink, InputEvent, MusicStore, Note, Tick};
use encore::{Error, Player, PlayerState};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A 24-note melody with some repeated motifs.
fn history() -> Arc<MusicStore> {
    let store = MusicStore::new();
    let melody = [
        60, 62, 64, 65, 67, 65, 64, 62, 60, 62, 64, 67, 69, 67, 65, 64, 62, 64, 65, 67, 72, 71,
        69, 67,
    ];
    for (i, pitch) in melody.into_iter().enumerate() {
        let tick = -10_000 + i as Tick * 32;
        store.add_note(Note::on(pitch, 90, tick));
        store.add_note(Note::off(pitch, tick + 24));
    }
    Arc::new(store)
}

fn player_with(history: Arc<MusicStore>, sink: Arc<CollectingSink>) -> Player {
    Player::builder()
        .history(history)
        .sink(sink)
        .silence_beats(1.0)
        .seed(17)
        .build()
        .unwrap()
}

fn tick_until_trigger(player: &Player, max_ticks: usize) -> Option<(Tick, JoinHandle<()>)> {
    for _ in 0..max_ticks {
        if let Some(handle) = player.tick_once().unwrap() {
            return Some((player.current_tick(), handle));
        }
    }
    None
}

/// Learn blocks until the test opens the gate.
struct GatedImproviser {
    inner: ContinuationImproviser,
    entered: Sender<()>,
    gate: Receiver<()>,
}

impl Improviser for GatedImproviser {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn learn(&self, history: &MusicStore) -> encore::ai::Result<usize> {
        let _ = self.entered.send(());
        let _ = self.gate.recv_timeout(Duration::from_secs(5));
        self.inner.learn(history)
    }

    fn generate(&self, start_tick: Tick) -> encore::ai::Result<Vec<Note>> {
        self.inner.generate(start_tick)
    }

    fn has_learned(&self) -> bool {
        self.inner.has_learned()
    }
}

fn gated_player(sink: Arc<CollectingSink>) -> (Player, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = bounded(1);
    let (gate_tx, gate_rx) = bounded(1);
    let config = ImproviserConfig {
        seed: Some(3),
        ..Default::default()
    };
    let improviser = Arc::new(GatedImproviser {
        inner: ContinuationImproviser::new(config).unwrap(),
        entered: entered_tx,
        gate: gate_rx,
    });
    let player = Player::builder()
        .history(history())
        .improviser(improviser)
        .sink(sink)
        .silence_beats(1.0)
        .build()
        .unwrap();
    (player, entered_rx, gate_tx)
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// Generating before any learn pass fails and leaves the future untouched.
#[test]
fn test_generate_before_learn_is_not_ready() {
    let player = player_with(history(), Arc::new(CollectingSink::new()));
    player.future().add_note(Note::on(40, 50, 5));
    let before = player.future().snapshot();

    let result = player.generate_lick(10);
    assert!(matches!(
        result,
        Err(Error::Improviser(ImproviserError::NotReady(_)))
    ));
    assert!(result.unwrap_err().is_recoverable());
    assert_eq!(player.future().snapshot(), before);
}

/// After an explicit learn, licks are scheduled from the requested tick.
#[test]
fn test_learn_then_generate_lick() {
    let player = player_with(history(), Arc::new(CollectingSink::new()));
    assert_eq!(player.learn().unwrap(), 24);
    assert!(player.has_learned());
    assert_eq!(player.state(), PlayerState::Idle);

    let lick = player.generate_lick(200).unwrap();
    assert!(!lick.is_empty());
    assert!(lick.iter().all(|n| n.tick >= 200));
    assert_eq!(player.future().len(), lick.len());
}

/// Too little history is a recoverable failure and keeps the player usable.
#[test]
fn test_improvise_with_short_history() {
    let player = player_with(Arc::new(MusicStore::new()), Arc::new(CollectingSink::new()));
    let err = player.improvise(1).unwrap_err();
    assert!(matches!(
        err,
        Error::Improviser(ImproviserError::DataInsufficient { found: 0, .. })
    ));
    assert!(err.is_recoverable());
    assert_eq!(player.state(), PlayerState::Idle);
    assert!(player.future().is_empty());
}

// ---------------------------------------------------------------------------
// Silence detection
// ---------------------------------------------------------------------------

/// Once the performer is silent past the threshold, a lick is scheduled for
/// the following tick and then played through the sink.
#[test]
fn test_silence_triggers_improvisation() {
    init_tracing();
    let sink = Arc::new(CollectingSink::new());
    let player = player_with(history(), Arc::clone(&sink));

    let (trigger, handle) = tick_until_trigger(&player, 200).expect("no improvisation started");
    assert_eq!(trigger, 65);
    handle.join().unwrap();

    assert!(player.has_learned());
    assert_eq!(player.state(), PlayerState::Idle);
    let scheduled = player.future().all_notes();
    assert!(!scheduled.is_empty());
    assert!(scheduled.iter().all(|n| n.tick > trigger));

    let last = player.future().last_tick().unwrap();
    while player.current_tick() < last {
        player.tick_once().unwrap();
    }
    assert_eq!(sink.len(), scheduled.len());
}

/// Nothing starts while a key is held, however long the silence.
#[test]
fn test_held_key_blocks_improvisation() {
    let player = player_with(history(), Arc::new(CollectingSink::new()));
    player.handle_event(InputEvent::note_on(48, 80));
    assert!(tick_until_trigger(&player, 300).is_none());

    player.handle_event(InputEvent::note_off(48));
    assert!(tick_until_trigger(&player, 300).is_some());
}

/// Striking a key again before releasing it does not leave it counted as
/// held after the single release.
#[test]
fn test_restruck_key_is_released_once() {
    let player = player_with(history(), Arc::new(CollectingSink::new()));
    player.handle_event(InputEvent::note_on(60, 80));
    player.handle_event(InputEvent::note_on(60, 80));
    assert_eq!(player.keys_held(), 1);
    player.handle_event(InputEvent::note_off(60));
    assert_eq!(player.keys_held(), 0);

    let (_, handle) = tick_until_trigger(&player, 1000).expect("silence never detected");
    handle.join().unwrap();
}

/// Performer activity restarts the silence count.
#[test]
fn test_activity_resets_silence() {
    let player = player_with(history(), Arc::new(CollectingSink::new()));
    for _ in 0..50 {
        player.tick_once().unwrap();
    }
    player.handle_event(InputEvent::note_on(50, 80));
    player.handle_event(InputEvent::note_off(50));
    let (trigger, handle) = tick_until_trigger(&player, 200).unwrap();
    assert_eq!(trigger, 50 + 65);
    handle.join().unwrap();
}

/// Pending output suppresses a new lick until it has played out.
#[test]
fn test_pending_future_blocks_improvisation() {
    let player = player_with(history(), Arc::new(CollectingSink::new()));
    player.future().add_note(Note::on(60, 80, 100));
    let (trigger, handle) = tick_until_trigger(&player, 300).unwrap();
    assert!(trigger >= 100);
    handle.join().unwrap();
}

/// A failed attempt is not retried until the performer plays again.
#[test]
fn test_failed_attempt_waits_for_next_silence() {
    let player = player_with(Arc::new(MusicStore::new()), Arc::new(CollectingSink::new()));
    let (_, handle) = tick_until_trigger(&player, 200).unwrap();
    handle.join().unwrap();
    assert!(tick_until_trigger(&player, 200).is_none());

    player.handle_event(InputEvent::note_on(60, 80));
    player.handle_event(InputEvent::note_off(60));
    assert!(tick_until_trigger(&player, 200).is_some());
}

// ---------------------------------------------------------------------------
// Exclusivity
// ---------------------------------------------------------------------------

/// While one pass is in flight, further triggers and explicit requests are
/// rejected rather than queued.
#[test]
fn test_second_trigger_is_noop() {
    init_tracing();
    let (player, entered_rx, gate_tx) = gated_player(Arc::new(CollectingSink::new()));

    let (_, handle) = tick_until_trigger(&player, 200).unwrap();
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(player.state(), PlayerState::Learning);

    assert!(tick_until_trigger(&player, 50).is_none());
    assert!(matches!(
        player.improvise(0),
        Err(Error::Improviser(ImproviserError::NotReady(_)))
    ));
    assert!(matches!(
        player.learn(),
        Err(Error::Improviser(ImproviserError::NotReady(_)))
    ));

    gate_tx.send(()).unwrap();
    handle.join().unwrap();
    assert_eq!(player.state(), PlayerState::Idle);
    assert!(!player.future().is_empty());
}

/// A lick that is only ready after its planned start tick is moved to the
/// next tick, so none of its notes are skipped.
#[test]
fn test_slow_learn_schedules_after_current_tick() {
    let sink = Arc::new(CollectingSink::new());
    let (player, entered_rx, gate_tx) = gated_player(Arc::clone(&sink));

    let (trigger, handle) = tick_until_trigger(&player, 200).unwrap();
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    for _ in 0..40 {
        assert!(player.tick_once().unwrap().is_none());
    }
    let released_at = player.current_tick();
    assert_eq!(released_at, trigger + 40);

    gate_tx.send(()).unwrap();
    drop(gate_tx);
    handle.join().unwrap();

    let scheduled = player.future().all_notes();
    assert!(!scheduled.is_empty());
    let first = player.future().first_tick().unwrap();
    // the lick starts on the first grid line after the release
    assert!(first > released_at && first <= released_at + 8, "lick starts at {}", first);

    let last = player.future().last_tick().unwrap();
    while player.current_tick() < last {
        player.tick_once().unwrap();
    }
    assert_eq!(sink.len(), scheduled.len());
}

// ---------------------------------------------------------------------------
// Capture and control pitches
// ---------------------------------------------------------------------------

/// Performer notes land in history at the current tick.
#[test]
fn test_capture_records_history() {
    let player = player_with(Arc::new(MusicStore::new()), Arc::new(CollectingSink::new()));
    for _ in 0..7 {
        player.tick_once().unwrap();
    }
    player.handle_event(InputEvent::note_on(64, 70));
    player.tick_once().unwrap();
    player.handle_event(InputEvent::note_off(64));

    assert_eq!(player.history().notes_at(7), vec![Note::on(64, 70, 7)]);
    assert_eq!(player.history().notes_at(8), vec![Note::off(64, 8)]);
    assert_eq!(player.keys_held(), 0);
}

/// The save pitch writes the snapshot and is never recorded.
#[test]
fn test_save_pitch_writes_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let player = Player::builder()
        .history(history())
        .snapshot_path(&path)
        .build()
        .unwrap();

    player.handle_event(InputEvent::note_on(21, 100));
    player.handle_event(InputEvent::note_off(21));

    assert_eq!(player.keys_held(), 0);
    let saved = MusicStore::load(&path).unwrap();
    assert_eq!(saved.len(), 48);
    assert!(saved.all_notes().iter().all(|n| n.pitch != 21));
}

/// The playback pitch schedules the whole history from the next tick.
#[test]
fn test_playback_pitch_schedules_history() {
    let player = player_with(history(), Arc::new(CollectingSink::new()));
    for _ in 0..3 {
        player.tick_once().unwrap();
    }
    player.handle_event(InputEvent::note_on(22, 100));

    assert_eq!(player.future().len(), 48);
    assert_eq!(player.future().first_tick(), Some(4));
    assert_eq!(player.history().len(), 48);
    assert_eq!(player.keys_held(), 0);
}

/// Threads started on a loopback source capture until the source closes.
#[test]
fn test_start_and_join_with_loopback() {
    init_tracing();
    let (keyboard, source) = loopback(64);
    let player = Player::builder()
        .history(Arc::new(MusicStore::new()))
        .sink(Arc::new(CollectingSink::new()))
        .bpm(600.0)
        .build()
        .unwrap();

    let handle = player.start(source).unwrap();
    assert!(handle.is_running());
    assert_eq!(player.state(), PlayerState::Listening);

    for pitch in 60..64 {
        keyboard.press(pitch, 90).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        keyboard.release(pitch).unwrap();
    }
    drop(keyboard);
    handle.join().unwrap();

    assert_eq!(player.state(), PlayerState::Idle);
    assert_eq!(
        player.history().all_notes().iter().filter(|n| n.on).count(),
        4
    );
    assert!(player.current_tick() > 0);
}

/// Stopping the handle ends capture and drops the source even though the
/// keyboard is still connected.
#[test]
fn test_stop_releases_source() {
    let (keyboard, source) = loopback(64);
    let player = Player::builder()
        .history(Arc::new(MusicStore::new()))
        .bpm(600.0)
        .build()
        .unwrap();

    let mut handle = player.start(source).unwrap();
    keyboard.press(60, 90).unwrap();
    handle.stop();

    assert!(!handle.is_running());
    assert_eq!(player.state(), PlayerState::Idle);
    assert!(keyboard.press(62, 90).is_err());
}

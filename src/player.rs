//! Tick-driven player: capture, emission and improvisation.
//!
//! A [`Player`] is a cheap handle over shared state. [`Player::start`] runs two
//! threads: one blocks on the event source and records the performer into
//! history, the other ticks at `tick_period()` and calls [`Player::tick_once`].
//! Each tick emits whatever the future store holds for that tick and, once
//! the performer has been silent long enough, hands learn + generate to a
//! short-lived `encore-improvise` thread so the tick thread never blocks.

use crate::builder::PlayerBuilder;
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::state::{PlayerState, StateMachine};
use crossbeam_channel::{bounded, select, tick, Sender};
use encore_ai::Improviser;
use encore_midi::{EventSource, InputEvent, MusicStore, Note, NoteSink, Polled, ShortMessage, Tick};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// No failed attempt recorded for the current silence window.
const NO_FAILED_WINDOW: Tick = Tick::MIN;

/// How long the capture thread waits for an event before rechecking `running`.
const CAPTURE_POLL: Duration = Duration::from_millis(20);

/// Keys currently down, one bit per pitch. A repeated note-on for a held
/// pitch or an off for a key that is not down leaves the set unchanged.
#[derive(Default)]
struct HeldKeys {
    low: AtomicU64,
    high: AtomicU64,
}

impl HeldKeys {
    fn slot(&self, pitch: u8) -> (&AtomicU64, u64) {
        let pitch = pitch & 0x7f;
        let word = if pitch < 64 { &self.low } else { &self.high };
        (word, 1u64 << (pitch % 64))
    }

    fn press(&self, pitch: u8) {
        let (word, bit) = self.slot(pitch);
        word.fetch_or(bit, Ordering::AcqRel);
    }

    fn release(&self, pitch: u8) {
        let (word, bit) = self.slot(pitch);
        word.fetch_and(!bit, Ordering::AcqRel);
    }

    fn count(&self) -> usize {
        let low = self.low.load(Ordering::Acquire).count_ones();
        let high = self.high.load(Ordering::Acquire).count_ones();
        (low + high) as usize
    }
}

struct Inner {
    config: PlayerConfig,
    history: Arc<MusicStore>,
    future: Arc<MusicStore>,
    improviser: Arc<dyn Improviser>,
    sink: Arc<dyn NoteSink>,
    machine: StateMachine,

    tick: AtomicI64,
    last_activity: AtomicI64,
    keys_held: HeldKeys,
    performer_velocity: AtomicU8,
    /// `last_activity` value of the silence window whose attempt failed.
    failed_window: AtomicI64,
}

/// Improvisation slot held for the duration of one pass. Dropping it
/// returns the player to the state it was in before.
struct Improvisation {
    inner: Arc<Inner>,
    resume: PlayerState,
}

impl Drop for Improvisation {
    fn drop(&mut self) {
        self.inner.machine.end_improvisation(self.resume);
    }
}

#[derive(Clone)]
pub struct Player {
    inner: Arc<Inner>,
}

impl Player {
    pub fn builder() -> PlayerBuilder {
        PlayerBuilder::default()
    }

    pub(crate) fn new(
        config: PlayerConfig,
        history: Arc<MusicStore>,
        improviser: Arc<dyn Improviser>,
        sink: Arc<dyn NoteSink>,
    ) -> Self {
        let machine = StateMachine::default();
        if improviser.has_learned() {
            machine.assume_learned();
        }
        info!(
            backend = improviser.name(),
            bpm = config.bpm,
            history = history.len(),
            "Player ready"
        );
        Self {
            inner: Arc::new(Inner {
                config,
                history,
                future: Arc::new(MusicStore::new()),
                improviser,
                sink,
                machine,
                tick: AtomicI64::new(0),
                last_activity: AtomicI64::new(0),
                keys_held: HeldKeys::default(),
                performer_velocity: AtomicU8::new(0),
                failed_window: AtomicI64::new(NO_FAILED_WINDOW),
            }),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    /// Confirmed performer notes.
    pub fn history(&self) -> &Arc<MusicStore> {
        &self.inner.history
    }

    /// Notes scheduled for output.
    pub fn future(&self) -> &Arc<MusicStore> {
        &self.inner.future
    }

    pub fn improviser(&self) -> &Arc<dyn Improviser> {
        &self.inner.improviser
    }

    pub fn current_tick(&self) -> Tick {
        self.inner.tick.load(Ordering::Acquire)
    }

    /// Number of distinct pitches the performer is holding down.
    pub fn keys_held(&self) -> usize {
        self.inner.keys_held.count()
    }

    pub fn state(&self) -> PlayerState {
        self.inner.machine.get()
    }

    pub fn has_learned(&self) -> bool {
        self.inner.machine.has_learned()
    }

    /// Starts the capture and tick threads.
    ///
    /// The capture thread owns `source` until the source closes or the
    /// handle is stopped, then drops it.
    pub fn start<S>(&self, source: S) -> Result<PlayerHandle>
    where
        S: EventSource + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        self.inner.machine.start_listening();

        let capture = {
            let player = self.clone();
            let running = Arc::clone(&running);
            let mut source = source;
            thread::Builder::new()
                .name("encore-capture".into())
                .spawn(move || {
                    while running.load(Ordering::Acquire) {
                        match source.recv_timeout(CAPTURE_POLL) {
                            Polled::Event(event) => player.handle_event(event),
                            Polled::TimedOut => {}
                            Polled::Closed => break,
                        }
                    }
                    debug!("Capture thread finished");
                })?
        };

        let period = self.inner.config.tick_period();
        let ticker = {
            let player = self.clone();
            thread::Builder::new()
                .name("encore-tick".into())
                .spawn(move || {
                    let clock = tick(period);
                    loop {
                        select! {
                            recv(clock) -> _ => {
                                if let Err(e) = player.tick_once() {
                                    error!("Failed to start improvisation: {}", e);
                                }
                            }
                            recv(shutdown_rx) -> _ => break,
                        }
                    }
                    debug!("Tick thread finished");
                })
        };
        let ticker = match ticker {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::Release);
                if capture.join().is_err() {
                    error!("Capture thread panicked");
                }
                self.inner.machine.stop_listening();
                return Err(e.into());
            }
        };

        info!(period_us = period.as_micros() as u64, "Player started");
        Ok(PlayerHandle {
            player: self.clone(),
            running,
            shutdown: Some(shutdown_tx),
            ticker: Some(ticker),
            capture: Some(capture),
        })
    }

    /// Advances one tick: emits due notes, then checks for silence.
    ///
    /// Returns the handle of the improvisation thread if this tick started one.
    pub fn tick_once(&self) -> Result<Option<JoinHandle<()>>> {
        let now = self.inner.tick.fetch_add(1, Ordering::AcqRel) + 1;
        self.emit(now);

        if !self.should_improvise(now) {
            return Ok(None);
        }
        let Some(slot) = self.try_begin(PlayerState::Learning) else {
            return Ok(None);
        };

        let player = self.clone();
        let window = self.inner.last_activity.load(Ordering::Acquire);
        let handle = thread::Builder::new()
            .name("encore-improvise".into())
            .spawn(move || {
                if let Err(e) = player.run_improvisation(&slot, now + 1) {
                    player.inner.failed_window.store(window, Ordering::Release);
                    if e.is_recoverable() {
                        warn!("Skipping improvisation: {}", e);
                    } else {
                        error!("Improvisation failed: {}", e);
                    }
                }
            })?;
        debug!(tick = now, "Silence detected, improvising");
        Ok(Some(handle))
    }

    fn should_improvise(&self, now: Tick) -> bool {
        let inner = &self.inner;
        let last = inner.last_activity.load(Ordering::Acquire);
        now - last > inner.config.silence_ticks()
            && inner.keys_held.count() == 0
            && !inner.machine.get().is_improvising()
            && inner.failed_window.load(Ordering::Acquire) != last
            && !inner.future.has_future(now)
    }

    fn emit(&self, now: Tick) {
        let notes = self.inner.future.notes_at(now);
        if notes.is_empty() {
            return;
        }
        let config = &self.inner.config;
        let follow = config.follow_velocity && self.keys_held() > 0;
        let performer = self.inner.performer_velocity.load(Ordering::Acquire);

        for mut note in notes {
            if follow && note.on {
                note.velocity = note.velocity.min(performer).max(1);
            }
            trace!(tick = now, pitch = note.pitch, velocity = note.velocity, on = note.on, "emit");
            if let Err(e) = self.inner.sink.send(ShortMessage::from_note(config.channel, &note)) {
                warn!(pitch = note.pitch, "Failed to send note: {}", e);
            }
        }
    }

    /// Records one performer event at the current tick.
    ///
    /// Control pitches trigger save or playback on note-on and are otherwise
    /// ignored; they never reach history or the activity counters.
    pub fn handle_event(&self, event: InputEvent) {
        let inner = &self.inner;
        let config = &inner.config;
        if config.is_control_pitch(event.pitch) {
            if !event.on {
                return;
            }
            if event.pitch == config.save_pitch {
                if let Err(e) = self.save_history() {
                    warn!("Failed to save history: {}", e);
                }
            } else if let Err(e) = self.play_back_history() {
                warn!("Failed to play back history: {}", e);
            }
            return;
        }

        let now = self.current_tick();
        inner.last_activity.store(now, Ordering::Release);
        let note = if event.on {
            inner.keys_held.press(event.pitch);
            inner.performer_velocity.store(event.velocity, Ordering::Release);
            Note::on(event.pitch, event.velocity, now)
        } else {
            inner.keys_held.release(event.pitch);
            Note::off(event.pitch, now)
        };
        let stored = inner.history.add_note(note);
        debug!(
            pitch = note.pitch,
            velocity = note.velocity,
            tick = now,
            stored,
            "Captured {}",
            note
        );
    }

    /// Learns from history and merges a lick starting at `start_tick` into
    /// the future store. Returns how many notes were scheduled.
    ///
    /// If the clock has already passed `start_tick` when the lick is ready,
    /// the lick is moved to start on the next tick instead.
    ///
    /// Fails with `NotReady` if another pass is in flight.
    pub fn improvise(&self, start_tick: Tick) -> Result<usize> {
        let slot = self
            .try_begin(PlayerState::Learning)
            .ok_or(encore_ai::Error::NotReady("improvisation already in flight"))?;
        self.run_improvisation(&slot, start_tick)
    }

    fn run_improvisation(&self, _slot: &Improvisation, start_tick: Tick) -> Result<usize> {
        let chords = self.inner.improviser.learn(&self.inner.history)?;
        self.inner.machine.learned();
        let start_tick = start_tick.max(self.current_tick() + 1);
        let mut lick = self.inner.improviser.generate(start_tick)?;
        let late = self.current_tick() + 1 - start_tick;
        if late > 0 {
            for note in &mut lick {
                *note = note.at(note.tick + late);
            }
        }
        let scheduled = self.inner.future.extend(lick);
        info!(chords, start_tick, scheduled, "Improvised lick");
        Ok(scheduled)
    }

    /// Rebuilds the model from history without generating.
    pub fn learn(&self) -> Result<usize> {
        let _slot = self
            .try_begin(PlayerState::Learning)
            .ok_or(encore_ai::Error::NotReady("improvisation already in flight"))?;
        let chords = self.inner.improviser.learn(&self.inner.history)?;
        self.inner.machine.learned();
        Ok(chords)
    }

    /// Generates a lick from the current model and schedules it.
    ///
    /// Fails with `NotReady`, leaving the future store untouched, before the
    /// first successful learn or while another pass is in flight.
    pub fn generate_lick(&self, start_tick: Tick) -> Result<Vec<Note>> {
        if !self.has_learned() {
            return Err(encore_ai::Error::NotReady("no model learned yet").into());
        }
        let _slot = self
            .try_begin(PlayerState::Generating)
            .ok_or(encore_ai::Error::NotReady("improvisation already in flight"))?;
        let lick = self.inner.improviser.generate(start_tick)?;
        let scheduled = self.inner.future.extend(lick.iter().copied());
        info!(start_tick, scheduled, "Generated lick");
        Ok(lick)
    }

    fn try_begin(&self, target: PlayerState) -> Option<Improvisation> {
        let machine = &self.inner.machine;
        let resume = match target {
            PlayerState::Generating => machine.begin_generation(),
            _ => machine.begin_improvisation(),
        }?;
        Some(Improvisation {
            inner: Arc::clone(&self.inner),
            resume,
        })
    }

    /// Writes the history snapshot to `snapshot_path`.
    pub fn save_history(&self) -> Result<()> {
        let path = &self.inner.config.snapshot_path;
        self.inner.history.save(path)?;
        info!(path = %path.display(), notes = self.inner.history.len(), "Saved history");
        Ok(())
    }

    /// Schedules the whole history so its first note sounds on the next tick.
    pub fn play_back_history(&self) -> Result<usize> {
        let notes = self.inner.history.all_notes();
        let Some(first) = notes.first().map(|n| n.tick) else {
            return Ok(0);
        };
        let shift = self.current_tick() + 1 - first;
        let scheduled = self
            .inner
            .future
            .extend(notes.into_iter().map(|n| n.at(n.tick + shift)));
        info!(scheduled, "Playing back history");
        Ok(scheduled)
    }
}

/// Running player threads. Dropping the handle stops both.
pub struct PlayerHandle {
    player: Player,
    running: Arc<AtomicBool>,
    shutdown: Option<Sender<()>>,
    ticker: Option<JoinHandle<()>>,
    capture: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops ticking and capture, and waits for both threads. The event
    /// source is dropped with the capture thread, which closes hardware ports.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        // closing the channel wakes the tick thread's select
        self.shutdown.take();
        if let Some(handle) = self.ticker.take() {
            if handle.join().is_err() {
                error!("Tick thread panicked");
            }
        }
        if let Some(handle) = self.capture.take() {
            if handle.join().is_err() {
                error!("Capture thread panicked");
            }
        }
        self.player.inner.machine.stop_listening();
    }

    /// Blocks until the event source closes, then stops.
    pub fn join(mut self) -> Result<()> {
        let capture = self.capture.take();
        let panicked = capture.map(|h| h.join().is_err()).unwrap_or(false);
        self.stop();
        if panicked {
            return Err(Error::Io(std::io::Error::other("capture thread panicked")));
        }
        Ok(())
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Transport state and the per-frame tick
use super::Sequencer;
use crate::audio::AudioOutput;
use crate::pattern::note::Note;
use crate::samples::{SampleBank, SampleId};
use log::{debug, info, trace, warn};

/// Time between steps at `tempo`, in host clock units (milliseconds).
pub fn step_duration(tempo: u32) -> f64 {
    60.0 / f64::from(tempo.max(1)) * 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayState {
    #[default]
    Stopped,
    PlayingPattern,
    PlayingSong,
}

/// Emitted during playback and drained with [`Sequencer::poll_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The cursor moved on to `step` of `pattern`.
    StepAdvanced { pattern: usize, step: usize },
    /// A note started a sample on `track`.
    NoteTriggered { track: usize, sample: SampleId },
    /// Song mode moved on to another pattern.
    PatternChanged(usize),
    Stopped,
}

impl<O: AudioOutput> Sequencer<O> {
    /// Starts playing a pattern (the active one by default) from its first
    /// step. Returns `false` if there is no such pattern.
    pub fn play_pattern(&mut self, index: Option<usize>) -> bool {
        let index = index.unwrap_or(self.current_pattern);
        if index >= self.patterns.len() {
            return false;
        }

        self.stop_preview();
        self.current_pattern = index;
        self.reconcile_routing();
        self.current_step = 0;
        self.state = PlayState::PlayingPattern;

        info!("playing pattern {index}");
        true
    }

    /// Plays every pattern in order from the first, then stops.
    pub fn play_song(&mut self) -> bool {
        if !self.play_pattern(Some(0)) {
            return false;
        }

        self.state = PlayState::PlayingSong;
        info!("playing song of {} patterns", self.patterns.len());
        true
    }

    /// Halts the cursor. Sources already started ring out.
    pub fn stop(&mut self) {
        if self.state != PlayState::Stopped {
            self.state = PlayState::Stopped;
            self.events.push(PlaybackEvent::Stopped);
            debug!("stopped at pattern {} step {}", self.current_pattern, self.current_step);
        }
    }

    /// Advances playback to `timestamp` (milliseconds on a monotonic host
    /// clock). Plays at most one step per call and returns whether it did.
    pub fn tick(&mut self, timestamp: f64, bank: &SampleBank) -> bool {
        if self.state == PlayState::Stopped {
            return false;
        }

        let Some(pattern) = self.patterns.get(self.current_pattern) else {
            return false;
        };

        if timestamp - self.last_tick < step_duration(pattern.tempo()) {
            return false;
        }

        let step = self.current_step;
        let notes_per_track = pattern.notes_per_track();
        let notes: Vec<(usize, Note)> = pattern
            .tracks()
            .iter()
            .enumerate()
            .filter_map(|(track, t)| t.get_note(step).map(|note| (track, *note)))
            .collect();

        if self.routing.is_stale(pattern) {
            warn!("routing out of date for pattern {}, rebuilding", self.current_pattern);
            self.reconcile_routing();
        }

        for (track, note) in notes {
            self.play_note(track, &note, bank);
        }

        self.advance(notes_per_track);
        self.last_tick = timestamp;
        true
    }

    fn play_note(&mut self, track: usize, note: &Note, bank: &SampleBank) {
        match (note.sample_id(), note.playback_rate()) {
            (Some(sample), Some(rate)) => {
                let Some(buffer) = bank.buffer(sample) else {
                    debug!("sample {sample} not loaded, skipping note on track {track}");
                    return;
                };

                let gain = note.gain().unwrap_or(1.0);
                if self.routing.trigger(&mut self.output, track, buffer, rate, gain) {
                    trace!("track {track}: {note} sample {sample}");
                    self.events.push(PlaybackEvent::NoteTriggered { track, sample });
                }
            }
            _ => {
                if let Some(gain) = note.gain() {
                    self.routing.set_gain(&mut self.output, track, gain);
                }
            }
        }
    }

    fn advance(&mut self, notes_per_track: usize) {
        if self.current_step + 1 < notes_per_track {
            self.current_step += 1;
            self.events.push(PlaybackEvent::StepAdvanced {
                pattern: self.current_pattern,
                step: self.current_step,
            });
            return;
        }

        self.current_step = 0;

        if self.state == PlayState::PlayingSong && self.current_pattern + 1 < self.patterns.len() {
            self.current_pattern += 1;
            self.reconcile_routing();
            self.events.push(PlaybackEvent::PatternChanged(self.current_pattern));
            self.events.push(PlaybackEvent::StepAdvanced {
                pattern: self.current_pattern,
                step: 0,
            });
            return;
        }

        self.stop();
    }
}

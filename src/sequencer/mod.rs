/// Core sequencer logic - song state, transport and routing upkeep
use crate::audio::AudioOutput;
use crate::pattern::note::{Note, NoteName};
use crate::pattern::{Pattern, TrackCountChanged};
use crate::samples::{SampleBank, SampleId};
use log::{debug, info};

pub mod playback;
pub mod routing;

use playback::{PlayState, PlaybackEvent};
use routing::{PreviewRoute, RoutingChange, RoutingGraph};

/// Owns the song (an ordered list of patterns), the play cursor and the
/// routing graph of the active pattern.
///
/// Patterns can only be changed through the sequencer so that the routing
/// always matches the active pattern's track count.
#[derive(Debug)]
pub struct Sequencer<O: AudioOutput> {
    output: O,
    routing: RoutingGraph,
    preview: Option<PreviewRoute>,
    patterns: Vec<Pattern>,
    current_pattern: usize,
    current_step: usize,
    state: PlayState,
    last_tick: f64,
    events: Vec<PlaybackEvent>,
}

impl<O: AudioOutput> Sequencer<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            routing: RoutingGraph::new(),
            preview: None,
            patterns: Vec::new(),
            current_pattern: 0,
            current_step: 0,
            state: PlayState::Stopped,
            last_tick: 0.0,
            events: Vec::new(),
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn routing(&self) -> &RoutingGraph {
        &self.routing
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn pattern(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn current_pattern(&self) -> Option<&Pattern> {
        self.patterns.get(self.current_pattern)
    }

    pub fn current_pattern_index(&self) -> usize {
        self.current_pattern
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state != PlayState::Stopped
    }

    pub fn is_playing_song(&self) -> bool {
        self.state == PlayState::PlayingSong
    }

    /// Fits the routing to the active pattern, or tears it down when the
    /// song is empty.
    fn reconcile_routing(&mut self) -> Option<RoutingChange> {
        match self.patterns.get(self.current_pattern) {
            Some(pattern) => Some(self.routing.configure(&mut self.output, pattern)),
            None => {
                self.routing.teardown(&mut self.output);
                None
            }
        }
    }

    /// Applies a track count change signalled by a pattern. Changes to
    /// patterns other than the active one need no routing work.
    pub fn apply(&mut self, change: TrackCountChanged) {
        if self
            .current_pattern()
            .is_some_and(|pattern| pattern.id() == change.pattern)
        {
            self.reconcile_routing();
        }
    }

    /// Appends a pattern and returns its index. The first pattern of an empty
    /// song becomes the active one.
    pub fn add_pattern(&mut self, pattern: Pattern) -> usize {
        self.patterns.push(pattern);
        if self.patterns.len() == 1 {
            self.current_pattern = 0;
            self.reconcile_routing();
        }
        self.patterns.len() - 1
    }

    /// Removes a pattern. The active pattern stays active when another one is
    /// removed; removing the active pattern stops playback.
    pub fn remove_pattern(&mut self, index: usize) -> Option<Pattern> {
        if index >= self.patterns.len() {
            return None;
        }

        let removed = self.patterns.remove(index);

        if index == self.current_pattern {
            self.stop();
            self.current_step = 0;
        }
        if index < self.current_pattern {
            self.current_pattern -= 1;
        }
        self.current_pattern = self.current_pattern.min(self.patterns.len().saturating_sub(1));

        self.reconcile_routing();
        Some(removed)
    }

    /// Replaces the whole song, selecting its first pattern.
    pub fn replace_patterns(&mut self, patterns: Vec<Pattern>) {
        self.stop();
        self.patterns = patterns;
        self.current_pattern = 0;
        self.current_step = 0;
        self.reconcile_routing();
        info!("song has {} patterns", self.patterns.len());
    }

    pub fn set_current_pattern(&mut self, index: usize) -> bool {
        if index >= self.patterns.len() {
            return false;
        }

        self.current_pattern = index;
        self.reconcile_routing();
        true
    }

    pub fn next_pattern(&mut self) -> bool {
        self.set_current_pattern(self.current_pattern + 1)
    }

    pub fn previous_pattern(&mut self) -> bool {
        self.current_pattern
            .checked_sub(1)
            .is_some_and(|index| self.set_current_pattern(index))
    }

    /// Deep copy of a pattern (the active one by default) with a new identity.
    pub fn clone_pattern(&self, index: Option<usize>) -> Option<Pattern> {
        self.patterns
            .get(index.unwrap_or(self.current_pattern))
            .map(Pattern::duplicate)
    }

    /// Appends a copy of the active pattern and selects it.
    pub fn duplicate_pattern(&mut self) -> Option<usize> {
        let copy = self.clone_pattern(None)?;
        let index = self.add_pattern(copy);
        self.set_current_pattern(index);
        Some(index)
    }

    /// Appends an empty pattern shaped like the active one and selects it.
    pub fn add_pattern_like_current(&mut self) -> Option<usize> {
        let current = self.current_pattern()?;
        let pattern = Pattern::with_shape(
            current.track_count(),
            current.notes_per_track(),
            current.tempo(),
        );
        let index = self.add_pattern(pattern);
        self.set_current_pattern(index);
        Some(index)
    }

    /// Runs `edit` on a pattern, then brings the routing back in line if the
    /// active pattern's shape changed.
    pub fn edit_pattern<R>(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut Pattern) -> R,
    ) -> Option<R> {
        let result = edit(self.patterns.get_mut(index)?);
        if index == self.current_pattern {
            self.reconcile_routing();
        }
        Some(result)
    }

    /// Sets the track count of a pattern and reconciles routing through the
    /// change it signals.
    pub fn set_track_count(&mut self, index: usize, count: usize) -> bool {
        let Some(pattern) = self.patterns.get_mut(index) else {
            return false;
        };
        if let Some(change) = pattern.set_track_count(count) {
            self.apply(change);
        }
        true
    }

    pub fn set_track_pan(&mut self, track: usize, pan: f32) -> bool {
        self.routing.set_pan(&mut self.output, track, pan)
    }

    /// Peak levels of the active pattern's tracks.
    pub fn track_levels(&self) -> Vec<[f32; 2]> {
        self.routing.levels(&self.output)
    }

    /// Auditions a sample at C-4, replacing any previous preview.
    pub fn preview_sample(&mut self, bank: &SampleBank, sample: SampleId) -> bool {
        let Some(buffer) = bank.buffer(sample) else {
            debug!("sample {sample} not loaded, nothing to preview");
            return false;
        };
        let rate = Note::new(NoteName::C, false, 4, Some(sample))
            .playback_rate()
            .unwrap_or(1.0);

        let output = &mut self.output;
        self.preview
            .get_or_insert_with(|| PreviewRoute::build(output))
            .play(output, buffer, rate);
        true
    }

    pub fn stop_preview(&mut self) {
        if let Some(preview) = &mut self.preview {
            preview.stop(&mut self.output);
        }
    }

    /// Drains the events queued since the last call.
    pub fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Which medium the shell is presenting. Exactly one of the two panes is
/// visible at any time; the visualizer runs only while in `Audio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeState {
    #[default]
    Video,
    Audio,
}

impl ModeState {
    pub fn toggled(self) -> Self {
        match self {
            ModeState::Video => ModeState::Audio,
            ModeState::Audio => ModeState::Video,
        }
    }

    /// Icon on the mode-toggle button, naming the mode a click switches to.
    pub fn toggle_icon(self) -> &'static str {
        match self {
            ModeState::Video => "🎵",
            ModeState::Audio => "📺",
        }
    }

    pub fn toggle_hint(self) -> &'static str {
        match self {
            ModeState::Video => "Switch to audio",
            ModeState::Audio => "Switch to video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    Playing,
    #[default]
    Paused,
}

impl PlaybackState {
    pub fn toggled(self) -> Self {
        match self {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused => PlaybackState::Playing,
        }
    }

    /// Icon on the play/pause button. Shows the action a click performs,
    /// so it reads "pause" while playing.
    pub fn icon(self) -> &'static str {
        match self {
            PlaybackState::Playing => "⏸",
            PlaybackState::Paused => "⏵",
        }
    }
}

/// Remembers what was playing when the window went away, so the sleep guard
/// can restore it on show. Only the hidden/shown handlers touch this.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityState {
    pub is_window_hidden: bool,
    pub was_video_playing: bool,
    pub was_audio_playing: bool,
}

/// All mutable shell state, owned by the app and mutated only on the UI
/// thread. Handlers update this struct; the render pass reads it and
/// reconciles the audio sink / visualizer against it.
#[derive(Debug, Clone)]
pub struct ShellState {
    pub mode: ModeState,
    pub playback: PlaybackState,
    pub visibility: VisibilityState,
    /// Video stream address. Playback in video mode is toggled by rewriting
    /// the `autoplay` flag embedded in it.
    pub video_url: String,
    /// Volume slider position, 0..=100. The sink gain is `volume / 100`.
    pub volume: u8,
}

impl ShellState {
    pub fn new(video_url: String, volume: u8) -> Self {
        let playback = if autoplay_enabled(&video_url) {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
        Self {
            mode: ModeState::default(),
            playback,
            visibility: VisibilityState::default(),
            video_url,
            volume: volume.min(100),
        }
    }

    /// Flips between video and audio mode and returns the new mode. The
    /// caller starts or stops the visualizer based on the result.
    pub fn toggle_mode(&mut self) -> ModeState {
        self.mode = self.mode.toggled();
        self.mode
    }

    /// Play/pause for whichever medium is active. Video mode flips the
    /// autoplay flag in the stream address; audio mode flips the playback
    /// state directly (the sink is reconciled afterwards).
    pub fn toggle_playback(&mut self) -> PlaybackState {
        match self.mode {
            ModeState::Audio => {
                self.playback = self.playback.toggled();
            }
            ModeState::Video => {
                self.video_url = set_autoplay(&self.video_url, !autoplay_enabled(&self.video_url));
                self.playback = if autoplay_enabled(&self.video_url) {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Paused
                };
            }
        }
        self.playback
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    /// Audio sink gain for the current slider position.
    pub fn gain(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }

    /// Window went away: remember what was playing and force-pause it, so
    /// background media cannot keep the platform awake.
    pub fn pause_media_for_sleep(&mut self) {
        self.visibility.is_window_hidden = true;

        if autoplay_enabled(&self.video_url) {
            self.visibility.was_video_playing = true;
            self.video_url = set_autoplay(&self.video_url, false);
        }
        if self.playback == PlaybackState::Playing {
            if self.mode == ModeState::Audio {
                self.visibility.was_audio_playing = true;
            }
            self.playback = PlaybackState::Paused;
        }
    }

    /// Window is back: restore whatever the sleep guard paused.
    pub fn resume_media_after_sleep(&mut self) {
        self.visibility.is_window_hidden = false;

        if self.visibility.was_video_playing {
            self.video_url = set_autoplay(&self.video_url, true);
            self.visibility.was_video_playing = false;
            if self.mode == ModeState::Video {
                self.playback = PlaybackState::Playing;
            }
        }
        if self.visibility.was_audio_playing {
            self.visibility.was_audio_playing = false;
            if self.mode == ModeState::Audio {
                self.playback = PlaybackState::Playing;
            }
        }
    }
}

pub fn autoplay_enabled(url: &str) -> bool {
    url.contains("autoplay=1")
}

/// Rewrites the `autoplay` flag in a stream address. An address that never
/// carried the flag is returned unchanged; playback of such a stream cannot
/// be toggled from the shell.
pub fn set_autoplay(url: &str, enabled: bool) -> String {
    if enabled {
        url.replace("autoplay=0", "autoplay=1")
    } else {
        url.replace("autoplay=1", "autoplay=0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_state() -> ShellState {
        ShellState::new("https://example.com/embed/jfKfPfyJRdk?autoplay=0".to_owned(), 80)
    }

    #[test]
    fn mode_strictly_alternates() {
        let mut state = video_state();
        let mut previous = state.mode;
        for _ in 0..7 {
            let next = state.toggle_mode();
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn playback_toggle_pairs_are_idempotent() {
        let mut state = video_state();
        state.toggle_mode();
        assert_eq!(state.mode, ModeState::Audio);

        let original = state.playback;
        let original_icon = state.playback.icon();
        state.toggle_playback();
        assert_ne!(state.playback, original);
        state.toggle_playback();
        assert_eq!(state.playback, original);
        assert_eq!(state.playback.icon(), original_icon);
    }

    #[test]
    fn icon_tracks_playback_state() {
        let mut state = video_state();
        state.toggle_mode();
        for _ in 0..4 {
            let playback = state.toggle_playback();
            let expected = match playback {
                PlaybackState::Playing => "⏸",
                PlaybackState::Paused => "⏵",
            };
            assert_eq!(playback.icon(), expected);
        }
    }

    #[test]
    fn video_playback_rewrites_autoplay_flag() {
        let mut state = video_state();
        assert_eq!(state.mode, ModeState::Video);
        assert_eq!(state.playback, PlaybackState::Paused);

        state.toggle_playback();
        assert!(state.video_url.contains("autoplay=1"));
        assert_eq!(state.playback, PlaybackState::Playing);

        state.toggle_playback();
        assert!(state.video_url.contains("autoplay=0"));
        assert_eq!(state.playback, PlaybackState::Paused);
    }

    #[test]
    fn url_without_flag_is_left_alone() {
        let url = "https://example.com/stream";
        assert_eq!(set_autoplay(url, true), url);
        assert_eq!(set_autoplay(url, false), url);
        assert!(!autoplay_enabled(url));
    }

    #[test]
    fn volume_maps_to_exact_gain() {
        let mut state = video_state();
        for (volume, gain) in [(0u8, 0.0f32), (25, 0.25), (50, 0.5), (100, 1.0)] {
            state.set_volume(volume);
            assert_eq!(state.gain(), gain);
        }
        state.set_volume(200);
        assert_eq!(state.volume, 100);
    }

    #[test]
    fn hidden_then_shown_resumes_audio() {
        let mut state = video_state();
        state.toggle_mode();
        state.toggle_playback();
        assert_eq!(state.playback, PlaybackState::Playing);

        state.pause_media_for_sleep();
        assert!(state.visibility.is_window_hidden);
        assert_eq!(state.playback, PlaybackState::Paused);
        assert!(state.visibility.was_audio_playing);

        state.resume_media_after_sleep();
        assert!(!state.visibility.is_window_hidden);
        assert_eq!(state.playback, PlaybackState::Playing);
        assert!(!state.visibility.was_audio_playing);
    }

    #[test]
    fn hidden_then_shown_restores_video_autoplay() {
        let mut state =
            ShellState::new("https://example.com/embed/x?autoplay=1&mute=0".to_owned(), 50);
        assert_eq!(state.playback, PlaybackState::Playing);

        state.pause_media_for_sleep();
        assert!(state.video_url.contains("autoplay=0"));
        assert!(state.visibility.was_video_playing);
        assert_eq!(state.playback, PlaybackState::Paused);

        state.resume_media_after_sleep();
        assert!(state.video_url.contains("autoplay=1"));
        assert_eq!(state.playback, PlaybackState::Playing);
    }

    #[test]
    fn sleep_guard_is_a_noop_when_nothing_played() {
        let mut state = video_state();
        state.pause_media_for_sleep();
        state.resume_media_after_sleep();
        assert_eq!(state.playback, PlaybackState::Paused);
        assert!(!state.visibility.was_video_playing);
        assert!(!state.visibility.was_audio_playing);
    }
}

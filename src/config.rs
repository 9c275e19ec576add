use anyhow::{anyhow, Context as _, Result};
use eframe::egui;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
};

const DEFAULT_VIDEO_URL: &str =
    "https://www.youtube-nocookie.com/embed/jfKfPfyJRdk?autoplay=0&mute=0";
const DEFAULT_PROJECT_PAGE: &str = "https://github.com/zachthedev/lofigirl";
const DEFAULT_VOLUME: u8 = 80;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub stream: StreamConfig,
    pub ui: UiConfig,
    pub links: LinksConfig,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Video-mode stream address; carries the autoplay flag that playback
    /// toggling rewrites.
    pub video_url: String,
    /// Local track for audio mode. Audio playback (and the sampled
    /// visualizer path) is unavailable without it.
    pub audio_track: Option<PathBuf>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            video_url: DEFAULT_VIDEO_URL.to_owned(),
            audio_track: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    /// Initial volume slider position, 0..=100.
    pub volume: u8,
    pub always_on_top: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            always_on_top: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinksConfig {
    pub project_page: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            project_page: DEFAULT_PROJECT_PAGE.to_owned(),
        }
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(current_dir) = env::current_dir() {
        candidates.push(current_dir.join("config.toml"));
        candidates.push(current_dir.join("config").join("config.toml"));
        candidates.push(current_dir.join("config").join("lofi.toml"));
    }

    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("config.toml"));
            candidates.push(dir.join("config").join("config.toml"));
            candidates.push(dir.join("config").join("lofi.toml"));
        }
    }

    candidates
}

fn load_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let doc: ConfigDocument = toml::from_str(&data)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(doc.into())
}

/// Owns the active config plus an optional file watcher that reloads it in
/// place. Reload failures keep the previous config active.
pub struct ConfigManager {
    config: Config,
    path: Option<PathBuf>,
    watcher: Option<RecommendedWatcher>,
    changes_rx: Option<Receiver<notify::Result<notify::Event>>>,
}

impl ConfigManager {
    /// Picks the first existing candidate config file; defaults when none
    /// exists.
    pub fn discover() -> Result<Self> {
        for path in candidate_paths() {
            if path.exists() {
                let config = load_file(&path)?;
                return Ok(Self {
                    config,
                    path: Some(path),
                    watcher: None,
                    changes_rx: None,
                });
            }
        }

        Ok(Self::with_defaults())
    }

    /// Built-in defaults, no file, no watcher. Used when discovery fails.
    pub fn with_defaults() -> Self {
        Self {
            config: Config::default(),
            path: None,
            watcher: None,
            changes_rx: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn enable_hot_reload(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }
        let Some(path) = self.path.clone() else {
            return Err(anyhow!("No config file to watch"));
        };
        let dir = path
            .parent()
            .ok_or_else(|| anyhow!("Config file {} has no parent directory", path.display()))?;

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        self.changes_rx = Some(rx);
        self.watcher = Some(watcher);
        Ok(())
    }

    pub fn hot_reload_enabled(&self) -> bool {
        self.watcher.is_some()
    }

    /// Drains watcher events and reloads the config when its file changed.
    /// Returns true when a reload took effect.
    pub fn poll_hot_reload(&mut self, ctx: &egui::Context) -> bool {
        let mut events = Vec::new();
        if let Some(rx) = self.changes_rx.as_ref() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }

        let Some(path) = self.path.clone() else {
            return false;
        };
        let file_name = path.file_name().unwrap_or_default();

        let mut reloaded = false;
        for event in events {
            match event {
                Ok(evt) => {
                    if !evt.paths.iter().any(|p| p.file_name() == Some(file_name)) {
                        continue;
                    }
                    match load_file(&path) {
                        Ok(config) => {
                            self.config = config;
                            reloaded = true;
                        }
                        Err(err) => {
                            log::warn!("config reload failed, keeping previous: {err:#}");
                        }
                    }
                }
                Err(err) => log::warn!("config watcher error: {err}"),
            }
        }

        if reloaded {
            ctx.request_repaint();
        }
        reloaded
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    stream: StreamSection,
    #[serde(default)]
    ui: UiSection,
    #[serde(default)]
    links: LinksSection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let stream = StreamConfig {
            video_url: value
                .stream
                .video_url
                .unwrap_or_else(|| DEFAULT_VIDEO_URL.to_owned()),
            audio_track: value.stream.audio_track,
        };
        let ui = UiConfig {
            volume: value.ui.volume.unwrap_or(DEFAULT_VOLUME).min(100),
            always_on_top: value.ui.always_on_top.unwrap_or(false),
        };
        let links = LinksConfig {
            project_page: value
                .links
                .project_page
                .unwrap_or_else(|| DEFAULT_PROJECT_PAGE.to_owned()),
        };

        Config { stream, ui, links }
    }
}

#[derive(Debug, Default, Deserialize)]
struct StreamSection {
    video_url: Option<String>,
    audio_track: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct UiSection {
    volume: Option<u8>,
    always_on_top: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksSection {
    project_page: Option<String>,
}

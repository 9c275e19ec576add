mod audio;
mod config;
mod host;
mod state;
mod visualizer;

use crate::{
    audio::AudioPlayer,
    config::ConfigManager,
    host::{HostCommand, HostEvent, HostLink},
    state::{autoplay_enabled, ModeState, PlaybackState, ShellState},
    visualizer::Visualizer,
};
use eframe::egui::{
    self, Align2, Color32, CornerRadius, FontId, PointerButton, Rect, ResizeDirection,
    ViewportBuilder, ViewportCommand, WindowLevel,
};
use std::time::{Duration, Instant};

const TITLEBAR_HEIGHT: f32 = 36.0;
const CONTROL_BAR_HEIGHT: f32 = 44.0;
const RESIZE_EDGE: f32 = 6.0;
const WINDOW_TITLE: &str = "lofi shell";

struct App {
    state: ShellState,
    visualizer: Visualizer,
    player: AudioPlayer,
    host: HostLink,
    config_manager: ConfigManager,
    err: Option<String>,
    maximized: bool,
    last_window_level: Option<WindowLevel>,
    started_at: Instant,
}

impl App {
    fn new(host: HostLink) -> Self {
        let (config_manager, config_err) = match ConfigManager::discover() {
            Ok(manager) => (manager, None),
            Err(err) => {
                log::error!("config discovery failed, using defaults: {err:#}");
                (ConfigManager::with_defaults(), Some(format!("{err:#}")))
            }
        };

        let config = config_manager.config().clone();
        let state = ShellState::new(config.stream.video_url.clone(), config.ui.volume);

        let mut player = AudioPlayer::new();
        let mut err = config_err;
        if let Some(track) = &config.stream.audio_track {
            if let Err(load_err) = player.load(track, state.gain()) {
                log::warn!("audio track unavailable: {load_err:#}");
                err.get_or_insert_with(|| format!("{load_err:#}"));
            }
        }

        let mut app = Self {
            state,
            visualizer: Visualizer::new(),
            player,
            host,
            config_manager,
            err,
            maximized: false,
            last_window_level: None,
            started_at: Instant::now(),
        };

        if let Err(watch_err) = app.config_manager.enable_hot_reload() {
            log::debug!("config hot reload not active: {watch_err:#}");
        }

        app
    }

    /// Mode controller: flips the mode, starts or stops the visualizer and
    /// mirrors the change to the host agent.
    fn toggle_mode(&mut self) {
        match self.state.toggle_mode() {
            ModeState::Audio => {
                let tap = self.player.spectrum_tap();
                self.visualizer.start(tap);
            }
            ModeState::Video => self.visualizer.stop(),
        }
        self.sync_player();
        self.host.invoke(HostCommand::ToggleAudioMode);
    }

    fn toggle_playback(&mut self) {
        self.state.toggle_playback();
        self.sync_player();
    }

    /// The sink follows the declared state: audible only while audio mode
    /// is active and playback is on.
    fn sync_player(&self) {
        let audible =
            self.state.mode == ModeState::Audio && self.state.playback == PlaybackState::Playing;
        self.player.set_paused(!audible);
    }

    fn handle_host_events(&mut self) {
        for event in self.host.poll_events() {
            match event {
                HostEvent::WindowHidden => {
                    self.state.pause_media_for_sleep();
                    self.sync_player();
                    self.host.invoke(HostCommand::SetWindowVisibility(false));
                }
                HostEvent::WindowShown => {
                    self.state.resume_media_after_sleep();
                    self.sync_player();
                    self.host.invoke(HostCommand::SetWindowVisibility(true));
                }
                HostEvent::TogglePlaybackFromTray => {
                    self.toggle_playback();
                    self.host.invoke(HostCommand::TogglePlayback);
                }
                HostEvent::ToggleModeFromTray => self.toggle_mode(),
            }
        }
    }

    fn maintain_config_reload(&mut self, ctx: &egui::Context) {
        if !self.config_manager.poll_hot_reload(ctx) {
            return;
        }
        // Volume and links apply immediately; stream addresses take effect
        // on restart so a reload cannot clobber the autoplay state.
        let volume = self.config_manager.config().ui.volume;
        self.state.set_volume(volume);
        self.player.set_gain(self.state.gain());
        log::info!("config reloaded");
    }

    fn desired_repaint_interval(&self) -> Duration {
        if self.visualizer.is_running() {
            Duration::from_millis(16)
        } else if self.state.playback == PlaybackState::Playing {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(250)
        }
    }

    fn update_window_level(&mut self, ctx: &egui::Context) {
        let desired = if self.config_manager.config().ui.always_on_top {
            WindowLevel::AlwaysOnTop
        } else {
            WindowLevel::Normal
        };

        if self.last_window_level != Some(desired) {
            ctx.send_viewport_cmd(ViewportCommand::WindowLevel(desired));
            self.last_window_level = Some(desired);
        }
    }

    fn open_project_page(&self, ctx: &egui::Context) {
        let url = self.config_manager.config().links.project_page.clone();
        ctx.open_url(egui::OpenUrl::new_tab(url));
    }

    fn render_titlebar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let (bar_rect, _) = ui.allocate_exact_size(
            egui::vec2(ui.available_width(), TITLEBAR_HEIGHT),
            egui::Sense::hover(),
        );

        ui.painter()
            .rect_filled(bar_rect, CornerRadius::ZERO, Color32::from_rgb(18, 22, 30));
        ui.painter().text(
            egui::pos2(bar_rect.left() + 12.0, bar_rect.center().y),
            Align2::LEFT_CENTER,
            WINDOW_TITLE,
            FontId::proportional(14.0),
            Color32::from_gray(200),
        );

        let mut button_ui = ui.new_child(
            egui::UiBuilder::new()
                .max_rect(bar_rect.shrink2(egui::vec2(8.0, 4.0)))
                .layout(egui::Layout::right_to_left(egui::Align::Center)),
        );
        button_ui.spacing_mut().item_spacing.x = 6.0;

        if button_ui.button("✕").on_hover_text("Close").clicked() {
            ctx.send_viewport_cmd(ViewportCommand::Close);
        }
        if button_ui.button("🗖").on_hover_text("Maximize").clicked() {
            self.maximized = !self.maximized;
            ctx.send_viewport_cmd(ViewportCommand::Maximized(self.maximized));
        }
        if button_ui.button("🗕").on_hover_text("Minimize").clicked() {
            // Pause before minimizing so background media cannot keep the
            // platform awake.
            self.state.pause_media_for_sleep();
            self.sync_player();
            ctx.send_viewport_cmd(ViewportCommand::Minimized(true));
            self.host.invoke(HostCommand::SetWindowVisibility(false));
        }
        let mode_icon = self.state.mode.toggle_icon();
        let mode_hint = self.state.mode.toggle_hint();
        if button_ui.button(mode_icon).on_hover_text(mode_hint).clicked() {
            self.toggle_mode();
        }

        // Anywhere on the strip left of the buttons drags the window.
        let buttons_left_edge = button_ui.min_rect().left();
        let drag_rect = Rect::from_min_max(
            bar_rect.min,
            egui::pos2(buttons_left_edge.min(bar_rect.right()), bar_rect.max.y),
        );
        let pressed_in_strip = ctx.input(|i| {
            i.pointer.button_pressed(PointerButton::Primary)
                && i.pointer
                    .latest_pos()
                    .is_some_and(|pos| drag_rect.contains(pos))
        });
        if pressed_in_strip && !ctx.is_using_pointer() {
            ctx.send_viewport_cmd(ViewportCommand::StartDrag);
        }
    }

    /// The video pane is a status surface: actual frames come from the host
    /// webview, the shell only reflects and controls the stream address.
    fn render_video_pane(&mut self, ui: &mut egui::Ui) {
        let rect = ui.available_rect_before_wrap();
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, CornerRadius::same(4), Color32::from_rgb(8, 10, 16));
        painter.text(
            rect.center() - egui::vec2(0.0, 14.0),
            Align2::CENTER_CENTER,
            "📺",
            FontId::proportional(48.0),
            Color32::from_gray(120),
        );
        let status = if autoplay_enabled(&self.state.video_url) {
            "streaming"
        } else {
            "stream paused"
        };
        painter.text(
            rect.center() + egui::vec2(0.0, 28.0),
            Align2::CENTER_CENTER,
            status,
            FontId::proportional(13.0),
            Color32::from_gray(160),
        );
        painter.text(
            egui::pos2(rect.center().x, rect.bottom() - 12.0),
            Align2::CENTER_CENTER,
            &self.state.video_url,
            FontId::monospace(10.0),
            Color32::from_gray(90),
        );
        ui.advance_cursor_after_rect(rect);
    }

    fn render_audio_pane(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let available = ui.available_rect_before_wrap();
        let canvas_rect = Rect::from_min_max(
            available.min,
            egui::pos2(available.max.x, available.max.y - CONTROL_BAR_HEIGHT),
        );

        // Per-frame visualizer step. Runs only while the mode controller
        // keeps it alive; the fast repaint interval below reschedules it.
        if self.visualizer.is_running() {
            let now_secs = self.started_at.elapsed().as_secs_f64();
            let frame = self.visualizer.frame(now_secs);
            let painter = ui.painter_at(canvas_rect);
            self.visualizer.paint(&painter, canvas_rect, &frame);
        }
        ui.advance_cursor_after_rect(canvas_rect);

        ui.horizontal(|ui| {
            ui.add_space(8.0);
            let icon = self.state.playback.icon();
            if ui.button(icon).on_hover_text("Play / pause").clicked() {
                self.toggle_playback();
                self.host.invoke(HostCommand::TogglePlayback);
            }

            ui.label("🔊");
            let mut volume = self.state.volume;
            let slider = ui.add(egui::Slider::new(&mut volume, 0..=100).show_value(false));
            if slider.changed() {
                self.state.set_volume(volume);
                self.player.set_gain(self.state.gain());
            }

            if !self.player.has_track() {
                ui.colored_label(Color32::from_gray(120), "no local track configured");
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.add_space(8.0);
                if ui.button("GitHub").clicked() {
                    self.open_project_page(ctx);
                }
            });
        });
    }

    /// Borderless-window resize handling: hovering near an edge shows the
    /// matching cursor, pressing there starts a native resize.
    fn handle_borderless_resize(&self, ctx: &egui::Context, root_rect: Rect) {
        let (pointer_pos, primary_pressed) = ctx.input(|i| {
            (
                i.pointer.latest_pos(),
                i.pointer.button_pressed(PointerButton::Primary),
            )
        });
        let Some(pos) = pointer_pos else {
            return;
        };
        if !root_rect.expand(RESIZE_EDGE).contains(pos) {
            return;
        }

        let near_left = pos.x <= root_rect.left() + RESIZE_EDGE;
        let near_right = pos.x >= root_rect.right() - RESIZE_EDGE;
        let near_top = pos.y <= root_rect.top() + RESIZE_EDGE;
        let near_bottom = pos.y >= root_rect.bottom() - RESIZE_EDGE;

        let direction = if near_left && near_top {
            Some(ResizeDirection::NorthWest)
        } else if near_right && near_top {
            Some(ResizeDirection::NorthEast)
        } else if near_left && near_bottom {
            Some(ResizeDirection::SouthWest)
        } else if near_right && near_bottom {
            Some(ResizeDirection::SouthEast)
        } else if near_left {
            Some(ResizeDirection::West)
        } else if near_right {
            Some(ResizeDirection::East)
        } else if near_top {
            Some(ResizeDirection::North)
        } else if near_bottom {
            Some(ResizeDirection::South)
        } else {
            None
        };

        if let Some(direction) = direction {
            let cursor = match direction {
                ResizeDirection::North => egui::CursorIcon::ResizeNorth,
                ResizeDirection::South => egui::CursorIcon::ResizeSouth,
                ResizeDirection::East => egui::CursorIcon::ResizeEast,
                ResizeDirection::West => egui::CursorIcon::ResizeWest,
                ResizeDirection::NorthEast => egui::CursorIcon::ResizeNorthEast,
                ResizeDirection::SouthEast => egui::CursorIcon::ResizeSouthEast,
                ResizeDirection::NorthWest => egui::CursorIcon::ResizeNorthWest,
                ResizeDirection::SouthWest => egui::CursorIcon::ResizeSouthWest,
            };
            ctx.set_cursor_icon(cursor);
            if primary_pressed && !ctx.is_using_pointer() {
                ctx.send_viewport_cmd(ViewportCommand::BeginResize(direction));
            }
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_host_events();
        self.maintain_config_reload(ctx);
        self.update_window_level(ctx);

        let root_rect = ctx.screen_rect();
        let mut panel_frame = egui::Frame::central_panel(&ctx.style());
        panel_frame.fill = Color32::from_rgb(12, 14, 20);
        panel_frame.inner_margin = egui::Margin::ZERO;

        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| {
                self.render_titlebar(ui, ctx);

                if let Some(err) = self.err.clone() {
                    ui.horizontal(|ui| {
                        ui.add_space(8.0);
                        ui.colored_label(Color32::from_rgb(220, 120, 120), err);
                        if ui.small_button("dismiss").clicked() {
                            self.err = None;
                        }
                    });
                }

                // Exactly one pane is visible; the other is not laid out at
                // all.
                match self.state.mode {
                    ModeState::Video => self.render_video_pane(ui),
                    ModeState::Audio => self.render_audio_pane(ui, ctx),
                }
            });

        self.handle_borderless_resize(ctx, root_rect);
        ctx.request_repaint_after(self.desired_repaint_interval());
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_decorations(false)
            .with_transparent(true)
            .with_inner_size([520.0, 400.0])
            .with_min_inner_size([320.0, 240.0]),
        ..Default::default()
    };
    let run_res = eframe::run_native(
        WINDOW_TITLE,
        native_options,
        Box::new(
            |_cc| -> std::result::Result<
                Box<dyn eframe::App>,
                Box<dyn std::error::Error + Send + Sync>,
            > { Ok(Box::new(App::new(HostLink::connect()))) },
        ),
    );
    if let Err(e) = run_res {
        return Err(Box::new(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        App::new(HostLink::disconnected())
    }

    #[test]
    fn mode_toggle_drives_the_visualizer() {
        let mut app = test_app();
        assert!(!app.visualizer.is_running());

        app.toggle_mode();
        assert_eq!(app.state.mode, ModeState::Audio);
        assert!(app.visualizer.is_running());
        // No local track loaded, so the session falls back to synthetic.
        assert!(app.visualizer.is_synthetic());

        app.toggle_mode();
        assert_eq!(app.state.mode, ModeState::Video);
        assert!(!app.visualizer.is_running());
    }

    #[test]
    fn host_events_work_without_a_host() {
        let mut app = test_app();
        // Nothing to poll, nothing to invoke; must not panic.
        app.handle_host_events();
        app.toggle_mode();
        app.toggle_playback();
        assert!(!app.host.is_connected());
    }

    #[test]
    fn hidden_and_shown_events_run_the_sleep_guard() {
        let mut app = test_app();
        app.toggle_mode();
        app.toggle_playback();
        assert_eq!(app.state.playback, PlaybackState::Playing);

        let link = HostLink::connect();
        let sender = link.event_sender().expect("connected");
        app.host = link;

        sender.send(HostEvent::WindowHidden).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        app.handle_host_events();
        assert_eq!(app.state.playback, PlaybackState::Paused);
        assert!(app.state.visibility.is_window_hidden);

        // Consume the agent's visibility acknowledgement before the next
        // event so ordering stays deterministic.
        std::thread::sleep(Duration::from_millis(20));
        app.handle_host_events();

        sender.send(HostEvent::WindowShown).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        app.handle_host_events();
        assert_eq!(app.state.playback, PlaybackState::Playing);
        assert!(!app.state.visibility.is_window_hidden);
    }

    #[test]
    fn repaint_is_fast_only_while_animating() {
        let mut app = test_app();
        assert_eq!(app.desired_repaint_interval(), Duration::from_millis(250));

        app.toggle_mode();
        assert_eq!(app.desired_repaint_interval(), Duration::from_millis(16));

        app.toggle_mode();
        app.toggle_playback();
        assert_eq!(app.desired_repaint_interval(), Duration::from_millis(100));
    }
}

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

/// Fire-and-forget notifications the shell sends to the host agent. The
/// shell never waits on a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    ToggleAudioMode,
    TogglePlayback,
    SetWindowVisibility(bool),
    Shutdown,
}

/// Host-originated notifications the shell reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    WindowHidden,
    WindowShown,
    TogglePlaybackFromTray,
    ToggleModeFromTray,
}

/// State the host agent mirrors so shell integrations (tray menus, status
/// widgets) can label their entries without asking the UI.
#[derive(Debug, Clone, Copy)]
struct MirroredState {
    is_audio_mode: bool,
    is_playing: bool,
    is_window_visible: bool,
}

impl Default for MirroredState {
    fn default() -> Self {
        Self {
            is_audio_mode: false,
            is_playing: false,
            is_window_visible: true,
        }
    }
}

/// Channel pair to the host agent thread. When the host side is absent the
/// link is constructed disconnected: `invoke` becomes a logged no-op and
/// `poll_events` yields nothing, leaving the rest of the UI functional.
pub struct HostLink {
    command_tx: Option<Sender<HostCommand>>,
    event_rx: Option<Receiver<HostEvent>>,
    event_tx: Option<Sender<HostEvent>>,
}

impl HostLink {
    /// Spawns the host agent and connects both channels.
    pub fn connect() -> Self {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let agent_event_tx = event_tx.clone();
        thread::spawn(move || run_agent(command_rx, agent_event_tx));

        Self {
            command_tx: Some(command_tx),
            event_rx: Some(event_rx),
            event_tx: Some(event_tx),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            command_tx: None,
            event_rx: None,
            event_tx: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.command_tx.is_some()
    }

    /// Fire-and-forget. Dropped with a log record when the agent is absent
    /// or has gone away.
    pub fn invoke(&mut self, command: HostCommand) {
        let Some(tx) = self.command_tx.as_ref() else {
            log::debug!("host agent absent, dropping {command:?}");
            return;
        };
        if tx.send(command).is_err() {
            log::warn!("host agent gone, dropping {command:?}");
            self.command_tx = None;
        }
    }

    /// Drains pending host events without blocking. Called once per update
    /// pass.
    pub fn poll_events(&mut self) -> Vec<HostEvent> {
        let mut events = Vec::new();
        if let Some(rx) = self.event_rx.as_ref() {
            loop {
                match rx.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.event_rx = None;
                        break;
                    }
                }
            }
        }
        events
    }

    /// Handle for shell integrations that originate events (a tray menu, a
    /// global hotkey bridge). `None` when the link is disconnected.
    pub fn event_sender(&self) -> Option<Sender<HostEvent>> {
        self.event_tx.clone()
    }
}

impl Drop for HostLink {
    fn drop(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(HostCommand::Shutdown);
        }
    }
}

/// Host agent loop: mirrors shell state and acknowledges visibility flips
/// by emitting the matching window event back to the shell, the same
/// handshake the tray backend performs around hide/show.
fn run_agent(command_rx: Receiver<HostCommand>, event_tx: Sender<HostEvent>) {
    let mut state = MirroredState::default();

    while let Ok(command) = command_rx.recv() {
        match command {
            HostCommand::ToggleAudioMode => {
                state.is_audio_mode = !state.is_audio_mode;
            }
            HostCommand::TogglePlayback => {
                state.is_playing = !state.is_playing;
            }
            HostCommand::SetWindowVisibility(visible) => {
                if state.is_window_visible != visible {
                    state.is_window_visible = visible;
                    let event = if visible {
                        HostEvent::WindowShown
                    } else {
                        HostEvent::WindowHidden
                    };
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
            }
            HostCommand::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for_events(link: &mut HostLink) -> Vec<HostEvent> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let events = link.poll_events();
            if !events.is_empty() || Instant::now() > deadline {
                return events;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn disconnected_link_ignores_commands() {
        let mut link = HostLink::disconnected();
        assert!(!link.is_connected());
        link.invoke(HostCommand::ToggleAudioMode);
        link.invoke(HostCommand::SetWindowVisibility(false));
        assert!(link.poll_events().is_empty());
        assert!(link.event_sender().is_none());
    }

    #[test]
    fn visibility_flip_is_acknowledged_with_window_event() {
        let mut link = HostLink::connect();
        link.invoke(HostCommand::SetWindowVisibility(false));
        assert_eq!(wait_for_events(&mut link), vec![HostEvent::WindowHidden]);

        link.invoke(HostCommand::SetWindowVisibility(true));
        assert_eq!(wait_for_events(&mut link), vec![HostEvent::WindowShown]);
    }

    #[test]
    fn repeated_visibility_is_not_re_acknowledged() {
        let mut link = HostLink::connect();
        link.invoke(HostCommand::SetWindowVisibility(false));
        assert_eq!(wait_for_events(&mut link), vec![HostEvent::WindowHidden]);

        // Same value again: the mirror is unchanged, no echo.
        link.invoke(HostCommand::SetWindowVisibility(false));
        link.invoke(HostCommand::ToggleAudioMode);
        thread::sleep(Duration::from_millis(50));
        assert!(link.poll_events().is_empty());
    }

    #[test]
    fn injected_tray_events_reach_the_shell() {
        let mut link = HostLink::connect();
        let sender = link.event_sender().expect("connected link has a sender");
        sender.send(HostEvent::TogglePlaybackFromTray).unwrap();
        sender.send(HostEvent::ToggleModeFromTray).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut seen = Vec::new();
        while seen.len() < 2 && Instant::now() < deadline {
            seen.extend(link.poll_events());
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            seen,
            vec![HostEvent::TogglePlaybackFromTray, HostEvent::ToggleModeFromTray]
        );
    }
}

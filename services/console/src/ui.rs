//! Terminal UI Coordinator
//!
//! Binds the console's commands to the gateway client and the session
//! controller. Which commands are available follows the session state; a
//! command that is currently disabled is refused with a warning instead of
//! being run.

use std::fmt;
use std::sync::Arc;

use avatar_core::Command;
use avatar_core::avatar::AvatarDescriptor;
use avatar_core::gateway::Gateway;
use avatar_core::session::{AvatarSessionController, SessionState};
use avatar_core::status::StatusReporter;
use tokio::sync::watch;

pub const HELP: &str = "\
commands:
  load              list interactive avatars
  select <n|id>     pick an avatar by list number or id
  start             start a session with the selected avatar
  stop              end the session
  say <text>        ask the backend and have the avatar speak the answer
  interrupt         cut off the current answer
  url <base>        use another gateway (empty for the default)
  status            show avatars, controls and session
  help              show this text
  quit              stop and exit";

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Load,
    Select(String),
    Start,
    Stop,
    Say(String),
    Interrupt,
    SetUrl(String),
    Status,
    Help,
    Quit,
}

/// Parses a command line. The error is a usage hint for the user.
pub fn parse_action(line: &str) -> Result<Action, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "load" | "list" => Ok(Action::Load),
        "select" if rest.is_empty() => Err("usage: select <n|id>".to_string()),
        "select" => Ok(Action::Select(rest.to_string())),
        "start" => Ok(Action::Start),
        "stop" => Ok(Action::Stop),
        "say" => Ok(Action::Say(rest.to_string())),
        "interrupt" | "hush" => Ok(Action::Interrupt),
        "url" => Ok(Action::SetUrl(rest.to_string())),
        "status" => Ok(Action::Status),
        "help" | "?" => Ok(Action::Help),
        "quit" | "exit" => Ok(Action::Quit),
        "" => Err("type 'help' for commands".to_string()),
        other => Err(format!("unknown command '{other}', type 'help' for commands")),
    }
}

/// Which controls are usable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub load: bool,
    pub select: bool,
    pub start: bool,
    pub stop: bool,
    pub chat: bool,
}

impl Controls {
    pub fn for_state(state: SessionState, avatar_selected: bool) -> Self {
        let idle = state == SessionState::Idle;
        Self {
            load: idle,
            select: idle,
            start: idle && avatar_selected,
            stop: !idle,
            chat: state == SessionState::Active,
        }
    }
}

impl fmt::Display for Controls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool| if on { "on" } else { "off" };
        write!(
            f,
            "load [{}]  select [{}]  start [{}]  stop [{}]  say [{}]",
            flag(self.load),
            flag(self.select),
            flag(self.start),
            flag(self.stop),
            flag(self.chat)
        )
    }
}

pub struct UiCoordinator {
    gateway: Arc<dyn Gateway>,
    controller: AvatarSessionController,
    status: StatusReporter,
    avatars: Vec<AvatarDescriptor>,
    selected: Option<String>,
    // The chat input field; cleared once its text has been spoken.
    input: String,
}

impl UiCoordinator {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        controller: AvatarSessionController,
        status: StatusReporter,
    ) -> Self {
        Self {
            gateway,
            controller,
            status,
            avatars: Vec::new(),
            selected: None,
            input: String::new(),
        }
    }

    pub fn controls(&self) -> Controls {
        Controls::for_state(self.controller.state(), self.selected.is_some())
    }

    pub fn avatars(&self) -> &[AvatarDescriptor] {
        &self.avatars
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.controller.subscribe_state()
    }

    /// Runs one user action. Returns `false` once the user asked to quit.
    pub async fn dispatch(&mut self, action: Action) -> bool {
        match action {
            Action::Load => self.load_avatars().await,
            Action::Select(choice) => self.select(&choice),
            Action::Start => self.start_session().await,
            Action::Stop => self.stop_session().await,
            Action::Say(text) => {
                self.set_input(&text);
                self.send_chat().await;
            }
            Action::Interrupt => self.interrupt_speech().await,
            Action::SetUrl(base_url) => self.set_base_url(&base_url),
            Action::Status | Action::Help => {}
            Action::Quit => {
                self.shutdown().await;
                return false;
            }
        }
        true
    }

    pub async fn handle_command(&mut self, command: Command) {
        self.controller.handle_command(command).await;
    }

    pub async fn load_avatars(&mut self) {
        if !self.controls().load {
            self.status.warning("Stop the session before reloading avatars");
            return;
        }

        self.status.info("Loading avatars...");
        match self.gateway.list_avatars().await {
            Ok(avatars) if avatars.is_empty() => {
                self.avatars.clear();
                self.selected = None;
                self.status.warning("No interactive avatars found");
            }
            Ok(avatars) => {
                let keep = self
                    .selected
                    .as_ref()
                    .is_some_and(|id| avatars.iter().any(|a| &a.id == id));
                if !keep {
                    self.selected = None;
                }
                self.avatars = avatars;
                self.status
                    .info(format!("Loaded {} avatars", self.avatars.len()));
            }
            Err(e) => self.status.error(format!("Failed to load avatars: {e}")),
        }
    }

    /// Selects by 1-based list position or by id.
    pub fn select(&mut self, choice: &str) {
        if !self.controls().select {
            self.status.warning("Stop the session before picking another avatar");
            return;
        }

        let choice = choice.trim();
        let found = match choice.parse::<usize>() {
            Ok(n) if n >= 1 => self.avatars.get(n - 1),
            _ => None,
        }
        .or_else(|| self.avatars.iter().find(|a| a.id == choice));

        match found {
            Some(avatar) => {
                let message = format!("Selected {} ({})", avatar.name, avatar.id);
                self.selected = Some(avatar.id.clone());
                self.status.info(message);
            }
            None => self
                .status
                .warning(format!("No avatar '{choice}' in the list; try 'load'")),
        }
    }

    pub async fn start_session(&mut self) {
        let controls = self.controls();
        if !controls.start {
            if controls.stop {
                self.status.warning("A session is already running");
            } else {
                self.status.warning("Select an avatar first");
            }
            return;
        }
        let Some(avatar_id) = self.selected.clone() else {
            return;
        };
        if let Err(e) = self.controller.start(&avatar_id).await {
            tracing::debug!("start did not complete: {}", e);
        }
    }

    pub async fn stop_session(&mut self) {
        if !self.controls().stop {
            self.status.warning("No session is running");
            return;
        }
        self.controller.stop().await;
    }

    /// Sends the input field to the backend and has the avatar speak the
    /// answer. The field is cleared only once the answer was handed over.
    pub async fn send_chat(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            self.status.warning("Type a message first");
            return;
        }
        if !self.controls().chat {
            self.status.warning("Start a session before chatting");
            return;
        }

        self.status.info("Thinking...");
        let answer = match self.gateway.chat(&text).await {
            Ok(answer) => answer,
            Err(e) => {
                self.status.error(format!("Chat failed: {e}"));
                return;
            }
        };

        match self.controller.speak(&answer).await {
            Ok(()) => {
                self.input.clear();
                self.status.success("Avatar is answering");
            }
            Err(e) => self.status.error(format!("Chat failed: {e}")),
        }
    }

    /// Stops the avatar mid-answer; uses the chat control's enablement.
    pub async fn interrupt_speech(&mut self) {
        if !self.controls().chat {
            self.status.warning("No session is running");
            return;
        }
        match self.controller.interrupt().await {
            Ok(()) => self.status.info("Avatar interrupted"),
            Err(e) => self.status.error(format!("Interrupt failed: {e}")),
        }
    }

    pub fn set_base_url(&mut self, base_url: &str) {
        self.gateway.set_base_url(base_url);
        self.status
            .info(format!("Using gateway {}", self.gateway.base_url()));
    }

    pub async fn shutdown(&mut self) {
        self.controller.stop().await;
    }

    /// One line per avatar card; the selected one is marked.
    pub fn render_cards(&self) -> Vec<String> {
        self.avatars
            .iter()
            .enumerate()
            .map(|(i, avatar)| {
                let marker = if self.selected.as_deref() == Some(avatar.id.as_str()) {
                    '*'
                } else {
                    ' '
                };
                format!("{marker} [{}] {}  ({})", i + 1, avatar.name, avatar.id)
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if self.avatars.is_empty() {
            lines.push("no avatars loaded".to_string());
        } else {
            lines.extend(self.render_cards());
        }
        lines.push(format!("session: {}", self.controller.state()));
        if let Some(media) = self.controller.media_stream() {
            lines.push(format!("media room: {}", media.room_url));
        }
        lines.push(self.controls().to_string());
        lines.join("\n")
    }
}

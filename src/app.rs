use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::MeasureClient;
use crate::config::AppConfig;
use crate::estimate::{
    Command, EstimateError, Estimation, Event, MeasurementResult, Phase, RequestId, View,
};
use crate::picker::{self, FileInput};

/// Status messages clear after this many seconds
const STATUS_SECONDS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Slot(View),
    Estimate,
}

impl Focus {
    const ORDER: [Focus; 4] = [
        Focus::Slot(View::Front),
        Focus::Slot(View::Side),
        Focus::Slot(View::Standing),
        Focus::Estimate,
    ];

    fn position(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        Self::ORDER[(self.position() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    FileBrowser,
    PathInput,
    Help,
}

/// Outcome of a spawned request, delivered back to the event loop.
#[derive(Debug)]
struct Completion {
    request: RequestId,
    outcome: Result<MeasurementResult, EstimateError>,
}

#[derive(Debug, Clone)]
pub struct BrowserEntry {
    pub name: String,
    pub is_dir: bool,
    pub path: PathBuf,
}

pub struct App {
    pub focus: Focus,
    pub popup: Popup,
    pub config: AppConfig,

    estimation: Estimation,
    inputs: [FileInput; 3],
    client: MeasureClient,

    // At most one request task; aborted on cancel and on drop
    in_flight: Option<(RequestId, JoinHandle<()>)>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,

    // Slot the browser / path popup will fill
    pub target: View,
    pub input_buffer: String,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    // File browser state
    pub browser_path: PathBuf,
    pub browser_entries: Vec<BrowserEntry>,
    pub browser_selected: usize,

    pub ticks: usize,
    pub submitted_at: Option<Instant>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = MeasureClient::new(
            config.endpoint.clone(),
            config.request_timeout(),
            config.connect_timeout(),
        )?;
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let browser_path = config.start_dir.clone().unwrap_or_else(home_dir);

        Ok(Self {
            focus: Focus::Slot(View::Front),
            popup: Popup::None,
            config,

            estimation: Estimation::new(),
            inputs: Default::default(),
            client,

            in_flight: None,
            completions_tx,
            completions_rx,

            target: View::Front,
            input_buffer: String::new(),

            status_message: None,
            status_message_time: None,

            browser_path,
            browser_entries: Vec::new(),
            browser_selected: 0,

            ticks: 0,
            submitted_at: None,
        })
    }

    pub fn estimation(&self) -> &Estimation {
        &self.estimation
    }

    #[cfg(test)]
    pub(crate) fn set_estimation(&mut self, estimation: Estimation) {
        self.estimation = estimation;
    }

    /// Set a status message (auto-clears after 3 seconds)
    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    /// Slot a drop lands in: the focused one, else the first empty one
    fn drop_target(&self) -> View {
        match self.focus {
            Focus::Slot(view) => view,
            Focus::Estimate => View::ALL
                .into_iter()
                .find(|v| self.estimation.slot(*v).is_none())
                .unwrap_or(View::Front),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        // Handle popups first
        if self.popup != Popup::None {
            return self.handle_popup_key(key);
        }

        match key.code {
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.focus = self.focus.next(),
            KeyCode::BackTab | KeyCode::Left => self.focus = self.focus.prev(),
            KeyCode::Char('1') => self.focus = Focus::Slot(View::Front),
            KeyCode::Char('2') => self.focus = Focus::Slot(View::Side),
            KeyCode::Char('3') => self.focus = Focus::Slot(View::Standing),

            KeyCode::Enter | KeyCode::Char(' ') => match self.focus {
                Focus::Slot(view) => self.start_file_browser(view),
                Focus::Estimate => self.estimate(),
            },
            KeyCode::Char('o') => {
                if let Focus::Slot(view) = self.focus {
                    self.start_file_browser(view);
                }
            }
            KeyCode::Char('p') => {
                if let Focus::Slot(view) = self.focus {
                    self.start_path_input(view);
                }
            }
            KeyCode::Char('d') | KeyCode::Delete | KeyCode::Backspace => {
                if let Focus::Slot(view) = self.focus {
                    self.clear(view);
                }
            }
            KeyCode::Char('e') => self.estimate(),
            KeyCode::Esc => {
                if self.estimation.is_submitting() {
                    self.dispatch(Event::Cancel);
                }
            }
            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,
            _ => {}
        }
        Ok(())
    }

    fn handle_popup_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.popup {
            Popup::FileBrowser => self.handle_browser_key(key),
            Popup::PathInput => self.handle_path_input_key(key),
            Popup::Help => {
                if matches!(
                    key.code,
                    KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Enter | KeyCode::Char('q')
                ) {
                    self.popup = Popup::None;
                }
                Ok(())
            }
            Popup::None => Ok(()),
        }
    }

    /// Pasted text: typed into the path popup, otherwise a dropped file
    pub fn handle_paste(&mut self, text: &str) {
        if self.popup == Popup::PathInput {
            self.input_buffer.push_str(text.trim_end_matches(['\n', '\r']));
            return;
        }
        if self.popup != Popup::None {
            return;
        }
        if let Some(path) = picker::resolve_drop(text) {
            let view = self.drop_target();
            self.drop_select(view, &path);
        }
    }

    pub fn estimate(&mut self) {
        self.dispatch(Event::Estimate);
    }

    /// A file chosen through the slot's browse control
    pub fn browse_select(&mut self, view: View, path: &Path) {
        if !self.inputs[view.index()].change(path) {
            tracing::debug!("{} input already holds {}", view.field_name(), path.display());
            return;
        }
        if !self.load(view, path) {
            self.inputs[view.index()].reset();
        }
    }

    /// A file dropped on the slot; drops do not touch the browse control
    pub fn drop_select(&mut self, view: View, path: &Path) {
        self.load(view, path);
    }

    /// Returns false when the file could not be read
    fn load(&mut self, view: View, path: &Path) -> bool {
        match picker::pick(path) {
            Ok(Some(selection)) => {
                self.set_status(format!("{}: {}", view.label(), selection.file.name));
                self.dispatch(Event::Select(view, selection));
                true
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                self.set_status(e.to_string());
                false
            }
        }
    }

    pub fn clear(&mut self, view: View) {
        self.dispatch(Event::Clear(view));
        self.inputs[view.index()].reset();
    }

    fn dispatch(&mut self, event: Event) {
        let (next, command) = std::mem::take(&mut self.estimation).step(event);
        self.estimation = next;
        if let Some(command) = command {
            self.run(command);
        }
    }

    fn run(&mut self, command: Command) {
        match command {
            Command::Submit { request, images } => {
                let client = self.client.clone();
                let tx = self.completions_tx.clone();
                let handle = tokio::spawn(async move {
                    let outcome = client.estimate(&images).await;
                    // Receiver gone means the app is shutting down
                    let _ = tx.send(Completion { request, outcome });
                });
                self.in_flight = Some((request, handle));
                self.submitted_at = Some(Instant::now());
            }
            Command::Abort { request } => {
                if let Some((id, handle)) = self.in_flight.take() {
                    if id == request {
                        handle.abort();
                    } else {
                        self.in_flight = Some((id, handle));
                    }
                }
                self.submitted_at = None;
                self.set_status("Estimation cancelled");
            }
        }
    }

    pub fn tick(&mut self) -> Result<()> {
        self.ticks = self.ticks.wrapping_add(1);

        while let Ok(completion) = self.completions_rx.try_recv() {
            if matches!(self.in_flight, Some((id, _)) if id == completion.request) {
                self.in_flight = None;
                self.submitted_at = None;
            }
            self.dispatch(Event::Completed {
                request: completion.request,
                outcome: completion.outcome,
            });
            self.notify_settled();
        }

        // Clear status message after 3 seconds
        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_SECONDS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }

        Ok(())
    }

    fn notify_settled(&self) {
        if !self.config.notifications {
            return;
        }
        let body = match self.estimation.phase() {
            Phase::Success(result) => format!(
                "Estimated height {}",
                crate::estimate::results::format_cm(result.measurements.estimated_height_cm)
            ),
            // Nothing was sent, nothing to announce
            Phase::Failure(e) if e.is_local() => return,
            Phase::Failure(e) => e.user_message().to_string(),
            _ => return,
        };
        if let Err(e) = notify_rust::Notification::new()
            .summary("bodymeasure")
            .body(&body)
            .icon("camera-photo")
            .show()
        {
            tracing::warn!("Notification failed: {}", e);
        }
    }

    fn start_path_input(&mut self, view: View) {
        self.target = view;
        self.popup = Popup::PathInput;
        self.input_buffer.clear();
    }

    fn handle_path_input_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.popup = Popup::None;
                self.input_buffer.clear();
            }
            KeyCode::Enter => {
                let typed = std::mem::take(&mut self.input_buffer);
                self.popup = Popup::None;
                if let Some(path) = picker::resolve_drop(&expand_home(&typed)) {
                    self.browse_select(self.target, &path);
                }
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            KeyCode::Char(c) => self.input_buffer.push(c),
            _ => {}
        }
        Ok(())
    }

    fn start_file_browser(&mut self, view: View) {
        self.target = view;
        self.popup = Popup::FileBrowser;
        if let Some(dir) = self
            .estimation
            .slot(view)
            .and_then(|s| s.file.path.parent())
            .filter(|d| d.is_dir())
        {
            self.browser_path = dir.to_path_buf();
        }
        self.browser_selected = 0;
        self.refresh_browser();
    }

    pub fn refresh_browser(&mut self) {
        self.browser_entries.clear();

        // Add parent directory entry if not at root
        if let Some(parent) = self.browser_path.parent() {
            self.browser_entries.push(BrowserEntry {
                name: "..".to_string(),
                is_dir: true,
                path: parent.to_path_buf(),
            });
        }

        if let Ok(entries) = std::fs::read_dir(&self.browser_path) {
            let mut dirs: Vec<BrowserEntry> = Vec::new();
            let mut files: Vec<BrowserEntry> = Vec::new();

            for entry in entries.flatten() {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();

                // Skip hidden files
                if name.starts_with('.') {
                    continue;
                }

                if path.is_dir() {
                    dirs.push(BrowserEntry { name, is_dir: true, path });
                } else if picker::has_image_extension(&path) {
                    files.push(BrowserEntry { name, is_dir: false, path });
                }
            }

            dirs.sort_by_key(|e| e.name.to_lowercase());
            files.sort_by_key(|e| e.name.to_lowercase());

            self.browser_entries.extend(dirs);
            self.browser_entries.extend(files);
        }

        if self.browser_selected >= self.browser_entries.len() {
            self.browser_selected = 0;
        }
    }

    fn handle_browser_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.popup = Popup::None;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if !self.browser_entries.is_empty() {
                    self.browser_selected = (self.browser_selected + 1) % self.browser_entries.len();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if !self.browser_entries.is_empty() {
                    self.browser_selected = self
                        .browser_selected
                        .checked_sub(1)
                        .unwrap_or(self.browser_entries.len() - 1);
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(entry) = self.browser_entries.get(self.browser_selected).cloned() {
                    if entry.is_dir {
                        self.browser_path = entry.path;
                        self.browser_selected = 0;
                        self.refresh_browser();
                    } else {
                        self.popup = Popup::None;
                        self.browse_select(self.target, &entry.path);
                    }
                }
            }
            KeyCode::Backspace => {
                if let Some(parent) = self.browser_path.parent() {
                    self.browser_path = parent.to_path_buf();
                    self.browser_selected = 0;
                    self.refresh_browser();
                }
            }
            KeyCode::Char('h') => {
                self.browser_path = home_dir();
                self.browser_selected = 0;
                self.refresh_browser();
            }
            _ => {}
        }
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some((request, handle)) = self.in_flight.take() {
            tracing::debug!("Aborting estimation {} on shutdown", request);
            handle.abort();
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

fn expand_home(typed: &str) -> String {
    match typed.trim().strip_prefix("~/") {
        Some(rest) => home_dir().join(rest).to_string_lossy().to_string(),
        None => typed.trim().to_string(),
    }
}

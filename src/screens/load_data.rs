use std::path::Path;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use eframe::egui;
use rfd::FileDialog;
use tracing::{info, warn};

use crate::models::{Contest, ViewerPosition};
use crate::services::config_loader::{self, FinalizerConfig};
use crate::services::snapshot_parser::{ParserEvent, spawn_snapshot_parser};

pub enum LoadDataAction {
    Stay,
    Continue,
}

#[derive(Default)]
struct ParseUiState {
    receiver: Option<Receiver<ParserEvent>>,
    is_parsing: bool,
    parsed_successfully: bool,
    parsed_path: Option<String>,
    session_count: usize,
    hidden_count: usize,
    parse_failed_message: Option<String>,
    errors: Vec<String>,
    position_input: String,
    parsed_contest: Option<Contest>,
    parsed_config: Option<FinalizerConfig>,
}

impl ParseUiState {
    fn reset(&mut self) {
        self.is_parsing = false;
        self.parsed_successfully = false;
        self.session_count = 0;
        self.hidden_count = 0;
        self.parse_failed_message = None;
        self.errors.clear();
        self.receiver = None;
        self.parsed_contest = None;
        self.parsed_config = None;
    }

    fn fail(&mut self, message: String) {
        self.is_parsing = false;
        self.parsed_successfully = false;
        self.parse_failed_message = Some(message.clone());
        self.errors.push(message);
        if self.errors.len() > 8 {
            self.errors.remove(0);
        }
        self.parsed_contest = None;
        self.parsed_config = None;
        self.receiver = None;
    }

    fn poll_parser(&mut self) {
        loop {
            let event = {
                let Some(rx) = &self.receiver else {
                    break;
                };
                rx.try_recv()
            };

            match event {
                Ok(ParserEvent::Started) => {
                    self.parsed_successfully = false;
                    self.parse_failed_message = None;
                    self.errors.clear();
                    self.parsed_contest = None;
                }
                Ok(ParserEvent::Finished {
                    contest,
                    session_count,
                    hidden_count,
                }) => {
                    self.is_parsing = false;
                    self.parsed_successfully = true;
                    self.session_count = session_count;
                    self.hidden_count = hidden_count;
                    self.parsed_contest = Some(*contest);
                    self.receiver = None;
                    break;
                }
                Ok(ParserEvent::Failed { message }) => {
                    self.fail(message);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.fail("Parser thread disconnected".to_string());
                    break;
                }
            }
        }
    }
}

static PARSE_STATE: OnceLock<Mutex<ParseUiState>> = OnceLock::new();

fn parse_state() -> MutexGuard<'static, ParseUiState> {
    PARSE_STATE
        .get_or_init(|| Mutex::new(ParseUiState::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn validate_snapshot_path(path: &str) -> Result<(), String> {
    let file = Path::new(path);
    if !file.exists() {
        return Err(format!("Snapshot does not exist: {}", file.display()));
    }
    if !file.is_file() {
        return Err(format!("Path is not a file: {}", file.display()));
    }
    Ok(())
}

pub fn take_parsed_contest() -> Option<Contest> {
    parse_state().parsed_contest.take()
}

pub fn take_parsed_config() -> Option<FinalizerConfig> {
    parse_state().parsed_config.take()
}

/// Position to resume from, or `None` when the field is empty or unparseable.
pub fn take_resume_position() -> Option<ViewerPosition> {
    let mut state = parse_state();
    let token = std::mem::take(&mut state.position_input);
    let position = ViewerPosition::parse(&token);
    if position.is_none() && !token.trim().is_empty() {
        warn!("Ignoring unusable resume position '{}'", token.trim());
    }
    position
}

pub fn ui(ui: &mut egui::Ui, data_path: &mut Option<String>) -> LoadDataAction {
    ui.heading("Finalizer");
    ui.add_space(8.0);
    ui.label("Select a standings snapshot");
    ui.add_space(12.0);

    ui.label("Snapshot file:");
    let mut selected_path = data_path.clone().unwrap_or_default();
    let response = ui.add_sized(
        [900.0, 28.0],
        egui::TextEdit::singleline(&mut selected_path).hint_text("Enter standings.json path..."),
    );
    if response.changed() {
        let trimmed = selected_path.trim().to_string();
        *data_path = (!trimmed.is_empty()).then_some(trimmed);
    }
    ui.add_space(8.0);

    if ui.button("Choose file").clicked()
        && let Some(path) = FileDialog::new()
            .set_directory(".")
            .add_filter("Standings snapshot", &["json"])
            .pick_file()
    {
        *data_path = Some(path.display().to_string());
    }

    let current_path = data_path
        .as_deref()
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(ToOwned::to_owned);

    let mut state = parse_state();

    if current_path != state.parsed_path && !state.is_parsing {
        state.reset();
    }

    if state.is_parsing {
        state.poll_parser();
        ui.ctx().request_repaint();
    }

    ui.add_space(8.0);
    ui.label("Resume from position (rank-id, optional):");
    ui.add_sized(
        [420.0, 28.0],
        egui::TextEdit::singleline(&mut state.position_input).hint_text("e.g. 12-neerc.team42"),
    );

    ui.add_space(8.0);
    let can_parse = current_path.is_some() && !state.is_parsing;
    if ui
        .add_enabled(can_parse, egui::Button::new("Parse"))
        .clicked()
        && let Some(snapshot_path) = current_path.clone()
    {
        state.reset();
        state.parsed_path = Some(snapshot_path.clone());
        match validate_snapshot_path(&snapshot_path) {
            Ok(()) => match config_loader::load_finalizer_config(Path::new(&snapshot_path)) {
                Ok(config) => {
                    info!("Parsing snapshot {}", snapshot_path);
                    state.is_parsing = true;
                    state.receiver = Some(spawn_snapshot_parser(snapshot_path, config.clone()));
                    state.parsed_config = Some(config);
                    ui.ctx().request_repaint();
                }
                Err(err) => {
                    state.fail(format!("{err:#}"));
                    state.parse_failed_message = Some("Invalid config.toml".to_string());
                }
            },
            Err(message) => state.fail(message),
        }
    }

    ui.add_space(8.0);
    if state.is_parsing {
        ui.horizontal(|ui| {
            ui.add(egui::Spinner::new());
            ui.label("Parsing...");
        });
    } else if state.parsed_successfully {
        ui.colored_label(
            egui::Color32::LIGHT_GREEN,
            format!(
                "Parse completed. teams: {} | frozen results: {}",
                state.session_count, state.hidden_count
            ),
        );
    } else if let Some(msg) = &state.parse_failed_message {
        ui.colored_label(egui::Color32::LIGHT_RED, msg);
    }

    if !state.errors.is_empty() {
        ui.add_space(8.0);
        egui::Frame::group(ui.style())
            .fill(egui::Color32::from_rgb(58, 22, 22))
            .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(180, 60, 60)))
            .show(ui, |ui| {
                ui.label(egui::RichText::new("Parse Errors").strong());
                for err in &state.errors {
                    ui.colored_label(egui::Color32::from_rgb(255, 170, 170), err);
                }
            });
    }

    ui.add_space(8.0);
    let can_continue = state.parsed_successfully
        && !state.is_parsing
        && current_path.is_some()
        && current_path == state.parsed_path;
    if ui
        .add_enabled(can_continue, egui::Button::new("Continue"))
        .clicked()
    {
        return LoadDataAction::Continue;
    }

    LoadDataAction::Stay
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_path_must_be_an_existing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("standings.json");
        std::fs::write(&file, "{}").expect("write snapshot");

        assert!(validate_snapshot_path(&file.display().to_string()).is_ok());
        assert!(validate_snapshot_path(&dir.path().display().to_string()).is_err());
        assert!(
            validate_snapshot_path(&dir.path().join("missing.json").display().to_string())
                .unwrap_err()
                .contains("does not exist")
        );
    }

    #[test]
    fn failed_parse_keeps_only_recent_errors() {
        let mut state = ParseUiState::default();
        for index in 0..10 {
            state.fail(format!("error {index}"));
        }

        assert_eq!(state.errors.len(), 8);
        assert_eq!(state.errors[0], "error 2");
        assert_eq!(state.parse_failed_message.as_deref(), Some("error 9"));
        assert!(!state.parsed_successfully);
    }
}

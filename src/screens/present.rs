use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;

use eframe::egui;
use tracing::{debug, info};

use crate::models::{Contest, ProblemCell, StandingsRow};
use crate::services::config_loader::{FinalizerConfig, PresentationConfig};
use crate::services::locale::Locale;
use crate::services::reveal_engine::{
    CommandOutcome, HaltReason, LastChange, MULTI_STEP_COUNT, NavigationCommand, RevealEngine,
    RevealEvent, SpeedMode,
};
use crate::services::reveal_log::LogLine;

pub enum PresentAction {
    Stay,
}

const ACCEPTED_BG: egui::Color32 = egui::Color32::from_rgb(0x50, 0xff, 0x50);
const REJECTED_BG: egui::Color32 = egui::Color32::from_rgb(0xff, 0x50, 0x50);
const PENDING_BG: egui::Color32 = egui::Color32::from_rgb(0xf2, 0xb2, 0x00);
const UNTOUCHED_BG: egui::Color32 = egui::Color32::from_rgb(98, 116, 142);
const CURRENT_ROW_BG: egui::Color32 = egui::Color32::from_rgb(0xff, 0xa1, 0xff);
const EVEN_ROW_BG: egui::Color32 = egui::Color32::from_gray(32);
const ODD_ROW_BG: egui::Color32 = egui::Color32::from_gray(12);

const HELP_LINES: &[(&str, &str)] = &[
    ("Right / Space / PgDn", "reveal next result"),
    ("Shift + Right", "reveal next result without effects"),
    ("Ctrl + Right", "run to the next solved count"),
    ("Ctrl + Shift + Right", "jump to the next solved count"),
    ("Left / PgUp", "undo last step"),
    ("Ctrl + Left", "undo to the previous solved count"),
    ("Esc", "stop a running sequence"),
    ("R", "restart the reveal"),
    ("Ctrl + Alt + Shift + L", "toggle reveal log"),
    ("F1", "toggle this help"),
];

#[derive(Default)]
struct PresentUiState {
    scroll_initialized: bool,
    scroll_current_offset: f32,
    scroll_target_offset: f32,
    scroll_anim_start_offset: f32,
    scroll_anim_start_time: Option<f64>,
    scroll_anim_duration: f32,
    active_row_anims: HashMap<String, RowMoveAnim>,
    flash: Option<CellFlash>,
    transition_deadline: Option<f64>,
    command_mode: SpeedMode,
    show_log: bool,
    show_help: bool,
}

impl PresentUiState {
    fn reset_effects(&mut self) {
        self.active_row_anims.clear();
        self.flash = None;
        self.transition_deadline = None;
        self.scroll_anim_start_time = None;
    }
}

#[derive(Clone, Copy)]
struct RowMoveAnim {
    from_index: usize,
    to_index: usize,
    started_at: f64,
    duration_sec: f32,
}

/// Blinking highlight on the cell (or whole row when `problem_index` is
/// `None`) that changed last.
#[derive(Debug, Clone, PartialEq)]
struct CellFlash {
    session_id: String,
    problem_index: Option<usize>,
    started_at: f64,
    period: f32,
    times: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyCommand {
    Navigate(NavigationCommand),
    ToggleLog,
    ToggleHelp,
}

#[derive(Clone, Copy)]
struct ScrollGeometry {
    row_height: f32,
    viewport_height: f32,
    current_line: usize,
    total_lines: usize,
}

#[derive(Clone)]
struct FrameMetrics {
    row_height: f32,
    header_height: f32,
    outer_pad_x: f32,
    inner_pad_y: f32,
    col_gap: f32,
    rank_font: egui::FontId,
    team_font: egui::FontId,
    problem_font: egui::FontId,
    stat_font: egui::FontId,
    header_font: egui::FontId,
    rank_col_width: f32,
    solved_col_width: f32,
    time_col_width: f32,
}

#[derive(Clone, Copy)]
struct RowLayout {
    rank_rect: egui::Rect,
    center_rect: egui::Rect,
    solved_rect: egui::Rect,
    time_rect: egui::Rect,
}

thread_local! {
    static PRESENT_UI_STATE: RefCell<PresentUiState> = RefCell::new(PresentUiState::default());
}

pub fn ui(
    ui: &mut egui::Ui,
    ctx: &egui::Context,
    engine: &mut RevealEngine,
    config: &FinalizerConfig,
) -> PresentAction {
    PRESENT_UI_STATE.with(|cell| {
        let mut state = cell.borrow_mut();
        let now = now_seconds(ctx);
        let presentation = &config.presentation;
        let locale = config.locale;

        let metrics = compute_frame_metrics(
            ui.painter(),
            ui.available_height(),
            ui.available_width(),
            presentation.rows_per_page.max(1),
            engine.contest(),
            locale,
        );

        render_header(ui, engine.contest(), &metrics, locale);
        ui.add_space(4.0);

        let scroll_height = ui.available_height().max(80.0);
        let geometry = ScrollGeometry {
            row_height: metrics.row_height,
            viewport_height: scroll_height,
            current_line: presentation.current_line,
            total_lines: presentation.total_lines,
        };
        if !state.scroll_initialized {
            state.scroll_initialized = true;
            sync_scroll_to_current(&mut state, engine.contest(), geometry, now, false);
        }

        handle_key_input(ctx, &mut state, engine, presentation, geometry, now);

        if let Some(deadline) = state.transition_deadline
            && now >= deadline
        {
            state.transition_deadline = None;
            let before_order = row_order(engine.contest());
            if let Some(outcome) = engine.finish_transition() {
                apply_outcome(
                    &mut state,
                    engine,
                    &outcome,
                    &before_order,
                    now,
                    presentation,
                    geometry,
                );
            }
        } else if state.transition_deadline.is_none() && engine.is_locked() {
            // Lock without a scheduled effect; release on the next frame.
            state.transition_deadline = Some(now);
        }

        let scroll_animating = update_scroll_animation(&mut state, now);
        let row_animating = cleanup_and_has_active_row_anims(&mut state, now);
        let flashing = state
            .flash
            .as_ref()
            .is_some_and(|flash| flash_active(flash, now));

        let contest = engine.contest();
        let rows = contest.rows();
        let row_count = rows.len();
        let window = visible_window(
            row_count,
            contest.current_session,
            presentation.current_line,
            presentation.total_lines,
        );
        let content_height = row_count as f32 * metrics.row_height;

        egui::ScrollArea::vertical()
            .id_salt("present_standings_scroll")
            .auto_shrink([false, false])
            .max_height(scroll_height)
            .vertical_scroll_offset(state.scroll_current_offset)
            .show_viewport(ui, |ui, viewport| {
                let (rect, _) = ui.allocate_exact_size(
                    egui::vec2(ui.available_width(), content_height.max(viewport.height())),
                    egui::Sense::hover(),
                );

                let mut draw_rows: Vec<(usize, f32, bool)> = window
                    .clone()
                    .map(|idx| {
                        let session_id = rows[idx].id;
                        let row_height = metrics.row_height;
                        let animated_y =
                            row_content_y_for_team(&state, session_id, idx, row_height, now);
                        let rising_top_layer = is_rising_row_anim_active(&state, session_id, now);
                        (idx, animated_y, rising_top_layer)
                    })
                    .filter(|(_, row_y, _)| {
                        let row_min = *row_y;
                        let row_max = row_min + metrics.row_height;
                        row_max >= viewport.min.y && row_min <= viewport.max.y
                    })
                    .collect();
                draw_rows.sort_by(|a, b| a.1.total_cmp(&b.1));

                // Rows flying upwards are painted last so they pass over the rows they overtake.
                for top_layer in [false, true] {
                    for &(idx, row_y, rising_top_layer) in &draw_rows {
                        if rising_top_layer != top_layer {
                            continue;
                        }
                        let row_rect = egui::Rect::from_min_size(
                            egui::pos2(rect.left(), rect.top() + row_y),
                            egui::vec2(rect.width(), metrics.row_height),
                        );
                        let flash = state.flash.as_ref();
                        render_row(ui, &rows[idx], idx, row_rect, &metrics, flash, now);
                    }
                }
            });

        render_position_token(ui, &engine.position().to_string());
        if let Some((session_id, citations)) = engine.displayed_diploma() {
            render_diploma_overlay(ui, contest, session_id, citations, locale);
        }
        if state.show_log {
            render_log_window(ctx, &mut state.show_log, engine, locale);
        }
        if state.show_help {
            render_help_window(ctx, &mut state.show_help, locale);
        }

        if scroll_animating || row_animating || flashing || state.transition_deadline.is_some() {
            ctx.request_repaint();
        }
    });

    PresentAction::Stay
}

fn handle_key_input(
    ctx: &egui::Context,
    state: &mut PresentUiState,
    engine: &mut RevealEngine,
    presentation: &PresentationConfig,
    geometry: ScrollGeometry,
    now: f64,
) {
    let pressed: Vec<(egui::Key, egui::Modifiers)> = ctx.input(|input| {
        input
            .events
            .iter()
            .filter_map(|event| match event {
                egui::Event::Key {
                    key,
                    pressed: true,
                    modifiers,
                    ..
                } => Some((*key, *modifiers)),
                _ => None,
            })
            .collect()
    });

    for (key, modifiers) in pressed {
        let solved = engine.contest().current().solved;
        let Some(command) = command_for_key(key, modifiers, solved) else {
            continue;
        };

        let navigation = match command {
            KeyCommand::ToggleLog => {
                state.show_log = !state.show_log;
                continue;
            }
            KeyCommand::ToggleHelp => {
                state.show_help = !state.show_help;
                continue;
            }
            KeyCommand::Navigate(navigation) => navigation,
        };

        let mode = command_mode(&navigation);
        let restart = matches!(navigation, NavigationCommand::Restart);
        let before_order = row_order(engine.contest());
        let Some(outcome) = engine.dispatch(navigation) else {
            debug!("Key {:?} ignored while a transition is presented", key);
            continue;
        };

        if restart {
            info!("Presentation restarted");
            state.reset_effects();
        }
        if engine.is_cancel_requested() && engine.is_locked() {
            debug!("Cancel noted, stopping after the current step");
        }
        if let Some(mode) = mode {
            state.command_mode = mode;
            apply_outcome(
                state,
                engine,
                &outcome,
                &before_order,
                now,
                presentation,
                geometry,
            );
        }
    }
}

fn command_for_key(
    key: egui::Key,
    modifiers: egui::Modifiers,
    current_solved: u32,
) -> Option<KeyCommand> {
    use egui::Key;

    let command = match key {
        Key::ArrowRight | Key::Space | Key::PageDown => {
            let mode = if modifiers.shift {
                SpeedMode::Instant
            } else if modifiers.ctrl {
                SpeedMode::Fast
            } else {
                SpeedMode::Animated
            };
            let (count, solved_threshold) = if modifiers.ctrl {
                (MULTI_STEP_COUNT, Some(current_solved + 1))
            } else {
                (1, None)
            };
            NavigationCommand::Advance {
                mode,
                count,
                solved_threshold,
            }
        }
        Key::ArrowLeft | Key::PageUp => {
            let mode = if modifiers.shift {
                SpeedMode::Instant
            } else {
                SpeedMode::Animated
            };
            let (count, solved_threshold) = if modifiers.ctrl {
                (MULTI_STEP_COUNT, current_solved.checked_sub(1))
            } else {
                (1, None)
            };
            NavigationCommand::Retreat {
                mode,
                count,
                solved_threshold,
            }
        }
        Key::Escape => NavigationCommand::Cancel,
        Key::R if !modifiers.ctrl && !modifiers.alt => NavigationCommand::Restart,
        Key::L if modifiers.ctrl && modifiers.alt && modifiers.shift => {
            return Some(KeyCommand::ToggleLog);
        }
        Key::F1 => return Some(KeyCommand::ToggleHelp),
        _ => return None,
    };
    Some(KeyCommand::Navigate(command))
}

fn command_mode(command: &NavigationCommand) -> Option<SpeedMode> {
    match command {
        NavigationCommand::Advance { mode, .. } | NavigationCommand::Retreat { mode, .. } => {
            Some(*mode)
        }
        NavigationCommand::Restart => Some(SpeedMode::Instant),
        NavigationCommand::Cancel => None,
    }
}

fn apply_outcome(
    state: &mut PresentUiState,
    engine: &RevealEngine,
    outcome: &CommandOutcome,
    before_order: &[String],
    now: f64,
    presentation: &PresentationConfig,
    geometry: ScrollGeometry,
) {
    let contest = engine.contest();
    let mode = state.command_mode;
    let last_event = outcome.events.last();

    if mode.presents_transitions() {
        let delay = match last_event {
            Some(RevealEvent::ProblemRevealed { .. }) if mode == SpeedMode::Animated => {
                problem_flash_seconds(presentation)
            }
            _ => 0.0,
        };
        spawn_row_move_animations(
            state,
            before_order,
            &row_order(contest),
            now + f64::from(delay),
            presentation.row_fly_animation_seconds.max(0.01),
        );
    } else {
        state.active_row_anims.clear();
    }

    if let Some(event) = last_event {
        state.flash = cell_flash_for(event, engine.last_change(), mode, now, presentation);
    }

    state.scroll_anim_duration = match mode {
        SpeedMode::Animated => presentation.team_scroll_seconds,
        SpeedMode::Fast => presentation.fast_team_scroll_seconds,
        SpeedMode::Instant => 0.0,
    }
    .max(0.01);
    sync_scroll_to_current(state, contest, geometry, now, mode.presents_transitions());

    if outcome.awaiting_presentation {
        let seconds = last_event
            .map(|event| transition_seconds(event, mode, presentation))
            .unwrap_or(0.0);
        state.transition_deadline = Some(now + f64::from(seconds));
    }
    if let Some(halt) = outcome.halt {
        debug!("Command halted: {:?}", halt);
    }
    if outcome.halt == Some(HaltReason::Done) && engine.is_finished() {
        info!("Reveal complete, winner {}", engine.position());
    }
}

fn cell_flash_for(
    event: &RevealEvent,
    last_change: Option<&LastChange>,
    mode: SpeedMode,
    now: f64,
    presentation: &PresentationConfig,
) -> Option<CellFlash> {
    if mode != SpeedMode::Animated {
        return None;
    }
    let change = last_change?;
    let (period, times) = match event {
        RevealEvent::ProblemRevealed { .. } => (
            presentation.problem_flash_seconds,
            presentation.problem_flash_times,
        ),
        RevealEvent::TeamAdvanced { .. } => (presentation.team_flash_seconds, 1),
        _ => return None,
    };
    Some(CellFlash {
        session_id: change.session_id.clone(),
        problem_index: change.problem_index,
        started_at: now,
        period,
        times,
    })
}

fn problem_flash_seconds(presentation: &PresentationConfig) -> f32 {
    presentation.problem_flash_times as f32 * presentation.problem_flash_seconds
}

fn transition_seconds(
    event: &RevealEvent,
    mode: SpeedMode,
    presentation: &PresentationConfig,
) -> f32 {
    let seconds = match (mode, event) {
        (SpeedMode::Instant, _) => 0.0,
        (
            mode,
            RevealEvent::ProblemRevealed {
                from_row, to_row, ..
            },
        ) => {
            let fly = if from_row == to_row {
                0.0
            } else {
                row_move_duration_seconds(
                    *from_row,
                    *to_row,
                    presentation.row_fly_animation_seconds,
                )
            };
            if mode == SpeedMode::Animated {
                problem_flash_seconds(presentation) + fly
            } else {
                fly
            }
        }
        (SpeedMode::Animated, RevealEvent::TeamAdvanced { .. }) => {
            presentation.team_flash_seconds + presentation.team_scroll_seconds
        }
        (_, RevealEvent::TeamAdvanced { .. }) => presentation.fast_team_scroll_seconds,
        _ => 0.0,
    };
    seconds.max(0.0)
}

fn flash_active(flash: &CellFlash, now: f64) -> bool {
    let elapsed = now - flash.started_at;
    elapsed >= 0.0 && elapsed < f64::from(flash.period) * f64::from(flash.times)
}

fn flash_visible(flash: &CellFlash, now: f64) -> bool {
    let period = f64::from(flash.period);
    if period <= 0.0 || !flash_active(flash, now) {
        return false;
    }
    (now - flash.started_at) % period < period * 0.5
}

fn row_order(contest: &Contest) -> Vec<String> {
    contest
        .sessions
        .iter()
        .map(|session| session.id.clone())
        .collect()
}

/// Rows shown around the current team: it sits `current_line` rows below the
/// top of the window.
fn visible_window(
    row_count: usize,
    current_row: usize,
    current_line: usize,
    total_lines: usize,
) -> Range<usize> {
    let start = current_row.saturating_sub(current_line).min(row_count);
    let end = start.saturating_add(total_lines.max(1)).min(row_count);
    start..end
}

fn now_seconds(ctx: &egui::Context) -> f64 {
    ctx.input(|input| input.time)
}

fn anim_progress(now: f64, started_at: f64, duration_sec: f32) -> f32 {
    if duration_sec <= 0.0 {
        return 1.0;
    }
    ((now - started_at) / f64::from(duration_sec)).clamp(0.0, 1.0) as f32
}

fn ease_in_out_sine(t: f32) -> f32 {
    -(f32::cos(std::f32::consts::PI * t) - 1.0) * 0.5
}

fn ease_out_cubic(t: f32) -> f32 {
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

fn lerp_f32(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

fn row_offset_for_index(
    first_row: usize,
    row_height: f32,
    viewport_height: f32,
    row_count: usize,
) -> f32 {
    let target = first_row as f32 * row_height;
    let max_offset = (row_count as f32 * row_height - viewport_height).max(0.0);
    target.clamp(0.0, max_offset)
}

fn sync_scroll_to_current(
    state: &mut PresentUiState,
    contest: &Contest,
    geometry: ScrollGeometry,
    now: f64,
    animate: bool,
) {
    let row_count = contest.sessions.len();
    let window = visible_window(
        row_count,
        contest.current_session,
        geometry.current_line,
        geometry.total_lines,
    );
    let target = row_offset_for_index(
        window.start,
        geometry.row_height,
        geometry.viewport_height,
        row_count,
    );
    if !animate {
        state.scroll_current_offset = target;
        state.scroll_target_offset = target;
        state.scroll_anim_start_offset = target;
        state.scroll_anim_start_time = None;
        return;
    }
    if (target - state.scroll_target_offset).abs() < f32::EPSILON {
        return;
    }

    state.scroll_anim_start_offset = state.scroll_current_offset;
    state.scroll_target_offset = target;
    state.scroll_anim_start_time = Some(now);
}

fn update_scroll_animation(state: &mut PresentUiState, now: f64) -> bool {
    let Some(started_at) = state.scroll_anim_start_time else {
        return false;
    };

    let progress = anim_progress(now, started_at, state.scroll_anim_duration);
    let eased = ease_in_out_sine(progress);
    state.scroll_current_offset = lerp_f32(
        state.scroll_anim_start_offset,
        state.scroll_target_offset,
        eased,
    );

    if progress >= 1.0 {
        state.scroll_current_offset = state.scroll_target_offset;
        state.scroll_anim_start_time = None;
        return false;
    }

    true
}

fn spawn_row_move_animations(
    state: &mut PresentUiState,
    before_order: &[String],
    after_order: &[String],
    now: f64,
    seconds_per_row: f32,
) {
    let before_map: HashMap<&str, usize> = before_order
        .iter()
        .enumerate()
        .map(|(idx, session_id)| (session_id.as_str(), idx))
        .collect();

    for (new_index, session_id) in after_order.iter().enumerate() {
        let Some(old_index) = before_map.get(session_id.as_str()).copied() else {
            continue;
        };
        if old_index == new_index {
            continue;
        }
        state.active_row_anims.insert(
            session_id.clone(),
            RowMoveAnim {
                from_index: old_index,
                to_index: new_index,
                started_at: now,
                duration_sec: row_move_duration_seconds(old_index, new_index, seconds_per_row),
            },
        );
    }
}

fn row_move_duration_seconds(from_index: usize, to_index: usize, seconds_per_row: f32) -> f32 {
    let distance_rows = from_index.abs_diff(to_index) as f32;
    (distance_rows * seconds_per_row).max(0.01)
}

fn row_content_y_for_team(
    state: &PresentUiState,
    session_id: &str,
    logical_index: usize,
    row_height: f32,
    now: f64,
) -> f32 {
    let Some(anim) = state.active_row_anims.get(session_id) else {
        return logical_index as f32 * row_height;
    };

    let progress = anim_progress(now, anim.started_at, anim.duration_sec);
    let from_y = anim.from_index as f32 * row_height;
    let to_y = anim.to_index as f32 * row_height;
    if progress >= 1.0 {
        return to_y;
    }

    lerp_f32(from_y, to_y, ease_out_cubic(progress))
}

fn is_rising_row_anim_active(state: &PresentUiState, session_id: &str, now: f64) -> bool {
    let Some(anim) = state.active_row_anims.get(session_id) else {
        return false;
    };
    anim.to_index < anim.from_index && anim_progress(now, anim.started_at, anim.duration_sec) < 1.0
}

fn cleanup_and_has_active_row_anims(state: &mut PresentUiState, now: f64) -> bool {
    state
        .active_row_anims
        .retain(|_, anim| anim_progress(now, anim.started_at, anim.duration_sec) < 1.0);
    !state.active_row_anims.is_empty()
}

fn compute_frame_metrics(
    painter: &egui::Painter,
    viewport_height: f32,
    viewport_width: f32,
    rows_per_page: usize,
    contest: &Contest,
    locale: Locale,
) -> FrameMetrics {
    let row_height = viewport_height / rows_per_page as f32;
    let header_height = row_height * 0.5;
    let outer_pad_x = viewport_width * 0.008;
    let inner_pad_y = row_height * 0.08;
    let col_gap = viewport_width * 0.006;

    let rank_font = egui::FontId::proportional(row_height * 0.45);
    let team_font = egui::FontId::proportional(row_height * 0.34);
    let problem_font = egui::FontId::proportional(row_height * 0.3);
    let stat_font = egui::FontId::proportional(row_height * 0.45);
    let header_font = egui::FontId::proportional(row_height * 0.28);

    let rank_sample = "0".repeat(contest.sessions.len().to_string().len());
    let rank_col_width = text_width(painter, &rank_sample, &rank_font).max(text_width(
        painter,
        &locale.localize("rank"),
        &header_font,
    ));

    let max_solved = contest.problems.len().max(1);
    let max_penalty = contest
        .sessions
        .iter()
        .map(|session| {
            session
                .problems
                .iter()
                .filter(|problem| problem.accepted)
                .map(|problem| problem.penalty)
                .sum::<i64>()
        })
        .max()
        .unwrap_or(0);

    let solved_col_width = text_width(painter, &locale.localize("solved"), &header_font).max(
        text_width(painter, &max_solved.to_string(), &stat_font),
    ) + col_gap * 0.8;
    let time_col_width = text_width(painter, &locale.localize("penalty"), &header_font)
        .max(text_width(painter, &max_penalty.to_string(), &stat_font))
        + col_gap * 0.8;

    FrameMetrics {
        row_height,
        header_height,
        outer_pad_x,
        inner_pad_y,
        col_gap,
        rank_font,
        team_font,
        problem_font,
        stat_font,
        header_font,
        rank_col_width,
        solved_col_width,
        time_col_width,
    }
}

fn compute_row_layout(row_rect: egui::Rect, m: &FrameMetrics) -> RowLayout {
    let inner = egui::Rect::from_min_max(
        egui::pos2(
            row_rect.left() + m.outer_pad_x,
            row_rect.top() + m.inner_pad_y,
        ),
        egui::pos2(
            row_rect.right() - m.outer_pad_x,
            row_rect.bottom() - m.inner_pad_y,
        ),
    );

    let time_rect = egui::Rect::from_min_size(
        egui::pos2(inner.right() - m.time_col_width, inner.top()),
        egui::vec2(m.time_col_width, inner.height()),
    );
    let solved_rect = egui::Rect::from_min_size(
        egui::pos2(
            time_rect.left() - m.col_gap - m.solved_col_width,
            inner.top(),
        ),
        egui::vec2(m.solved_col_width, inner.height()),
    );
    let rank_rect = egui::Rect::from_min_size(
        egui::pos2(inner.left(), inner.top()),
        egui::vec2(m.rank_col_width, inner.height()),
    );

    let center_left = rank_rect.right() + m.col_gap;
    let center_right = (solved_rect.left() - m.col_gap).max(center_left);
    let center_rect = egui::Rect::from_min_max(
        egui::pos2(center_left, inner.top()),
        egui::pos2(center_right, inner.bottom()),
    );

    RowLayout {
        rank_rect,
        center_rect,
        solved_rect,
        time_rect,
    }
}

fn cell_columns(center_rect: egui::Rect, count: usize) -> Vec<(f32, f32)> {
    if count == 0 {
        return Vec::new();
    }
    let n = count as f32;
    let cell_gap = (center_rect.width() * 0.006).max(10.0);
    let cell_width = ((center_rect.width() - cell_gap * (n - 1.0)) / n).max(1.0);
    (0..count)
        .map(|index| {
            (
                center_rect.left() + index as f32 * (cell_width + cell_gap),
                cell_width,
            )
        })
        .collect()
}

fn render_header(ui: &mut egui::Ui, contest: &Contest, m: &FrameMetrics, locale: Locale) {
    let (header_rect, _) = ui.allocate_exact_size(
        egui::vec2(ui.available_width(), m.header_height),
        egui::Sense::hover(),
    );
    let painter = ui.painter();
    painter.rect_filled(header_rect, 0.0, egui::Color32::from_gray(20));
    let layout = compute_row_layout(header_rect, m);

    for (rect, key) in [
        (layout.rank_rect, "rank"),
        (layout.solved_rect, "solved"),
        (layout.time_rect, "penalty"),
    ] {
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            locale.localize(key),
            m.header_font.clone(),
            egui::Color32::WHITE,
        );
    }

    let columns = cell_columns(layout.center_rect, contest.problems.len());
    if columns.is_empty() {
        painter.text(
            layout.center_rect.left_center(),
            egui::Align2::LEFT_CENTER,
            locale.localize("party"),
            m.header_font.clone(),
            egui::Color32::WHITE,
        );
    }
    for (header, (left, width)) in contest.problems.iter().zip(columns) {
        painter.text(
            egui::pos2(left + width * 0.5, layout.center_rect.center().y),
            egui::Align2::CENTER_CENTER,
            &header.alias,
            m.header_font.clone(),
            egui::Color32::WHITE,
        );
    }
}

fn render_row(
    ui: &egui::Ui,
    row: &StandingsRow<'_>,
    index: usize,
    row_rect: egui::Rect,
    m: &FrameMetrics,
    flash: Option<&CellFlash>,
    now: f64,
) {
    let flash = flash.filter(|flash| flash.session_id == row.id && flash_visible(flash, now));
    let row_flash = flash.is_some_and(|flash| flash.problem_index.is_none());

    let bg = if row_flash {
        egui::Color32::WHITE
    } else if row.current {
        CURRENT_ROW_BG
    } else if index % 2 == 0 {
        EVEN_ROW_BG
    } else {
        ODD_ROW_BG
    };
    let text_color = if row.current || row_flash {
        egui::Color32::BLACK
    } else {
        egui::Color32::WHITE
    };
    let painter = ui.painter();
    painter.rect_filled(row_rect, 0.0, bg);
    let layout = compute_row_layout(row_rect, m);

    painter.text(
        layout.rank_rect.center(),
        egui::Align2::CENTER_CENTER,
        row.rank.to_string(),
        m.rank_font.clone(),
        text_color,
    );

    let name_rect = egui::Rect::from_min_max(
        layout.center_rect.left_top(),
        egui::pos2(
            layout.center_rect.right(),
            layout.center_rect.top() + layout.center_rect.height() * 0.52,
        ),
    );
    painter.with_clip_rect(name_rect).text(
        layout.center_rect.left_top(),
        egui::Align2::LEFT_TOP,
        row.party,
        m.team_font.clone(),
        text_color,
    );

    let status_y = layout.center_rect.bottom() - layout.center_rect.height() * 0.4;
    let cell_height = layout.center_rect.height() * 0.4;
    for (problem_index, (cell, (left, width))) in row
        .cells
        .iter()
        .zip(cell_columns(layout.center_rect, row.cells.len()))
        .enumerate()
    {
        let flashing = flash.is_some_and(|flash| flash.problem_index == Some(problem_index));
        let (fill, cell_text_color) = if flashing {
            (egui::Color32::WHITE, egui::Color32::BLACK)
        } else {
            cell_colors(cell)
        };
        let status_rect = egui::Rect::from_min_size(
            egui::pos2(left, status_y),
            egui::vec2(width, cell_height),
        );
        painter.rect_filled(status_rect, 2.0, fill);
        painter.text(
            status_rect.center(),
            egui::Align2::CENTER_CENTER,
            cell.label(),
            m.problem_font.clone(),
            cell_text_color,
        );
    }

    painter.text(
        layout.solved_rect.center(),
        egui::Align2::CENTER_CENTER,
        row.solved.to_string(),
        m.stat_font.clone(),
        text_color,
    );
    painter.text(
        layout.time_rect.center(),
        egui::Align2::CENTER_CENTER,
        row.penalty.to_string(),
        m.stat_font.clone(),
        text_color,
    );
}

fn cell_colors(cell: &ProblemCell) -> (egui::Color32, egui::Color32) {
    match cell {
        ProblemCell::Accepted { .. } => (ACCEPTED_BG, egui::Color32::BLACK),
        ProblemCell::Rejected { .. } => (REJECTED_BG, egui::Color32::BLACK),
        ProblemCell::Pending { .. } => (PENDING_BG, egui::Color32::BLACK),
        ProblemCell::Untouched => (UNTOUCHED_BG, egui::Color32::WHITE),
    }
}

fn text_width(painter: &egui::Painter, text: &str, font: &egui::FontId) -> f32 {
    painter
        .layout_no_wrap(text.to_owned(), font.clone(), egui::Color32::WHITE)
        .size()
        .x
}

fn render_position_token(ui: &egui::Ui, token: &str) {
    let rect = ui.max_rect();
    ui.painter().text(
        rect.right_bottom() - egui::vec2(8.0, 6.0),
        egui::Align2::RIGHT_BOTTOM,
        token,
        egui::FontId::monospace(14.0),
        egui::Color32::from_gray(110),
    );
}

fn render_diploma_overlay(
    ui: &egui::Ui,
    contest: &Contest,
    session_id: &str,
    citations: &[String],
    locale: Locale,
) {
    let full_rect = ui.max_rect();
    let painter = ui.painter();
    painter.rect_filled(full_rect, 0.0, egui::Color32::from_black_alpha(200));

    let bar_height = (full_rect.height() * 0.18).clamp(100.0, 220.0);
    let bar_rect = egui::Rect::from_min_max(
        egui::pos2(full_rect.left(), full_rect.bottom() - bar_height),
        egui::pos2(full_rect.right(), full_rect.bottom()),
    );
    painter.rect_filled(bar_rect, 0.0, egui::Color32::from_black_alpha(178));

    let session = contest
        .index_of(session_id)
        .map(|index| &contest.sessions[index]);
    let party = session.map_or(session_id, |session| session.party.as_str());
    let rank_line = session
        .map(|session| format!("{} {}", locale.localize("rank"), session.rank))
        .unwrap_or_default();

    let team_font = egui::FontId::proportional((bar_height * 0.3).clamp(28.0, 64.0));
    let citation_font = egui::FontId::proportional((bar_height * 0.22).clamp(22.0, 52.0));
    let text_left = bar_rect.left() + bar_rect.width() * 0.03;

    painter.text(
        egui::pos2(text_left, bar_rect.top() + bar_rect.height() * 0.33),
        egui::Align2::LEFT_CENTER,
        party,
        team_font,
        egui::Color32::WHITE,
    );
    painter.text(
        egui::pos2(text_left, bar_rect.top() + bar_rect.height() * 0.73),
        egui::Align2::LEFT_CENTER,
        citations.join(" | "),
        citation_font.clone(),
        egui::Color32::WHITE,
    );
    painter.text(
        egui::pos2(bar_rect.right() - text_left, bar_rect.center().y),
        egui::Align2::RIGHT_CENTER,
        rank_line,
        citation_font,
        CURRENT_ROW_BG,
    );
}

fn log_line_text(line: &LogLine, locale: Locale) -> String {
    match line {
        LogLine::SolvedHeader { solved } => {
            format!("--- {solved} {} ---", locale.localize("problems"))
        }
        LogLine::Reveal {
            solved,
            penalty,
            short_id,
            party,
            ..
        }
        | LogLine::TeamFinished {
            solved,
            penalty,
            short_id,
            party,
            ..
        } => format!(
            "{:<4} {:>7} {:>3} {:>6}  {short_id} {party}",
            line.mark(),
            line.rank_text(),
            solved,
            penalty
        ),
    }
}

fn render_log_window(ctx: &egui::Context, open: &mut bool, engine: &RevealEngine, locale: Locale) {
    egui::Window::new(locale.localize("log"))
        .open(open)
        .default_width(520.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for line in engine.log().lines() {
                        ui.monospace(log_line_text(line, locale));
                    }
                });
        });
}

fn render_help_window(ctx: &egui::Context, open: &mut bool, locale: Locale) {
    egui::Window::new(locale.localize("help"))
        .open(open)
        .collapsible(false)
        .show(ctx, |ui| {
            egui::Grid::new("present_help_grid").show(ui, |ui| {
                for (keys, action) in HELP_LINES {
                    ui.strong(*keys);
                    ui.label(*action);
                    ui.end_row();
                }
            });
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modifiers(ctrl: bool, alt: bool, shift: bool) -> egui::Modifiers {
        egui::Modifiers {
            ctrl,
            alt,
            shift,
            ..Default::default()
        }
    }

    #[test]
    fn arrow_keys_map_to_navigation() {
        let plain = modifiers(false, false, false);

        assert_eq!(
            command_for_key(egui::Key::ArrowRight, plain, 4),
            Some(KeyCommand::Navigate(NavigationCommand::Advance {
                mode: SpeedMode::Animated,
                count: 1,
                solved_threshold: None,
            }))
        );
        assert_eq!(
            command_for_key(egui::Key::Space, modifiers(true, false, false), 4),
            Some(KeyCommand::Navigate(NavigationCommand::Advance {
                mode: SpeedMode::Fast,
                count: MULTI_STEP_COUNT,
                solved_threshold: Some(5),
            }))
        );
        assert_eq!(
            command_for_key(egui::Key::PageDown, modifiers(true, false, true), 4),
            Some(KeyCommand::Navigate(NavigationCommand::Advance {
                mode: SpeedMode::Instant,
                count: MULTI_STEP_COUNT,
                solved_threshold: Some(5),
            }))
        );
        assert_eq!(
            command_for_key(egui::Key::ArrowLeft, modifiers(true, false, false), 0),
            Some(KeyCommand::Navigate(NavigationCommand::Retreat {
                mode: SpeedMode::Animated,
                count: MULTI_STEP_COUNT,
                solved_threshold: None,
            }))
        );
    }

    #[test]
    fn control_keys_map_to_commands() {
        let plain = modifiers(false, false, false);

        assert_eq!(
            command_for_key(egui::Key::Escape, plain, 0),
            Some(KeyCommand::Navigate(NavigationCommand::Cancel))
        );
        assert_eq!(
            command_for_key(egui::Key::R, plain, 0),
            Some(KeyCommand::Navigate(NavigationCommand::Restart))
        );
        assert_eq!(command_for_key(egui::Key::L, plain, 0), None);
        assert_eq!(
            command_for_key(egui::Key::L, modifiers(true, true, true), 0),
            Some(KeyCommand::ToggleLog)
        );
        assert_eq!(command_for_key(egui::Key::F1, plain, 0), Some(KeyCommand::ToggleHelp));
    }

    #[test]
    fn window_keeps_current_row_near_the_top() {
        assert_eq!(visible_window(50, 40, 3, 100), 37..50);
        assert_eq!(visible_window(50, 1, 3, 100), 0..50);
        assert_eq!(visible_window(500, 300, 3, 100), 297..397);
        assert_eq!(visible_window(0, 0, 3, 100), 0..0);
    }

    #[test]
    fn transition_length_depends_on_mode() {
        let presentation = PresentationConfig::default();
        let reveal = RevealEvent::ProblemRevealed {
            session_id: "t".to_string(),
            problem_index: 0,
            accepted: true,
            from_row: 5,
            to_row: 2,
            old_rank: 6,
            new_rank: 3,
        };
        let advance = RevealEvent::TeamAdvanced {
            from_row: 5,
            to_row: 4,
        };

        let fly = 3.0 * presentation.row_fly_animation_seconds;
        let animated = transition_seconds(&reveal, SpeedMode::Animated, &presentation);
        assert!((animated - (0.6 + fly)).abs() < 1e-5);
        let fast = transition_seconds(&reveal, SpeedMode::Fast, &presentation);
        assert!((fast - fly).abs() < 1e-5);
        assert_eq!(transition_seconds(&reveal, SpeedMode::Instant, &presentation), 0.0);
        assert!(
            (transition_seconds(&advance, SpeedMode::Fast, &presentation)
                - presentation.fast_team_scroll_seconds)
                .abs()
                < 1e-5
        );
    }

    #[test]
    fn flash_blinks_for_configured_times() {
        let flash = CellFlash {
            session_id: "t".to_string(),
            problem_index: Some(1),
            started_at: 10.0,
            period: 0.5,
            times: 2,
        };

        assert!(flash_visible(&flash, 10.1));
        assert!(!flash_visible(&flash, 10.3));
        assert!(flash_visible(&flash, 10.6));
        assert!(!flash_visible(&flash, 11.1));
        assert!(!flash_active(&flash, 9.9));
    }

    #[test]
    fn scroll_offset_is_clamped_to_content() {
        assert_eq!(row_offset_for_index(0, 40.0, 400.0, 50), 0.0);
        assert_eq!(row_offset_for_index(10, 40.0, 400.0, 50), 400.0);
        assert_eq!(row_offset_for_index(48, 40.0, 400.0, 50), 1600.0);
    }

    #[test]
    fn log_lines_render_marks_and_rank_moves() {
        let line = LogLine::Reveal {
            alias: "C".to_string(),
            accepted: true,
            old_rank: 9,
            new_rank: 4,
            solved: 5,
            penalty: 612,
            short_id: "team7".to_string(),
            party: "Seven".to_string(),
        };

        let text = log_line_text(&line, Locale::En);
        assert!(text.starts_with("C+"));
        assert!(text.contains("9→4"));
        assert!(text.ends_with("team7 Seven"));
        assert_eq!(
            log_line_text(&LogLine::SolvedHeader { solved: 3 }, Locale::En),
            "--- 3 solved ---"
        );
    }
}

mod error;
mod models;
mod screens;
mod services;

use std::fs;

use eframe::egui;
use screens::load_data::LoadDataAction;
use screens::present::PresentAction;
use services::config_loader::FinalizerConfig;
use services::reveal_engine::RevealEngine;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

enum FinalizerState {
    LoadData,
    Present,
}

struct FinalizerApp {
    state: FinalizerState,
    data_path: Option<String>,
    engine: Option<RevealEngine>,
    config: FinalizerConfig,
}

impl Default for FinalizerApp {
    fn default() -> Self {
        Self {
            state: FinalizerState::LoadData,
            data_path: None,
            engine: None,
            config: FinalizerConfig::default(),
        }
    }
}

impl FinalizerApp {
    fn start_presentation(&mut self) {
        let Some(contest) = screens::load_data::take_parsed_contest() else {
            info!("Cannot continue: parsed contest is missing");
            return;
        };
        let Some(config) = screens::load_data::take_parsed_config() else {
            warn!("Cannot continue: parsed config is missing");
            return;
        };

        let mut engine = RevealEngine::new(contest);
        let resume = screens::load_data::take_resume_position();
        let steps = engine.rewind(resume.as_ref());
        if steps > 0 {
            info!("Resumed at {} after {} steps", engine.position(), steps);
        }

        self.config = config;
        self.engine = Some(engine);
        info!("Transition: LoadData -> Present");
        self.state = FinalizerState::Present;
    }
}

impl eframe::App for FinalizerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(8.0);
            match self.state {
                FinalizerState::LoadData => {
                    ui.vertical_centered(|ui| {
                        if let LoadDataAction::Continue =
                            screens::load_data::ui(ui, &mut self.data_path)
                        {
                            self.start_presentation();
                        }
                    });
                }
                FinalizerState::Present => {
                    if let Some(engine) = self.engine.as_mut() {
                        match screens::present::ui(ui, ctx, engine, &self.config) {
                            PresentAction::Stay => {}
                        }
                    } else {
                        ui.colored_label(
                            egui::Color32::RED,
                            "Contest data missing. Go back to Load Data.",
                        );
                    }
                }
            }
        });
    }
}

fn init_tracing() -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true);

    let _ = fs::create_dir_all("logs");
    let file_appender = tracing_appender::rolling::daily("logs", "finalizer.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_target(true);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(err) = init_result {
        eprintln!("tracing init failed: {err}");
        return None;
    }

    Some(file_guard)
}

fn main() -> eframe::Result<()> {
    let _log_guard = init_tracing();
    info!("Starting Finalizer");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_resizable(false),
        ..Default::default()
    };

    eframe::run_native(
        "Finalizer",
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_pixels_per_point(1.1);

            let mut style = (*cc.egui_ctx.style()).clone();
            style
                .text_styles
                .insert(egui::TextStyle::Heading, egui::FontId::proportional(34.0));
            style
                .text_styles
                .insert(egui::TextStyle::Body, egui::FontId::proportional(22.0));
            style
                .text_styles
                .insert(egui::TextStyle::Button, egui::FontId::proportional(22.0));
            style.spacing.button_padding = egui::vec2(14.0, 9.0);
            cc.egui_ctx.set_style(style);

            Ok(Box::new(FinalizerApp::default()))
        }),
    )
}

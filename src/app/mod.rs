use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use eframe::egui::{self, Context};
use tracing::{error, info};

use flow_navigator::config::NavigatorConfig;
use flow_navigator::ftree::load_network;
use flow_navigator::layout::{Coordinator, FlowStyle, Transform};
use flow_navigator::network::{Network, NodeIndex};

mod interaction;
mod panels;
mod render_utils;
mod view;

pub struct NavigatorApp {
    input: PathBuf,
    config: NavigatorConfig,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<Network, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    network: Network,
    coordinator: Coordinator,
    input: PathBuf,
    search: String,
    /// Fuzzy matches shown when the search text is not a valid regex.
    fuzzy_hits: HashSet<NodeIndex>,
    status: Option<String>,
    transform_ready: bool,
    canvas_size: egui::Vec2,
}

impl NavigatorApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, input: PathBuf, config: NavigatorConfig) -> Self {
        let state = Self::start_load(input.clone());
        Self {
            input,
            config,
            state,
        }
    }

    fn spawn_load(input: PathBuf) -> Receiver<Result<Network, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = std::fs::read_to_string(&input)
                .map_err(|error| format!("failed to read {}: {error}", input.display()))
                .and_then(|text| load_network(&text).map_err(|error| error.to_string()));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(input: PathBuf) -> AppState {
        info!(path = %input.display(), "loading network");
        AppState::Loading {
            rx: Self::spawn_load(input),
        }
    }
}

impl ViewModel {
    fn new(network: Network, input: PathBuf, config: NavigatorConfig) -> Self {
        let style = FlowStyle::for_network_module(&network, network.root());
        let coordinator = Coordinator::new(&network, config, Box::new(style));
        Self {
            network,
            coordinator,
            input,
            search: String::new(),
            fuzzy_hits: HashSet::new(),
            status: None,
            transform_ready: false,
            canvas_size: egui::Vec2::ZERO,
        }
    }

    /// Centres the root layout the first time the canvas size is known.
    fn initial_transform(size: egui::Vec2) -> Transform {
        Transform::new(size.x / 2.0, size.y / 2.0, 0.8)
    }

    fn show(&mut self, ctx: &Context) {
        self.draw_top_bar(ctx);

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_map(ui));
    }
}

impl eframe::App for NavigatorApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(network) => AppState::Ready(Box::new(ViewModel::new(
                            network,
                            self.input.clone(),
                            self.config,
                        ))),
                        Err(message) => {
                            error!(%message, "failed to load network");
                            AppState::Error(message)
                        }
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading network...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(message) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load network");
                    ui.add_space(6.0);
                    ui.label(message.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(self.input.clone()));
                    }
                });
            }
            AppState::Ready(model) => model.show(ctx),
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}

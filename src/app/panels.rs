use eframe::egui::{self, Align, Context, Layout, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use regex::RegexBuilder;
use tracing::{info, warn};

use flow_navigator::ftree::{flow_format, serialize_ftree};
use flow_navigator::network::NodeKind;

use super::ViewModel;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl ViewModel {
    pub(super) fn draw_top_bar(&mut self, ctx: &Context) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("flow-navigator");
                    ui.separator();
                    ui.label(self.input.display().to_string());
                    ui.separator();

                    let search = ui.add(
                        egui::TextEdit::singleline(&mut self.search)
                            .hint_text("search names (regex)")
                            .desired_width(240.0),
                    );
                    let submitted =
                        search.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
                    if submitted || ui.button("Search").clicked() {
                        self.run_search();
                    }
                    if ui.button("Clear").clicked() {
                        self.search.clear();
                        self.run_search();
                    }

                    ui.separator();
                    if ui.button("Reset view").clicked() {
                        self.transform_ready = false;
                    }
                    if ui.button("Export").clicked() {
                        self.export();
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(status) = &self.status {
                            ui.label(status.as_str());
                        }
                    });
                });
            });
    }

    /// Regex search through the network; falls back to fuzzy matching on leaf names when
    /// the text is not a valid pattern.
    fn run_search(&mut self) {
        let query = self.search.trim().to_owned();
        self.fuzzy_hits.clear();
        let hits = self.network.search(&query);
        let leaf_hits = hits
            .iter()
            .filter(|hit| self.network.node(**hit).is_leaf())
            .count();

        let invalid = !query.is_empty()
            && RegexBuilder::new(&query)
                .case_insensitive(true)
                .build()
                .is_err();
        if invalid {
            let matcher = SkimMatcherV2::default();
            let root = self.network.root();
            for leaf in self.network.leaves(root) {
                let name = self.network.name(leaf);
                if fuzzy_match_score(&matcher, &name, &query).is_some() {
                    self.fuzzy_hits.insert(leaf);
                    self.fuzzy_hits.extend(self.network.ancestors(leaf));
                }
            }
            self.status = Some(format!("fuzzy matches: {}", self.fuzzy_hits.len()));
        } else if query.is_empty() {
            self.status = None;
        } else {
            self.status = Some(format!("matches: {leaf_hits}"));
        }

        self.coordinator.refresh(&self.network);
    }

    fn export(&mut self) {
        let path = self.input.with_extension("navigator.ftree");
        match std::fs::write(&path, serialize_ftree(&self.network)) {
            Ok(()) => {
                info!(path = %path.display(), "exported network");
                self.status = Some(format!("exported to {}", path.display()));
            }
            Err(error) => {
                warn!(%error, path = %path.display(), "export failed");
                self.status = Some(format!("export failed: {error}"));
            }
        }
    }

    pub(super) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Details");
        ui.separator();

        let Some((layout, node_index)) = self.coordinator.selected().cloned() else {
            ui.label("Click a node to inspect it.");
            return;
        };

        let network = &self.network;
        let node = network.node(node_index);
        ui.label(format!("name: {}", network.name(node_index)));
        ui.label(format!("path: {}", node.path));
        ui.label(format!("shown in layout: {layout}"));
        ui.label(format!("flow: {}", flow_format(node.flow)));
        ui.label(format!("exit flow: {}", flow_format(node.exit_flow)));
        ui.label(format!("links in/out: {}/{}", node.in_degree, node.out_degree));

        match &node.kind {
            NodeKind::Leaf(leaf) => {
                ui.label(format!("node id: {}", leaf.node_id));
                if let Some(state_id) = &leaf.state_id {
                    ui.label(format!("state id: {state_id}"));
                }
                if let Some(layer_id) = &leaf.layer_id {
                    ui.label(format!("layer: {layer_id}"));
                }
                for (source, mark) in &leaf.occurred {
                    ui.label(format!("occurs in {source}: {}", mark.label));
                }
            }
            NodeKind::Module(module) => {
                let aggregates = network.aggregates(node_index);
                ui.label(format!("enter flow: {}", flow_format(module.enter_flow)));
                ui.label(format!("children: {}", module.child_count()));
                ui.label(format!("leaves below: {}", aggregates.total_children));
                ui.label(format!("max node flow: {}", flow_format(aggregates.max_node_flow)));
                ui.label(format!("max link flow: {}", flow_format(aggregates.max_link_flow)));
                ui.label(format!("links: {}", module.links().len()));
                if node.search_hits > 0 {
                    ui.label(format!("search hits: {}", node.search_hits));
                }

                ui.separator();
                ui.label("Largest leaves");
                for largest in module.largest() {
                    ui.label(format!(
                        "{}  {}",
                        network.name(*largest),
                        flow_format(network.node(*largest).flow)
                    ));
                }
            }
        }
    }
}

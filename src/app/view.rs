use eframe::egui::{self, Align2, Color32, FontId, Sense, Shape, Stroke, Ui, vec2};

use flow_navigator::layout::LayoutEngine;
use flow_navigator::util::truncate_label;

use super::ViewModel;
use super::render_utils::{circle_visible, dim_color, draw_background, ribbon_bounds, ribbon_mesh};

const SEARCH_HIT_COLOR: Color32 = Color32::from_rgb(40, 150, 230);
const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 180, 40);
const LABEL_CHARS: usize = 32;

impl ViewModel {
    pub(super) fn draw_map(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        if !self.transform_ready || self.canvas_size != rect.size() {
            self.canvas_size = rect.size();
            self.coordinator.set_viewport(rect.width(), rect.height());
            let transform = if self.transform_ready {
                self.coordinator.transform()
            } else {
                Self::initial_transform(rect.size())
            };
            self.transform_ready = true;
            self.coordinator.apply_transform(&self.network, transform);
        }

        let mut changed = self.handle_map_zoom(ui, rect, &response);
        changed |= self.handle_node_drag(ui, rect, &response);
        changed |= self.handle_map_pan(&response, self.coordinator.is_dragging());
        self.handle_click(ui, rect, &response);

        if self.coordinator.tick(&self.network) || changed || self.coordinator.is_dragging() {
            ui.ctx().request_repaint();
        }

        let transform = self.coordinator.transform();
        draw_background(&painter, rect, vec2(transform.x, transform.y), transform.k);

        let offset = rect.min.to_vec2();
        let dimmed = self.coordinator.layouts().count() > 1;
        let mut layouts = self.coordinator.layouts().peekable();
        while let Some(layout) = layouts.next() {
            let has_children = layouts
                .peek()
                .is_some_and(|next| next.path().is_descendant_of(layout.path()));
            self.draw_layout(&painter, rect, offset, layout, dimmed && has_children);
        }

        let hits = self.network.node(self.network.root()).search_hits;
        let mut summary = format!(
            "zoom {:.2}  |  layouts {}",
            transform.k,
            self.coordinator.layout_count()
        );
        if hits > 0 {
            summary.push_str(&format!("  |  hits {hits}"));
        }
        painter.text(
            rect.left_top() + vec2(10.0, 10.0),
            Align2::LEFT_TOP,
            summary,
            FontId::proportional(13.0),
            Color32::from_gray(60),
        );
    }

    fn draw_layout(
        &self,
        painter: &egui::Painter,
        rect: egui::Rect,
        offset: egui::Vec2,
        layout: &LayoutEngine,
        faded: bool,
    ) {
        for link in layout.links() {
            if !link.visible {
                continue;
            }
            let Some(shape) = link.shape.as_ref() else {
                continue;
            };
            if !rect.intersects(ribbon_bounds(shape, offset)) {
                continue;
            }
            let color = if faded {
                dim_color(link.color, 0.6)
            } else {
                link.color
            };
            painter.add(Shape::mesh(ribbon_mesh(shape, offset, color)));
        }

        for (index, node) in layout.nodes().iter().enumerate() {
            let position = node.screen_position + offset;
            let radius = node.screen_radius;
            if !circle_visible(rect, position, radius) {
                continue;
            }
            if layout.is_spawned(index) {
                painter.circle_stroke(
                    position,
                    radius,
                    Stroke::new(1.0, dim_color(node.border_color, 0.7)),
                );
                continue;
            }

            painter.circle_filled(position, radius, node.fill);
            painter.circle_stroke(
                position,
                radius,
                Stroke::new(node.border_width * layout.effective_k().min(1.0), node.border_color),
            );

            let fuzzy_hit = self.fuzzy_hits.contains(&node.node);
            if node.search_hits > 0 || fuzzy_hit {
                painter.circle_stroke(
                    position,
                    radius + 4.0,
                    Stroke::new(2.5, SEARCH_HIT_COLOR),
                );
            }
            if node.highlighted {
                painter.circle_stroke(position, radius + 7.0, Stroke::new(2.0, SELECTED_COLOR));
            }

            if node.label_visible || node.highlighted {
                let mut label = truncate_label(&node.label, LABEL_CHARS);
                if node.search_hits > 0 && node.is_module {
                    label.push_str(&format!(" ({})", node.search_hits));
                }
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    label,
                    FontId::proportional(12.0),
                    Color32::from_gray(30),
                );
            }
        }
    }
}

use eframe::egui::{self, Pos2, Rect, Ui};

use super::ViewModel;

const ZOOM_RANGE: (f32, f32) = (0.05, 400.0);

impl ViewModel {
    /// Zooms around the pointer on scroll. Returns whether the transform changed.
    pub(super) fn handle_map_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) -> bool {
        if !response.hovered() {
            return false;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return false;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        let transform = self.coordinator.transform().zoomed_about(
            canvas_point(rect, pointer),
            zoom_factor,
            ZOOM_RANGE,
        );
        self.coordinator.apply_transform(&self.network, transform);
        true
    }

    /// Pans with the secondary or middle button, or the primary button on empty canvas.
    pub(super) fn handle_map_pan(&mut self, response: &egui::Response, over_node: bool) -> bool {
        let panning = response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
            || (response.dragged_by(egui::PointerButton::Primary) && !over_node);
        let delta = response.drag_delta();
        if !panning || delta == egui::Vec2::ZERO {
            return false;
        }

        let transform = self.coordinator.transform().translated(delta);
        self.coordinator.apply_transform(&self.network, transform);
        true
    }

    /// Drags a node in its layout while the primary button is held over it.
    pub(super) fn handle_node_drag(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) -> bool {
        let pointer = ui.input(|input| input.pointer.interact_pos());
        let Some(pointer) = pointer.map(|pointer| canvas_point(rect, pointer)) else {
            return false;
        };

        if response.drag_started_by(egui::PointerButton::Primary)
            && let Some((layout, element)) = self.coordinator.node_at(pointer)
        {
            return self.coordinator.drag_start(&layout, element, pointer);
        }

        if response.dragged_by(egui::PointerButton::Primary) {
            self.coordinator.drag_to(&self.network, pointer);
        }
        if response.drag_stopped() {
            self.coordinator.drag_end();
        }
        false
    }

    pub(super) fn handle_click(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        if !response.clicked_by(egui::PointerButton::Primary) {
            return;
        }
        let Some(pointer) = ui.input(|input| input.pointer.interact_pos()) else {
            return;
        };
        if let Some((layout, element)) = self.coordinator.node_at(canvas_point(rect, pointer)) {
            self.coordinator.click(&layout, element);
        }
    }
}

/// Screen position relative to the canvas origin, the frame layouts work in.
pub(super) fn canvas_point(rect: Rect, screen: Pos2) -> Pos2 {
    (screen - rect.min).to_pos2()
}

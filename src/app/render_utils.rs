use eframe::egui::{Color32, Mesh, Painter, Pos2, Rect, Stroke, Vec2};

use flow_navigator::layout::LinkShape;

const RIBBON_SEGMENTS: usize = 12;

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, offset: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(250, 248, 244));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(200, 195, 185, 60));

    let mut x = rect.left() + offset.x.rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + offset.y.rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

/// Triangulates a link ribbon (and its arrowhead) shifted by `offset` into canvas space.
pub(super) fn ribbon_mesh(shape: &LinkShape, offset: Vec2, color: Color32) -> Mesh {
    let mut mesh = Mesh::default();
    for (step, (inner, outer)) in shape.ribbon(RIBBON_SEGMENTS).into_iter().enumerate() {
        mesh.colored_vertex(inner + offset, color);
        mesh.colored_vertex(outer + offset, color);
        if step > 0 {
            let base = (step as u32 - 1) * 2;
            mesh.add_triangle(base, base + 1, base + 2);
            mesh.add_triangle(base + 1, base + 3, base + 2);
        }
    }

    if let Some(arrow) = shape.arrow {
        let base = mesh.vertices.len() as u32;
        mesh.colored_vertex(shape.end_inner + offset, color);
        mesh.colored_vertex(arrow.barb + offset, color);
        mesh.colored_vertex(arrow.tip + offset, color);
        mesh.add_triangle(base, base + 1, base + 2);
    }
    mesh
}

pub(super) fn ribbon_bounds(shape: &LinkShape, offset: Vec2) -> Rect {
    let mut points = vec![
        shape.base_inner,
        shape.base_outer,
        shape.inner_control,
        shape.outer_control,
        shape.end_inner,
        shape.end_outer,
    ];
    if let Some(arrow) = shape.arrow {
        points.push(arrow.barb);
        points.push(arrow.tip);
    }
    Rect::from_points(&points).translate(offset)
}

use std::fmt;

use eframe::egui::{Pos2, Vec2, vec2};

/// Bends below this magnitude are not drawn between overlapping nodes.
const VISIBLE_BEND_ON_OVERLAP: f32 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub center: Pos2,
    pub radius: f32,
}

/// Everything needed to draw one link between two circular nodes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkEnds {
    pub source: Circle,
    pub target: Circle,
    pub width: f32,
    pub bend: f32,
    /// Width of the link running the other way, if it is drawn too.
    pub opposite_width: Option<f32>,
}

/// Free space along the centre line between the two node borders.
pub fn gap_distance(source: Circle, target: Circle) -> f32 {
    (target.center - source.center).length() - source.radius - target.radius
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Pos2),
    LineTo(Pos2),
    QuadTo(Pos2, Pos2),
    Close,
}

/// Closed outline of a link; empty when there is nothing worth drawing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkPath {
    commands: Vec<PathCommand>,
}

impl LinkPath {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }
}

impl fmt::Display for LinkPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, command) in self.commands.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            match command {
                PathCommand::MoveTo(point) => write!(f, "M{:.2},{:.2}", point.x, point.y)?,
                PathCommand::LineTo(point) => write!(f, "L{:.2},{:.2}", point.x, point.y)?,
                PathCommand::QuadTo(control, point) => write!(
                    f,
                    "Q{:.2},{:.2} {:.2},{:.2}",
                    control.x, control.y, point.x, point.y
                )?,
                PathCommand::Close => f.write_str("Z")?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arrowhead {
    pub barb: Pos2,
    pub tip: Pos2,
}

/// Key points of a link ribbon: two edges joined by quadratic curves, optionally ending in
/// a half arrowhead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkShape {
    pub base_inner: Pos2,
    pub base_outer: Pos2,
    pub inner_control: Pos2,
    pub outer_control: Pos2,
    pub end_inner: Pos2,
    pub end_outer: Pos2,
    pub arrow: Option<Arrowhead>,
}

impl LinkShape {
    pub fn path(&self) -> LinkPath {
        let mut commands = vec![
            PathCommand::MoveTo(self.base_inner),
            PathCommand::LineTo(self.base_outer),
            PathCommand::QuadTo(self.outer_control, self.end_outer),
        ];
        if let Some(arrow) = self.arrow {
            commands.push(PathCommand::LineTo(arrow.barb));
            commands.push(PathCommand::LineTo(arrow.tip));
        }
        commands.push(PathCommand::LineTo(self.end_inner));
        commands.push(PathCommand::QuadTo(self.inner_control, self.base_inner));
        commands.push(PathCommand::Close);
        LinkPath { commands }
    }

    /// Samples matching points along the inner and outer edge, base to end.
    pub fn ribbon(&self, segments: usize) -> Vec<(Pos2, Pos2)> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|step| {
                let t = step as f32 / segments as f32;
                (
                    quadratic_point(self.base_inner, self.inner_control, self.end_inner, t),
                    quadratic_point(self.base_outer, self.outer_control, self.end_outer, t),
                )
            })
            .collect()
    }
}

fn quadratic_point(start: Pos2, control: Pos2, end: Pos2, t: f32) -> Pos2 {
    let mt = 1.0 - t;
    let x = mt * mt * start.x + 2.0 * mt * t * control.x + t * t * end.x;
    let y = mt * mt * start.y + 2.0 * mt * t * control.y + t * t * end.y;
    Pos2::new(x, y)
}

fn tip_length(gap: f32, width: f32) -> f32 {
    (gap / 2.0).min(10.0 * width.max(0.0).cbrt()).max(0.0)
}

struct Frame {
    dir: Vec2,
    right: Vec2,
    gap: f32,
    signed_bend: f32,
    extra: f32,
}

/// Direction, perpendicular and bend handedness for a link, or `None` when the ends
/// overlap and the curve would not show.
fn frame(ends: &LinkEnds) -> Option<Frame> {
    let delta = ends.target.center - ends.source.center;
    let length = delta.length();
    let gap = length - ends.source.radius - ends.target.radius;
    if gap <= 0.0 && ends.bend.abs() < VISIBLE_BEND_ON_OVERLAP {
        return None;
    }
    if length <= f32::EPSILON {
        return None;
    }

    let dir = delta / length;
    let right = vec2(-dir.y, dir.x);

    let quadrant = if delta.x > 0.0 || (delta.x == 0.0 && delta.y < 0.0) {
        1.0
    } else {
        -1.0
    };
    let bend_sign = if ends.bend > 0.0 {
        1.0
    } else if ends.bend < 0.0 {
        -1.0
    } else {
        0.0
    };
    let signed_bend = ends.bend.abs() * quadrant * bend_sign;
    let extra = (ends.bend.abs() / 10.0).powf(0.4);

    Some(Frame {
        dir,
        right,
        gap,
        signed_bend,
        extra,
    })
}

/// Half-width ribbon with an arrowhead at the target, leaving the other half of the
/// channel to the opposite link.
pub fn directed_link(ends: &LinkEnds) -> Option<LinkShape> {
    let Frame {
        dir,
        right,
        gap,
        signed_bend,
        extra,
    } = frame(ends)?;
    let width = ends.width.max(0.0);

    let own_tip = tip_length(gap, width);
    let tip_width = 2.0 * width.sqrt();
    let opposite_tip = ends
        .opposite_width
        .map(|opposite| tip_length(gap, opposite))
        .unwrap_or(0.0);

    let start = ends.source.center + dir * (ends.source.radius + opposite_tip);
    let tip = ends.target.center - dir * ends.target.radius;
    let end = tip - dir * own_tip;
    let mid = start + (end - start) * 0.5;

    Some(LinkShape {
        base_inner: start,
        base_outer: start + right * width,
        inner_control: mid + right * signed_bend,
        outer_control: mid + right * (signed_bend + width + extra),
        end_inner: end,
        end_outer: end + right * width,
        arrow: Some(Arrowhead {
            barb: end + right * (width + tip_width),
            tip,
        }),
    })
}

/// Full-width ribbon centred on the axis, no arrowhead.
pub fn undirected_link(ends: &LinkEnds) -> Option<LinkShape> {
    let Frame {
        dir,
        right,
        signed_bend,
        extra,
        ..
    } = frame(ends)?;
    let half = ends.width.max(0.0) / 2.0;

    let start = ends.source.center + dir * ends.source.radius;
    let end = ends.target.center - dir * ends.target.radius;
    let mid = start + (end - start) * 0.5;

    Some(LinkShape {
        base_inner: start - right * half,
        base_outer: start + right * half,
        inner_control: mid + right * (signed_bend - half),
        outer_control: mid + right * (signed_bend + half + extra),
        end_inner: end - right * half,
        end_outer: end + right * half,
        arrow: None,
    })
}

pub fn render_directed_link(ends: &LinkEnds) -> LinkPath {
    directed_link(ends)
        .map(|shape| shape.path())
        .unwrap_or_default()
}

pub fn render_undirected_link(ends: &LinkEnds) -> LinkPath {
    undirected_link(ends)
        .map(|shape| shape.path())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    fn ends(source: Pos2, target: Pos2, bend: f32) -> LinkEnds {
        LinkEnds {
            source: Circle {
                center: source,
                radius: 10.0,
            },
            target: Circle {
                center: target,
                radius: 10.0,
            },
            width: 4.0,
            bend,
            opposite_width: None,
        }
    }

    #[test]
    fn overlapping_nodes_without_bend_draw_nothing() {
        let overlapping = ends(pos2(0.0, 0.0), pos2(0.0, 0.0), 0.0);
        assert!(render_directed_link(&overlapping).is_empty());
        assert_eq!(render_directed_link(&overlapping).to_string(), "");
        assert!(render_undirected_link(&overlapping).is_empty());

        let touching = ends(pos2(0.0, 0.0), pos2(15.0, 0.0), 30.0);
        assert!(render_directed_link(&touching).is_empty());
    }

    #[test]
    fn strongly_bent_links_survive_overlap() {
        let touching = ends(pos2(0.0, 0.0), pos2(15.0, 0.0), 60.0);
        assert!(!render_directed_link(&touching).is_empty());
    }

    #[test]
    fn directed_path_has_arrowhead_vertices_in_order() {
        let path = render_directed_link(&ends(pos2(0.0, 0.0), pos2(100.0, 0.0), 0.0));
        let kinds = path
            .commands()
            .iter()
            .map(|command| match command {
                PathCommand::MoveTo(_) => 'M',
                PathCommand::LineTo(_) => 'L',
                PathCommand::QuadTo(..) => 'Q',
                PathCommand::Close => 'Z',
            })
            .collect::<String>();
        assert_eq!(kinds, "MLQLLLQZ");
        assert!(path.to_string().starts_with("M10.00,0.00 L10.00,4.00"));
    }

    #[test]
    fn arrow_tip_touches_the_target_border() {
        let shape = directed_link(&ends(pos2(0.0, 0.0), pos2(100.0, 0.0), 0.0)).unwrap();
        let arrow = shape.arrow.unwrap();
        assert_eq!(arrow.tip, pos2(90.0, 0.0));

        let tip = (10.0 * 4.0_f32.cbrt()).min(40.0);
        assert!((shape.end_inner.x - (90.0 - tip)).abs() < 1e-4);
        assert!((arrow.barb.y - (4.0 + 2.0 * 2.0)).abs() < 1e-4);
    }

    #[test]
    fn opposite_link_pushes_the_start_forward() {
        let mut with_opposite = ends(pos2(0.0, 0.0), pos2(100.0, 0.0), 0.0);
        with_opposite.opposite_width = Some(8.0);
        let shape = directed_link(&with_opposite).unwrap();
        let opposite_tip = 10.0 * 8.0_f32.cbrt();
        assert!((shape.base_inner.x - (10.0 + opposite_tip)).abs() < 1e-4);
    }

    #[test]
    fn bend_handedness_is_symmetric_for_reversed_pairs() {
        let forward = directed_link(&ends(pos2(0.0, 0.0), pos2(100.0, 0.0), 20.0)).unwrap();
        let backward = directed_link(&ends(pos2(100.0, 0.0), pos2(0.0, 0.0), 20.0)).unwrap();
        // both curves bow to the same side of the screen
        assert!(forward.inner_control.y > 0.0);
        assert!(backward.inner_control.y > 0.0);
    }

    #[test]
    fn undirected_ribbon_is_centred() {
        let shape = undirected_link(&ends(pos2(0.0, 0.0), pos2(0.0, 100.0), 0.0)).unwrap();
        assert!(shape.arrow.is_none());
        assert!((shape.base_inner.x + shape.base_outer.x).abs() < 1e-4);
        assert_eq!(shape.path().commands().len(), 6);
    }

    #[test]
    fn ribbon_samples_span_base_to_end() {
        let shape = directed_link(&ends(pos2(0.0, 0.0), pos2(100.0, 0.0), 10.0)).unwrap();
        let ribbon = shape.ribbon(8);
        assert_eq!(ribbon.len(), 9);
        assert_eq!(ribbon[0], (shape.base_inner, shape.base_outer));
        assert_eq!(ribbon[8], (shape.end_inner, shape.end_outer));
    }
}

//! Zoom dependent visibility: which links and labels show, and how nodes restyle when the
//! user zooms deep into a module.

use eframe::egui::Pos2;

use crate::config::{LinkPolicy, LodConfig};
use crate::util::linear_clamped;

/// Outgoing links kept per source at full backbone zoom.
const BACKBONE_OUT_DEGREE: f32 = 10.0;

/// Indices ordered by flow, heaviest first; ties keep input order.
pub fn rank_descending(flows: &[f64]) -> Vec<usize> {
    let mut order = (0..flows.len()).collect::<Vec<_>>();
    order.sort_by(|a, b| flows[*b].total_cmp(&flows[*a]));
    order
}

/// Fraction of links that may show at zoom `k`, between `1 / total` and 1.
pub fn link_threshold(k: f32, total: usize, lod: &LodConfig) -> f32 {
    if total == 0 {
        return 1.0;
    }
    linear_clamped(k, lod.link_zoom, (1.0 / total as f32, 1.0))
}

/// Visibility by flow rank: the heaviest `always_visible_links` always show, the rest
/// appear in rank order as the threshold grows.
pub fn rank_link_visibility(flows: &[f64], k: f32, lod: &LodConfig) -> Vec<bool> {
    let total = flows.len();
    let threshold = link_threshold(k, total, lod);
    let always = lod.always_visible_links;

    let mut visible = vec![false; total];
    for (rank, index) in rank_descending(flows).into_iter().enumerate() {
        let beyond = (rank + 1).saturating_sub(always) as f32 / total as f32;
        visible[index] = rank < always || beyond <= threshold;
    }
    visible
}

/// Least squares fit of `ln(y) = a + b ln(rank + 1)` over positive values sorted heaviest
/// first. Returns `(a, b)`.
fn fit_power_law(sorted: &[f64]) -> Option<(f64, f64)> {
    let points = sorted
        .iter()
        .enumerate()
        .filter(|(_, value)| **value > 0.0)
        .map(|(rank, value)| (((rank + 1) as f64).ln(), value.ln()))
        .collect::<Vec<_>>();
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let covariance = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum::<f64>();
    let variance = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum::<f64>();
    if variance <= f64::EPSILON {
        return None;
    }
    let slope = covariance / variance;
    Some((mean_y - slope * mean_x, slope))
}

/// Backbone visibility: a link shows when its normalized flow reaches the power-law fit at
/// the threshold rank and it is among the heaviest outgoing links of its source.
pub fn backbone_link_visibility(
    links: &[(usize, f64)],
    k: f32,
    lod: &LodConfig,
) -> Vec<bool> {
    let total = links.len();
    if total == 0 {
        return Vec::new();
    }
    let threshold = link_threshold(k, total, lod) as f64;
    let flows = links.iter().map(|(_, flow)| *flow).collect::<Vec<_>>();
    let order = rank_descending(&flows);

    let max_flow = flows[order[0]];
    let normalized = order
        .iter()
        .map(|index| if max_flow > 0.0 { flows[*index] / max_flow } else { 0.0 })
        .collect::<Vec<_>>();
    let cutoff = match fit_power_law(&normalized) {
        Some((intercept, slope)) => (intercept + slope * (threshold * total as f64 + 1.0).ln()).exp(),
        None => 0.0,
    };
    let cap = ((threshold as f32 * BACKBONE_OUT_DEGREE).ceil() as usize).max(1);

    let mut per_source = std::collections::HashMap::<usize, usize>::new();
    let mut visible = vec![false; total];
    for (rank, index) in order.into_iter().enumerate() {
        let seen = per_source.entry(links[index].0).or_default();
        let within_cap = *seen < cap;
        *seen += 1;
        visible[index] = rank < lod.always_visible_links
            || (normalized[rank] >= cutoff - 1e-12 && within_cap);
    }
    visible
}

/// Link visibility under the configured policy; `links` are `(source, flow)` pairs.
pub fn link_visibility(links: &[(usize, f64)], k: f32, lod: &LodConfig) -> Vec<bool> {
    match lod.policy {
        LinkPolicy::Rank => {
            let flows = links.iter().map(|(_, flow)| *flow).collect::<Vec<_>>();
            rank_link_visibility(&flows, k, lod)
        }
        LinkPolicy::Backbone => backbone_link_visibility(links, k, lod),
    }
}

/// How many of `node_count` nodes carry a label at zoom `k`; at least one when there are
/// nodes at all.
pub fn label_count(k: f32, node_count: usize, lod: &LodConfig) -> usize {
    if node_count == 0 {
        return 0;
    }
    let count = linear_clamped(k, lod.label_zoom, (1.0, node_count as f32)).round() as usize;
    count.clamp(1, node_count)
}

pub fn label_visibility(flows: &[f64], k: f32, lod: &LodConfig) -> Vec<bool> {
    let count = label_count(k, flows.len(), lod);
    let mut visible = vec![false; flows.len()];
    for index in rank_descending(flows).into_iter().take(count) {
        visible[index] = true;
    }
    visible
}

/// How far module fills have faded toward white, 0 at the start of the deep zoom band.
pub fn fill_fade(k: f32, lod: &LodConfig) -> f32 {
    let (start, end) = lod.deep_zoom;
    if k <= start {
        return 0.0;
    }
    linear_clamped(k, (start, end), (0.0, 1.0))
}

/// Progress of the focused node toward its drill-down radius, once zoom enters the focus
/// band.
pub fn focus_progress(k: f32, lod: &LodConfig) -> Option<f32> {
    let (start, end) = lod.focus_zoom;
    (k >= start).then(|| linear_clamped(k, (start, end), (0.0, 1.0)))
}

pub fn focus_radius(radius: f32, progress: f32, lod: &LodConfig) -> f32 {
    radius + (lod.focus_radius - radius) * progress.clamp(0.0, 1.0)
}

pub fn nearest_to(points: impl IntoIterator<Item = Pos2>, center: Pos2) -> Option<usize> {
    points
        .into_iter()
        .enumerate()
        .map(|(index, point)| (index, point.distance_sq(center)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    fn flows(count: usize) -> Vec<f64> {
        (0..count).map(|index| 1.0 / (index + 1) as f64).collect()
    }

    #[test]
    fn zoomed_out_shows_only_the_heaviest_links() {
        let lod = LodConfig::default();
        let visible = rank_link_visibility(&flows(20), 0.1, &lod);
        let shown = visible.iter().filter(|visible| **visible).count();
        assert_eq!(shown, 6);
        assert!(visible[..5].iter().all(|visible| *visible));
    }

    #[test]
    fn zoomed_in_shows_every_link() {
        let lod = LodConfig::default();
        assert!(rank_link_visibility(&flows(20), 1.7, &lod).into_iter().all(|v| v));
        assert!(rank_link_visibility(&flows(20), 50.0, &lod).into_iter().all(|v| v));
    }

    #[test]
    fn visibility_grows_monotonically_with_zoom() {
        let lod = LodConfig::default();
        let mut previous = 0;
        for step in 0..30 {
            let k = 0.4 + step as f32 * 0.05;
            let shown = rank_link_visibility(&flows(40), k, &lod)
                .into_iter()
                .filter(|v| *v)
                .count();
            assert!(shown >= previous);
            previous = shown;
        }
    }

    #[test]
    fn backbone_keeps_the_top_links_and_caps_out_degree() {
        let lod = LodConfig {
            policy: LinkPolicy::Backbone,
            ..LodConfig::default()
        };
        let links = (0..30)
            .map(|index| (index % 2, 1.0 / (index + 1) as f64))
            .collect::<Vec<_>>();
        let zoomed_out = link_visibility(&links, 0.1, &lod);
        assert!(zoomed_out[..5].iter().all(|v| *v));
        assert!(zoomed_out.iter().filter(|v| **v).count() <= 6);

        let zoomed_in = link_visibility(&links, 5.0, &lod);
        assert_eq!(zoomed_in.iter().filter(|v| **v).count(), 20);
    }

    #[test]
    fn label_count_follows_zoom() {
        let lod = LodConfig::default();
        assert_eq!(label_count(0.1, 10, &lod), 1);
        assert_eq!(label_count(1.0, 10, &lod), 10);
        assert_eq!(label_count(0.0, 0, &lod), 0);
        let visible = label_visibility(&[0.1, 0.5, 0.2], 0.1, &lod);
        assert_eq!(visible, vec![false, true, false]);
    }

    #[test]
    fn deep_zoom_fade_and_focus() {
        let lod = LodConfig::default();
        assert_eq!(fill_fade(1.0, &lod), 0.0);
        assert!((fill_fade(4.0, &lod) - 0.5).abs() < 1e-6);
        assert_eq!(fill_fade(10.0, &lod), 1.0);

        assert_eq!(focus_progress(8.9, &lod), None);
        assert_eq!(focus_progress(12.0, &lod), Some(0.5));
        assert_eq!(focus_radius(20.0, 0.5, &lod), 110.0);
    }

    #[test]
    fn nearest_point_wins() {
        let points = [pos2(0.0, 0.0), pos2(9.0, 9.0), pos2(4.0, 6.0)];
        assert_eq!(nearest_to(points, pos2(5.0, 5.0)), Some(2));
        assert_eq!(nearest_to([], pos2(5.0, 5.0)), None);
    }
}

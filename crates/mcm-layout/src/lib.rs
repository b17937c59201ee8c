#![forbid(unsafe_code)]

//! Zoom normalization and non-overlapping placement of whole models.
//!
//! Coordinates are stored at [`REFERENCE_ZOOM`]; a model authored at another
//! zoom level is rescaled on the way in and out. When several models are
//! merged into one drawing, [`align_models`] moves every model whose bounding
//! box collides with another one into a row to the right of the rest.

use mcm_core::{EngineConfig, MODEL_PADDING, Model, REFERENCE_ZOOM, Rect};
use tracing::{debug, trace};

/// Summary of one [`align_models`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlignStats {
    pub model_count: usize,
    pub overlapping_count: usize,
    pub moved_count: usize,
}

/// Rounds halves towards positive infinity, matching the diagram tool.
fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

#[must_use]
pub fn normalize_coordinate(value: i32, zoom_level: i32) -> i32 {
    normalize_coordinate_with(value, zoom_level, REFERENCE_ZOOM)
}

/// `round(value / (zoom_level / reference_zoom))`. Non-positive zoom levels
/// leave the value untouched.
#[must_use]
pub fn normalize_coordinate_with(value: i32, zoom_level: i32, reference_zoom: i32) -> i32 {
    if zoom_level <= 0 || reference_zoom <= 0 {
        return value;
    }
    round_half_up(f64::from(value) / (f64::from(zoom_level) / f64::from(reference_zoom)))
}

#[must_use]
pub fn denormalize_coordinate(value: i32, zoom_level: i32) -> i32 {
    denormalize_coordinate_with(value, zoom_level, REFERENCE_ZOOM)
}

/// Inverse of [`normalize_coordinate_with`].
#[must_use]
pub fn denormalize_coordinate_with(value: i32, zoom_level: i32, reference_zoom: i32) -> i32 {
    if zoom_level <= 0 || reference_zoom <= 0 {
        return value;
    }
    round_half_up(f64::from(value) / (f64::from(reference_zoom) / f64::from(zoom_level)))
}

fn scale_rect(rect: Rect, scale: impl Fn(i32) -> i32) -> Rect {
    Rect::new(
        scale(rect.x),
        scale(rect.y),
        scale(rect.width),
        scale(rect.height),
    )
}

fn rescale_model(model: &mut Model, scale: impl Fn(i32) -> i32) {
    for node in &mut model.nodes {
        node.position = scale_rect(node.position, &scale);
        for relation in &mut node.relations {
            relation.position = scale_rect(relation.position, &scale);
        }
    }
}

/// Rebases every rectangle of the model from its own zoom level to the
/// reference zoom. Relation point offsets are not scaled.
pub fn normalize_model(model: &mut Model) {
    normalize_model_with_config(model, &EngineConfig::default());
}

pub fn normalize_model_with_config(model: &mut Model, config: &EngineConfig) {
    let zoom_level = model.zoom_level;
    let reference_zoom = config.reference_zoom;
    trace!(zoom_level, reference_zoom, "normalizing model");
    rescale_model(model, |value| {
        normalize_coordinate_with(value, zoom_level, reference_zoom)
    });
    model.zoom_level = reference_zoom;
}

/// Rescales a model stored at the reference zoom to `zoom_level`.
pub fn denormalize_model(model: &mut Model, zoom_level: i32) {
    denormalize_model_with_config(model, zoom_level, &EngineConfig::default());
}

pub fn denormalize_model_with_config(model: &mut Model, zoom_level: i32, config: &EngineConfig) {
    let reference_zoom = config.reference_zoom;
    trace!(zoom_level, reference_zoom, "denormalizing model");
    rescale_model(model, |value| {
        denormalize_coordinate_with(value, zoom_level, reference_zoom)
    });
    model.zoom_level = zoom_level;
}

/// Zoom level a merged export is drawn at: the smallest one among the models.
#[must_use]
pub fn export_zoom_level(models: &[Model]) -> i32 {
    models
        .iter()
        .map(|model| model.zoom_level)
        .min()
        .unwrap_or(REFERENCE_ZOOM)
}

fn union(a: Rect, b: Rect) -> Rect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    Rect::new(
        x,
        y,
        a.right().max(b.right()).saturating_sub(x),
        a.bottom().max(b.bottom()).saturating_sub(y),
    )
}

fn element_rects(model: &Model) -> impl Iterator<Item = Rect> + '_ {
    model.nodes.iter().flat_map(|node| {
        std::iter::once(node.position)
            .chain(node.relations.iter().map(|relation| relation.position))
    })
}

/// Box covering every node and relation rectangle of one model; `None` for
/// a model without elements.
#[must_use]
pub fn model_bounds(model: &Model) -> Option<Rect> {
    element_rects(model).reduce(union)
}

/// Box covering every element of the given models.
#[must_use]
pub fn bounding_box(models: &[&Model]) -> Option<Rect> {
    models
        .iter()
        .filter_map(|model| model_bounds(model))
        .reduce(union)
}

/// Pairwise intersection test over model boxes. Models without elements
/// never overlap anything.
#[must_use]
pub fn overlap(a: &Model, b: &Model) -> bool {
    match (model_bounds(a), model_bounds(b)) {
        (Some(a), Some(b)) => a.overlaps(b),
        _ => false,
    }
}

/// Moves every element rectangle of the model by the same offset.
pub fn translate_model(model: &mut Model, dx: i32, dy: i32) {
    for node in &mut model.nodes {
        node.position = node.position.translated(dx, dy);
        for relation in &mut node.relations {
            relation.position = relation.position.translated(dx, dy);
        }
    }
}

pub fn align_models(models: &mut [Model]) -> AlignStats {
    align_models_with_padding(models, MODEL_PADDING)
}

pub fn align_models_with_config(models: &mut [Model], config: &EngineConfig) -> AlignStats {
    align_models_with_padding(models, config.model_padding)
}

/// Places every model that overlaps another one in a row to the right of an
/// anchor box, each vertically centered on it. The anchor is the combined box
/// of the non-overlapping models, or the first overlapping model when every
/// model overlaps. A layout without overlaps is left untouched.
pub fn align_models_with_padding(models: &mut [Model], padding: i32) -> AlignStats {
    let boxes: Vec<Option<Rect>> = models.iter().map(model_bounds).collect();
    let mut overlapping = Vec::new();
    let mut separate = Vec::new();

    for (index, bounds) in boxes.iter().enumerate() {
        let Some(bounds) = bounds else {
            continue;
        };
        let collides = boxes.iter().enumerate().any(|(other_index, other)| {
            other_index != index && other.is_some_and(|other| bounds.overlaps(other))
        });
        if collides {
            overlapping.push(index);
        } else {
            separate.push(index);
        }
    }

    let mut stats = AlignStats {
        model_count: models.len(),
        overlapping_count: overlapping.len(),
        moved_count: 0,
    };
    if overlapping.is_empty() {
        debug!(models = models.len(), "no overlapping models");
        return stats;
    }

    let anchor = if separate.is_empty() {
        if overlapping.len() < 2 {
            return stats;
        }
        boxes[overlapping.remove(0)]
    } else {
        separate
            .iter()
            .filter_map(|&index| boxes[index])
            .reduce(union)
    };
    let Some(anchor) = anchor else {
        return stats;
    };

    let center_y = anchor.y.saturating_add(anchor.height / 2);
    let mut next_x = anchor.right().saturating_add(padding);
    for index in overlapping {
        let Some(bounds) = boxes[index] else {
            continue;
        };
        let dx = next_x.saturating_sub(bounds.x);
        let dy = center_y.saturating_sub(bounds.y.saturating_add(bounds.height / 2));
        trace!(model = index, dx, dy, "moving model");
        translate_model(&mut models[index], dx, dy);
        next_x = bounds
            .right()
            .saturating_add(dx)
            .saturating_add(padding);
        stats.moved_count += 1;
    }

    debug!(
        models = stats.model_count,
        overlapping = stats.overlapping_count,
        moved = stats.moved_count,
        "aligned models"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcm_core::{Node, Relation};
    use proptest::prelude::*;

    fn model_at(id: &str, rect: Rect) -> Model {
        let mut node = Node::with_id(format!("{id}-node"));
        node.position = rect;
        let mut model = Model::with_id(id, REFERENCE_ZOOM);
        model.nodes.push(node);
        model
    }

    #[test]
    fn touching_unit_rects_do_not_overlap() {
        let a = model_at("a", Rect::new(10, 10, 1, 1));
        let b = model_at("b", Rect::new(11, 10, 1, 1));
        assert!(!overlap(&a, &b));
    }

    #[test]
    fn overlapping_small_rects_are_separated() {
        let mut models = vec![
            model_at("a", Rect::new(10, 10, 2, 1)),
            model_at("b", Rect::new(11, 10, 1, 1)),
        ];
        assert!(overlap(&models[0], &models[1]));

        let stats = align_models(&mut models);
        assert_eq!(stats.moved_count, 1);
        assert!(!overlap(&models[0], &models[1]));
        assert_eq!(models[0].nodes[0].position, Rect::new(10, 10, 2, 1));
        assert_eq!(models[1].nodes[0].position, Rect::new(62, 10, 1, 1));
    }

    #[test]
    fn all_overlapping_models_anchor_on_the_first() {
        let mut models = vec![
            model_at("a", Rect::new(110, 210, 50, 50)),
            model_at("b", Rect::new(100, 200, 50, 50)),
        ];
        align_models(&mut models);
        assert_eq!(models[0].nodes[0].position, Rect::new(110, 210, 50, 50));
        assert_eq!(models[1].nodes[0].position, Rect::new(210, 210, 50, 50));
    }

    #[test]
    fn overlapping_models_line_up_beside_separate_ones() {
        let mut models = vec![
            model_at("a", Rect::new(10, 10, 50, 50)),
            model_at("b", Rect::new(110, 210, 20, 20)),
            model_at("c", Rect::new(100, 200, 50, 50)),
        ];
        align_models(&mut models);
        assert_eq!(models[0].nodes[0].position, Rect::new(10, 10, 50, 50));
        assert_eq!(models[1].nodes[0].position, Rect::new(110, 25, 20, 20));
        assert_eq!(models[2].nodes[0].position, Rect::new(180, 10, 50, 50));
    }

    #[test]
    fn sub_unit_overlap_after_zoom_is_separated() {
        let mut models = vec![
            model_at("a", Rect::new(100, 100, 10, 10)),
            model_at("b", Rect::new(110, 100, 10, 10)),
        ];
        models[1].nodes[0].position = Rect::new(105, 100, 10, 10);
        align_models(&mut models);
        assert!(!overlap(&models[0], &models[1]));
        assert_eq!(models[1].nodes[0].position, Rect::new(160, 100, 10, 10));
    }

    #[test]
    fn non_overlapping_models_are_untouched() {
        let mut models = vec![
            model_at("a", Rect::new(10, 10, 1, 1)),
            model_at("b", Rect::new(100, 10, 1, 1)),
        ];
        let before = models.clone();
        let stats = align_models(&mut models);
        assert_eq!(stats.overlapping_count, 0);
        assert_eq!(models, before);
    }

    #[test]
    fn separate_models_form_the_anchor() {
        let mut models = vec![
            model_at("free", Rect::new(0, 0, 100, 40)),
            model_at("a", Rect::new(200, 0, 50, 50)),
            model_at("b", Rect::new(220, 10, 50, 50)),
        ];
        align_models_with_padding(&mut models, 10);

        assert_eq!(models[0].nodes[0].position, Rect::new(0, 0, 100, 40));
        assert_eq!(models[1].nodes[0].position, Rect::new(110, -5, 50, 50));
        assert_eq!(models[2].nodes[0].position, Rect::new(170, -5, 50, 50));
    }

    #[test]
    fn translate_moves_relations_with_nodes() {
        let mut model = model_at("a", Rect::new(0, 0, 10, 10));
        let mut relation = Relation::to_target("x");
        relation.position = Rect::new(5, 5, 20, 20);
        model.nodes[0].relations.push(relation);

        assert_eq!(model_bounds(&model), Some(Rect::new(0, 0, 25, 25)));
        translate_model(&mut model, 3, -2);
        assert_eq!(model.nodes[0].position, Rect::new(3, -2, 10, 10));
        assert_eq!(model.nodes[0].relations[0].position, Rect::new(8, 3, 20, 20));
    }

    #[test]
    fn bounding_box_spans_models() {
        let a = model_at("a", Rect::new(10, 20, 5, 5));
        let b = model_at("b", Rect::new(-5, 40, 10, 10));
        let empty = Model::with_id("empty", REFERENCE_ZOOM);
        assert_eq!(
            bounding_box(&[&a, &b, &empty]),
            Some(Rect::new(-5, 20, 20, 30))
        );
        assert_eq!(bounding_box(&[&empty]), None);
    }

    #[test]
    fn coordinates_scale_with_zoom() {
        assert_eq!(normalize_coordinate(100, 10), 100);
        assert_eq!(normalize_coordinate(100, 5), 200);
        assert_eq!(normalize_coordinate(100, 20), 50);
        assert_eq!(denormalize_coordinate(200, 5), 100);
        assert_eq!(normalize_coordinate(15, 20), 8);
        assert_eq!(normalize_coordinate(-15, 20), -7);
        assert_eq!(normalize_coordinate(42, 0), 42);
    }

    #[test]
    fn model_normalization_updates_zoom_level() {
        let mut model = model_at("a", Rect::new(10, 20, 30, 40));
        model.zoom_level = 5;
        normalize_model(&mut model);
        assert_eq!(model.zoom_level, REFERENCE_ZOOM);
        assert_eq!(model.nodes[0].position, Rect::new(20, 40, 60, 80));

        denormalize_model(&mut model, 5);
        assert_eq!(model.zoom_level, 5);
        assert_eq!(model.nodes[0].position, Rect::new(10, 20, 30, 40));
    }

    #[test]
    fn export_zoom_prefers_smallest() {
        let mut a = Model::with_id("a", 12);
        let b = Model::with_id("b", 7);
        assert_eq!(export_zoom_level(&[a.clone(), b]), 7);
        a.zoom_level = 15;
        assert_eq!(export_zoom_level(&[a]), 15);
        assert_eq!(export_zoom_level(&[]), REFERENCE_ZOOM);
    }

    #[test]
    fn models_at_the_integer_limit_align_without_overflow() {
        let mut models = vec![
            model_at("a", Rect::new(i32::MAX - 1000, 0, 1000, 10)),
            model_at("b", Rect::new(i32::MAX - 500, 0, 500, 10)),
        ];
        let stats = align_models(&mut models);
        assert_eq!(stats.overlapping_count, 2);
        assert_eq!(stats.moved_count, 1);
        assert_eq!(models[1].nodes[0].position.x, i32::MAX);
        assert!(bounding_box(&[&models[0], &models[1]]).is_some());
    }

    fn rect_strategy() -> impl Strategy<Value = Rect> {
        (0..500_i32, 0..500_i32, 1..120_i32, 1..120_i32)
            .prop_map(|(x, y, width, height)| Rect::new(x, y, width, height))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_align_leaves_no_overlaps(rects in prop::collection::vec(rect_strategy(), 1..8)) {
            let mut models: Vec<Model> = rects
                .iter()
                .enumerate()
                .map(|(index, rect)| model_at(&format!("m{index}"), *rect))
                .collect();
            align_models(&mut models);

            for (i, a) in models.iter().enumerate() {
                for b in models.iter().skip(i + 1) {
                    prop_assert!(!overlap(a, b));
                }
            }
        }

        #[test]
        fn prop_align_preserves_sizes(rects in prop::collection::vec(rect_strategy(), 1..8)) {
            let mut models: Vec<Model> = rects
                .iter()
                .enumerate()
                .map(|(index, rect)| model_at(&format!("m{index}"), *rect))
                .collect();
            align_models(&mut models);

            for (model, rect) in models.iter().zip(&rects) {
                prop_assert_eq!(model.nodes[0].position.width, rect.width);
                prop_assert_eq!(model.nodes[0].position.height, rect.height);
            }
        }
    }
}

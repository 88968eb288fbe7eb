//! Color-operator rewriting inside decoded content streams.
//!
//! Operates on `lopdf::content::Content`, where operands already arrive
//! grouped under their operator. Color-setting operators get their numeric
//! operands transformed in place; every other operation passes through
//! untouched, so operator order and arity are preserved exactly.

use lopdf::content::{Content, Operation};
use lopdf::Object;

use crate::color;
use crate::InvertMode;

/// Operators that set the current fill or stroke color.
fn is_color_operator(name: &str) -> bool {
    matches!(
        name,
        "g" | "G" | "rg" | "RG" | "k" | "K" | "sc" | "SC" | "scn" | "SCN"
    )
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(n) => Some(*n as f32),
        Object::Real(n) => Some(*n),
        _ => None,
    }
}

fn numeric_indices(ops: &[Object]) -> Vec<usize> {
    ops.iter()
        .enumerate()
        .filter(|(_, obj)| as_number(obj).is_some())
        .map(|(i, _)| i)
        .collect()
}

/// Rewrite every color-setting operator in `content` under `mode`.
pub fn rewrite_content(content: &mut Content, mode: InvertMode) {
    for op in &mut content.operations {
        if is_color_operator(op.operator.as_str()) {
            invert_operands(op.operator.as_str(), &mut op.operands, mode);
        }
    }
}

fn invert_operands(name: &str, ops: &mut [Object], mode: InvertMode) {
    match name {
        "g" | "G" => invert_gray_operand(ops, mode),
        "rg" | "RG" => invert_rgb_operands(ops, mode),
        "k" | "K" => invert_cmyk_operands(ops, mode),
        // sc / SC / scn / SCN carry a variable operand count that depends
        // on the current color space. Interpreting cs/CS correctly needs a
        // full graphics-state simulator, so classify by numeric arity
        // instead, which holds for the device color spaces in practice.
        _ => match numeric_indices(ops).len() {
            1 => invert_gray_operand(ops, mode),
            3 => invert_rgb_operands(ops, mode),
            4 => invert_cmyk_operands(ops, mode),
            _ => {
                // Unknown color space: best-effort inversion of every
                // numeric operand, pattern names kept in place.
                for obj in ops.iter_mut() {
                    if let Some(v) = as_number(obj) {
                        *obj = Object::Real(color::clamp01(1.0 - v));
                    }
                }
            }
        },
    }
}

/// One gray component. A trailing pattern name (`scn`) is skipped over.
fn invert_gray_operand(ops: &mut [Object], mode: InvertMode) {
    let Some(&i) = numeric_indices(ops).last() else {
        return;
    };
    let gray = as_number(&ops[i]).unwrap_or(0.0);
    ops[i] = Object::Real(color::invert_gray(mode, gray));
}

fn invert_rgb_operands(ops: &mut [Object], mode: InvertMode) {
    let idx = numeric_indices(ops);
    if idx.len() < 3 {
        return;
    }
    let r = as_number(&ops[idx[0]]).unwrap_or(0.0);
    let g = as_number(&ops[idx[1]]).unwrap_or(0.0);
    let b = as_number(&ops[idx[2]]).unwrap_or(0.0);

    let out = color::invert_rgb(mode, r, g, b);
    for (slot, value) in idx.into_iter().zip(out) {
        ops[slot] = Object::Real(value);
    }
}

fn invert_cmyk_operands(ops: &mut [Object], mode: InvertMode) {
    let idx = numeric_indices(ops);
    if idx.len() < 4 {
        return;
    }
    let c = as_number(&ops[idx[0]]).unwrap_or(0.0);
    let m = as_number(&ops[idx[1]]).unwrap_or(0.0);
    let y = as_number(&ops[idx[2]]).unwrap_or(0.0);
    let k = as_number(&ops[idx[3]]).unwrap_or(0.0);

    let out = color::invert_cmyk(mode, c, m, y, k);
    for (slot, value) in idx.into_iter().zip(out) {
        ops[slot] = Object::Real(value);
    }
}

/// Background rectangle color and inverted-default ink for a mode.
fn prelude_colors(mode: InvertMode) -> ([f32; 3], [f32; 3]) {
    match mode {
        InvertMode::Custom => (color::CUSTOM_BG, color::CUSTOM_FG),
        // Inverted white paper is black, inverted black ink is white.
        _ => ([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
    }
}

/// Prepend the background fill and the inverted default color state.
///
/// PDF's implicit initial fill and stroke are both black, and many streams
/// never emit a color operator for body text because black is the default.
/// After painting the dark background rectangle such text would vanish, so
/// the prelude also sets fill and stroke to the inverted default. The
/// rectangle fill is bracketed in q/Q to keep it out of the following
/// graphics state.
pub fn prepend_background(content: &mut Content, media_box: [f32; 4], mode: InvertMode) {
    let (bg, fg) = prelude_colors(mode);
    let [x, y, w, h] = media_box;

    let reals = |values: &[f32]| -> Vec<Object> {
        values.iter().map(|&v| Object::Real(v)).collect()
    };

    let mut prelude = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", reals(&bg)),
        Operation::new("re", reals(&[x, y, w, h])),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
        Operation::new("rg", reals(&fg)),
        Operation::new("RG", reals(&fg)),
    ];

    prelude.append(&mut content.operations);
    content.operations = prelude;
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn content_of(ops: Vec<Operation>) -> Content {
        Content { operations: ops }
    }

    fn reals(values: &[f32]) -> Vec<Object> {
        values.iter().map(|&v| Object::Real(v)).collect()
    }

    fn numbers(op: &Operation) -> Vec<f32> {
        op.operands.iter().filter_map(as_number).collect()
    }

    fn assert_numbers(op: &Operation, expected: &[f32]) {
        let got = numbers(op);
        assert_eq!(got.len(), expected.len(), "arity changed for {}", op.operator);
        for (g, e) in got.iter().zip(expected) {
            assert!((g - e).abs() < EPS, "{}: {:?} != {:?}", op.operator, got, expected);
        }
    }

    #[test]
    fn full_inverts_rg_operands() {
        let mut content = content_of(vec![Operation::new("rg", reals(&[0.8, 0.2, 0.1]))]);
        rewrite_content(&mut content, InvertMode::Full);
        assert_numbers(&content.operations[0], &[0.2, 0.8, 0.9]);
    }

    #[test]
    fn grayscale_inverts_gray_operand() {
        let mut content = content_of(vec![Operation::new("g", reals(&[0.6]))]);
        rewrite_content(&mut content, InvertMode::Grayscale);
        assert_numbers(&content.operations[0], &[0.4]);
    }

    #[test]
    fn sc_with_three_numbers_is_treated_as_rgb() {
        let mut content = content_of(vec![Operation::new(
            "sc",
            vec![Object::Integer(1), Object::Integer(1), Object::Integer(1)],
        )]);
        rewrite_content(&mut content, InvertMode::Full);
        assert_numbers(&content.operations[0], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn scn_gray_skips_trailing_pattern_name() {
        let mut content = content_of(vec![Operation::new(
            "scn",
            vec![Object::Real(0.25), Object::Name(b"P1".to_vec())],
        )]);
        rewrite_content(&mut content, InvertMode::Full);

        let op = &content.operations[0];
        assert_numbers(op, &[0.75]);
        assert!(matches!(&op.operands[1], Object::Name(n) if n == b"P1"));
    }

    #[test]
    fn scn_unknown_arity_inverts_each_numeric() {
        let mut content = content_of(vec![Operation::new("scn", reals(&[0.2, 0.9]))]);
        rewrite_content(&mut content, InvertMode::Full);
        assert_numbers(&content.operations[0], &[0.8, 0.1]);
    }

    #[test]
    fn k_round_trips_through_rgb() {
        // Pure black ink becomes no ink.
        let mut content = content_of(vec![Operation::new("K", reals(&[0.0, 0.0, 0.0, 1.0]))]);
        rewrite_content(&mut content, InvertMode::Full);
        assert_numbers(&content.operations[0], &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn non_color_operators_pass_through() {
        let mut content = content_of(vec![
            Operation::new("cm", reals(&[2.0, 0.0, 0.0, 2.0, 10.0, 10.0])),
            Operation::new("w", reals(&[0.5])),
        ]);
        rewrite_content(&mut content, InvertMode::Full);
        assert_numbers(&content.operations[0], &[2.0, 0.0, 0.0, 2.0, 10.0, 10.0]);
        assert_numbers(&content.operations[1], &[0.5]);
    }

    #[test]
    fn double_full_rewrite_restores_operands() {
        let mut content = content_of(vec![
            Operation::new("rg", reals(&[0.8, 0.2, 0.1])),
            Operation::new("G", reals(&[0.3])),
        ]);
        rewrite_content(&mut content, InvertMode::Full);
        rewrite_content(&mut content, InvertMode::Full);
        assert_numbers(&content.operations[0], &[0.8, 0.2, 0.1]);
        assert_numbers(&content.operations[1], &[0.3]);
    }

    #[test]
    fn prelude_sequence_and_colors() {
        let mut content = content_of(vec![Operation::new("BT", vec![])]);
        prepend_background(&mut content, [0.0, 0.0, 612.0, 792.0], InvertMode::Full);

        let operators: Vec<&str> = content
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect();
        assert_eq!(operators, vec!["q", "rg", "re", "f", "Q", "rg", "RG", "BT"]);

        // Background is black, inverted default ink is white.
        assert_numbers(&content.operations[1], &[0.0, 0.0, 0.0]);
        assert_numbers(&content.operations[2], &[0.0, 0.0, 612.0, 792.0]);
        assert_numbers(&content.operations[5], &[1.0, 1.0, 1.0]);
        assert_numbers(&content.operations[6], &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn custom_prelude_uses_palette() {
        let mut content = content_of(vec![]);
        prepend_background(&mut content, [0.0, 0.0, 100.0, 100.0], InvertMode::Custom);

        assert_numbers(
            &content.operations[1],
            &[42.0 / 255.0, 42.0 / 255.0, 42.0 / 255.0],
        );
        assert_numbers(
            &content.operations[5],
            &[232.0 / 255.0, 232.0 / 255.0, 232.0 / 255.0],
        );
    }
}

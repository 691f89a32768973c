//! Renders an instruction trace as a multiline UTF-8 circuit diagram:
//! a layered layout over a glyph grid, with a merge lattice resolving
//! overlapping box corners, control lines, and wires.

use crate::trace::Trace;

/// Output wraps once the accumulated width reaches this many columns.
const MAX_COLUMNS: usize = 80;

// Logical glyph alphabet. Grid cells hold one of these or a plain ASCII
// byte, which renders as itself.
const WIRE_LINE: u8 = 0; // ─
const CONTROL_LINE: u8 = 1; // │
const WIRE_CONTROL_CROSS: u8 = 2; // ┼
const CONTROL: u8 = 3; // ●
const BOX_LEFT_WIRE: u8 = 4; // ┤
const BOX_RIGHT_WIRE: u8 = 5; // ├
const BOX_TOP_CONTROL: u8 = 6; // ┴
const BOX_BOTTOM_CONTROL: u8 = 7; // ┬
const BOX_TOP_LEFT_CORNER: u8 = 8; // ╭
const BOX_TOP_RIGHT_CORNER: u8 = 9; // ╮
const BOX_BOTTOM_LEFT_CORNER: u8 = 10; // ╰
const BOX_BOTTOM_RIGHT_CORNER: u8 = 11; // ╯
const SWAP_X: u8 = 12; // ╳

fn render_cell(cell: u8) -> Option<&'static str> {
    match cell {
        WIRE_LINE => Some("─"),
        CONTROL_LINE => Some("│"),
        WIRE_CONTROL_CROSS => Some("┼"),
        CONTROL => Some("●"),
        BOX_LEFT_WIRE => Some("┤"),
        BOX_RIGHT_WIRE => Some("├"),
        BOX_TOP_CONTROL => Some("┴"),
        BOX_BOTTOM_CONTROL => Some("┬"),
        BOX_TOP_LEFT_CORNER => Some("╭"),
        BOX_TOP_RIGHT_CORNER => Some("╮"),
        BOX_BOTTOM_LEFT_CORNER => Some("╰"),
        BOX_BOTTOM_RIGHT_CORNER => Some("╯"),
        SWAP_X => Some("╳"),
        _ => None,
    }
}

fn render_cells(cells: &[u8], out: &mut String) {
    for &cell in cells {
        match render_cell(cell) {
            Some(glyph) => out.push_str(glyph),
            None => out.push(char::from(cell)),
        }
    }
}

/// Deterministically combines the glyph already in a cell with an incoming
/// one.
fn merge_cells(cell: &mut u8, incoming: u8) {
    if *cell == incoming {
        return;
    }
    if *cell == b' ' {
        *cell = incoming;
        return;
    }

    if incoming == CONTROL_LINE {
        match *cell {
            CONTROL | WIRE_CONTROL_CROSS => {}
            WIRE_LINE => *cell = WIRE_CONTROL_CROSS,
            _ => *cell = CONTROL_LINE,
        }
        return;
    }

    let (low, high) = if *cell > incoming {
        (incoming, *cell)
    } else {
        (*cell, incoming)
    };
    if low == WIRE_LINE {
        match high {
            BOX_TOP_LEFT_CORNER | BOX_TOP_RIGHT_CORNER => {
                *cell = BOX_BOTTOM_CONTROL;
                return;
            }
            BOX_BOTTOM_LEFT_CORNER | BOX_BOTTOM_RIGHT_CORNER => {
                *cell = BOX_TOP_CONTROL;
                return;
            }
            _ => {}
        }
    }
    if low == BOX_TOP_LEFT_CORNER && high == BOX_BOTTOM_LEFT_CORNER {
        *cell = BOX_RIGHT_WIRE;
        return;
    }
    if low == BOX_TOP_RIGHT_CORNER && high == BOX_BOTTOM_RIGHT_CORNER {
        *cell = BOX_LEFT_WIRE;
        return;
    }
    *cell = high;
}

/// The glyph grid. Wire `w` lives on row `2w + 1`; even rows are spacing.
struct Diagram {
    num_qudits: usize,
    height: usize,
    rows: Vec<Vec<u8>>,
}

impl Diagram {
    fn new(num_qudits: usize) -> Self {
        Self {
            num_qudits,
            height: 2 * num_qudits + 1,
            rows: Vec::new(),
        }
    }

    fn set_width(&mut self, width: usize) {
        self.rows = vec![vec![b' '; width]; self.height];
        for wire in 0..self.num_qudits {
            self.rows[2 * wire + 1].fill(WIRE_LINE);
        }
    }

    fn to_row(&self, wire: usize) -> usize {
        if wire < self.num_qudits {
            2 * wire + 1
        } else {
            self.height - 2
        }
    }

    fn set(&mut self, row: usize, col: usize, glyph: u8) {
        self.rows[row][col] = glyph;
    }

    fn merge(&mut self, row: usize, col: usize, glyph: u8) {
        merge_cells(&mut self.rows[row][col], glyph);
    }
}

#[derive(Clone, Copy)]
enum Shape {
    /// Controls drawn inside the box; used when a control sits strictly
    /// between two target wires.
    Box,
    /// Controls project vertically onto the nearest box edge.
    ControlledBox,
    Swap,
}

#[derive(Clone, Copy)]
struct Frame {
    top: usize,
    mid: usize,
    bot: usize,
}

struct Operator {
    shape: Shape,
    label: String,
    /// Sorted targets first, then controls in trace order.
    wires: Vec<usize>,
    num_targets: usize,
    num_controls: usize,
    left_col: usize,
    right_col: usize,
}

impl Operator {
    fn width(&self) -> usize {
        match self.shape {
            Shape::Box => self.label.len() + 2 + usize::from(self.num_controls > 0),
            Shape::ControlledBox => self.label.len() + 2,
            Shape::Swap => 3,
        }
    }

    fn set_cols(&mut self, left_col: usize) {
        self.left_col = left_col;
        self.right_col = left_col + self.width() - 1;
    }

    fn targets(&self) -> &[usize] {
        &self.wires[..self.num_targets]
    }

    fn controls(&self) -> &[usize] {
        &self.wires[self.num_targets..]
    }

    fn frame(&self, diagram: &Diagram, top_wire: usize, bot_wire: usize) -> Frame {
        let top = diagram.to_row(top_wire) - 1;
        let bot = diagram.to_row(bot_wire) + 1;
        Frame {
            top,
            mid: (top + bot) / 2,
            bot,
        }
    }

    fn draw(&self, diagram: &mut Diagram) {
        match self.shape {
            Shape::Box => {
                let top_wire = self.wires.iter().copied().min().unwrap_or(0);
                let bot_wire = self.wires.iter().copied().max().unwrap_or(0);
                let frame = self.frame(diagram, top_wire, bot_wire);
                self.draw_box(diagram, frame);
                self.draw_targets(diagram);
                self.draw_inline_controls(diagram);
                let start = self.left_col + 1 + usize::from(self.num_controls > 0);
                self.draw_label(diagram, frame.mid, start);
            }
            Shape::ControlledBox => {
                let top_wire = self.targets().iter().copied().min().unwrap_or(0);
                let bot_wire = self.targets().iter().copied().max().unwrap_or(0);
                let frame = self.frame(diagram, top_wire, bot_wire);
                self.draw_box(diagram, frame);
                self.draw_targets(diagram);
                self.draw_stem_controls(diagram, frame);
                self.draw_label(diagram, frame.mid, self.left_col + 1);
            }
            Shape::Swap => self.draw_swap(diagram),
        }
    }

    fn draw_box(&self, diagram: &mut Diagram, frame: Frame) {
        for col in self.left_col + 1..self.right_col {
            diagram.merge(frame.top, col, WIRE_LINE);
            diagram.merge(frame.bot, col, WIRE_LINE);
        }
        for row in frame.top + 1..frame.bot {
            diagram.set(row, self.left_col, CONTROL_LINE);
            diagram.set(row, self.right_col, CONTROL_LINE);
            for col in self.left_col + 1..self.right_col {
                diagram.set(row, col, b' ');
            }
        }
        diagram.merge(frame.top, self.left_col, BOX_TOP_LEFT_CORNER);
        diagram.merge(frame.bot, self.left_col, BOX_BOTTOM_LEFT_CORNER);
        diagram.merge(frame.top, self.right_col, BOX_TOP_RIGHT_CORNER);
        diagram.merge(frame.bot, self.right_col, BOX_BOTTOM_RIGHT_CORNER);
    }

    fn draw_targets(&self, diagram: &mut Diagram) {
        for &wire in self.targets() {
            let row = diagram.to_row(wire);
            diagram.set(row, self.left_col, BOX_LEFT_WIRE);
            diagram.set(row, self.right_col, BOX_RIGHT_WIRE);
            if self.num_controls > 0 {
                diagram.set(row, self.left_col + 1, b'>');
            }
        }
    }

    fn draw_inline_controls(&self, diagram: &mut Diagram) {
        for &wire in self.controls() {
            let row = diagram.to_row(wire);
            diagram.set(row, self.left_col, BOX_LEFT_WIRE);
            diagram.set(row, self.left_col + 1, CONTROL);
            diagram.set(row, self.right_col, BOX_RIGHT_WIRE);
        }
    }

    fn draw_stem_controls(&self, diagram: &mut Diagram, frame: Frame) {
        let mid_col = (self.left_col + self.right_col) / 2;
        for &wire in self.controls() {
            let row = diagram.to_row(wire);
            diagram.set(row, mid_col, CONTROL);
            if row < frame.top {
                for r in row + 1..frame.top {
                    diagram.merge(r, mid_col, CONTROL_LINE);
                }
                diagram.set(frame.top, mid_col, BOX_TOP_CONTROL);
            } else {
                for r in frame.bot + 1..row {
                    diagram.merge(r, mid_col, CONTROL_LINE);
                }
                diagram.set(frame.bot, mid_col, BOX_BOTTOM_CONTROL);
            }
        }
    }

    fn draw_label(&self, diagram: &mut Diagram, row: usize, start: usize) {
        for (i, byte) in self.label.bytes().enumerate() {
            diagram.set(row, start + i, byte);
        }
    }

    fn draw_swap(&self, diagram: &mut Diagram) {
        let mid_col = self.left_col + 1;
        let row0 = diagram.to_row(self.wires[0]);
        let row1 = diagram.to_row(self.wires[1]);
        diagram.set(row0, mid_col, SWAP_X);
        for r in row0 + 1..row1 {
            diagram.merge(r, mid_col, CONTROL_LINE);
        }
        diagram.set(row1, mid_col, SWAP_X);
        for &wire in self.controls() {
            let row = diagram.to_row(wire);
            diagram.set(row, mid_col, CONTROL);
            if row < row0 {
                for r in row + 1..row0 {
                    diagram.merge(r, mid_col, CONTROL_LINE);
                }
            } else {
                for r in row1 + 1..row {
                    diagram.merge(r, mid_col, CONTROL_LINE);
                }
            }
        }
    }
}

/// Formats a gate parameter at four significant digits: fixed point for
/// moderate magnitudes, scientific otherwise, trailing zeros trimmed but at
/// least one fractional digit kept.
fn format_parameter(value: f64) -> String {
    if value == 0.0 {
        return String::from("0.0");
    }
    if !value.is_finite() {
        return format!("{value}");
    }
    let exponent = value.abs().log10().floor() as i32;
    if (-4..4).contains(&exponent) {
        let decimals = (3 - exponent).max(0) as usize;
        trim_zeros(format!("{value:.decimals$}"))
    } else {
        let rendered = format!("{value:.3e}");
        match rendered.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{exp}", trim_zeros(mantissa.to_string())),
            None => rendered,
        }
    }
}

fn trim_zeros(mut text: String) -> String {
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.push('0');
        }
        text
    } else {
        text.push_str(".0");
        text
    }
}

/// Renders the trace as a circuit diagram. Returns `<empty trace>` for an
/// empty input.
#[must_use]
pub fn draw(trace: &Trace) -> String {
    if trace.is_empty() {
        return String::from("<empty trace>");
    }

    let mut diagram = Diagram::new(trace.num_qudits());

    // Split instructions into layers: entries whose wire spans overlap can
    // never share a diagram column.
    let mut operators: Vec<Operator> = Vec::new();
    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut layer_width: Vec<usize> = Vec::new();
    let mut wire_layer: Vec<isize> = vec![-1; trace.num_qudits()];

    for inst in trace {
        let mut wires: Vec<usize> = inst.targets.iter().map(|q| q.id).collect();
        wires.sort_unstable();
        let (Some(&min_target), Some(&max_target)) = (wires.first(), wires.last()) else {
            log::warn!("instruction `{}` has no targets, skipping", inst.name);
            continue;
        };
        let mut min_dwire = min_target;
        let mut max_dwire = max_target;

        let mut overlap = false;
        for control in inst.controls.iter().map(|q| q.id) {
            wires.push(control);
            if control > min_target && control < max_target {
                overlap = true;
            }
            min_dwire = min_dwire.min(control);
            max_dwire = max_dwire.max(control);
        }

        let name = if inst.params.is_empty() {
            inst.name.clone()
        } else {
            let params: Vec<String> = inst.params.iter().copied().map(format_parameter).collect();
            format!("{}({})", inst.name, params.join(","))
        };
        let label = format!(" {name} ");

        let num_targets = inst.targets.len();
        let shape = if overlap {
            Shape::Box
        } else if name == "swap" && num_targets == 2 {
            Shape::Swap
        } else {
            Shape::ControlledBox
        };
        let mut operator = Operator {
            shape,
            label,
            wires,
            num_targets,
            num_controls: inst.controls.len(),
            left_col: 0,
            right_col: 0,
        };

        let mut layer: isize = -1;
        for wire in min_dwire..=max_dwire {
            layer = layer.max(wire_layer[wire]);
        }
        let layer = usize::try_from(layer + 1).unwrap_or(0);
        if layer == layers.len() {
            layers.push(Vec::new());
            layer_width.push(0);
        }
        layers[layer].push(operators.len());
        for wire in min_dwire..=max_dwire {
            wire_layer[wire] = layer as isize;
        }
        layer_width[layer] = layer_width[layer].max(operator.width());
        operator.set_cols(0);
        operators.push(operator);
    }

    // Wire labels, right-aligned to the widest.
    let mut prefix = vec![String::new(); diagram.height];
    let mut prefix_size = 0;
    for wire in 0..trace.num_qudits() {
        let row = diagram.to_row(wire);
        prefix[row] = format!("q{wire} : ");
        prefix_size = prefix_size.max(prefix[row].len());
    }

    // Column assignment and wrap points.
    let mut curr_width = 0;
    let mut acc_width = prefix_size;
    let mut cutting_points: Vec<usize> = Vec::new();
    for (layer, members) in layers.iter().enumerate() {
        for &index in members {
            let width = operators[index].width();
            operators[index].set_cols(curr_width + (layer_width[layer] - width) / 2);
        }
        if acc_width + layer_width[layer] >= MAX_COLUMNS - 1 {
            cutting_points.push(curr_width);
            acc_width = 0;
        }
        curr_width += layer_width[layer];
        acc_width += layer_width[layer];
    }
    cutting_points.push(curr_width);
    diagram.set_width(curr_width);

    for operator in &operators {
        operator.draw(&mut diagram);
    }

    let mut out = String::with_capacity(curr_width * diagram.height * 4);
    let mut start = 0;
    for (segment, &cut) in cutting_points.iter().enumerate() {
        if segment > 0 {
            out.push('\n');
            for _ in 0..MAX_COLUMNS {
                out.push('#');
            }
            out.push_str("\n\n");
        }
        for row in 0..diagram.height {
            if segment == 0 {
                out.push_str(&format!("{:>width$}", prefix[row], width = prefix_size));
            }
            render_cells(&diagram.rows[row][start..cut], &mut out);
            if segment + 1 < cutting_points.len() {
                out.push('»');
            }
            out.push('\n');
        }
        start = cut;
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    use crate::trace::{Instruction, QuditInfo};

    use super::*;

    fn gate(name: &str, targets: &[usize]) -> Instruction {
        Instruction::new(
            name,
            vec![],
            vec![],
            targets.iter().map(|&id| QuditInfo::qubit(id)).collect(),
        )
    }

    fn controlled(name: &str, controls: &[usize], targets: &[usize]) -> Instruction {
        Instruction::new(
            name,
            vec![],
            controls.iter().map(|&id| QuditInfo::qubit(id)).collect(),
            targets.iter().map(|&id| QuditInfo::qubit(id)).collect(),
        )
    }

    #[test]
    fn empty_trace_renders_placeholder() {
        assert_eq!(draw(&Trace::new()), "<empty trace>");
    }

    #[test]
    fn bell_pair_with_swap_renders_exactly() {
        let mut trace = Trace::new();
        trace.push(gate("h", &[0]));
        trace.push(controlled("x", &[0], &[1]));
        trace.push(gate("swap", &[0, 1]));

        let expected = concat!(
            "     ╭───╮        \n",
            "q0 : ┤ h ├──●───╳─\n",
            "     ╰───╯╭─┴─╮ │ \n",
            "q1 : ─────┤ x ├─╳─\n",
            "          ╰───╯   \n",
        );
        assert_eq!(draw(&trace), expected);
    }

    #[test]
    fn segment_has_expected_line_count() {
        let mut trace = Trace::new();
        trace.push(gate("h", &[0]));
        trace.push(gate("h", &[2]));
        let rendered = draw(&trace);
        // 2Q + 1 rows, each newline terminated.
        assert_eq!(rendered.lines().count(), 7);
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn overlapping_spans_never_share_a_layer() {
        let mut trace = Trace::new();
        trace.push(controlled("x", &[0], &[2]));
        trace.push(gate("x", &[1]));
        let rendered = draw(&trace);
        // Both boxes are 5 wide; disjoint layers make every line
        // prefix + 10 columns.
        for line in rendered.lines() {
            assert_eq!(line.chars().count(), 5 + 10, "bad line: {line:?}");
        }
    }

    #[test]
    fn control_between_targets_draws_a_plain_box() {
        let mut trace = Trace::new();
        trace.push(controlled("zz", &[1], &[0, 2]));
        let rendered = draw(&trace);
        // The control sits inside the box, marked on target wires.
        assert!(rendered.contains('●'), "no control dot:\n{rendered}");
        assert!(rendered.contains('>'), "no target marker:\n{rendered}");
    }

    #[test]
    fn controlled_swap_attaches_a_stem() {
        let mut trace = Trace::new();
        trace.push(controlled("swap", &[2], &[0, 1]));
        let rendered = draw(&trace);
        assert_eq!(rendered.matches('╳').count(), 2, "bad swap:\n{rendered}");
        assert_eq!(rendered.matches('●').count(), 1, "bad control:\n{rendered}");
        assert!(rendered.contains('│'), "no stem:\n{rendered}");
    }

    #[test]
    fn parameters_join_inside_the_label() {
        let mut trace = Trace::new();
        trace.push(Instruction::new(
            "rx",
            vec![std::f64::consts::FRAC_PI_2],
            vec![],
            vec![QuditInfo::qubit(0)],
        ));
        let rendered = draw(&trace);
        assert!(rendered.contains("rx(1.571)"), "bad label:\n{rendered}");
    }

    #[test]
    fn wide_circuits_wrap_with_a_rule() {
        let mut trace = Trace::new();
        for _ in 0..20 {
            trace.push(gate("h", &[0]));
        }
        let rendered = draw(&trace);
        let continuation_rows = rendered.lines().filter(|l| l.ends_with('»')).count();
        // One qubit: three rows per segment, every pre-wrap row marked.
        assert_eq!(continuation_rows, 3, "bad wrap:\n{rendered}");
        let rule = "#".repeat(80);
        assert!(
            rendered.lines().any(|l| l == rule),
            "missing segment rule:\n{rendered}"
        );
        // The label prefix appears only in the first segment.
        assert_eq!(rendered.matches("q0 : ").count(), 1);
    }

    #[rstest]
    #[case(SWAP_X, SWAP_X, SWAP_X)]
    #[case(b' ', SWAP_X, SWAP_X)]
    #[case(WIRE_LINE, CONTROL_LINE, WIRE_CONTROL_CROSS)]
    #[case(CONTROL, CONTROL_LINE, CONTROL)]
    #[case(WIRE_CONTROL_CROSS, CONTROL_LINE, WIRE_CONTROL_CROSS)]
    #[case(BOX_TOP_LEFT_CORNER, CONTROL_LINE, CONTROL_LINE)]
    #[case(WIRE_LINE, BOX_TOP_LEFT_CORNER, BOX_BOTTOM_CONTROL)]
    #[case(BOX_TOP_RIGHT_CORNER, WIRE_LINE, BOX_BOTTOM_CONTROL)]
    #[case(WIRE_LINE, BOX_BOTTOM_RIGHT_CORNER, BOX_TOP_CONTROL)]
    #[case(BOX_TOP_LEFT_CORNER, BOX_BOTTOM_LEFT_CORNER, BOX_RIGHT_WIRE)]
    #[case(BOX_TOP_RIGHT_CORNER, BOX_BOTTOM_RIGHT_CORNER, BOX_LEFT_WIRE)]
    #[case(CONTROL, SWAP_X, SWAP_X)]
    fn merge_lattice(#[case] current: u8, #[case] incoming: u8, #[case] expected: u8) {
        let mut cell = current;
        merge_cells(&mut cell, incoming);
        assert_eq!(cell, expected);
    }

    #[rstest]
    #[case(0.0, "0.0")]
    #[case(1.0, "1.0")]
    #[case(0.5, "0.5")]
    #[case(3.14159, "3.142")]
    #[case(1234.0, "1234.0")]
    #[case(0.000123, "0.000123")]
    #[case(123456.0, "1.235e5")]
    fn parameter_formatting(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_parameter(value), expected);
    }
}

use serde::{Deserialize, Serialize};

/// One straight piece of a contour in plane coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: [f64; 2],
    pub end: [f64; 2],
}

/// Zero-level contour of a sampled scalar field by marching squares.
///
/// `value(i, j)` is the sample at `(x[j], y[i])`. The axes need not be uniform.
pub fn zero_contour(x: &[f64], y: &[f64], value: impl Fn(usize, usize) -> f64) -> Vec<Segment> {
    let nx = x.len();
    let ny = y.len();
    let mut segments = Vec::new();

    for iy in 0..ny.saturating_sub(1) {
        let (y0, y1) = (y[iy], y[iy + 1]);
        for ix in 0..nx.saturating_sub(1) {
            let (x0, x1) = (x[ix], x[ix + 1]);
            let cell = Cell {
                x0,
                x1,
                y0,
                y1,
                v: [
                    value(iy, ix),
                    value(iy, ix + 1),
                    value(iy + 1, ix + 1),
                    value(iy + 1, ix),
                ],
            };
            if cell.v.iter().any(|v| !v.is_finite()) {
                continue;
            }

            let mut case_index = 0u8;
            for (corner, v) in cell.v.iter().enumerate() {
                if *v >= 0.0 {
                    case_index |= 1 << corner;
                }
            }

            for &(edge_a, edge_b) in marching_squares_edge_pairs(case_index) {
                segments.push(Segment {
                    start: cell.edge_crossing(edge_a),
                    end: cell.edge_crossing(edge_b),
                });
            }
        }
    }

    segments
}

/// Corners are numbered counter-clockwise from (x0, y0); edge k joins corner k and k+1.
struct Cell {
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    v: [f64; 4],
}

impl Cell {
    fn edge_crossing(&self, edge: u8) -> [f64; 2] {
        let [v0, v1, v2, v3] = self.v;
        let (x0, x1, y0, y1) = (self.x0, self.x1, self.y0, self.y1);
        match edge {
            0 => {
                let t = interpolate_factor(v0, v1);
                [x0 + (x1 - x0) * t, y0]
            }
            1 => {
                let t = interpolate_factor(v1, v2);
                [x1, y0 + (y1 - y0) * t]
            }
            2 => {
                let t = interpolate_factor(v2, v3);
                [x1 + (x0 - x1) * t, y1]
            }
            _ => {
                let t = interpolate_factor(v3, v0);
                [x0, y1 + (y0 - y1) * t]
            }
        }
    }
}

fn marching_squares_edge_pairs(case_index: u8) -> &'static [(u8, u8)] {
    match case_index {
        1 => &[(3, 0)],
        2 => &[(0, 1)],
        3 => &[(3, 1)],
        4 => &[(1, 2)],
        5 => &[(3, 2), (0, 1)],
        6 => &[(0, 2)],
        7 => &[(3, 2)],
        8 => &[(2, 3)],
        9 => &[(0, 2)],
        10 => &[(0, 3), (1, 2)],
        11 => &[(1, 2)],
        12 => &[(1, 3)],
        13 => &[(0, 1)],
        14 => &[(3, 0)],
        _ => &[],
    }
}

fn interpolate_factor(v0: f64, v1: f64) -> f64 {
    let denominator = v0 - v1;
    if denominator.abs() <= 1e-12 {
        0.5
    } else {
        (v0 / denominator).clamp(0.0, 1.0)
    }
}

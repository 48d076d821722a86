//! Connected components and contour shape metrics
//!
//! Components are grown with a 4-neighbourhood flood fill in row-major seed
//! order. Each component's outer boundary is traced clockwise (Moore
//! neighbour tracing) into an ordered polygon, which feeds the shoelace area
//! and perimeter used by the finger shape tests.

use std::collections::VecDeque;

use super::skin::SkinMask;

/// Pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// Axis-aligned bounds, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl BoundingBox {
    pub fn width(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    /// Longer side over shorter side
    pub fn aspect_ratio(&self) -> f32 {
        let w = self.width() as f32;
        let h = self.height() as f32;
        w.max(h) / w.min(h)
    }
}

/// One 4-connected region of the mask
#[derive(Debug, Clone)]
pub struct Component {
    /// Row-major pixel indices belonging to the region
    pub pixels: Vec<usize>,
    pub bbox: BoundingBox,
}

/// Find all 4-connected components, in row-major order of their first pixel.
pub fn connected_components(mask: &SkinMask) -> Vec<Component> {
    let width = mask.width as usize;
    let height = mask.height as usize;
    let mut visited = vec![false; width * height];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..width * height {
        if visited[seed] || !mask.bits[seed] {
            continue;
        }

        visited[seed] = true;
        queue.push_back(seed);
        let mut pixels = Vec::new();
        let mut bbox = BoundingBox {
            min_x: (seed % width) as i64,
            min_y: (seed / width) as i64,
            max_x: (seed % width) as i64,
            max_y: (seed / width) as i64,
        };

        while let Some(idx) = queue.pop_front() {
            pixels.push(idx);
            let x = idx % width;
            let y = idx / width;
            bbox.min_x = bbox.min_x.min(x as i64);
            bbox.max_x = bbox.max_x.max(x as i64);
            bbox.min_y = bbox.min_y.min(y as i64);
            bbox.max_y = bbox.max_y.max(y as i64);

            let mut visit = |n: usize| {
                if !visited[n] && mask.bits[n] {
                    visited[n] = true;
                    queue.push_back(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < width {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - width);
            }
            if y + 1 < height {
                visit(idx + width);
            }
        }

        pixels.sort_unstable();
        components.push(Component { pixels, bbox });
    }

    components
}

// Clockwise with y pointing down, starting west
const MOORE: [(i64, i64); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

fn direction_index(dx: i64, dy: i64) -> usize {
    MOORE
        .iter()
        .position(|&d| d == (dx, dy))
        .unwrap_or(0)
}

/// Trace the outer boundary of a component as an ordered, closed polygon
/// (first point not repeated at the end).
pub fn trace_boundary(mask: &SkinMask, component: &Component) -> Vec<Point> {
    let width = mask.width as usize;
    let Some(&first) = component.pixels.first() else {
        return Vec::new();
    };
    // Topmost-leftmost pixel; its west neighbour is never set
    let start = Point {
        x: (first % width) as i64,
        y: (first / width) as i64,
    };
    let inside = |p: Point| mask.get(p.x, p.y);

    let Some((second, mut back)) = trace_step(&inside, start, 0) else {
        // Isolated pixel
        return vec![start];
    };

    let mut boundary = vec![start];
    let mut current = second;
    // Each boundary pixel is entered at most once per direction
    let max_steps = component.pixels.len() * 8 + 8;

    for _ in 0..max_steps {
        let Some((next, next_back)) = trace_step(&inside, current, back) else {
            break;
        };
        // Closed once the walk would repeat its first edge
        if current == start && next == second {
            break;
        }
        boundary.push(current);
        current = next;
        back = next_back;
    }

    boundary
}

/// One Moore step: scan clockwise from the backtrack direction and return the
/// next boundary pixel with its own backtrack direction.
fn trace_step(
    inside: &impl Fn(Point) -> bool,
    current: Point,
    back: usize,
) -> Option<(Point, usize)> {
    for k in 1..=8 {
        let d = (back + k) % 8;
        let candidate = Point {
            x: current.x + MOORE[d].0,
            y: current.y + MOORE[d].1,
        };
        if inside(candidate) {
            let prev = (d + 7) % 8;
            let dx = current.x + MOORE[prev].0 - candidate.x;
            let dy = current.y + MOORE[prev].1 - candidate.y;
            return Some((candidate, direction_index(dx, dy)));
        }
    }
    None
}

/// Shoelace area of a closed polygon
pub fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice += p.x * q.y - q.x * p.y;
    }
    twice.abs() as f32 / 2.0
}

/// Closed-polygon perimeter (sum of consecutive Euclidean distances)
pub fn polygon_perimeter(points: &[Point]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let q = points[(i + 1) % points.len()];
            (((q.x - p.x).pow(2) + (q.y - p.y).pow(2)) as f32).sqrt()
        })
        .sum()
}

/// Shape measurements of one component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeMetrics {
    pub area: f32,
    pub perimeter: f32,
    pub aspect_ratio: f32,
    pub circularity: f32,
}

impl ShapeMetrics {
    pub fn measure(boundary: &[Point], bbox: &BoundingBox) -> Self {
        let area = polygon_area(boundary);
        let perimeter = polygon_perimeter(boundary);
        let circularity = if perimeter > 0.0 {
            4.0 * std::f32::consts::PI * area / (perimeter * perimeter)
        } else {
            0.0
        };
        Self {
            area,
            perimeter,
            aspect_ratio: bbox.aspect_ratio(),
            circularity,
        }
    }

    /// Perimeter per unit area; infinite for degenerate shapes
    pub fn perimeter_ratio(&self) -> f32 {
        if self.area > 0.0 {
            self.perimeter / self.area
        } else {
            f32::INFINITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mask_from_rows(rows: &[&str]) -> SkinMask {
        let width = rows[0].len() as u32;
        let bits = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| c == '#'))
            .collect();
        SkinMask {
            width,
            height: rows.len() as u32,
            bits,
        }
    }

    fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> SkinMask {
        let mut bits = vec![false; (width * height) as usize];
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                bits[(y * width + x) as usize] = true;
            }
        }
        SkinMask {
            width,
            height,
            bits,
        }
    }

    #[test]
    fn test_components_use_four_neighbourhood() {
        // Diagonal touch does not join components
        let mask = mask_from_rows(&["#..", ".#.", "..#"]);
        let comps = connected_components(&mask);
        assert_eq!(comps.len(), 3);
        assert_eq!(comps[0].pixels, vec![0]);
        assert_eq!(comps[2].pixels, vec![8]);
    }

    #[test]
    fn test_components_in_row_major_order() {
        let mask = mask_from_rows(&["..##", "....", "##..", "##.."]);
        let comps = connected_components(&mask);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].pixels, vec![2, 3]);
        assert_eq!(comps[1].bbox.width(), 2);
        assert_eq!(comps[1].bbox.height(), 2);
    }

    #[test]
    fn test_rectangle_boundary_metrics() {
        let mask = rect_mask(30, 30, 5, 3, 10, 20);
        let comps = connected_components(&mask);
        assert_eq!(comps.len(), 1);
        let boundary = trace_boundary(&mask, &comps[0]);
        // Boundary pixel centres of a 10x20 block: 2 * (9 + 19) points
        assert_eq!(boundary.len(), 56);
        let metrics = ShapeMetrics::measure(&boundary, &comps[0].bbox);
        assert_relative_eq!(metrics.area, 9.0 * 19.0);
        assert_relative_eq!(metrics.perimeter, 56.0);
        assert_relative_eq!(metrics.aspect_ratio, 2.0);
        assert!(metrics.circularity < 0.8);
    }

    #[test]
    fn test_boundary_of_single_pixel() {
        let mask = mask_from_rows(&["...", ".#.", "..."]);
        let comps = connected_components(&mask);
        let boundary = trace_boundary(&mask, &comps[0]);
        assert_eq!(boundary, vec![Point { x: 1, y: 1 }]);
        assert_eq!(polygon_area(&boundary), 0.0);
    }

    #[test]
    fn test_boundary_terminates_on_thin_bridge() {
        // Two blobs joined by a one-pixel neck revisit the neck while tracing
        let mask = mask_from_rows(&[
            "###....", //
            "###....", //
            "#######", //
            "....###", //
            "....###", //
        ]);
        let comps = connected_components(&mask);
        assert_eq!(comps.len(), 1);
        let boundary = trace_boundary(&mask, &comps[0]);
        assert!(!boundary.is_empty());
        assert!(boundary.len() <= comps[0].pixels.len() * 2);
        assert!(polygon_area(&boundary) > 0.0);
    }

    #[test]
    fn test_shoelace_square() {
        let square = [
            Point { x: 0, y: 0 },
            Point { x: 4, y: 0 },
            Point { x: 4, y: 4 },
            Point { x: 0, y: 4 },
        ];
        assert_relative_eq!(polygon_area(&square), 16.0);
        assert_relative_eq!(polygon_perimeter(&square), 16.0);
    }
}

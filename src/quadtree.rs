//! Quad-tree over node positions, rebuilt every step.
//!
//! Cells store the number of bodies below them and their centroid, which is
//! all the Barnes-Hut approximation of the charge force needs. Leaves keep
//! the bodies themselves so near interactions stay exact.

use glam::Vec2;

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 16;

/// Axis-aligned square region of the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox2D {
    pub center: Vec2,
    pub half_extent: f32,
}

impl BoundingBox2D {
    /// Square centered on `center` large enough to hold a `width` x `height` rectangle.
    pub fn new(center: Vec2, width: f32, height: f32) -> Self {
        Self {
            center,
            half_extent: width.max(height) * 0.5,
        }
    }

    /// Smallest square enclosing `points`, padded by one unit.
    ///
    /// Returns `None` for an empty slice or when any coordinate is not finite.
    pub fn enclosing<'p>(points: impl IntoIterator<Item = &'p Vec2>) -> Option<Self> {
        let mut min = Vec2::INFINITY;
        let mut max = Vec2::NEG_INFINITY;
        for point in points {
            min = min.min(*point);
            max = max.max(*point);
        }

        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        let span = (max - min).max(Vec2::ONE);
        Some(Self {
            center: (min + max) * 0.5,
            half_extent: span.max_element() * 0.5 + 1.0,
        })
    }

    pub fn width(self) -> f32 {
        self.half_extent * 2.0
    }

    pub fn contains(self, point: Vec2) -> bool {
        let offset = (point - self.center).abs();
        offset.x <= self.half_extent && offset.y <= self.half_extent
    }

    /// Squared distance from `point` to the closest point of the box, `0` inside.
    pub fn distance_sq_to(self, point: Vec2) -> f32 {
        let outside = ((point - self.center).abs() - Vec2::splat(self.half_extent)).max(Vec2::ZERO);
        outside.length_squared()
    }

    fn quadrant_for(self, point: Vec2) -> usize {
        let right = (point.x >= self.center.x) as usize;
        let upper = (point.y >= self.center.y) as usize;
        right | (upper << 1)
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let x = if quadrant & 1 == 1 { quarter } else { -quarter };
        let y = if quadrant & 2 == 2 { quarter } else { -quarter };
        Self {
            center: self.center + Vec2::new(x, y),
            half_extent: quarter,
        }
    }
}

/// A body stored in the tree: a caller-chosen key and its position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub key: u32,
    pub position: Vec2,
}

#[derive(Debug, Clone)]
struct Cell {
    bounds: BoundingBox2D,
    centroid: Vec2,
    count: u32,
    bodies: Vec<usize>,
    children: [Option<usize>; 4],
}

impl Cell {
    fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// Arena-backed quad-tree. Cell `0` is the root.
#[derive(Debug, Clone, Default)]
pub struct QuadTree {
    cells: Vec<Cell>,
    bodies: Vec<Body>,
}

impl QuadTree {
    /// Builds a tree over `bodies`. Non-finite positions yield an empty tree.
    pub fn build(bodies: impl IntoIterator<Item = Body>) -> Self {
        let bodies: Vec<Body> = bodies.into_iter().collect();
        let mut tree = Self {
            cells: Vec::with_capacity(bodies.len() / LEAF_CAPACITY * 2 + 1),
            bodies,
        };

        let Some(bounds) = BoundingBox2D::enclosing(tree.bodies.iter().map(|body| &body.position))
        else {
            return tree;
        };
        let indices = (0..tree.bodies.len()).collect();
        tree.build_cell(bounds, indices, 0);
        tree
    }

    fn build_cell(&mut self, bounds: BoundingBox2D, indices: Vec<usize>, depth: usize) -> usize {
        let count = indices.len();
        let sum = indices
            .iter()
            .fold(Vec2::ZERO, |sum, &index| sum + self.bodies[index].position);

        let id = self.cells.len();
        self.cells.push(Cell {
            bounds,
            centroid: sum / count.max(1) as f32,
            count: count as u32,
            bodies: Vec::new(),
            children: [None; 4],
        });

        if depth >= MAX_DEPTH || count <= LEAF_CAPACITY {
            self.cells[id].bodies = indices;
            return id;
        }

        let mut buckets: [Vec<usize>; 4] = Default::default();
        for index in indices {
            buckets[bounds.quadrant_for(self.bodies[index].position)].push(index);
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let child = self.build_cell(bounds.child(quadrant), bucket, depth + 1);
            self.cells[id].children[quadrant] = Some(child);
        }
        id
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn bounds(&self) -> Option<BoundingBox2D> {
        self.cells.first().map(|cell| cell.bounds)
    }

    /// Visits everything that acts on `point` under the Barnes-Hut criterion.
    ///
    /// A cell that does not contain `point` and whose `width / distance` is
    /// below `theta` is visited once as `(centroid, count, None)`. Bodies in
    /// leaves that are opened are visited individually as
    /// `(position, 1.0, Some(key))`, except the one keyed `skip`.
    pub fn for_each_approximation(
        &self,
        point: Vec2,
        skip: u32,
        theta: f32,
        mut visit: impl FnMut(Vec2, f32, Option<u32>),
    ) {
        if self.cells.is_empty() {
            return;
        }

        let theta_sq = theta * theta;
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            let cell = &self.cells[id];
            if cell.is_leaf() {
                for &index in &cell.bodies {
                    let body = self.bodies[index];
                    if body.key != skip {
                        visit(body.position, 1.0, Some(body.key));
                    }
                }
                continue;
            }

            let width = cell.bounds.width();
            let distance_sq = (cell.centroid - point).length_squared();
            if !cell.bounds.contains(point) && width * width < theta_sq * distance_sq {
                visit(cell.centroid, cell.count as f32, None);
                continue;
            }

            stack.extend(cell.children.iter().flatten().copied());
        }
    }

    /// Visits every body within `radius` of `point`, including one at `point` itself.
    pub fn for_each_within(&self, point: Vec2, radius: f32, mut visit: impl FnMut(Body)) {
        if self.cells.is_empty() {
            return;
        }

        let radius_sq = radius * radius;
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            let cell = &self.cells[id];
            if cell.bounds.distance_sq_to(point) > radius_sq {
                continue;
            }

            if cell.is_leaf() {
                for &index in &cell.bodies {
                    let body = self.bodies[index];
                    if (body.position - point).length_squared() <= radius_sq {
                        visit(body);
                    }
                }
                continue;
            }

            stack.extend(cell.children.iter().flatten().copied());
        }
    }
}

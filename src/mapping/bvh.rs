//! Bounding volume hierarchy over triangles.
//!
//! Used for both sides of the mapping: the 3D triangles of the original
//! surface and the 2D triangles of the layout (lifted to `z = 0`).

use nalgebra::Point3;
use rayon::prelude::*;

/// Below this many triangles a subtree is built on the current thread.
const PARALLEL_THRESHOLD: usize = 4096;

/// Maximum triangles per leaf.
const MAX_LEAF_SIZE: usize = 8;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// An empty (inverted) box.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// Bounding box of a triangle.
    pub fn from_triangle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Self {
        let mut bbox = Self::empty();
        bbox.expand_point(a);
        bbox.expand_point(b);
        bbox.expand_point(c);
        bbox
    }

    /// Grow to include `other`.
    pub fn expand(&mut self, other: &Self) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Grow to include `point`.
    pub fn expand_point(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Centre of the box.
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Index of the longest axis (0=X, 1=Y, 2=Z).
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Whether `point` lies inside the box grown by `tolerance`.
    pub fn contains(&self, point: &Point3<f64>, tolerance: f64) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] - tolerance && point[i] <= self.max[i] + tolerance)
    }

    /// Distance from `point` to the box (zero inside).
    pub fn distance(&self, point: &Point3<f64>) -> f64 {
        let mut sq = 0.0;
        for i in 0..3 {
            let d = (self.min[i] - point[i]).max(point[i] - self.max[i]).max(0.0);
            sq += d * d;
        }
        sq.sqrt()
    }
}

/// BVH node.
#[derive(Debug)]
enum BvhNode {
    Leaf {
        bbox: Aabb,
        items: Vec<usize>,
    },
    Internal {
        bbox: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Bounding volume hierarchy over item boxes.
#[derive(Debug)]
pub struct Bvh {
    root: Option<BvhNode>,
    len: usize,
}

impl Bvh {
    /// Build over `boxes`, item `i` having box `boxes[i]`.
    ///
    /// Splits at the median along the longest axis; ties keep index order,
    /// so the tree is the same whether built in parallel or not.
    pub fn build(boxes: &[Aabb], parallel: bool) -> Self {
        if boxes.is_empty() {
            return Self { root: None, len: 0 };
        }
        let items: Vec<usize> = (0..boxes.len()).collect();
        let root = build_node(boxes, items, parallel);
        Self {
            root: Some(root),
            len: boxes.len(),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the hierarchy is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Items whose boxes contain `point` (within `tolerance`), ascending.
    pub fn containing(&self, point: &Point3<f64>, tolerance: f64) -> Vec<usize> {
        let mut found = Vec::new();
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            if !node.bbox().contains(point, tolerance) {
                continue;
            }
            match node {
                BvhNode::Leaf { items, .. } => found.extend_from_slice(items),
                BvhNode::Internal { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        found.sort_unstable();
        found
    }

    /// The item minimising `distance(item)`, with that distance.
    ///
    /// `distance` must never be smaller than the distance from `point` to the
    /// item's box. Ties go to the smaller item index.
    pub fn nearest(
        &self,
        point: &Point3<f64>,
        distance: impl Fn(usize) -> f64,
    ) -> Option<(usize, f64)> {
        let root = self.root.as_ref()?;
        let mut best: Option<(usize, f64)> = None;
        let mut stack = vec![(root, root.bbox().distance(point))];

        while let Some((node, bound)) = stack.pop() {
            if let Some((_, d)) = best {
                if bound > d {
                    continue;
                }
            }
            match node {
                BvhNode::Leaf { items, .. } => {
                    for &item in items {
                        let d = distance(item);
                        let better = match best {
                            None => true,
                            Some((bi, bd)) => d < bd || (d == bd && item < bi),
                        };
                        if better {
                            best = Some((item, d));
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    let dl = left.bbox().distance(point);
                    let dr = right.bbox().distance(point);
                    // Visit the nearer child first.
                    if dl <= dr {
                        stack.push((right.as_ref(), dr));
                        stack.push((left.as_ref(), dl));
                    } else {
                        stack.push((left.as_ref(), dl));
                        stack.push((right.as_ref(), dr));
                    }
                }
            }
        }

        best
    }
}

fn build_node(boxes: &[Aabb], mut items: Vec<usize>, parallel: bool) -> BvhNode {
    let mut bbox = Aabb::empty();
    for &i in &items {
        bbox.expand(&boxes[i]);
    }

    if items.len() <= MAX_LEAF_SIZE {
        return BvhNode::Leaf { bbox, items };
    }

    let axis = bbox.longest_axis();
    items.sort_by(|&a, &b| {
        let ca = boxes[a].center()[axis];
        let cb = boxes[b].center()[axis];
        ca.total_cmp(&cb).then(a.cmp(&b))
    });
    let right_items = items.split_off(items.len() / 2);
    let left_items = items;

    let (left, right) = if parallel && left_items.len() + right_items.len() >= PARALLEL_THRESHOLD {
        rayon::join(
            || build_node(boxes, left_items, parallel),
            || build_node(boxes, right_items, parallel),
        )
    } else {
        (
            build_node(boxes, left_items, parallel),
            build_node(boxes, right_items, parallel),
        )
    };

    BvhNode::Internal {
        bbox,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Boxes of `triangles` over `positions`, computed in parallel when asked.
pub fn triangle_boxes(positions: &[Point3<f64>], triangles: &[[usize; 3]], parallel: bool) -> Vec<Aabb> {
    let make = |t: &[usize; 3]| Aabb::from_triangle(&positions[t[0]], &positions[t[1]], &positions[t[2]]);
    if parallel {
        triangles.par_iter().map(make).collect()
    } else {
        triangles.iter().map(make).collect()
    }
}

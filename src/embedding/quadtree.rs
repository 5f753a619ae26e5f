//! Quadtree over the 2-D layout for Barnes-Hut repulsion.

/// Depth at which a leaf stops splitting and holds every point that lands in it.
/// Only coincident or near-coincident points get this deep.
const MAX_DEPTH: usize = 48;

#[derive(Debug, Clone)]
struct Cell {
    centre: [f64; 2],
    half_width: f64,
    mass_centre: [f64; 2],
    count: usize,
    children: Option<[usize; 4]>,
    points: Vec<usize>,
}

impl Cell {
    fn empty(centre: [f64; 2], half_width: f64) -> Self {
        Cell {
            centre,
            half_width,
            mass_centre: [0.0; 2],
            count: 0,
            children: None,
            points: Vec::new(),
        }
    }

    fn quadrant(&self, p: [f64; 2]) -> usize {
        usize::from(p[0] >= self.centre[0]) | (usize::from(p[1] >= self.centre[1]) << 1)
    }

    fn add_mass(&mut self, p: [f64; 2]) {
        let n = self.count as f64;
        for d in 0..2 {
            self.mass_centre[d] = (self.mass_centre[d] * n + p[d]) / (n + 1.0);
        }
        self.count += 1;
    }
}

/// Every point of a layout, each cell summarised by its point count and centre of mass.
#[derive(Debug)]
pub struct QuadTree<'a> {
    points: &'a [[f64; 2]],
    cells: Vec<Cell>,
}

impl<'a> QuadTree<'a> {
    pub fn new(points: &'a [[f64; 2]]) -> Self {
        let mut lo = [f64::INFINITY; 2];
        let mut hi = [f64::NEG_INFINITY; 2];
        for p in points {
            for d in 0..2 {
                lo[d] = lo[d].min(p[d]);
                hi[d] = hi[d].max(p[d]);
            }
        }
        let centre = [(lo[0] + hi[0]) / 2.0, (lo[1] + hi[1]) / 2.0];
        let half_width = ((hi[0] - lo[0]).max(hi[1] - lo[1]) / 2.0).max(f64::EPSILON);

        let mut tree = QuadTree {
            points,
            cells: vec![Cell::empty(centre, half_width)],
        };
        for index in 0..points.len() {
            tree.insert(index, 0, 0);
        }
        tree
    }

    #[cfg(test)]
    fn point_count(&self) -> usize {
        self.cells[0].count
    }

    #[cfg(test)]
    fn centre_of_mass(&self) -> [f64; 2] {
        self.cells[0].mass_centre
    }

    fn insert(&mut self, index: usize, start: usize, start_depth: usize) {
        let p = self.points[index];
        let mut cell = start;
        let mut depth = start_depth;
        loop {
            self.cells[cell].add_mass(p);
            if let Some(children) = self.cells[cell].children {
                cell = children[self.cells[cell].quadrant(p)];
                depth += 1;
                continue;
            }
            if self.cells[cell].points.is_empty() || depth >= MAX_DEPTH {
                self.cells[cell].points.push(index);
                return;
            }
            let children = self.subdivide(cell);
            for resident in std::mem::take(&mut self.cells[cell].points) {
                let child = children[self.cells[cell].quadrant(self.points[resident])];
                self.insert(resident, child, depth + 1);
            }
            cell = children[self.cells[cell].quadrant(p)];
            depth += 1;
        }
    }

    fn subdivide(&mut self, cell: usize) -> [usize; 4] {
        let centre = self.cells[cell].centre;
        let half = self.cells[cell].half_width / 2.0;
        let first = self.cells.len();
        for quadrant in 0..4 {
            let dx = if quadrant & 1 == 1 { half } else { -half };
            let dy = if quadrant & 2 == 2 { half } else { -half };
            self.cells
                .push(Cell::empty([centre[0] + dx, centre[1] + dy], half));
        }
        let children = [first, first + 1, first + 2, first + 3];
        self.cells[cell].children = Some(children);
        children
    }

    /// Repulsion on point `index` from every other point.
    ///
    /// Returns `(sum_j q_ij^2 (y_i - y_j), sum_j q_ij)` with the unnormalised
    /// kernel `q_ij = 1 / (1 + |y_i - y_j|^2)`. A cell whose width over its
    /// distance to the point is below `theta` counts as one heavy point at
    /// its centre of mass; `theta = 0` visits every point.
    pub fn repulsion(&self, index: usize, theta: f64) -> ([f64; 2], f64) {
        let p = self.points[index];
        let mut force = [0.0; 2];
        let mut z = 0.0;
        let mut add = |other: [f64; 2], weight: f64| {
            let dx = p[0] - other[0];
            let dy = p[1] - other[1];
            let q = 1.0 / (1.0 + dx * dx + dy * dy);
            z += weight * q;
            force[0] += weight * q * q * dx;
            force[1] += weight * q * q * dy;
        };

        let mut stack = vec![0usize];
        while let Some(id) = stack.pop() {
            let cell = &self.cells[id];
            if cell.count == 0 {
                continue;
            }
            match cell.children {
                Some(children) => {
                    let dx = p[0] - cell.mass_centre[0];
                    let dy = p[1] - cell.mass_centre[1];
                    let width = 2.0 * cell.half_width;
                    if width * width < theta * theta * (dx * dx + dy * dy) {
                        add(cell.mass_centre, cell.count as f64);
                    } else {
                        stack.extend(children);
                    }
                }
                None => {
                    for &other in cell.points.iter().filter(|&&j| j != index) {
                        add(self.points[other], 1.0);
                    }
                }
            }
        }
        (force, z)
    }
}

use rs_graph::traits::*;
use rs_graph::{self, Buildable, Builder};

use crate::grid::{Coord, PixelGrid};

/// Which neighbour an edge reaches. `Down` joins (i, j) to (i + 1, j),
/// `Right` joins (i, j) to (i, j + 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Adjacency {
    Down,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelNode {
    pub coord : Coord,
    /// Drawing position, `(row, col)`.
    pub pos : (usize, usize),
    pub color : u8,
}

/// An undirected grid edge. `a` is always above or left of `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridEdge {
    pub a : Coord,
    pub b : Coord,
    pub weight : u8,
    pub adjacency : Adjacency,
}

/// Weighted 4-connected graph over the cells of a pixel grid.
pub struct ImageGraph {
    graph : rs_graph::VecGraph<usize>,
    rows : usize,
    cols : usize,
    colors : Vec<u8>,  // by node id
    weights : Vec<u8>, // by edge id
}

impl ImageGraph {
    pub fn build(grid : &PixelGrid) -> ImageGraph {
        let (rows, cols) = (grid.rows(), grid.cols());
        let pixel_id = |c : Coord| -> usize { c.row * cols + c.col };

        let mut b : rs_graph::vecgraph::VecGraphBuilder<usize> = rs_graph::VecGraph::new_builder();
        let pixel_nodes = b.add_nodes(rows * cols); // added first so node ids are pixel ids
        let mut colors = Vec::with_capacity(rows * cols);
        let mut weights = Vec::with_capacity(2 * rows * cols);

        for (here, color) in grid.cells() {
            colors.push(color);
            let mut neighbors : Vec<Coord> = Vec::with_capacity(2);
            if here.col + 1 < cols {
                neighbors.push(Coord::new(here.row, here.col + 1));
            }
            if here.row + 1 < rows {
                neighbors.push(Coord::new(here.row + 1, here.col));
            }
            for there in neighbors {
                b.add_edge(pixel_nodes[pixel_id(here)], pixel_nodes[pixel_id(there)]);
                weights.push(color.abs_diff(grid.get(there)));
            }
        }

        let graph = b.into_graph();
        tracing::debug!(nodes = graph.num_nodes(), edges = graph.num_edges(), "built image graph");
        return ImageGraph { graph, rows, cols, colors, weights };
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn node_count(&self) -> usize {
        self.graph.num_nodes()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.num_edges()
    }

    fn coord_of(&self, node_id : usize) -> Coord {
        Coord::new(node_id / self.cols, node_id % self.cols)
    }

    pub fn contains(&self, c : Coord) -> bool {
        c.row < self.rows && c.col < self.cols
    }

    /// Colour of the pixel behind node `c`, or `None` outside the grid.
    pub fn color(&self, c : Coord) -> Option<u8> {
        if !self.contains(c) {
            return None;
        }
        Some(self.colors[c.row * self.cols + c.col])
    }

    pub fn nodes(&self) -> impl Iterator<Item = PixelNode> + '_ {
        self.graph.nodes().map(move |u| {
            let id = self.graph.node_id(u);
            let coord = self.coord_of(id);
            PixelNode { coord, pos : (coord.row, coord.col), color : self.colors[id] }
        })
    }

    /// Edges in build order.
    pub fn edges(&self) -> impl Iterator<Item = GridEdge> + '_ {
        self.graph.edges().map(move |e| {
            let (u, v) = self.graph.enodes(e);
            let a = self.coord_of(self.graph.node_id(u));
            let b = self.coord_of(self.graph.node_id(v));
            let adjacency = if a.row == b.row { Adjacency::Right } else { Adjacency::Down };
            GridEdge { a, b, weight : self.weights[self.graph.edge_id(e)], adjacency }
        })
    }

    /// The edge joining `p` and `q` in either order, if they are 4-adjacent.
    pub fn edge_between(&self, p : Coord, q : Coord) -> Option<GridEdge> {
        let (a, b) = if p <= q { (p, q) } else { (q, p) };
        self.edges().find(|e| e.a == a && e.b == b)
    }
}

use std::collections::BTreeMap;

use crate::bqm::Sample;
use crate::graph::{Adjacency, GridEdge, ImageGraph};
use crate::grid::Coord;

/// Label per node, as returned by the sampler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    labels : BTreeMap<Coord, u8>,
}

impl Assignment {
    pub fn from_labels<I : IntoIterator<Item = (Coord, u8)>>(labels : I) -> Self {
        Assignment { labels : labels.into_iter().collect() }
    }

    pub fn get(&self, c : Coord) -> Option<u8> {
        self.labels.get(&c).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, u8)> + '_ {
        self.labels.iter().map(|(c, l)| (*c, *l))
    }

    pub fn as_sample(&self) -> Sample<Coord> {
        self.iter().map(|(c, l)| (c, l as i8)).collect()
    }

    /// First node of `graph` without a label, if any.
    pub fn missing(&self, graph : &ImageGraph) -> Option<Coord> {
        graph.nodes().map(|n| n.coord).find(|c| !self.labels.contains_key(c))
    }

    pub fn is_cut(&self, edge : &GridEdge) -> bool {
        self.get(edge.a) != self.get(edge.b)
    }

    /// Connected groups of equally labelled nodes.
    pub fn region_count(&self, graph : &ImageGraph) -> usize {
        let (rows, cols) = graph.shape();
        let mut parent : Vec<usize> = (0..rows * cols).collect();
        fn find(parent : &mut [usize], mut i : usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        let id = |c : Coord| c.row * cols + c.col;
        for edge in graph.edges().filter(|e| !self.is_cut(e)) {
            let ra = find(&mut parent, id(edge.a));
            let rb = find(&mut parent, id(edge.b));
            if ra != rb {
                parent[ra] = rb;
            }
        }
        (0..rows * cols).filter(|&i| find(&mut parent, i) == i).count()
    }
}

/// Every edge of a graph, split by whether an assignment cuts it.
#[derive(Clone, Debug, PartialEq)]
pub struct CutPartition {
    pub cut : Vec<GridEdge>,
    pub uncut : Vec<GridEdge>,
}

impl CutPartition {
    pub fn from_assignment(graph : &ImageGraph, assignment : &Assignment) -> Self {
        let (cut, uncut) = graph.edges().partition(|e| assignment.is_cut(e));
        CutPartition { cut, uncut }
    }

    pub fn len(&self) -> usize {
        self.cut.len() + self.uncut.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cut edges whose endpoints share a colour, i.e. boundary drawn
    /// through a uniform region.
    pub fn spurious(&self) -> usize {
        self.cut.iter().filter(|e| e.weight == 0).count()
    }

    /// Colour changes the assignment failed to separate.
    pub fn missed(&self) -> usize {
        self.uncut.iter().filter(|e| e.weight == 1).count()
    }
}

/// A boundary piece in grid units: rows along x, columns along y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from : (f64, f64),
    pub to : (f64, f64),
}

impl Segment {
    pub fn for_edge(edge : &GridEdge) -> Segment {
        let (i, j) = (edge.a.row as f64, edge.a.col as f64);
        match edge.adjacency {
            // cells stacked along x, separated by the line x = i + 1
            Adjacency::Down => Segment { from : (i + 1.0, j), to : (i + 1.0, j + 1.0) },
            // cells stacked along y, separated by the line y = j + 1
            Adjacency::Right => Segment { from : (i, j + 1.0), to : (i + 1.0, j + 1.0) },
        }
    }
}

/// One segment per cut edge, in edge order.
pub fn boundary_segments(graph : &ImageGraph, assignment : &Assignment) -> Vec<Segment> {
    CutPartition::from_assignment(graph, assignment).cut.iter().map(Segment::for_edge).collect()
}

use serde::{Deserialize, Serialize};

use crate::bqm::{BinaryQuadraticModel, ModelError, Vartype};
use crate::graph::ImageGraph;
use crate::grid::Coord;

/// Edge terms of the boundary objective.
///
/// Every edge earns `-cut_reward` when its endpoints disagree. Edges whose
/// endpoints share a colour additionally pay `same_color_penalty` when cut,
/// so with `same_color_penalty > cut_reward > 0` the cheapest labelings split
/// the grid exactly along colour changes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryObjective {
    pub cut_reward : f64,
    pub same_color_penalty : f64,
}

impl Default for BoundaryObjective {
    fn default() -> Self {
        BoundaryObjective { cut_reward : 1.0, same_color_penalty : 2.0 }
    }
}

impl BoundaryObjective {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.cut_reward.is_finite() {
            return Err(ModelError::NonFinite("cut_reward".into()));
        }
        if !self.same_color_penalty.is_finite() {
            return Err(ModelError::NonFinite("same_color_penalty".into()));
        }
        if self.cut_reward <= 0.0 || self.same_color_penalty <= self.cut_reward {
            return Err(ModelError::NonSeparating { reward : self.cut_reward, penalty : self.same_color_penalty });
        }
        Ok(())
    }

    /// Energy contribution of a single edge.
    pub fn edge_energy(&self, weight : u8, cut : bool) -> f64 {
        if !cut {
            return 0.0;
        }
        if weight == 0 {
            self.same_color_penalty - self.cut_reward
        } else {
            -self.cut_reward
        }
    }
}

/// One binary variable per pixel, no node-level bias, and the two edge terms
/// of [`BoundaryObjective`] on every grid edge.
pub fn build_bqm(graph : &ImageGraph, objective : &BoundaryObjective) -> Result<BinaryQuadraticModel<Coord>, ModelError> {
    objective.validate()?;
    let mut bqm = BinaryQuadraticModel::new(Vartype::Binary);
    for node in graph.nodes() {
        bqm.add_variable(node.coord);
    }
    for edge in graph.edges() {
        bqm.add_squared_difference(edge.a, edge.b, -objective.cut_reward)?;
        if edge.weight == 0 {
            bqm.add_squared_difference(edge.a, edge.b, objective.same_color_penalty)?;
        }
    }
    tracing::debug!(
        variables = bqm.num_variables(),
        interactions = bqm.num_interactions(),
        "built boundary model"
    );
    Ok(bqm)
}

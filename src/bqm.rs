//! Binary quadratic models.
//!
//! `E(x) = offset + sum_i a_i x_i + sum_{i<j} b_ij x_i x_j`, with `x` in
//! `{0, 1}` (BINARY) or `{-1, +1}` (SPIN).

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vartype {
    Binary,
    Spin,
}

impl Vartype {
    pub fn accepts(self, value : i8) -> bool {
        match self {
            Vartype::Binary => value == 0 || value == 1,
            Vartype::Spin => value == -1 || value == 1,
        }
    }
}

/// One value per variable.
pub type Sample<V> = BTreeMap<V, i8>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("sample has no value for variable {0}")]
    MissingVariable(String),

    #[error("value {value} for variable {variable} is not {vartype:?}")]
    WrongDomain { variable : String, value : i8, vartype : Vartype },

    #[error("bias on {0} is not finite")]
    NonFinite(String),

    #[error("self-interaction on {0}")]
    SelfLoop(String),

    #[error("same-colour penalty {penalty} must exceed cut reward {reward}")]
    NonSeparating { reward : f64, penalty : f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BinaryQuadraticModel<V : Ord> {
    vartype : Vartype,
    linear : BTreeMap<V, f64>,
    quadratic : BTreeMap<(V, V), f64>, // keys ordered (low, high)
    offset : f64,
}

fn ordered<V : Ord>(u : V, v : V) -> (V, V) {
    if u <= v {
        (u, v)
    } else {
        (v, u)
    }
}

impl<V> BinaryQuadraticModel<V>
where
    V : Ord + Clone + std::fmt::Display,
{
    pub fn new(vartype : Vartype) -> Self {
        BinaryQuadraticModel { vartype, linear : BTreeMap::new(), quadratic : BTreeMap::new(), offset : 0.0 }
    }

    pub fn vartype(&self) -> Vartype {
        self.vartype
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn num_variables(&self) -> usize {
        self.linear.len()
    }

    pub fn num_interactions(&self) -> usize {
        self.quadratic.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = &V> {
        self.linear.keys()
    }

    /// Adds `v` with zero bias if it is not present yet.
    pub fn add_variable(&mut self, v : V) {
        self.linear.entry(v).or_insert(0.0);
    }

    pub fn add_linear(&mut self, v : V, bias : f64) -> Result<(), ModelError> {
        if !bias.is_finite() {
            return Err(ModelError::NonFinite(v.to_string()));
        }
        *self.linear.entry(v).or_insert(0.0) += bias;
        Ok(())
    }

    pub fn add_quadratic(&mut self, u : V, v : V, bias : f64) -> Result<(), ModelError> {
        if u == v {
            return Err(ModelError::SelfLoop(u.to_string()));
        }
        if !bias.is_finite() {
            return Err(ModelError::NonFinite(format!("({u}, {v})")));
        }
        self.add_variable(u.clone());
        self.add_variable(v.clone());
        *self.quadratic.entry(ordered(u, v)).or_insert(0.0) += bias;
        Ok(())
    }

    pub fn add_offset(&mut self, constant : f64) {
        self.offset += constant;
    }

    /// Adds `scale * (x_u - x_v)^2`, which is `scale` when the two
    /// variables disagree and zero when they agree.
    pub fn add_squared_difference(&mut self, u : V, v : V, scale : f64) -> Result<(), ModelError> {
        match self.vartype {
            // x_u + x_v - 2 x_u x_v
            Vartype::Binary => {
                self.add_linear(u.clone(), scale)?;
                self.add_linear(v.clone(), scale)?;
                self.add_quadratic(u, v, -2.0 * scale)
            }
            // (s_u - s_v)^2 / 4 = (1 - s_u s_v) / 2
            Vartype::Spin => {
                self.add_quadratic(u, v, -0.5 * scale)?;
                self.add_offset(0.5 * scale);
                Ok(())
            }
        }
    }

    pub fn linear(&self, v : &V) -> Option<f64> {
        self.linear.get(v).copied()
    }

    pub fn quadratic(&self, u : &V, v : &V) -> Option<f64> {
        let key = ordered(u.clone(), v.clone());
        self.quadratic.get(&key).copied()
    }

    pub fn linear_terms(&self) -> impl Iterator<Item = (&V, f64)> {
        self.linear.iter().map(|(v, &b)| (v, b))
    }

    pub fn quadratic_terms(&self) -> impl Iterator<Item = (&V, &V, f64)> {
        self.quadratic.iter().map(|((u, v), &b)| (u, v, b))
    }

    /// Largest absolute linear or quadratic bias.
    pub fn max_abs_bias(&self) -> f64 {
        self.linear.values().chain(self.quadratic.values()).map(|b| b.abs()).fold(0.0, f64::max)
    }

    pub fn energy(&self, sample : &Sample<V>) -> Result<f64, ModelError> {
        let value = |v : &V| -> Result<f64, ModelError> {
            let x = *sample.get(v).ok_or_else(|| ModelError::MissingVariable(v.to_string()))?;
            if !self.vartype.accepts(x) {
                return Err(ModelError::WrongDomain { variable : v.to_string(), value : x, vartype : self.vartype });
            }
            Ok(f64::from(x))
        };
        let mut energy = self.offset;
        for (v, bias) in self.linear_terms() {
            energy += bias * value(v)?;
        }
        for (u, v, bias) in self.quadratic_terms() {
            energy += bias * value(u)? * value(v)?;
        }
        Ok(energy)
    }

    /// The same energy landscape expressed over the other vartype.
    pub fn change_vartype(&self, target : Vartype) -> Self {
        if target == self.vartype {
            return self.clone();
        }
        let mut out = Self::new(target);
        out.offset = self.offset;
        match target {
            // x = (s + 1) / 2
            Vartype::Spin => {
                for (v, a) in &self.linear {
                    *out.linear.entry(v.clone()).or_insert(0.0) += a / 2.0;
                    out.offset += a / 2.0;
                }
                for ((u, v), b) in &self.quadratic {
                    out.quadratic.insert((u.clone(), v.clone()), b / 4.0);
                    *out.linear.entry(u.clone()).or_insert(0.0) += b / 4.0;
                    *out.linear.entry(v.clone()).or_insert(0.0) += b / 4.0;
                    out.offset += b / 4.0;
                }
            }
            // s = 2x - 1
            Vartype::Binary => {
                for (v, h) in &self.linear {
                    *out.linear.entry(v.clone()).or_insert(0.0) += 2.0 * h;
                    out.offset -= h;
                }
                for ((u, v), j) in &self.quadratic {
                    out.quadratic.insert((u.clone(), v.clone()), 4.0 * j);
                    *out.linear.entry(u.clone()).or_insert(0.0) -= 2.0 * j;
                    *out.linear.entry(v.clone()).or_insert(0.0) -= 2.0 * j;
                    out.offset += j;
                }
            }
        }
        out
    }

    /// Number of interactions each variable takes part in.
    pub fn degrees(&self) -> BTreeMap<&V, usize> {
        let mut degrees : BTreeMap<&V, usize> = self.linear.keys().map(|v| (v, 0)).collect();
        for (u, v) in self.quadratic.keys() {
            *degrees.entry(u).or_default() += 1;
            *degrees.entry(v).or_default() += 1;
        }
        degrees
    }

    /// Human readable dump, one term per line.
    pub fn describe(&self) -> String {
        let linear = self.linear_terms().map(|(v, b)| format!("  {v}: {b}")).join("\n");
        let quadratic = self.quadratic_terms().map(|(u, v, b)| format!("  ({u}) ({v}): {b}")).join("\n");
        format!(
            "BQM {:?} offset={}\nlinear:\n{}\nquadratic:\n{}",
            self.vartype, self.offset, linear, quadratic
        )
    }
}

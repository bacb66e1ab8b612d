use crate::real;

pub const EXP_TABLE_SIZE: usize = 1000;
pub const MAX_EXP: real = 6.0;

/// Precomputed logistic function over `(-MAX_EXP, MAX_EXP)`.
#[derive(Debug, Clone)]
pub struct SigmoidTable {
    table: Vec<real>,
}

impl SigmoidTable {
    pub fn new() -> Self {
        let table = (0..EXP_TABLE_SIZE)
            .map(|i| {
                let j = (i as real / EXP_TABLE_SIZE as real * 2.0 - 1.0) * MAX_EXP;
                let e = (j as f64).exp() as real; // Precompute the exp() table
                e / (e + 1.0) // Precompute f(x) = x / (x + 1)
            })
            .collect();
        SigmoidTable { table }
    }

    /// Approximate `1 / (1 + e^-x)`. Returns `None` when `x` is outside
    /// `(-MAX_EXP, MAX_EXP)`, where the sigmoid counts as saturated.
    pub fn get(&self, x: real) -> Option<real> {
        if !(x > -MAX_EXP && x < MAX_EXP) {
            return None;
        }
        let i = ((x + MAX_EXP) * (EXP_TABLE_SIZE as real / MAX_EXP / 2.0)) as usize;
        Some(self.table[i.min(EXP_TABLE_SIZE - 1)])
    }
}

impl Default for SigmoidTable {
    fn default() -> Self {
        SigmoidTable::new()
    }
}

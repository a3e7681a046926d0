// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::index::{AisleIndex, OrderIndex};

/// The final reported solution to the wave-picking problem.
///
/// A solution is the set of chosen orders and the set of visited aisles; the
/// reported objective is the total picked units divided by the number of
/// visited aisles. Both id lists are kept sorted ascending so solutions
/// compare and print deterministically.
#[derive(Clone, Debug, PartialEq)]
pub struct PickingSolution {
    /// The chosen orders, sorted ascending.
    orders: Vec<OrderIndex>,
    /// The visited aisles, sorted ascending.
    aisles: Vec<AisleIndex>,
    /// Total picked units divided by the number of visited aisles.
    objective: f64,
}

impl PickingSolution {
    /// Constructs a new `PickingSolution`. The id lists are sorted on entry.
    pub fn new(mut orders: Vec<OrderIndex>, mut aisles: Vec<AisleIndex>, objective: f64) -> Self {
        orders.sort_unstable();
        aisles.sort_unstable();
        Self {
            orders,
            aisles,
            objective,
        }
    }

    /// Returns the chosen orders, sorted ascending.
    #[inline]
    pub fn orders(&self) -> &[OrderIndex] {
        &self.orders
    }

    /// Returns the visited aisles, sorted ascending.
    #[inline]
    pub fn aisles(&self) -> &[AisleIndex] {
        &self.aisles
    }

    /// Returns the number of chosen orders.
    #[inline]
    pub fn num_orders(&self) -> usize {
        self.orders.len()
    }

    /// Returns the number of visited aisles.
    #[inline]
    pub fn num_aisles(&self) -> usize {
        self.aisles.len()
    }

    /// Returns the objective value (picked units per visited aisle).
    #[inline]
    pub fn objective(&self) -> f64 {
        self.objective
    }
}

impl std::fmt::Display for PickingSolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution Summary")?;
        writeln!(f, "   Objective Value: {:.4}", self.objective)?;
        writeln!(f, "   Orders ({}):", self.num_orders())?;
        for order in &self.orders {
            writeln!(f, "      {}", order.get())?;
        }
        writeln!(f, "   Aisles ({}):", self.num_aisles())?;
        for aisle in &self.aisles {
            writeln!(f, "      {}", aisle.get())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oi(i: usize) -> OrderIndex {
        OrderIndex::new(i)
    }

    fn ai(i: usize) -> AisleIndex {
        AisleIndex::new(i)
    }

    #[test]
    fn test_new_sorts_ids() {
        let sol = PickingSolution::new(vec![oi(2), oi(0)], vec![ai(3), ai(1)], 2.5);
        assert_eq!(sol.orders(), &[oi(0), oi(2)]);
        assert_eq!(sol.aisles(), &[ai(1), ai(3)]);
        assert_eq!(sol.objective(), 2.5);
    }

    #[test]
    fn test_counts() {
        let sol = PickingSolution::new(vec![oi(0)], vec![ai(0), ai(1)], 1.0);
        assert_eq!(sol.num_orders(), 1);
        assert_eq!(sol.num_aisles(), 2);
    }

    #[test]
    fn test_display_lists_orders_and_aisles() {
        let sol = PickingSolution::new(vec![oi(1)], vec![ai(0)], 3.0);
        let rendered = format!("{}", sol);
        assert!(rendered.contains("Objective Value: 3.0000"));
        assert!(rendered.contains("Orders (1):"));
        assert!(rendered.contains("Aisles (1):"));
    }
}

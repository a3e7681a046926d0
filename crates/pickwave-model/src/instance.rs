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

use crate::index::{AisleIndex, ItemIndex, OrderIndex};
use pickwave_core::num::UnitNumeric;
use smallvec::SmallVec;

/// A single (item, units) record of an order demand or aisle stock.
///
/// `units` is always strictly positive; builders drop zero-unit entries on
/// insertion so downstream code never has to re-check.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemEntry<T> {
    /// The item this entry refers to.
    pub item: ItemIndex,
    /// The number of units demanded (orders) or stocked (aisles).
    pub units: T,
}

impl<T> ItemEntry<T> {
    /// Creates a new entry.
    #[inline(always)]
    pub fn new(item: ItemIndex, units: T) -> Self {
        Self { item, units }
    }
}

impl<T> std::fmt::Debug for ItemEntry<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?})", self.item, self.units)
    }
}

/// Demand lists are short in practice; eight inline entries cover the bulk of
/// SBPO instances without touching the heap.
pub type DemandList<T> = SmallVec<[ItemEntry<T>; 8]>;

/// The order-to-aisle and aisle-to-order adjacency derived from an instance.
///
/// `order_to_aisles[o]` lists the aisles whose stock intersects the demand set
/// of order `o`; `aisle_to_orders[a]` is the symmetric view. Both lists are
/// sorted ascending. Computed once per solution and treated as immutable
/// afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Adjacency {
    /// For every order, the aisles whose stock intersects its demand set.
    pub order_to_aisles: Vec<Vec<usize>>,
    /// For every aisle, the orders whose demand set intersects its stock.
    pub aisle_to_orders: Vec<Vec<usize>>,
}

/// The immutable data model describing orders, aisles, and the wave bounds.
///
/// This struct holds all pre-validated, queryable data:
/// - `orders[o]`: the (item, units) demand list of order `o`.
/// - `aisles[a]`: the (item, units) stock list of aisle `a`.
/// - `order_units[o]`: the total demanded units of order `o`, precomputed.
/// - `wave_size_lb`/`wave_size_ub`: the inclusive wave-size interval.
///
/// Construction:
/// - Use `InstanceBuilder` and call `InstanceBuilder::build` to obtain a
///   validated `Instance`.
#[derive(Clone)]
pub struct Instance<T>
where
    T: UnitNumeric,
{
    num_items: usize,
    orders: Vec<DemandList<T>>,        // len = num_orders
    aisles: Vec<Vec<ItemEntry<T>>>,    // len = num_aisles
    order_units: Vec<T>,               // len = num_orders
    wave_size_lb: T,
    wave_size_ub: T,
}

impl<T> Instance<T>
where
    T: UnitNumeric,
{
    /// Returns the number of distinct items in the instance.
    #[inline]
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Returns the number of orders in the instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pickwave_model::instance::InstanceBuilder;
    ///
    /// let mut builder = InstanceBuilder::<u32>::new(1);
    /// builder.push_order([(0, 3)]);
    /// let instance = builder.build();
    /// assert_eq!(instance.num_orders(), 1);
    /// ```
    #[inline]
    pub fn num_orders(&self) -> usize {
        self.orders.len()
    }

    /// Returns the number of aisles in the instance.
    #[inline]
    pub fn num_aisles(&self) -> usize {
        self.aisles.len()
    }

    /// Returns the inclusive lower wave-size bound.
    #[inline]
    pub fn wave_size_lb(&self) -> T {
        self.wave_size_lb
    }

    /// Returns the inclusive upper wave-size bound.
    #[inline]
    pub fn wave_size_ub(&self) -> T {
        self.wave_size_ub
    }

    /// Returns the demand list of the specified order.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `order_index` is not in `0..num_orders()`.
    #[inline]
    pub fn order_demand(&self, order_index: OrderIndex) -> &[ItemEntry<T>] {
        let index = order_index.get();
        debug_assert!(
            index < self.num_orders(),
            "called `Instance::order_demand` with order index out of bounds: the len is {} but the index is {}",
            self.num_orders(),
            index
        );

        &self.orders[index]
    }

    /// Returns the demand list of the specified order without bounds checking.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `order_index` is in `0..num_orders()`.
    /// Undefined behavior may occur if this precondition is violated.
    #[inline]
    pub unsafe fn order_demand_unchecked(&self, order_index: OrderIndex) -> &[ItemEntry<T>] {
        let index = order_index.get();
        debug_assert!(
            index < self.num_orders(),
            "called `Instance::order_demand_unchecked` with order index out of bounds: the len is {} but the index is {}",
            self.num_orders(),
            index
        );

        unsafe { self.orders.get_unchecked(index) }
    }

    /// Returns the stock list of the specified aisle.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `aisle_index` is not in `0..num_aisles()`.
    #[inline]
    pub fn aisle_stock(&self, aisle_index: AisleIndex) -> &[ItemEntry<T>] {
        let index = aisle_index.get();
        debug_assert!(
            index < self.num_aisles(),
            "called `Instance::aisle_stock` with aisle index out of bounds: the len is {} but the index is {}",
            self.num_aisles(),
            index
        );

        &self.aisles[index]
    }

    /// Returns the stock list of the specified aisle without bounds checking.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `aisle_index` is in `0..num_aisles()`.
    /// Undefined behavior may occur if this precondition is violated.
    #[inline]
    pub unsafe fn aisle_stock_unchecked(&self, aisle_index: AisleIndex) -> &[ItemEntry<T>] {
        let index = aisle_index.get();
        debug_assert!(
            index < self.num_aisles(),
            "called `Instance::aisle_stock_unchecked` with aisle index out of bounds: the len is {} but the index is {}",
            self.num_aisles(),
            index
        );

        unsafe { self.aisles.get_unchecked(index) }
    }

    /// Returns the total demanded units of the specified order.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `order_index` is not in `0..num_orders()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pickwave_model::instance::InstanceBuilder;
    /// # use pickwave_model::index::OrderIndex;
    ///
    /// let mut builder = InstanceBuilder::<u32>::new(2);
    /// builder.push_order([(0, 2), (1, 3)]);
    /// let instance = builder.build();
    /// assert_eq!(instance.order_units(OrderIndex::new(0)), 5);
    /// ```
    #[inline]
    pub fn order_units(&self, order_index: OrderIndex) -> T {
        let index = order_index.get();
        debug_assert!(
            index < self.num_orders(),
            "called `Instance::order_units` with order index out of bounds: the len is {} but the index is {}",
            self.num_orders(),
            index
        );

        self.order_units[index]
    }

    /// Computes the order/aisle adjacency maps.
    ///
    /// An order and an aisle are adjacent when the aisle stocks at least one
    /// item the order demands (units are positive by construction). The maps
    /// are derived purely from the instance and are intended to be computed
    /// once per solution lifetime.
    pub fn compute_adjacency(&self) -> Adjacency {
        // Invert the demand lists so each aisle scan touches only the orders
        // that can possibly be adjacent.
        let mut item_to_orders: Vec<Vec<usize>> = vec![Vec::new(); self.num_items];
        for (order_id, demand) in self.orders.iter().enumerate() {
            for entry in demand {
                item_to_orders[entry.item.get()].push(order_id);
            }
        }

        let mut order_to_aisles: Vec<Vec<usize>> = vec![Vec::new(); self.num_orders()];
        let mut aisle_to_orders: Vec<Vec<usize>> = vec![Vec::new(); self.num_aisles()];

        // Epoch stamps deduplicate (order, aisle) pairs without a per-aisle
        // hash set.
        let mut seen = vec![usize::MAX; self.num_orders()];
        for (aisle_id, stock) in self.aisles.iter().enumerate() {
            for entry in stock {
                for &order_id in &item_to_orders[entry.item.get()] {
                    if seen[order_id] != aisle_id {
                        seen[order_id] = aisle_id;
                        order_to_aisles[order_id].push(aisle_id);
                        aisle_to_orders[aisle_id].push(order_id);
                    }
                }
            }
        }

        for list in &mut order_to_aisles {
            list.sort_unstable();
        }
        // aisle_to_orders is filled in ascending order id per aisle already,
        // but the dedup above can interleave; sort for a deterministic layout.
        for list in &mut aisle_to_orders {
            list.sort_unstable();
        }

        Adjacency {
            order_to_aisles,
            aisle_to_orders,
        }
    }
}

impl<T> std::fmt::Debug for Instance<T>
where
    T: UnitNumeric,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("num_items", &self.num_items)
            .field("orders", &self.orders)
            .field("aisles", &self.aisles)
            .field("wave_size_lb", &self.wave_size_lb)
            .field("wave_size_ub", &self.wave_size_ub)
            .finish()
    }
}

impl<T> std::fmt::Display for Instance<T>
where
    T: UnitNumeric,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Instance(orders: {}, items: {}, aisles: {}, wave: [{}, {}])",
            self.num_orders(),
            self.num_items(),
            self.num_aisles(),
            self.wave_size_lb,
            self.wave_size_ub
        )
    }
}

/// A mutable builder producing validated `Instance` values.
///
/// The builder starts with an empty warehouse: no orders, no aisles, and a
/// wave interval of `[0, T::MAX]` (fully permissive). Constraints are added by
/// pushing records and narrowing the wave bounds. Zero-unit entries are
/// silently dropped so the frozen instance only ever carries positive units.
///
/// # Examples
///
/// ```rust
/// # use pickwave_model::instance::InstanceBuilder;
///
/// let mut builder = InstanceBuilder::<u32>::new(2);
/// builder
///     .push_order([(0, 2), (1, 2)])
///     .push_aisle([(0, 2)])
///     .push_aisle([(1, 2)])
///     .wave_bounds(4, 4);
/// let instance = builder.build();
/// assert_eq!(instance.num_orders(), 1);
/// assert_eq!(instance.num_aisles(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct InstanceBuilder<T>
where
    T: UnitNumeric,
{
    num_items: usize,
    orders: Vec<DemandList<T>>,
    aisles: Vec<Vec<ItemEntry<T>>>,
    wave_size_lb: T,
    wave_size_ub: T,
}

impl<T> InstanceBuilder<T>
where
    T: UnitNumeric,
{
    /// Creates a new builder for an instance over `num_items` distinct items.
    pub fn new(num_items: usize) -> Self {
        Self {
            num_items,
            orders: Vec::new(),
            aisles: Vec::new(),
            wave_size_lb: T::zero(),
            wave_size_ub: T::max_value(),
        }
    }

    /// Returns the number of orders pushed so far.
    #[inline]
    pub fn num_orders(&self) -> usize {
        self.orders.len()
    }

    /// Returns the number of aisles pushed so far.
    #[inline]
    pub fn num_aisles(&self) -> usize {
        self.aisles.len()
    }

    /// Appends an order with the given demand entries. Ids are assigned in
    /// push order starting at 0. Zero-unit entries are dropped.
    ///
    /// # Panics
    ///
    /// Panics if any entry references an item outside `0..num_items`.
    pub fn push_order<I>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (usize, T)>,
    {
        let mut demand = DemandList::new();
        for (item, units) in entries {
            assert!(
                item < self.num_items,
                "called `InstanceBuilder::push_order` with item id out of bounds: the item count is {} but the id is {}",
                self.num_items,
                item
            );
            if units > T::zero() {
                demand.push(ItemEntry::new(ItemIndex::new(item), units));
            }
        }
        self.orders.push(demand);
        self
    }

    /// Appends an aisle with the given stock entries. Ids are assigned in
    /// push order starting at 0. Zero-unit entries are dropped.
    ///
    /// # Panics
    ///
    /// Panics if any entry references an item outside `0..num_items`.
    pub fn push_aisle<I>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (usize, T)>,
    {
        let mut stock = Vec::new();
        for (item, units) in entries {
            assert!(
                item < self.num_items,
                "called `InstanceBuilder::push_aisle` with item id out of bounds: the item count is {} but the id is {}",
                self.num_items,
                item
            );
            if units > T::zero() {
                stock.push(ItemEntry::new(ItemIndex::new(item), units));
            }
        }
        self.aisles.push(stock);
        self
    }

    /// Sets the inclusive wave-size interval `[lb, ub]`.
    pub fn wave_bounds(&mut self, lb: T, ub: T) -> &mut Self {
        self.wave_size_lb = lb;
        self.wave_size_ub = ub;
        self
    }

    /// Freezes the builder into an immutable `Instance`.
    ///
    /// # Panics
    ///
    /// Panics if the configured wave bounds are inverted (`lb > ub`).
    pub fn build(&self) -> Instance<T> {
        assert!(
            self.wave_size_lb <= self.wave_size_ub,
            "called `InstanceBuilder::build` with inverted wave bounds: lb is {} but ub is {}",
            self.wave_size_lb,
            self.wave_size_ub
        );

        let order_units = self
            .orders
            .iter()
            .map(|demand| {
                demand
                    .iter()
                    .fold(T::zero(), |acc, entry| acc.saturating_add(entry.units))
            })
            .collect();

        Instance {
            num_items: self.num_items,
            orders: self.orders.clone(),
            aisles: self.aisles.clone(),
            order_units,
            wave_size_lb: self.wave_size_lb,
            wave_size_ub: self.wave_size_ub,
        }
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
    fn test_builder_assigns_dense_ids_in_push_order() {
        let mut builder = InstanceBuilder::<u32>::new(3);
        builder.push_order([(0, 1)]);
        builder.push_order([(1, 2), (2, 1)]);
        builder.push_aisle([(0, 5), (1, 5)]);
        builder.wave_bounds(1, 10);
        let instance = builder.build();

        assert_eq!(instance.num_orders(), 2);
        assert_eq!(instance.num_aisles(), 1);
        assert_eq!(instance.num_items(), 3);
        assert_eq!(instance.order_demand(oi(0)).len(), 1);
        assert_eq!(instance.order_demand(oi(1)).len(), 2);
        assert_eq!(instance.aisle_stock(ai(0)).len(), 2);
    }

    #[test]
    fn test_order_units_are_precomputed() {
        let mut builder = InstanceBuilder::<u32>::new(2);
        builder.push_order([(0, 2), (1, 3)]);
        builder.push_order([(1, 7)]);
        let instance = builder.build();

        assert_eq!(instance.order_units(oi(0)), 5);
        assert_eq!(instance.order_units(oi(1)), 7);
    }

    #[test]
    fn test_zero_unit_entries_are_dropped() {
        let mut builder = InstanceBuilder::<u32>::new(2);
        builder.push_order([(0, 0), (1, 4)]);
        builder.push_aisle([(0, 0)]);
        let instance = builder.build();

        assert_eq!(instance.order_demand(oi(0)).len(), 1);
        assert_eq!(instance.order_demand(oi(0))[0].item.get(), 1);
        assert!(instance.aisle_stock(ai(0)).is_empty());
    }

    #[test]
    #[should_panic(expected = "called `InstanceBuilder::push_order` with item id out of bounds")]
    fn test_push_order_panics_on_out_of_range_item() {
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.push_order([(1, 1)]);
    }

    #[test]
    #[should_panic(expected = "called `InstanceBuilder::build` with inverted wave bounds")]
    fn test_build_panics_on_inverted_wave_bounds() {
        let mut builder = InstanceBuilder::<u32>::new(1);
        builder.wave_bounds(5, 3);
        builder.build();
    }

    #[test]
    fn test_adjacency_links_orders_and_aisles_through_items() {
        // Order 0 demands items {0, 1}, order 1 demands item {2}.
        // Aisle 0 stocks {0}, aisle 1 stocks {1, 2}, aisle 2 stocks nothing
        // relevant.
        let mut builder = InstanceBuilder::<u32>::new(4);
        builder.push_order([(0, 1), (1, 1)]);
        builder.push_order([(2, 2)]);
        builder.push_aisle([(0, 3)]);
        builder.push_aisle([(1, 1), (2, 1)]);
        builder.push_aisle([(3, 9)]);
        let instance = builder.build();

        let adjacency = instance.compute_adjacency();
        assert_eq!(adjacency.order_to_aisles[0], vec![0, 1]);
        assert_eq!(adjacency.order_to_aisles[1], vec![1]);
        assert_eq!(adjacency.aisle_to_orders[0], vec![0]);
        assert_eq!(adjacency.aisle_to_orders[1], vec![0, 1]);
        assert!(adjacency.aisle_to_orders[2].is_empty());
    }

    #[test]
    fn test_adjacency_deduplicates_multi_item_overlap() {
        // Aisle 0 stocks both items order 0 demands; the pair must appear once.
        let mut builder = InstanceBuilder::<u32>::new(2);
        builder.push_order([(0, 1), (1, 1)]);
        builder.push_aisle([(0, 1), (1, 1)]);
        let instance = builder.build();

        let adjacency = instance.compute_adjacency();
        assert_eq!(adjacency.order_to_aisles[0], vec![0]);
        assert_eq!(adjacency.aisle_to_orders[0], vec![0]);
    }

    #[test]
    fn test_display_summarizes_dimensions() {
        let mut builder = InstanceBuilder::<u32>::new(2);
        builder.push_order([(0, 1)]);
        builder.push_aisle([(0, 1)]);
        builder.wave_bounds(1, 1);
        let instance = builder.build();

        assert_eq!(
            format!("{}", instance),
            "Instance(orders: 1, items: 2, aisles: 1, wave: [1, 1])"
        );
    }
}

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

//! # Pickwave Model
//!
//! **The Core Domain Model for the Pickwave Wave-Picking Solver.**
//!
//! This crate defines the fundamental data structures used to represent the
//! SBPO 2025 wave-picking problem: customer orders demanding item units,
//! warehouse aisles stocking item units, and the wave-size interval the
//! picked units must fall into. It serves as the data interchange layer
//! between the problem definition (instance files) and the search engine
//! (`pickwave_asa`).
//!
//! ## Architecture
//!
//! * **`index`**: Strongly-typed wrappers (`OrderIndex`, `AisleIndex`,
//!   `ItemIndex`) to prevent logical indexing errors.
//! * **`instance`**: The immutable `Instance` (optimized for the search) and
//!   the mutable `InstanceBuilder` (optimized for configuration).
//! * **`loading`**: The whitespace-tokenized instance file reader.
//! * **`solution`**: The final reported solution format, including the true
//!   objective (picked units per visited aisle).
//!
//! ## Design Philosophy
//!
//! 1.  **Type Safety**: Indices are distinct types. You cannot accidentally
//!     use an `OrderIndex` to access an aisle.
//! 2.  **Dense Ids**: Orders, aisles, and items use dense `0..n` index spaces
//!     so the engine can store per-id data in flat vectors.
//! 3.  **Fail-Fast**: Builders and loaders validate inputs eagerly so the
//!     search engine never encounters an invalid instance.

pub mod index;
pub mod instance;
pub mod loading;
pub mod solution;

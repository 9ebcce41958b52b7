// This file is part of Hopper.
//
// Hopper is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Hopper is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Hopper.
// If not, see https://www.gnu.org/licenses/.

//! User operation pool and entity reputation tracking.
//!
//! The pool is the authoritative in-memory view of pending operations,
//! rebuilt from the persistent store on startup and scoped per entry point.
//! The reputation tracker maintains decaying per-entity counters in the same
//! store.

mod mempool;
pub use mempool::Mempool;

mod reputation;
pub use reputation::ReputationTracker;

//! field-collection: a variable-size collection of form fields (or
//! fieldsets) cloned from a single prototype and reconciled against
//! submitted data.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the structural pieces small and separately testable so the
//!   collection itself only has to express its policy (initial count,
//!   growth, template).
//! - Layers:
//!   - NamedMap<V, S>: insertion-ordered storage keyed by name, returning
//!     stable generational handles (slotmap storage, hashbrown index).
//!   - Field / Element / Fieldset: the instance tree. A fieldset owns its
//!     children in a NamedMap; every node is either a leaf or a group.
//!   - Prototype: the cloning source. Instantiation rebuilds every level of
//!     the tree by value, so no instance shares state with another.
//!   - Collection: seeds `count` instances named `0..count`, optionally a
//!     template instance under a placeholder name, and reconciles incoming
//!     data with bounded-then-unbounded growth.
//!
//! Reconciliation
//! - The first `count` entries of the incoming map fill existing instances
//!   and must name one; later entries grow the collection when `allow_add`
//!   is set and are dropped otherwise.
//! - Checks run before any write, so a failed call leaves the collection as
//!   it was.
//!
//! Constraints
//! - Single-threaded: `Collection` holds its factory in an `Rc` and is
//!   `!Send`/`!Sync`. Callers embedding it elsewhere serialize access.
//! - Names are unique at every level; duplicate inserts fail.
//! - Iteration is insertion order everywhere, including after removals.
//!
//! Notes and non-goals
//! - No rendering, transport or persistence. The crate manages structure and
//!   values only; validation rules are exported as data through
//!   `InputFilterProvider`.

mod collection;
mod error;
mod factory;
mod field;
mod input_filter;
pub mod named_map;
mod named_map_proptest;
mod options;
mod prototype;

// Public surface
pub use collection::{Collection, DEFAULT_TEMPLATE_PLACEHOLDER};
pub use error::{CollectionError, FactoryError};
pub use factory::{Factory, SpecFactory};
pub use field::{Element, Field, FieldKind, Fieldset, VALUE_ATTRIBUTE};
pub use input_filter::{InputFilterProvider, InputFilterSpec, InputSpec};
pub use named_map::{InsertError, NamedMap};
pub use options::{CollectionOptions, TargetElement};
pub use prototype::Prototype;

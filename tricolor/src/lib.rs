//! Memory management core for an embeddable Lisp runtime.
//!
//! Two collectors share the work:
//!  * strings, symbols, closures and other non-cons objects are reference
//!    counted (`ObjectRef`)
//!  * cons cells, the only values that can form cycles, are managed by an
//!    incremental tri-color collector whose colors are positions in a table
//!
//! Cons handles inside `Value`s do not keep cells alive. A cell survives a
//! collection only if it is rooted or reachable from a root; an embedder
//! holding a cons across `collect`/`sweep` must `root` it.
//!
//! ```
//! use tricolor::{Color, Heap, Tag, Value};
//!
//! let mut heap = Heap::new();
//! let child = heap.make_cons(Tag::CONS).unwrap();
//! let root = heap.make_root_cons_with(Tag::CONS, &child, &Value::nil()).unwrap();
//!
//! assert_eq!(heap.color(&child), Ok(Color::Grey));
//! assert_eq!(heap.root_ref_count(&root), 1);
//! ```

mod barrier;
mod cell;
mod config;
mod error;
mod heap;
mod object;
mod printer;
mod roots;
mod scan;
mod store;
mod table;
mod types;
mod value;
mod verify;

pub use crate::cell::ConsId;
pub use crate::config::{HeapConfig, DEFAULT_CELLS_PER_PAGE, DEFAULT_ROOTS_PER_PAGE};
pub use crate::error::HeapError;
pub use crate::heap::{Color, Heap, ZoneStats};
pub use crate::object::{Closure, ObjectBody, ObjectRef};
pub use crate::table::Boundaries;
pub use crate::types::{Destructor, Tag, TypeInfo, TypeTable, ATOM_TAGS, CONS_TAGS, OBJECT_TAGS};
pub use crate::value::Value;

/// Reference-counted heap objects: everything that is not a cons cell.
///
/// Each object is boxed behind a header holding its count, its tag and the
/// destructor resolved from the `TypeTable` when the object was created.
/// `ObjectRef::clone` is the copy operation (count + 1) and dropping an
/// `ObjectRef` is the release operation (count - 1, freeing at zero).
use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

use log::trace;

use crate::types::{Destructor, Tag};
use crate::value::Value;

/// A compiled procedure with its captured environment
#[derive(Clone, Debug, PartialEq)]
pub struct Closure {
    pub arity: u8,
    pub code: Vec<u8>,
    pub captured: Vec<Value>,
}

/// The payload of a heap object
#[derive(Debug, PartialEq)]
pub enum ObjectBody {
    Text(String),
    Symbol(String),
    Closure(Closure),
    /// Opaque bytes for collaborator-registered types
    Opaque(Vec<u8>),
}

impl ObjectBody {
    /// The values this body holds on to. Object bodies are immutable once
    /// created, so these can only name values that existed before the object.
    pub fn values(&self) -> &[Value] {
        match self {
            ObjectBody::Closure(closure) => &closure.captured,
            _ => &[],
        }
    }
}

/// Header stored in front of every object body
struct ObjectHeader {
    count: Cell<usize>,
    tag: Tag,
    destructor: Option<Destructor>,
}

struct ObjectBox {
    header: ObjectHeader,
    body: ObjectBody,
}

/// An owning, counted reference to a heap object
pub struct ObjectRef {
    ptr: NonNull<ObjectBox>,
}

impl ObjectRef {
    /// Box up a new object with a count of one
    pub(crate) fn new(tag: Tag, body: ObjectBody, destructor: Option<Destructor>) -> ObjectRef {
        let boxed = Box::new(ObjectBox {
            header: ObjectHeader {
                count: Cell::new(1),
                tag,
                destructor,
            },
            body,
        });

        ObjectRef {
            ptr: NonNull::from(Box::leak(boxed)),
        }
    }

    fn inner(&self) -> &ObjectBox {
        // The box stays allocated while any ObjectRef to it exists
        unsafe { self.ptr.as_ref() }
    }

    pub fn tag(&self) -> Tag {
        self.inner().header.tag
    }

    /// Current number of owning references
    pub fn ref_count(&self) -> usize {
        self.inner().header.count.get()
    }

    pub fn body(&self) -> &ObjectBody {
        &self.inner().body
    }

    /// The text of a `Text` or `Symbol` body
    pub fn as_str(&self) -> Option<&str> {
        match self.body() {
            ObjectBody::Text(s) | ObjectBody::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.ptr == other.ptr
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> ObjectRef {
        let count = &self.inner().header.count;
        count.set(count.get() + 1);

        ObjectRef { ptr: self.ptr }
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        let remaining = {
            let count = &self.inner().header.count;
            let remaining = count.get() - 1;
            count.set(remaining);
            remaining
        };

        if remaining == 0 {
            // Last reference: reclaim ownership of the box
            let mut boxed = unsafe { Box::from_raw(self.ptr.as_ptr()) };

            trace!("releasing object with tag {}", boxed.header.tag);

            if let Some(destructor) = boxed.header.destructor {
                destructor(&mut boxed.body);
            }
        }
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &ObjectRef) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.body() {
            ObjectBody::Text(s) => write!(f, "{:?}", s),
            ObjectBody::Symbol(s) => write!(f, "{}", s),
            ObjectBody::Closure(c) => write!(f, "<closure/{}>", c.arity),
            ObjectBody::Opaque(bytes) => write!(f, "<object {} [{} bytes]>", self.tag(), bytes.len()),
        }
    }
}

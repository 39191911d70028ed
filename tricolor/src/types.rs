/// The type tag space and the per-type registration table.
///
/// Tags are small integers split into three disjoint ranges: atoms, which
/// carry no ownership, reference-counted heap objects, and cons kinds, which
/// live in the tri-color cons table.
use std::fmt;
use std::ops::Range;

use crate::error::{err_type, HeapError};
use crate::object::ObjectBody;

/// A runtime type tag
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u16);

pub const ATOM_TAGS: Range<u16> = 0x000..0x100;
pub const OBJECT_TAGS: Range<u16> = 0x100..0x200;
pub const CONS_TAGS: Range<u16> = 0x200..0x300;

impl Tag {
    pub const NIL: Tag = Tag(0x000);
    pub const INTEGER: Tag = Tag(0x001);
    pub const CHARACTER: Tag = Tag(0x002);
    pub const BOOLEAN: Tag = Tag(0x003);

    pub const TEXT: Tag = Tag(0x100);
    pub const SYMBOL: Tag = Tag(0x101);
    pub const CLOSURE: Tag = Tag(0x102);

    pub const CONS: Tag = Tag(0x200);
    pub const LIST_HEAD: Tag = Tag(0x201);
    pub const QUOTE: Tag = Tag(0x202);

    pub fn is_atom(self) -> bool {
        ATOM_TAGS.contains(&self.0)
    }

    pub fn is_object(self) -> bool {
        OBJECT_TAGS.contains(&self.0)
    }

    pub fn is_cons(self) -> bool {
        CONS_TAGS.contains(&self.0)
    }

    /// Reject anything outside the cons-kind range
    pub fn expect_cons(self) -> Result<Tag, HeapError> {
        if self.is_cons() {
            Ok(self)
        } else {
            Err(err_type("a cons-kind tag", self))
        }
    }

    /// Reject anything outside the heap object range
    pub fn expect_object(self) -> Result<Tag, HeapError> {
        if self.is_object() {
            Ok(self)
        } else {
            Err(err_type("a heap object tag", self))
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#05x}", self.0)
    }
}

/// Called on an object body when the last reference to it is released,
/// before the storage is freed.
pub type Destructor = fn(&mut ObjectBody);

/// Registration record for one heap object type
#[derive(Copy, Clone, Debug)]
pub struct TypeInfo {
    pub name: &'static str,
    pub destructor: Option<Destructor>,
}

/// Registered heap object types, indexed by tag offset within the object range
pub struct TypeTable {
    entries: Vec<Option<TypeInfo>>,
}

impl TypeTable {
    /// A table with the built-in object types registered
    pub fn new() -> TypeTable {
        let mut table = TypeTable {
            entries: vec![None; OBJECT_TAGS.len()],
        };

        table.entries[0] = Some(TypeInfo {
            name: "text",
            destructor: None,
        });
        table.entries[1] = Some(TypeInfo {
            name: "symbol",
            destructor: None,
        });
        table.entries[2] = Some(TypeInfo {
            name: "closure",
            destructor: None,
        });

        table
    }

    /// Register or replace the type information for an object tag
    pub fn register(
        &mut self,
        tag: Tag,
        name: &'static str,
        destructor: Option<Destructor>,
    ) -> Result<(), HeapError> {
        let index = Self::index(tag.expect_object()?);
        self.entries[index] = Some(TypeInfo { name, destructor });
        Ok(())
    }

    pub fn lookup(&self, tag: Tag) -> Option<&TypeInfo> {
        if tag.is_object() {
            self.entries[Self::index(tag)].as_ref()
        } else {
            None
        }
    }

    pub fn destructor(&self, tag: Tag) -> Option<Destructor> {
        self.lookup(tag).and_then(|info| info.destructor)
    }

    pub fn name(&self, tag: Tag) -> &'static str {
        match tag {
            Tag::NIL => "nil",
            Tag::INTEGER => "integer",
            Tag::CHARACTER => "character",
            Tag::BOOLEAN => "boolean",
            _ if tag.is_cons() => "cons",
            _ => self.lookup(tag).map(|info| info.name).unwrap_or("unknown"),
        }
    }

    fn index(tag: Tag) -> usize {
        (tag.0 - OBJECT_TAGS.start) as usize
    }
}

impl Default for TypeTable {
    fn default() -> TypeTable {
        TypeTable::new()
    }
}

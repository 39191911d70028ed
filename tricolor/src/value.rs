/// The runtime value type: a tag plus a payload.
///
/// The payload is one of
///  * an inline word for atoms (nil, integers, characters, booleans)
///  * an owning `ObjectRef` for reference-counted heap objects
///  * a non-owning `ConsId` handle for cons cells, which the tri-color
///    collector manages instead of counting
use std::fmt;

use crate::cell::ConsId;
use crate::object::ObjectRef;
use crate::types::Tag;

#[derive(Clone)]
enum Payload {
    Inline(isize),
    Object(ObjectRef),
    Cons(ConsId),
}

/// A tagged runtime value. Cloning a value that holds an object adds one to
/// the object's count; dropping it takes one away.
#[derive(Clone)]
pub struct Value {
    tag: Tag,
    payload: Payload,
}

impl Value {
    pub fn nil() -> Value {
        Value {
            tag: Tag::NIL,
            payload: Payload::Inline(0),
        }
    }

    pub fn integer(value: isize) -> Value {
        Value {
            tag: Tag::INTEGER,
            payload: Payload::Inline(value),
        }
    }

    pub fn character(value: char) -> Value {
        Value {
            tag: Tag::CHARACTER,
            payload: Payload::Inline(value as isize),
        }
    }

    pub fn boolean(value: bool) -> Value {
        Value {
            tag: Tag::BOOLEAN,
            payload: Payload::Inline(value as isize),
        }
    }

    /// Wrap an object reference, taking over its count unit
    pub fn object(object: ObjectRef) -> Value {
        Value {
            tag: object.tag(),
            payload: Payload::Object(object),
        }
    }

    /// A handle to a cons cell. Only the heap hands these out.
    pub(crate) fn cons(tag: Tag, id: ConsId) -> Value {
        Value {
            tag,
            payload: Payload::Cons(id),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn is_nil(&self) -> bool {
        self.tag == Tag::NIL
    }

    pub fn is_cons(&self) -> bool {
        matches!(self.payload, Payload::Cons(_))
    }

    pub fn as_integer(&self) -> Option<isize> {
        match (self.tag, &self.payload) {
            (Tag::INTEGER, Payload::Inline(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_character(&self) -> Option<char> {
        match (self.tag, &self.payload) {
            (Tag::CHARACTER, Payload::Inline(c)) => std::char::from_u32(*c as u32),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match (self.tag, &self.payload) {
            (Tag::BOOLEAN, Payload::Inline(b)) => Some(*b != 0),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match &self.payload {
            Payload::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_cons(&self) -> Option<ConsId> {
        match self.payload {
            Payload::Cons(id) => Some(id),
            _ => None,
        }
    }

    /// Gather every cons handle this value refers to, either directly or
    /// through the bodies of the objects it holds
    pub(crate) fn cons_refs(&self, out: &mut Vec<ConsId>) {
        match &self.payload {
            Payload::Cons(id) => out.push(*id),
            Payload::Object(object) => {
                for value in object.body().values() {
                    value.cons_refs(out);
                }
            }
            Payload::Inline(_) => (),
        }
    }
}

impl Default for Value {
    fn default() -> Value {
        Value::nil()
    }
}

/// Identity comparison
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        if self.tag != other.tag {
            return false;
        }

        match (&self.payload, &other.payload) {
            (Payload::Inline(a), Payload::Inline(b)) => a == b,
            (Payload::Object(a), Payload::Object(b)) => a.ptr_eq(b),
            (Payload::Cons(a), Payload::Cons(b)) => a == b,
            _ => false,
        }
    }
}

impl From<isize> for Value {
    fn from(value: isize) -> Value {
        Value::integer(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Value {
        Value::object(object)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.payload, self.tag) {
            (_, Tag::NIL) => write!(f, "nil"),
            (Payload::Inline(n), Tag::INTEGER) => write!(f, "{}", n),
            (Payload::Inline(_), Tag::CHARACTER) => match self.as_character() {
                Some(c) => write!(f, "#\\{}", c),
                None => write!(f, "#\\?"),
            },
            (Payload::Inline(b), Tag::BOOLEAN) => write!(f, "{}", if *b != 0 { "#t" } else { "#f" }),
            (Payload::Inline(n), tag) => write!(f, "<atom {} {}>", tag, n),
            (Payload::Object(object), _) => write!(f, "{:?}", object),
            (Payload::Cons(id), tag) => write!(f, "<cons {} {}>", tag, id),
        }
    }
}

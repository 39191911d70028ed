use std::collections::HashSet;

use crate::cell::CellId;
use crate::error::HeapError;
use crate::heap::Heap;
use crate::object::ObjectBody;
use crate::value::Value;

impl Heap {
    /// Render a value in list notation. Cells already printed on the current
    /// path are shown as `...` so cyclic structures terminate. A cons handle
    /// that does not name a live cell of this heap is a `ForeignCons` error.
    pub fn print(&self, value: &Value) -> Result<String, HeapError> {
        let mut out = String::new();
        let mut path = HashSet::new();

        self.write_value(&mut out, value, &mut path)?;
        Ok(out)
    }

    fn write_value(
        &self,
        out: &mut String,
        value: &Value,
        path: &mut HashSet<CellId>,
    ) -> Result<(), HeapError> {
        if value.is_cons() {
            let head = self.live_cons(value)?;
            return self.write_list(out, head, path);
        }

        let text = match value.as_object().map(|object| object.body()) {
            Some(ObjectBody::Text(s)) => format!("{:?}", s),
            Some(ObjectBody::Symbol(s)) => s.clone(),
            Some(ObjectBody::Closure(c)) => format!("<closure/{}>", c.arity),
            Some(ObjectBody::Opaque(_)) => format!("<{}>", self.types().name(value.tag())),
            None => format!("{:?}", value),
        };
        out.push_str(&text);
        Ok(())
    }

    fn write_list(
        &self,
        out: &mut String,
        head: CellId,
        path: &mut HashSet<CellId>,
    ) -> Result<(), HeapError> {
        let mut entered = Vec::new();
        let mut tail = head;

        out.push('(');

        loop {
            if !path.insert(tail) {
                out.push_str("...");
                break;
            }
            entered.push(tail);

            let cell = &self.store[tail];
            self.write_value(out, cell.car(), path)?;

            let next = cell.cdr();
            if next.is_cons() {
                out.push(' ');
                tail = self.live_cons(next)?;
            } else {
                if !next.is_nil() {
                    out.push_str(" . ");
                    self.write_value(out, next, path)?;
                }
                break;
            }
        }

        for id in entered {
            path.remove(&id);
        }

        out.push(')');
        Ok(())
    }
}

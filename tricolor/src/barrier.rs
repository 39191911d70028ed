/// The write barrier and the mutating accessors that rely on it.
///
/// Invariant maintained here: no root or black cell refers to a white cell,
/// whether directly or through an object it holds. Whenever such an edge is
/// about to appear, the white cell is shaded grey first.
use log::trace;

use crate::cell::{CellId, ConsId};
use crate::error::HeapError;
use crate::heap::{Color, Heap};
use crate::value::Value;

impl Heap {
    /// Shade `value` grey if it is a white cons. Roots and cells that are
    /// already grey or black are left where they are.
    pub fn ensure_not_white(&mut self, value: &Value) -> Result<(), HeapError> {
        let id = self.live_cons(value)?;
        self.shade(id);
        Ok(())
    }

    /// Replace the car of `target`, releasing the previous value
    pub fn set_car(&mut self, target: &Value, value: &Value) -> Result<(), HeapError> {
        let id = self.live_cons(target)?;
        self.check_child(value)?;

        let previous = self.store[id].replace_car(value.clone());
        drop(previous);

        self.write_barrier(id, value);
        Ok(())
    }

    /// Replace the cdr of `target`, releasing the previous value
    pub fn set_cdr(&mut self, target: &Value, value: &Value) -> Result<(), HeapError> {
        let id = self.live_cons(target)?;
        self.check_child(value)?;

        let previous = self.store[id].replace_cdr(value.clone());
        drop(previous);

        self.write_barrier(id, value);
        Ok(())
    }

    /// Called after `child` has been stored into `parent`. A child object is
    /// looked through for the cons cells it holds.
    fn write_barrier(&mut self, parent: CellId, child: &Value) {
        match self.color_of(parent) {
            Some(Color::Root) | Some(Color::Black) => {
                let mut refs = Vec::new();
                child.cons_refs(&mut refs);
                self.shade_all(refs);
            }
            _ => (),
        }
    }

    /// Pass every cell referred to by `id`'s children through the barrier.
    /// Used whenever a cell becomes root or black.
    pub(crate) fn shade_children(&mut self, id: CellId) {
        let mut refs = Vec::new();
        self.store[id].car().cons_refs(&mut refs);
        self.store[id].cdr().cons_refs(&mut refs);
        self.shade_all(refs);
    }

    fn shade_all(&mut self, refs: Vec<ConsId>) {
        for handle in refs {
            // stored values were live when stored and stay reachable from here
            if let Some(id) = self.resolve(handle) {
                self.shade(id);
            }
        }
    }

    fn shade(&mut self, id: CellId) {
        if let Some(Color::White) = self.color_of(id) {
            let slot = self.store[id].slot_index();
            self.table.shade(&mut self.store, slot);
            trace!("barrier shaded {} grey", id);
        }
    }
}

#[cfg(test)]
mod test {
    use crate::heap::{Color, Heap};
    use crate::object::Closure;
    use crate::types::Tag;
    use crate::value::Value;

    #[test]
    fn barrier_ignores_non_white() {
        let mut heap = Heap::new();
        let root = heap.make_root_cons(Tag::CONS).unwrap();
        let child = heap.make_cons(Tag::CONS).unwrap();

        heap.ensure_not_white(&child).unwrap();
        let after_first = heap.boundaries();
        heap.ensure_not_white(&child).unwrap();
        heap.ensure_not_white(&root).unwrap();

        assert!(heap.boundaries() == after_first);
        assert!(heap.color(&child) == Ok(Color::Grey));
        assert!(heap.color(&root) == Ok(Color::Root));
    }

    #[test]
    fn set_car_on_root_shades_child() {
        let mut heap = Heap::new();
        let root = heap.make_root_cons(Tag::CONS).unwrap();
        let child = heap.make_cons(Tag::CONS).unwrap();

        heap.set_car(&root, &child).unwrap();

        assert!(heap.color(&child) == Ok(Color::Grey));
        assert!(heap.car(&root).unwrap() == child);
    }

    #[test]
    fn set_cdr_on_white_does_not_shade() {
        let mut heap = Heap::new();
        let parent = heap.make_cons(Tag::CONS).unwrap();
        let child = heap.make_cons(Tag::CONS).unwrap();

        heap.set_cdr(&parent, &child).unwrap();

        assert!(heap.color(&child) == Ok(Color::White));
    }

    #[test]
    fn barrier_looks_inside_stored_closures() {
        let mut heap = Heap::new();
        let root = heap.make_root_cons(Tag::CONS).unwrap();
        let captured = heap.make_cons(Tag::CONS).unwrap();

        let closure = heap.alloc_closure(Closure {
            arity: 0,
            code: vec![],
            captured: vec![captured.clone()],
        });
        heap.set_cdr(&root, &Value::object(closure)).unwrap();

        assert!(heap.color(&captured) == Ok(Color::Grey));
        heap.check_invariants().unwrap();
    }

    #[test]
    fn set_car_releases_previous_object() {
        let mut heap = Heap::new();
        let text = heap.alloc_text("old");
        let pair = heap
            .make_cons_with(Tag::CONS, &Value::object(text.clone()), &Value::nil())
            .unwrap();
        assert!(text.ref_count() == 2);

        heap.set_car(&pair, &Value::integer(0)).unwrap();
        assert!(text.ref_count() == 1);
    }
}

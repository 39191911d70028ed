use tricolor::{Closure, Color, Heap, HeapConfig, HeapError, Tag, Value};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn heap_with(cells_per_page: usize, roots_per_page: usize, page_limit: Option<usize>) -> Heap {
    init_logging();

    Heap::with_config(HeapConfig {
        cells_per_page,
        roots_per_page,
        page_limit,
    })
}

#[test]
fn fresh_cells_fill_the_white_zone_in_order() {
    let mut heap = heap_with(8, 4, None);

    let cells: Vec<Value> = (0..3).map(|_| heap.make_cons(Tag::CONS).unwrap()).collect();

    for (index, cell) in cells.iter().enumerate() {
        assert!(heap.slot_index(cell) == Ok(index));
        assert!(heap.color(cell) == Ok(Color::White));
    }

    let b = heap.boundaries();
    assert!(b.black_top == 0);
    assert!(b.grey_top == 0);
    assert!(b.white_top == 3);
    heap.check_invariants().unwrap();
}

#[test]
fn rooting_a_white_cell() {
    let mut heap = heap_with(8, 4, None);
    let x = heap.make_cons(Tag::CONS).unwrap();

    heap.root(&x).unwrap();

    assert!(heap.color(&x) == Ok(Color::Root));
    assert!(heap.root_ref_count(&x) == 1);
    assert!(heap.stats().white == 0);
    assert!(heap.stats().roots == 1);
    heap.check_invariants().unwrap();
}

#[test]
fn rooting_shades_children() {
    let mut heap = heap_with(8, 4, None);
    let y = heap.make_cons(Tag::CONS).unwrap();
    let x = heap.make_cons_with(Tag::CONS, &y, &Value::nil()).unwrap();

    heap.root(&x).unwrap();

    assert!(heap.color(&y) == Ok(Color::Grey));
    let b = heap.boundaries();
    assert!(b.grey_top - b.grey_begin == 1);
    heap.check_invariants().unwrap();
}

#[test]
fn nested_roots_need_matching_unroots() {
    let mut heap = heap_with(8, 4, None);
    let x = heap.make_cons(Tag::CONS).unwrap();

    heap.root(&x).unwrap();
    heap.root(&x).unwrap();
    assert!(heap.root_ref_count(&x) == 2);

    heap.unroot(&x).unwrap();
    assert!(heap.root_ref_count(&x) == 1);
    assert!(heap.color(&x) == Ok(Color::Root));

    heap.unroot(&x).unwrap();
    assert!(heap.root_ref_count(&x) == 0);
    assert!(heap.color(&x) == Ok(Color::Black));
    assert!(heap.unroot(&x) == Err(HeapError::NotRooted));
    heap.check_invariants().unwrap();
}

#[test]
fn failed_root_allocation_leaves_heap_untouched() {
    let mut heap = heap_with(8, 4, Some(1));
    let first = heap.alloc_text("first");
    let second = heap.alloc_text("second");

    let result = heap.make_root_cons_with(
        Tag::CONS,
        &Value::object(first.clone()),
        &Value::object(second.clone()),
    );

    assert!(result.map(|_| ()) == Err(HeapError::OutOfMemory));
    assert!(first.ref_count() == 1);
    assert!(second.ref_count() == 1);

    let stats = heap.stats();
    assert!(stats.capacity == 0);
    assert!(stats.root_capacity == 0);
    assert!(stats.pages == 0);
    heap.check_invariants().unwrap();

    // the budget was refunded, so a plain cons still fits
    heap.make_cons(Tag::CONS).unwrap();
    assert!(heap.stats().pages == 1);
}

#[test]
fn root_count_tracks_calls() {
    let mut heap = heap_with(8, 4, None);
    let x = heap.make_cons(Tag::CONS).unwrap();

    for n in 1..=5 {
        heap.root(&x).unwrap();
        assert!(heap.root_ref_count(&x) == n);
    }
    for n in (0..5).rev() {
        heap.unroot(&x).unwrap();
        assert!(heap.root_ref_count(&x) == n);
    }
}

#[test]
fn round_trip_leaves_siblings_white() {
    let mut heap = heap_with(8, 4, None);
    let a = heap.make_cons(Tag::CONS).unwrap();
    let b = heap.make_cons(Tag::CONS).unwrap();
    let c = heap.make_cons(Tag::CONS).unwrap();

    heap.root(&b).unwrap();
    heap.unroot(&b).unwrap();

    assert!(heap.color(&a) == Ok(Color::White));
    assert!(heap.color(&b) == Ok(Color::Black));
    assert!(heap.color(&c) == Ok(Color::White));

    let stats = heap.stats();
    assert!(stats.black == 1);
    assert!(stats.white == 2);
    assert!(stats.roots == 0);
    heap.check_invariants().unwrap();
}

#[test]
fn unroot_grows_a_full_table() {
    let mut heap = heap_with(2, 2, None);

    heap.make_cons(Tag::CONS).unwrap();
    heap.make_cons(Tag::CONS).unwrap();
    let rooted = heap.make_root_cons(Tag::CONS).unwrap();
    heap.make_cons(Tag::CONS).unwrap();
    heap.make_cons(Tag::CONS).unwrap();

    assert!(heap.stats().capacity == 4);
    assert!(heap.stats().free == 0);

    heap.unroot(&rooted).unwrap();

    assert!(heap.color(&rooted) == Ok(Color::Black));
    assert!(heap.stats().capacity == 6);
    heap.check_invariants().unwrap();
}

#[test]
fn slot_indices_are_unique_per_table() {
    let mut heap = heap_with(4, 2, None);
    let mut cells = Vec::new();

    for i in 0..10 {
        let cell = heap.make_cons(Tag::CONS).unwrap();
        if i % 3 == 0 {
            heap.root(&cell).unwrap();
        }
        cells.push(cell);
    }

    let mut table_slots = Vec::new();
    let mut root_slots = Vec::new();
    for cell in &cells {
        let slot = heap.slot_index(cell).unwrap();
        if heap.color(cell) == Ok(Color::Root) {
            root_slots.push(slot);
        } else {
            table_slots.push(slot);
        }
    }

    table_slots.sort();
    table_slots.dedup();
    root_slots.sort();
    root_slots.dedup();
    assert!(table_slots.len() == 6);
    assert!(root_slots == vec![0, 1, 2, 3]);
    heap.check_invariants().unwrap();
}

#[test]
fn barrier_shades_stores_into_black_cells() {
    let mut heap = heap_with(8, 4, None);
    let parent = heap.make_root_cons(Tag::CONS).unwrap();
    heap.unroot(&parent).unwrap();
    assert!(heap.color(&parent) == Ok(Color::Black));

    let child = heap.make_cons(Tag::CONS).unwrap();
    heap.set_car(&parent, &child).unwrap();
    assert!(heap.color(&child) == Ok(Color::Grey));

    // white parents are not barriered
    let loose = heap.make_cons(Tag::CONS).unwrap();
    let other = heap.make_cons(Tag::CONS).unwrap();
    heap.set_cdr(&loose, &other).unwrap();
    assert!(heap.color(&other) == Ok(Color::White));
    heap.check_invariants().unwrap();
}

#[test]
fn collection_keeps_reachable_cycles() {
    let mut heap = heap_with(4, 2, None);
    let root = heap.make_root_cons(Tag::CONS).unwrap();

    let a = heap.make_cons(Tag::CONS).unwrap();
    let b = heap.make_cons_with(Tag::CONS, &Value::nil(), &a).unwrap();
    heap.set_cdr(&a, &b).unwrap();
    heap.set_car(&root, &a).unwrap();

    let garbage = heap.make_cons(Tag::CONS).unwrap();
    heap.set_cdr(&garbage, &garbage).unwrap();

    assert!(heap.collect() == Ok(1));
    assert!(heap.color(&garbage) == Err(HeapError::ForeignCons));
    assert!(heap.color(&a).is_ok());
    assert!(heap.color(&b).is_ok());
    heap.check_invariants().unwrap();

    // nothing new was allocated, so a second cycle reclaims nothing
    assert!(heap.collect() == Ok(0));
    heap.check_invariants().unwrap();
}

#[test]
fn reclaimed_cells_release_objects_on_reuse() {
    let mut heap = heap_with(4, 2, None);
    let name = heap.alloc_symbol("transient");

    heap.list(&[Value::object(name.clone()), Value::integer(1)]).unwrap();
    assert!(name.ref_count() == 2);

    assert!(heap.collect() == Ok(2));
    for _ in 0..4 {
        heap.make_cons(Tag::CONS).unwrap();
    }

    assert!(name.ref_count() == 1);
    heap.check_invariants().unwrap();
}

#[test]
fn stale_and_foreign_handles_are_rejected() {
    let mut heap = heap_with(4, 2, None);
    let mut other = heap_with(4, 2, None);

    let dead = heap.make_cons(Tag::CONS).unwrap();
    heap.collect().unwrap();

    assert!(heap.car(&dead) == Err(HeapError::ForeignCons));
    assert!(heap.root(&dead) == Err(HeapError::ForeignCons));

    let elsewhere = heap.make_cons(Tag::CONS).unwrap();
    let own = other.make_cons(Tag::CONS).unwrap();
    other.make_cons(Tag::CONS).unwrap();

    // both heaps hold a cell at the same storage position
    assert!(other.color(&elsewhere) == Err(HeapError::ForeignCons));
    assert!(other.root(&elsewhere) == Err(HeapError::ForeignCons));
    assert!(other.set_car(&own, &elsewhere) == Err(HeapError::ForeignCons));
    assert!(other.color(&own) == Ok(Color::White));
    assert!(other.car(&own) == Ok(Value::nil()));
    assert!(heap.color(&elsewhere) == Ok(Color::White));

    let empty = heap_with(4, 2, None);
    assert!(empty.color(&elsewhere) == Err(HeapError::ForeignCons));
    other.check_invariants().unwrap();
}

#[test]
fn handles_to_reused_slots_stay_dead() {
    let mut heap = heap_with(4, 2, None);

    let dead = heap
        .make_cons_with(Tag::CONS, &Value::integer(1), &Value::nil())
        .unwrap();
    assert!(heap.collect() == Ok(1));

    let fresh = heap
        .make_cons_with(Tag::CONS, &Value::integer(2), &Value::nil())
        .unwrap();
    // the reclaimed storage is handed out again
    assert!(heap.slot_index(&fresh) == Ok(0));

    assert!(heap.car(&dead) == Err(HeapError::ForeignCons));
    assert!(heap.color(&dead) == Err(HeapError::ForeignCons));
    assert!(heap.root(&dead) == Err(HeapError::ForeignCons));
    assert!(heap.unroot(&dead) == Err(HeapError::ForeignCons));
    assert!(heap.set_cdr(&dead, &Value::integer(3)) == Err(HeapError::ForeignCons));
    assert!(heap.print(&dead) == Err(HeapError::ForeignCons));
    assert!(heap.root_ref_count(&dead) == 0);

    assert!(heap.car(&fresh) == Ok(Value::integer(2)));
    assert!(heap.cdr(&fresh) == Ok(Value::nil()));
    assert!(heap.root_ref_count(&fresh) == 0);
    assert!(heap.color(&fresh) == Ok(Color::White));
    heap.check_invariants().unwrap();
}

#[test]
fn closures_in_roots_keep_captured_cells() {
    let mut heap = heap_with(4, 2, None);
    let root = heap.make_root_cons(Tag::CONS).unwrap();

    let captured = heap
        .make_cons_with(Tag::CONS, &Value::integer(7), &Value::nil())
        .unwrap();
    let closure = heap.alloc_closure(Closure {
        arity: 0,
        code: vec![0],
        captured: vec![captured.clone()],
    });

    heap.set_car(&root, &Value::object(closure)).unwrap();
    assert!(heap.color(&captured) == Ok(Color::Grey));
    heap.check_invariants().unwrap();

    // the second cycle finds the cell again by re-shading the root's children
    assert!(heap.collect() == Ok(0));
    assert!(heap.collect() == Ok(0));
    assert!(heap.car(&captured) == Ok(Value::integer(7)));
    heap.check_invariants().unwrap();
}

#[test]
fn closures_in_black_cells_keep_captured_cells() {
    let mut heap = heap_with(4, 2, None);
    let parent = heap.make_root_cons(Tag::CONS).unwrap();
    heap.unroot(&parent).unwrap();
    assert!(heap.color(&parent) == Ok(Color::Black));

    let captured = heap.make_cons(Tag::CONS).unwrap();
    let closure = heap.alloc_closure(Closure {
        arity: 1,
        code: Vec::new(),
        captured: vec![Value::integer(1), captured.clone()],
    });

    heap.set_cdr(&parent, &Value::object(closure)).unwrap();
    assert!(heap.color(&captured) == Ok(Color::Grey));

    assert!(heap.collect() == Ok(0));
    assert!(heap.color(&captured).is_ok());
    heap.check_invariants().unwrap();
}

#[test]
fn closures_capturing_dead_cells_are_refused() {
    let mut heap = heap_with(4, 2, None);
    let root = heap.make_root_cons(Tag::CONS).unwrap();

    let dead = heap.make_cons(Tag::CONS).unwrap();
    assert!(heap.collect() == Ok(1));

    let closure = heap.alloc_closure(Closure {
        arity: 0,
        code: Vec::new(),
        captured: vec![dead],
    });

    assert!(heap.set_car(&root, &Value::object(closure)) == Err(HeapError::ForeignCons));
    assert!(heap.car(&root) == Ok(Value::nil()));
    heap.check_invariants().unwrap();
}

#[test]
fn root_construction_shades_both_children() {
    let mut heap = heap_with(8, 4, None);
    let car = heap.make_cons(Tag::CONS).unwrap();
    let cdr = heap.make_cons(Tag::LIST_HEAD).unwrap();

    let root = heap.make_root_cons_with(Tag::QUOTE, &car, &cdr).unwrap();

    assert!(root.tag() == Tag::QUOTE);
    assert!(heap.color(&car) == Ok(Color::Grey));
    assert!(heap.color(&cdr) == Ok(Color::Grey));
    assert!(heap.stats().grey == 2);
    heap.check_invariants().unwrap();
}

use fnv::FnvHashMap;
use log::debug;

use tricolor::{Color, Heap, HeapConfig, Tag, Value};

use crate::error::{err_command, err_unbound, ExplorerError};

const HELP: &str = "\
cons [name [car [cdr]]]  allocate a white cons, optionally binding it
root name                root a cons, or add to its root count
unroot name              release one root reference
setcar a b               store b into the car of a
setcdr a b               store b into the cdr of a
str name text            bind a new text object
scan [n]                 blacken up to n grey cells (default 1)
sweep                    reclaim white cells once scanning is done
collect                  scan everything, then sweep
stats                    show zone and table occupancy
check                    verify heap invariants
color name               show the color of a cons
refs name                show a root count or object reference count
print name               print a value in list notation
help                     this text

Operands are integers, nil, #t, #f or bound names. Names are not roots.";

fn color_name(color: Color) -> &'static str {
    match color {
        Color::Black => "black",
        Color::Grey => "grey",
        Color::White => "white",
        Color::Root => "root",
    }
}

/// A heap plus a table of named values, driven one command line at a time
pub struct Session {
    heap: Heap,
    names: FnvHashMap<String, Value>,
    anonymous: usize,
}

impl Session {
    pub fn new(config: HeapConfig) -> Session {
        Session {
            heap: Heap::with_config(config),
            names: FnvHashMap::default(),
            anonymous: 0,
        }
    }

    /// Run a single command line, returning any text to show
    pub fn run(&mut self, line: &str) -> Result<Option<String>, ExplorerError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            return Ok(None);
        }

        let mut words = line.split_whitespace();
        // non-empty, so there is a first word
        let command = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        debug!("command {} {:?}", command, args);

        let output = match (command, args.as_slice()) {
            ("cons", args) if args.len() <= 3 => self.cons(args)?,
            ("root", [name]) => {
                let value = self.lookup(name)?;
                self.heap.root(&value)?;
                format!("{} root count {}", name, self.heap.root_ref_count(&value))
            }
            ("unroot", [name]) => {
                let value = self.lookup(name)?;
                self.heap.unroot(&value)?;
                self.describe(name, &value)?
            }
            ("setcar", [target, operand]) => {
                let target = self.lookup(target)?;
                let value = self.operand(operand)?;
                self.heap.set_car(&target, &value)?;
                self.heap.print(&target)?
            }
            ("setcdr", [target, operand]) => {
                let target = self.lookup(target)?;
                let value = self.operand(operand)?;
                self.heap.set_cdr(&target, &value)?;
                self.heap.print(&target)?
            }
            ("str", [name, ..]) if args.len() > 1 => {
                let text = args[1..].join(" ");
                let object = self.heap.alloc_text(&text);
                self.names.insert(String::from(*name), Value::object(object));
                format!("{} = {:?}", name, text)
            }
            ("scan", []) => format!("blackened {}", self.heap.scan(1)),
            ("scan", [n]) => {
                let budget = n
                    .parse::<usize>()
                    .map_err(|_| err_command("scan budget must be a non-negative integer"))?;
                format!("blackened {}", self.heap.scan(budget))
            }
            ("sweep", []) => {
                let reclaimed = self.heap.sweep()?;
                self.after_sweep(reclaimed)
            }
            ("collect", []) => {
                let reclaimed = self.heap.collect()?;
                self.after_sweep(reclaimed)
            }
            ("stats", []) => {
                let s = self.heap.stats();
                format!(
                    "black {} gap {} grey {} white {} free {} of {}; roots {} of {}; pages {}",
                    s.black,
                    s.gap,
                    s.grey,
                    s.white,
                    s.free,
                    s.capacity,
                    s.roots,
                    s.root_capacity,
                    s.pages
                )
            }
            ("check", []) => {
                self.heap.check_invariants()?;
                String::from("ok")
            }
            ("color", [name]) => {
                let value = self.lookup(name)?;
                self.describe(name, &value)?
            }
            ("refs", [name]) => {
                let value = self.lookup(name)?;
                match value.as_object() {
                    // less the copy just taken by lookup
                    Some(object) => format!("{} refs {}", name, object.ref_count() - 1),
                    None => format!("{} root count {}", name, self.heap.root_ref_count(&value)),
                }
            }
            ("print", [name]) => {
                let value = self.lookup(name)?;
                self.heap.print(&value)?
            }
            ("help", []) => String::from(HELP),
            _ => return Err(err_command(&format!("cannot parse '{}', try 'help'", line))),
        };

        Ok(Some(output))
    }

    fn cons(&mut self, args: &[&str]) -> Result<String, ExplorerError> {
        let car = match args.get(1) {
            Some(operand) => self.operand(operand)?,
            None => Value::nil(),
        };
        let cdr = match args.get(2) {
            Some(operand) => self.operand(operand)?,
            None => Value::nil(),
        };

        let value = self.heap.make_cons_with(Tag::CONS, &car, &cdr)?;

        let name = match args.first() {
            Some(name) => String::from(*name),
            None => {
                self.anonymous += 1;
                format!("_{}", self.anonymous)
            }
        };

        let description = self.describe(&name, &value)?;
        self.names.insert(name, value);
        Ok(description)
    }

    fn describe(&self, name: &str, value: &Value) -> Result<String, ExplorerError> {
        let color = self.heap.color(value)?;
        let slot = self.heap.slot_index(value)?;
        Ok(format!("{} is {} at slot {}", name, color_name(color), slot))
    }

    /// Forget names bound to reclaimed cells, since their handles no longer
    /// resolve
    fn after_sweep(&mut self, reclaimed: usize) -> String {
        let heap = &self.heap;
        let mut dead: Vec<String> = self
            .names
            .iter()
            .filter(|(_, value)| value.is_cons() && heap.color(value).is_err())
            .map(|(name, _)| name.clone())
            .collect();

        for name in &dead {
            self.names.remove(name);
        }

        if dead.is_empty() {
            format!("reclaimed {}", reclaimed)
        } else {
            dead.sort();
            format!("reclaimed {}; released {}", reclaimed, dead.join(", "))
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, ExplorerError> {
        self.names.get(name).cloned().ok_or_else(|| err_unbound(name))
    }

    fn operand(&self, word: &str) -> Result<Value, ExplorerError> {
        match word {
            "nil" => Ok(Value::nil()),
            "#t" => Ok(Value::boolean(true)),
            "#f" => Ok(Value::boolean(false)),
            _ => match word.parse::<isize>() {
                Ok(n) => Ok(Value::integer(n)),
                Err(_) => self.lookup(word),
            },
        }
    }
}

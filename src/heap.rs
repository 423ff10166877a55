// ABOUTME: Arena allocator with a root stack and mark-and-sweep garbage collector

use crate::config::{INITIAL_GC_THRESHOLD, ROOT_STACK_CAPACITY};
use crate::env;
use crate::error::SchError;
use crate::port::{InPort, OutPort};
use crate::value::{Obj, ObjRef, PrimFn, Primitive};
use std::cmp;
use std::collections::HashMap;

/// Handles for the symbols the evaluator dispatches on, interned once at
/// startup so form recognition is a handle comparison.
#[derive(Clone, Copy)]
pub struct Syms {
    pub quote: ObjRef,
    pub set_bang: ObjRef,
    pub define: ObjRef,
    pub ok: ObjRef,
    pub if_: ObjRef,
    pub lambda: ObjRef,
    pub begin: ObjRef,
    pub cond: ObjRef,
    pub else_: ObjRef,
    pub let_: ObjRef,
    pub and: ObjRef,
    pub or: ObjRef,
}

#[derive(Clone, Copy, Debug)]
pub struct GcStats {
    pub live: usize,
    pub threshold: usize,
    pub collections: usize,
}

/// The interpreter context: every allocated value, the root stack, the
/// interned symbol table, the canonical singletons and the global
/// environment. All other subsystems borrow this mutably; allocation is
/// the only point at which a collection can run.
pub struct Heap {
    /// Object pool; `None` slots are on the free list.
    slots: Vec<Option<Obj>>,
    /// Per-slot mark bits, live only during a collection.
    marks: Vec<bool>,
    free: Vec<usize>,
    live: usize,
    threshold: usize,
    collections: usize,
    /// Pinned handles. Every allocation is born on this stack; callers
    /// truncate back to a watermark at scope boundaries.
    roots: Vec<ObjRef>,
    symbols: HashMap<String, ObjRef>,

    pub nil: ObjRef,
    pub t: ObjRef,
    pub f: ObjRef,
    pub eof: ObjRef,
    pub global_env: ObjRef,
    pub syms: Syms,
    /// The `eval` and `apply` primitives, recognized by handle identity
    /// and intercepted by the evaluator.
    pub eval_proc: ObjRef,
    pub apply_proc: ObjRef,
    /// Default ports for `read`/`write` and friends. Held outside the
    /// object pool so pushback state survives across calls.
    pub stdin_port: InPort,
    pub stdout_port: OutPort,
}

impl Heap {
    /// Build a fully initialized interpreter context: singletons, interned
    /// dispatch symbols, the global environment and every primitive.
    pub fn new() -> Result<Heap, SchError> {
        let placeholder = ObjRef(0);
        let mut heap = Heap {
            slots: Vec::new(),
            marks: Vec::new(),
            free: Vec::new(),
            live: 0,
            threshold: INITIAL_GC_THRESHOLD,
            collections: 0,
            roots: Vec::with_capacity(ROOT_STACK_CAPACITY),
            symbols: HashMap::new(),
            nil: placeholder,
            t: placeholder,
            f: placeholder,
            eof: placeholder,
            global_env: placeholder,
            syms: Syms {
                quote: placeholder,
                set_bang: placeholder,
                define: placeholder,
                ok: placeholder,
                if_: placeholder,
                lambda: placeholder,
                begin: placeholder,
                cond: placeholder,
                else_: placeholder,
                let_: placeholder,
                and: placeholder,
                or: placeholder,
            },
            eval_proc: placeholder,
            apply_proc: placeholder,
            stdin_port: InPort::stdin(),
            stdout_port: OutPort::stdout(),
        };

        heap.nil = heap.alloc(Obj::Nil)?;
        heap.t = heap.alloc(Obj::Boolean(true))?;
        heap.f = heap.alloc(Obj::Boolean(false))?;
        heap.eof = heap.alloc(Obj::Eof)?;

        heap.syms = Syms {
            quote: heap.intern("quote")?,
            set_bang: heap.intern("set!")?,
            define: heap.intern("define")?,
            ok: heap.intern("ok")?,
            if_: heap.intern("if")?,
            lambda: heap.intern("lambda")?,
            begin: heap.intern("begin")?,
            cond: heap.intern("cond")?,
            else_: heap.intern("else")?,
            let_: heap.intern("let")?,
            and: heap.intern("and")?,
            or: heap.intern("or")?,
        };

        heap.global_env = env::setup_environment(&mut heap)?;
        crate::builtins::register_builtins(&mut heap)?;
        heap.clear_roots();
        Ok(heap)
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocate a value. May run a full collection first; the fresh
    /// handle is pushed onto the root stack before it is returned, so it
    /// survives any allocation the caller performs next.
    pub fn alloc(&mut self, obj: Obj) -> Result<ObjRef, SchError> {
        if self.live >= self.threshold {
            self.collect();
        }
        let index = match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(obj);
                i
            }
            None => {
                self.slots.push(Some(obj));
                self.marks.push(false);
                self.slots.len() - 1
            }
        };
        self.live += 1;
        let r = ObjRef(index as u32);
        self.push_root(r)?;
        Ok(r)
    }

    pub fn cons(&mut self, car: ObjRef, cdr: ObjRef) -> Result<ObjRef, SchError> {
        self.alloc(Obj::Pair { car, cdr })
    }

    pub fn fixnum(&mut self, value: i64) -> Result<ObjRef, SchError> {
        self.alloc(Obj::Fixnum(value))
    }

    pub fn flonum(&mut self, value: f64) -> Result<ObjRef, SchError> {
        self.alloc(Obj::Flonum(value))
    }

    pub fn complex(&mut self, re: f64, im: f64) -> Result<ObjRef, SchError> {
        self.alloc(Obj::Complex { re, im })
    }

    pub fn character(&mut self, value: u8) -> Result<ObjRef, SchError> {
        self.alloc(Obj::Character(value))
    }

    pub fn string(&mut self, value: impl Into<String>) -> Result<ObjRef, SchError> {
        self.alloc(Obj::Str(value.into()))
    }

    pub fn compound(
        &mut self,
        params: ObjRef,
        body: ObjRef,
        env: ObjRef,
    ) -> Result<ObjRef, SchError> {
        self.alloc(Obj::Compound { params, body, env })
    }

    pub fn primitive(&mut self, name: &'static str, func: PrimFn) -> Result<ObjRef, SchError> {
        self.alloc(Obj::Primitive(Primitive { name, func }))
    }

    pub fn input_port(&mut self, port: InPort) -> Result<ObjRef, SchError> {
        self.alloc(Obj::InputPort(port))
    }

    pub fn output_port(&mut self, port: OutPort) -> Result<ObjRef, SchError> {
        self.alloc(Obj::OutputPort(port))
    }

    /// The canonical boolean for `value`; never allocates.
    pub fn boolean(&self, value: bool) -> ObjRef {
        if value {
            self.t
        } else {
            self.f
        }
    }

    /// Build a proper list from the items, right to left.
    pub fn list(&mut self, items: &[ObjRef]) -> Result<ObjRef, SchError> {
        let mut tail = self.nil;
        for &item in items.iter().rev() {
            tail = self.cons(item, tail)?;
        }
        Ok(tail)
    }

    /// Return the interned symbol for `name`, allocating it on first use.
    /// Two interns of equal names always yield the same handle.
    pub fn intern(&mut self, name: &str) -> Result<ObjRef, SchError> {
        if let Some(&existing) = self.symbols.get(name) {
            return Ok(existing);
        }
        let r = self.alloc(Obj::Symbol(name.to_string()))?;
        self.symbols.insert(name.to_string(), r);
        Ok(r)
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    pub fn get(&self, r: ObjRef) -> &Obj {
        self.slots[r.index()]
            .as_ref()
            .expect("dangling handle: slot was swept")
    }

    pub fn is_nil(&self, r: ObjRef) -> bool {
        r == self.nil
    }

    /// `#f` alone is false; every other value is truthy.
    pub fn is_truthy(&self, r: ObjRef) -> bool {
        r != self.f
    }

    pub fn pair(&self, r: ObjRef) -> Option<(ObjRef, ObjRef)> {
        match self.get(r) {
            Obj::Pair { car, cdr } => Some((*car, *cdr)),
            _ => None,
        }
    }

    pub fn car(&self, r: ObjRef) -> Result<ObjRef, SchError> {
        match self.get(r) {
            Obj::Pair { car, .. } => Ok(*car),
            other => Err(SchError::type_error("car", "pair", other)),
        }
    }

    pub fn cdr(&self, r: ObjRef) -> Result<ObjRef, SchError> {
        match self.get(r) {
            Obj::Pair { cdr, .. } => Ok(*cdr),
            other => Err(SchError::type_error("cdr", "pair", other)),
        }
    }

    pub fn set_car(&mut self, r: ObjRef, value: ObjRef) -> Result<(), SchError> {
        match &mut self.slots[r.index()] {
            Some(Obj::Pair { car, .. }) => {
                *car = value;
                Ok(())
            }
            Some(other) => Err(SchError::type_error("set-car!", "pair", other)),
            None => unreachable!("dangling handle: slot was swept"),
        }
    }

    pub fn set_cdr(&mut self, r: ObjRef, value: ObjRef) -> Result<(), SchError> {
        match &mut self.slots[r.index()] {
            Some(Obj::Pair { cdr, .. }) => {
                *cdr = value;
                Ok(())
            }
            Some(other) => Err(SchError::type_error("set-cdr!", "pair", other)),
            None => unreachable!("dangling handle: slot was swept"),
        }
    }

    pub fn symbol_name(&self, r: ObjRef) -> Option<&str> {
        match self.get(r) {
            Obj::Symbol(name) => Some(name),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Roots
    // ------------------------------------------------------------------

    /// Pin a handle. Fails once the fixed root stack capacity is spent.
    pub fn push_root(&mut self, r: ObjRef) -> Result<(), SchError> {
        if self.roots.len() >= ROOT_STACK_CAPACITY {
            return Err(SchError::Resource("root stack overflow".to_string()));
        }
        self.roots.push(r);
        Ok(())
    }

    /// Current root stack height, for bracketing an allocating region.
    pub fn root_watermark(&self) -> usize {
        self.roots.len()
    }

    /// Drop every root pinned after the watermark.
    pub fn truncate_roots(&mut self, watermark: usize) {
        self.roots.truncate(watermark);
    }

    /// Drop all transient roots. The REPL does this between top-level
    /// expressions.
    pub fn clear_roots(&mut self) {
        self.roots.clear();
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Mark from every root, then sweep the unmarked remainder. Infallible
    /// once triggered; afterwards the threshold is `max(initial, 2 * live)`.
    pub fn collect(&mut self) {
        let mut pending: Vec<ObjRef> = Vec::with_capacity(self.roots.len() + 16);
        pending.push(self.nil);
        pending.push(self.t);
        pending.push(self.f);
        pending.push(self.eof);
        pending.push(self.global_env);
        pending.push(self.eval_proc);
        pending.push(self.apply_proc);
        pending.extend(self.symbols.values().copied());
        pending.extend(self.roots.iter().copied());

        while let Some(r) = pending.pop() {
            let i = r.index();
            if self.marks[i] {
                continue;
            }
            self.marks[i] = true;
            match self.slots[i].as_ref().expect("marked a swept slot") {
                Obj::Pair { car, cdr } => {
                    pending.push(*car);
                    pending.push(*cdr);
                }
                Obj::Compound { params, body, env } => {
                    pending.push(*params);
                    pending.push(*body);
                    pending.push(*env);
                }
                _ => {}
            }
        }

        for i in 0..self.slots.len() {
            if self.slots[i].is_some() && !self.marks[i] {
                // Dropping the payload releases owned buffers and the
                // last handle to any open port.
                self.slots[i] = None;
                self.free.push(i);
                self.live -= 1;
            }
            self.marks[i] = false;
        }

        self.collections += 1;
        self.threshold = cmp::max(INITIAL_GC_THRESHOLD, 2 * self.live);
    }

    pub fn stats(&self) -> GcStats {
        GcStats {
            live: self.live,
            threshold: self.threshold,
            collections: self.collections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons_are_canonical() {
        let heap = Heap::new().unwrap();
        assert!(matches!(heap.get(heap.nil), Obj::Nil));
        assert!(matches!(heap.get(heap.t), Obj::Boolean(true)));
        assert!(matches!(heap.get(heap.f), Obj::Boolean(false)));
        assert!(matches!(heap.get(heap.eof), Obj::Eof));
        assert_eq!(heap.boolean(true), heap.t);
        assert_eq!(heap.boolean(false), heap.f);
    }

    #[test]
    fn test_interning_gives_identity() {
        let mut heap = Heap::new().unwrap();
        let a = heap.intern("banana").unwrap();
        let b = heap.intern("banana").unwrap();
        let c = heap.intern("apple").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(heap.symbol_name(a), Some("banana"));
    }

    #[test]
    fn test_collect_frees_unrooted_values() {
        let mut heap = Heap::new().unwrap();
        heap.clear_roots();
        let before = heap.stats().live;
        for i in 0..100 {
            heap.fixnum(i).unwrap();
        }
        assert_eq!(heap.stats().live, before + 100);
        heap.clear_roots();
        heap.collect();
        assert_eq!(heap.stats().live, before);
    }

    #[test]
    fn test_collect_keeps_rooted_structures() {
        let mut heap = Heap::new().unwrap();
        let one = heap.fixnum(1).unwrap();
        let two = heap.fixnum(2).unwrap();
        let pair = heap.cons(one, two).unwrap();
        heap.clear_roots();
        heap.push_root(pair).unwrap();
        heap.collect();
        let (car, cdr) = heap.pair(pair).unwrap();
        assert!(matches!(heap.get(car), Obj::Fixnum(1)));
        assert!(matches!(heap.get(cdr), Obj::Fixnum(2)));
    }

    #[test]
    fn test_collect_handles_cycles() {
        let mut heap = Heap::new().unwrap();
        let a = heap.cons(heap.nil, heap.nil).unwrap();
        let b = heap.cons(a, heap.nil).unwrap();
        heap.set_cdr(a, b).unwrap();
        heap.clear_roots();
        heap.push_root(a).unwrap();
        let live_with_cycle = heap.stats().live;
        heap.collect();
        assert_eq!(heap.stats().live, live_with_cycle);

        // Drop the root and the whole cycle goes away.
        heap.clear_roots();
        heap.collect();
        assert_eq!(heap.stats().live, live_with_cycle - 2);
    }

    #[test]
    fn test_allocation_triggers_collection_at_threshold() {
        let mut heap = Heap::new().unwrap();
        heap.clear_roots();
        let baseline = heap.stats().live;
        let mark = heap.root_watermark();
        for i in 0..(INITIAL_GC_THRESHOLD * 3) as i64 {
            heap.fixnum(i).unwrap();
            heap.truncate_roots(mark);
        }
        // Dropped garbage cannot accumulate past the collection trigger.
        assert!(heap.stats().collections > 0);
        assert!(heap.stats().live <= baseline + INITIAL_GC_THRESHOLD);
    }

    #[test]
    fn test_threshold_resets_after_collection() {
        let mut heap = Heap::new().unwrap();
        heap.clear_roots();
        heap.collect();
        let stats = heap.stats();
        assert_eq!(
            stats.threshold,
            std::cmp::max(INITIAL_GC_THRESHOLD, 2 * stats.live)
        );
    }

    #[test]
    fn test_root_stack_overflow_is_a_resource_error() {
        let mut heap = Heap::new().unwrap();
        heap.clear_roots();
        let mut result = Ok(());
        for _ in 0..=ROOT_STACK_CAPACITY {
            result = heap.push_root(heap.nil);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(SchError::Resource(_))));
    }

    #[test]
    fn test_interned_symbols_survive_collection() {
        let mut heap = Heap::new().unwrap();
        let sym = heap.intern("persistent").unwrap();
        heap.clear_roots();
        heap.collect();
        assert_eq!(heap.symbol_name(sym), Some("persistent"));
        assert_eq!(heap.intern("persistent").unwrap(), sym);
    }
}

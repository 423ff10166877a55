// ABOUTME: Environment chain: frames of parallel variable/value lists on the heap

use crate::error::SchError;
use crate::heap::Heap;
use crate::value::{Obj, ObjRef};

/// An environment is a list of frames; a frame is a pair of two parallel
/// lists `(vars . vals)`. The empty environment is nil, so environments
/// are ordinary heap values that the collector traces like any pair.

/// Create a fresh environment of one empty frame over the empty
/// environment.
pub fn setup_environment(heap: &mut Heap) -> Result<ObjRef, SchError> {
    let nil = heap.nil;
    extend(heap, nil, nil, nil)
}

/// Scan frames nearest-first for `var` and return its value.
pub fn lookup(heap: &Heap, var: ObjRef, env: ObjRef) -> Result<ObjRef, SchError> {
    let mut e = env;
    while let Some((frame, parent)) = heap.pair(e) {
        if let Some((mut vars, mut vals)) = heap.pair(frame) {
            loop {
                let Some((candidate, vars_rest)) = heap.pair(vars) else {
                    break;
                };
                let Some((value, vals_rest)) = heap.pair(vals) else {
                    break;
                };
                if candidate == var {
                    return Ok(value);
                }
                vars = vars_rest;
                vals = vals_rest;
            }
        }
        e = parent;
    }
    Err(unbound(heap, var))
}

/// Overwrite an existing binding in place, scanning like [`lookup`].
pub fn set_var(heap: &mut Heap, var: ObjRef, val: ObjRef, env: ObjRef) -> Result<(), SchError> {
    let mut e = env;
    while let Some((frame, parent)) = heap.pair(e) {
        if let Some(vals_node) = find_in_frame(heap, var, frame) {
            return heap.set_car(vals_node, val);
        }
        e = parent;
    }
    Err(unbound(heap, var))
}

/// Bind `var` in the innermost frame only: overwrite an existing binding,
/// otherwise prepend to the frame's parallel lists.
pub fn define_var(heap: &mut Heap, var: ObjRef, val: ObjRef, env: ObjRef) -> Result<(), SchError> {
    let frame = heap.car(env)?;
    if let Some(vals_node) = find_in_frame(heap, var, frame) {
        return heap.set_car(vals_node, val);
    }
    let old_vars = heap.car(frame)?;
    let old_vals = heap.cdr(frame)?;
    let new_vars = heap.cons(var, old_vars)?;
    let new_vals = heap.cons(val, old_vals)?;
    heap.set_car(frame, new_vars)?;
    heap.set_cdr(frame, new_vals)
}

/// Allocate a new frame pairing `vars` with `vals` and cons it onto
/// `base_env`. When `vars` is an improper list ending in a symbol, the
/// remaining values are bound to that symbol as a list, which is how
/// variadic lambdas receive their rest arguments. A length mismatch on
/// the required parameters is an arity error.
pub fn extend(
    heap: &mut Heap,
    vars: ObjRef,
    vals: ObjRef,
    base_env: ObjRef,
) -> Result<ObjRef, SchError> {
    let supplied = list_length(heap, vals);
    let mut names = Vec::new();
    let mut values = Vec::new();
    let mut required = 0usize;
    let mut v = vars;
    let mut a = vals;
    loop {
        match heap.get(v) {
            Obj::Nil => {
                if !heap.is_nil(a) {
                    return Err(SchError::arity("lambda", required.to_string(), supplied));
                }
                break;
            }
            Obj::Symbol(_) => {
                // rest parameter takes whatever values remain
                names.push(v);
                values.push(a);
                break;
            }
            Obj::Pair { car, cdr } => {
                let (name, vars_rest) = (*car, *cdr);
                let Some((value, vals_rest)) = heap.pair(a) else {
                    return Err(SchError::arity(
                        "lambda",
                        format!("at least {}", required + 1),
                        supplied,
                    ));
                };
                names.push(name);
                values.push(value);
                required += 1;
                v = vars_rest;
                a = vals_rest;
            }
            other => {
                return Err(SchError::type_error("lambda", "a parameter list", other));
            }
        }
    }
    let name_list = heap.list(&names)?;
    let value_list = heap.list(&values)?;
    let frame = heap.cons(name_list, value_list)?;
    heap.cons(frame, base_env)
}

/// Walk a frame's parallel lists; on a hit, return the vals node whose
/// car holds the binding, so callers can mutate it in place.
fn find_in_frame(heap: &Heap, var: ObjRef, frame: ObjRef) -> Option<ObjRef> {
    let (mut vars, mut vals_node) = heap.pair(frame)?;
    loop {
        let (candidate, vars_rest) = heap.pair(vars)?;
        if candidate == var {
            return Some(vals_node);
        }
        vars = vars_rest;
        vals_node = heap.pair(vals_node)?.1;
    }
}

fn list_length(heap: &Heap, list: ObjRef) -> usize {
    let mut n = 0;
    let mut l = list;
    while let Some((_, rest)) = heap.pair(l) {
        n += 1;
        l = rest;
    }
    n
}

fn unbound(heap: &Heap, var: ObjRef) -> SchError {
    SchError::UnboundVariable(heap.symbol_name(var).unwrap_or("#<non-symbol>").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Heap, ObjRef) {
        let mut heap = Heap::new().unwrap();
        let env = setup_environment(&mut heap).unwrap();
        (heap, env)
    }

    #[test]
    fn test_define_and_lookup() {
        let (mut heap, env) = fresh();
        let x = heap.intern("x").unwrap();
        let forty_two = heap.fixnum(42).unwrap();
        define_var(&mut heap, x, forty_two, env).unwrap();
        assert_eq!(lookup(&heap, x, env).unwrap(), forty_two);
    }

    #[test]
    fn test_lookup_unbound_names_the_symbol() {
        let (mut heap, env) = fresh();
        let missing = heap.intern("missing").unwrap();
        match lookup(&heap, missing, env) {
            Err(SchError::UnboundVariable(name)) => assert_eq!(name, "missing"),
            other => panic!("expected unbound variable, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_define_overwrites_in_innermost_frame() {
        let (mut heap, env) = fresh();
        let x = heap.intern("x").unwrap();
        let one = heap.fixnum(1).unwrap();
        let two = heap.fixnum(2).unwrap();
        define_var(&mut heap, x, one, env).unwrap();
        define_var(&mut heap, x, two, env).unwrap();
        assert_eq!(lookup(&heap, x, env).unwrap(), two);
    }

    #[test]
    fn test_shadowing_and_parent_lookup() {
        let (mut heap, parent) = fresh();
        let x = heap.intern("x").unwrap();
        let y = heap.intern("y").unwrap();
        let ten = heap.fixnum(10).unwrap();
        let twenty = heap.fixnum(20).unwrap();
        define_var(&mut heap, x, ten, parent).unwrap();
        define_var(&mut heap, y, twenty, parent).unwrap();

        let params = heap.list(&[x]).unwrap();
        let hundred = heap.fixnum(100).unwrap();
        let args = heap.list(&[hundred]).unwrap();
        let child = extend(&mut heap, params, args, parent).unwrap();

        // child sees its own x, parent's y, and parent keeps its x
        assert_eq!(lookup(&heap, x, child).unwrap(), hundred);
        assert_eq!(lookup(&heap, y, child).unwrap(), twenty);
        assert_eq!(lookup(&heap, x, parent).unwrap(), ten);
    }

    #[test]
    fn test_set_mutates_the_owning_frame() {
        let (mut heap, parent) = fresh();
        let x = heap.intern("x").unwrap();
        let one = heap.fixnum(1).unwrap();
        define_var(&mut heap, x, one, parent).unwrap();

        let nil = heap.nil;
        let child = extend(&mut heap, nil, nil, parent).unwrap();
        let two = heap.fixnum(2).unwrap();
        set_var(&mut heap, x, two, child).unwrap();
        assert_eq!(lookup(&heap, x, parent).unwrap(), two);
    }

    #[test]
    fn test_set_unbound_is_an_error() {
        let (mut heap, env) = fresh();
        let ghost = heap.intern("ghost").unwrap();
        let one = heap.fixnum(1).unwrap();
        assert!(matches!(
            set_var(&mut heap, ghost, one, env),
            Err(SchError::UnboundVariable(_))
        ));
    }

    #[test]
    fn test_extend_arity_mismatch() {
        let (mut heap, env) = fresh();
        let x = heap.intern("x").unwrap();
        let y = heap.intern("y").unwrap();
        let params = heap.list(&[x, y]).unwrap();
        let one = heap.fixnum(1).unwrap();
        let args = heap.list(&[one]).unwrap();
        assert!(matches!(
            extend(&mut heap, params, args, env),
            Err(SchError::Arity { .. })
        ));

        let params = heap.list(&[x]).unwrap();
        let one = heap.fixnum(1).unwrap();
        let two = heap.fixnum(2).unwrap();
        let args = heap.list(&[one, two]).unwrap();
        assert!(matches!(
            extend(&mut heap, params, args, env),
            Err(SchError::Arity { .. })
        ));
    }

    #[test]
    fn test_extend_with_rest_parameter() {
        let (mut heap, env) = fresh();
        let x = heap.intern("x").unwrap();
        let rest = heap.intern("rest").unwrap();
        // (x . rest)
        let params = heap.cons(x, rest).unwrap();
        let one = heap.fixnum(1).unwrap();
        let two = heap.fixnum(2).unwrap();
        let three = heap.fixnum(3).unwrap();
        let args = heap.list(&[one, two, three]).unwrap();
        let child = extend(&mut heap, params, args, env).unwrap();

        assert_eq!(lookup(&heap, x, child).unwrap(), one);
        let bound = lookup(&heap, rest, child).unwrap();
        let (first, tail) = heap.pair(bound).unwrap();
        assert_eq!(first, two);
        assert_eq!(heap.pair(tail).unwrap().0, three);
    }
}

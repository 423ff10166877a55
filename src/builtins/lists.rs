// ABOUTME: Pair and list primitives

use super::{define_primitive, expect_args};
use crate::error::SchError;
use crate::heap::Heap;
use crate::value::ObjRef;

fn cons(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "cons", args, 2)?;
    heap.cons(a[0], a[1])
}

fn car(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "car", args, 1)?;
    heap.car(a[0])
}

fn cdr(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "cdr", args, 1)?;
    heap.cdr(a[0])
}

fn set_car(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "set-car!", args, 2)?;
    heap.set_car(a[0], a[1])?;
    Ok(heap.syms.ok)
}

fn set_cdr(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "set-cdr!", args, 2)?;
    heap.set_cdr(a[0], a[1])?;
    Ok(heap.syms.ok)
}

/// The evaluator already consed the arguments into a fresh list.
fn list(_heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    Ok(args)
}

pub fn register(heap: &mut Heap, env: ObjRef) -> Result<(), SchError> {
    define_primitive(heap, env, "cons", cons)?;
    define_primitive(heap, env, "car", car)?;
    define_primitive(heap, env, "cdr", cdr)?;
    define_primitive(heap, env, "set-car!", set_car)?;
    define_primitive(heap, env, "set-cdr!", set_cdr)?;
    define_primitive(heap, env, "list", list)?;
    Ok(())
}

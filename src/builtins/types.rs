// ABOUTME: Type predicate primitives

//! Type predicates. Each takes one argument and answers `#t` or `#f`.
//! `complex?` follows the numeric tower and accepts every number;
//! `procedure?` accepts both primitive and compound procedures.

use super::{define_primitive, expect_args};
use crate::error::SchError;
use crate::heap::Heap;
use crate::value::{Obj, ObjRef};

fn is_null(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "null?", args, 1)?;
    Ok(heap.boolean(heap.is_nil(a[0])))
}

fn is_boolean(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "boolean?", args, 1)?;
    Ok(heap.boolean(matches!(heap.get(a[0]), Obj::Boolean(_))))
}

fn is_symbol(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "symbol?", args, 1)?;
    Ok(heap.boolean(matches!(heap.get(a[0]), Obj::Symbol(_))))
}

fn is_integer(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "integer?", args, 1)?;
    Ok(heap.boolean(matches!(heap.get(a[0]), Obj::Fixnum(_))))
}

fn is_real(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "real?", args, 1)?;
    Ok(heap.boolean(matches!(heap.get(a[0]), Obj::Flonum(_))))
}

fn is_complex(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "complex?", args, 1)?;
    Ok(heap.boolean(heap.get(a[0]).is_number()))
}

fn is_char(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "char?", args, 1)?;
    Ok(heap.boolean(matches!(heap.get(a[0]), Obj::Character(_))))
}

fn is_string(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "string?", args, 1)?;
    Ok(heap.boolean(matches!(heap.get(a[0]), Obj::Str(_))))
}

fn is_pair(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "pair?", args, 1)?;
    Ok(heap.boolean(matches!(heap.get(a[0]), Obj::Pair { .. })))
}

fn is_procedure(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "procedure?", args, 1)?;
    Ok(heap.boolean(matches!(
        heap.get(a[0]),
        Obj::Primitive(_) | Obj::Compound { .. }
    )))
}

fn is_input_port(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "input-port?", args, 1)?;
    Ok(heap.boolean(matches!(heap.get(a[0]), Obj::InputPort(_))))
}

fn is_output_port(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "output-port?", args, 1)?;
    Ok(heap.boolean(matches!(heap.get(a[0]), Obj::OutputPort(_))))
}

fn is_eof_object(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "eof-object?", args, 1)?;
    Ok(heap.boolean(a[0] == heap.eof))
}

pub fn register(heap: &mut Heap, env: ObjRef) -> Result<(), SchError> {
    define_primitive(heap, env, "null?", is_null)?;
    define_primitive(heap, env, "boolean?", is_boolean)?;
    define_primitive(heap, env, "symbol?", is_symbol)?;
    define_primitive(heap, env, "integer?", is_integer)?;
    define_primitive(heap, env, "real?", is_real)?;
    define_primitive(heap, env, "complex?", is_complex)?;
    define_primitive(heap, env, "char?", is_char)?;
    define_primitive(heap, env, "string?", is_string)?;
    define_primitive(heap, env, "pair?", is_pair)?;
    define_primitive(heap, env, "procedure?", is_procedure)?;
    define_primitive(heap, env, "input-port?", is_input_port)?;
    define_primitive(heap, env, "output-port?", is_output_port)?;
    define_primitive(heap, env, "eof-object?", is_eof_object)?;
    Ok(())
}

// ABOUTME: Conversion primitives between characters, numbers, strings and symbols

//! Conversions. `number->string` and `string->number` cover fixnums
//! only; `string->number` parses a leading integer prefix and falls back
//! to 0, like the C library it replaces.

use super::{define_primitive, expect_args};
use crate::error::SchError;
use crate::heap::Heap;
use crate::value::{Obj, ObjRef};

fn char_to_integer(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "char->integer", args, 1)?;
    match heap.get(a[0]) {
        Obj::Character(c) => {
            let n = i64::from(*c);
            heap.fixnum(n)
        }
        other => Err(SchError::type_error("char->integer", "a character", other)),
    }
}

fn integer_to_char(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "integer->char", args, 1)?;
    match heap.get(a[0]) {
        Obj::Fixnum(n) => {
            let c = *n as u8;
            heap.character(c)
        }
        other => Err(SchError::type_error("integer->char", "an integer", other)),
    }
}

fn number_to_string(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "number->string", args, 1)?;
    match heap.get(a[0]) {
        Obj::Fixnum(n) => {
            let text = n.to_string();
            heap.string(text)
        }
        other => Err(SchError::type_error("number->string", "an integer", other)),
    }
}

fn string_to_number(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "string->number", args, 1)?;
    match heap.get(a[0]) {
        Obj::Str(s) => {
            let n = parse_integer_prefix(s);
            heap.fixnum(n)
        }
        other => Err(SchError::type_error("string->number", "a string", other)),
    }
}

fn symbol_to_string(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "symbol->string", args, 1)?;
    match heap.get(a[0]) {
        Obj::Symbol(name) => {
            let text = name.clone();
            heap.string(text)
        }
        other => Err(SchError::type_error("symbol->string", "a symbol", other)),
    }
}

fn string_to_symbol(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "string->symbol", args, 1)?;
    match heap.get(a[0]) {
        Obj::Str(s) => {
            let name = s.clone();
            heap.intern(&name)
        }
        other => Err(SchError::type_error("string->symbol", "a string", other)),
    }
}

/// Optional sign and leading digits; anything after the prefix is
/// ignored and an empty prefix parses as 0.
fn parse_integer_prefix(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let mut sign = 1i64;
    let mut rest = trimmed;
    if let Some(stripped) = trimmed.strip_prefix('-') {
        sign = -1;
        rest = stripped;
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        rest = stripped;
    }
    let mut n = 0i64;
    for b in rest.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        n = n.wrapping_mul(10).wrapping_add(i64::from(b - b'0'));
    }
    sign * n
}

pub fn register(heap: &mut Heap, env: ObjRef) -> Result<(), SchError> {
    define_primitive(heap, env, "char->integer", char_to_integer)?;
    define_primitive(heap, env, "integer->char", integer_to_char)?;
    define_primitive(heap, env, "number->string", number_to_string)?;
    define_primitive(heap, env, "string->number", string_to_number)?;
    define_primitive(heap, env, "symbol->string", symbol_to_string)?;
    define_primitive(heap, env, "string->symbol", string_to_symbol)?;
    Ok(())
}

// ABOUTME: Primitive procedures registered in the initial environment

//! # Primitive procedures
//!
//! The built-in operations of the interpreter, organized by category:
//!
//! - **[types]**: `null?`, `boolean?`, `symbol?`, `integer?`, `real?`,
//!   `complex?`, `char?`, `string?`, `pair?`, `procedure?`,
//!   `input-port?`, `output-port?`, `eof-object?`
//! - **[convert]**: `char->integer`, `integer->char`, `number->string`,
//!   `string->number`, `symbol->string`, `string->symbol`
//! - **[arithmetic]**: `+`, `-`, `*`, `/`, `quotient`, `remainder`,
//!   `=`, `<`, `>`
//! - **[lists]**: `cons`, `car`, `cdr`, `set-car!`, `set-cdr!`, `list`
//! - **[control]**: `eq?`, `apply`, `eval`, `interaction-environment`,
//!   `null-environment`, `environment`, `error`, `gc`, `gc-stats`
//! - **[io]**: `load`, `open-input-port`, `close-input-port`, `read`,
//!   `read-char`, `peek-char`, `open-output-port`, `close-output-port`,
//!   `write`, `write-char`
//!
//! Each category module exposes a `register` function binding its
//! primitives into an environment.

pub mod arithmetic;
pub mod control;
pub mod convert;
pub mod io;
pub mod lists;
pub mod types;

use crate::env;
use crate::error::SchError;
use crate::heap::Heap;
use crate::value::{ObjRef, PrimFn};

/// Bind every primitive into the global environment.
pub fn register_builtins(heap: &mut Heap) -> Result<(), SchError> {
    let env = heap.global_env;
    register_into(heap, env)
}

/// Bind every primitive into `env`. The `environment` primitive uses
/// this to stock a fresh initial environment.
pub fn register_into(heap: &mut Heap, env: ObjRef) -> Result<(), SchError> {
    types::register(heap, env)?;
    convert::register(heap, env)?;
    arithmetic::register(heap, env)?;
    lists::register(heap, env)?;
    control::register(heap, env)?;
    io::register(heap, env)
}

pub(crate) fn define_primitive(
    heap: &mut Heap,
    env: ObjRef,
    name: &'static str,
    func: PrimFn,
) -> Result<ObjRef, SchError> {
    let var = heap.intern(name)?;
    let proc = heap.primitive(name, func)?;
    env::define_var(heap, var, proc, env)?;
    Ok(proc)
}

/// Collect an argument chain into a vector of handles.
pub(crate) fn collect_args(
    heap: &Heap,
    name: &'static str,
    args: ObjRef,
) -> Result<Vec<ObjRef>, SchError> {
    let mut out = Vec::new();
    let mut a = args;
    while !heap.is_nil(a) {
        let Some((first, more)) = heap.pair(a) else {
            return Err(SchError::runtime(name, "argument list is improper"));
        };
        out.push(first);
        a = more;
    }
    Ok(out)
}

/// Collect the arguments and insist on an exact count.
pub(crate) fn expect_args(
    heap: &Heap,
    name: &'static str,
    args: ObjRef,
    count: usize,
) -> Result<Vec<ObjRef>, SchError> {
    let collected = collect_args(heap, name, args)?;
    if collected.len() != count {
        return Err(SchError::arity(name, count.to_string(), collected.len()));
    }
    Ok(collected)
}

// ABOUTME: Port primitives and the load streaming loop

//! I/O primitives. Ports default to stdin/stdout when the optional port
//! argument is absent. `load` streams every expression of a file through
//! the evaluator and returns the last result.

use super::{collect_args, define_primitive, expect_args};
use crate::error::SchError;
use crate::eval;
use crate::heap::Heap;
use crate::port::{InPort, OutPort};
use crate::printer::print_to_string;
use crate::reader::read_datum;
use crate::value::{Obj, ObjRef};

/// Evaluate every expression in the file against the global environment
/// and return the last result. Also used by the CLI's script mode.
pub fn load_file(heap: &mut Heap, path: &str) -> Result<ObjRef, SchError> {
    let port = InPort::open(path)?;
    let mark = heap.root_watermark();
    let mut result = heap.syms.ok;
    loop {
        // keep only the previous result pinned between expressions
        heap.truncate_roots(mark);
        heap.push_root(result)?;
        let expr = read_datum(heap, &port)?;
        if expr == heap.eof {
            return Ok(result);
        }
        let global = heap.global_env;
        result = eval::eval(heap, expr, global)?;
    }
}

fn load(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "load", args, 1)?;
    let path = string_arg(heap, "load", a[0])?;
    let result = load_file(heap, &path)?;
    println!("program-loaded");
    Ok(result)
}

fn open_input_port(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "open-input-port", args, 1)?;
    let path = string_arg(heap, "open-input-port", a[0])?;
    let port = InPort::open(&path)?;
    heap.input_port(port)
}

fn close_input_port(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "close-input-port", args, 1)?;
    in_port_arg(heap, "close-input-port", a[0])?.close();
    Ok(heap.syms.ok)
}

fn open_output_port(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "open-output-port", args, 1)?;
    let path = string_arg(heap, "open-output-port", a[0])?;
    let port = OutPort::create(&path)?;
    heap.output_port(port)
}

fn close_output_port(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "close-output-port", args, 1)?;
    out_port_arg(heap, "close-output-port", a[0])?.close()?;
    Ok(heap.syms.ok)
}

fn read(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let port = optional_in_port(heap, "read", args)?;
    read_datum(heap, &port)
}

fn read_char(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let port = optional_in_port(heap, "read-char", args)?;
    match port.next_byte()? {
        Some(c) => heap.character(c),
        None => Ok(heap.eof),
    }
}

fn peek_char(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let port = optional_in_port(heap, "peek-char", args)?;
    match port.peek_byte()? {
        Some(c) => heap.character(c),
        None => Ok(heap.eof),
    }
}

fn write(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let (value, port) = value_and_out_port(heap, "write", args)?;
    let text = print_to_string(heap, value);
    port.write_all(text.as_bytes())?;
    Ok(heap.syms.ok)
}

fn write_char(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let (value, port) = value_and_out_port(heap, "write-char", args)?;
    match heap.get(value) {
        Obj::Character(c) => {
            port.write_all(&[*c])?;
            Ok(heap.syms.ok)
        }
        other => Err(SchError::type_error("write-char", "a character", other)),
    }
}

fn string_arg(heap: &Heap, name: &'static str, r: ObjRef) -> Result<String, SchError> {
    match heap.get(r) {
        Obj::Str(s) => Ok(s.clone()),
        other => Err(SchError::type_error(name, "a string", other)),
    }
}

fn in_port_arg(heap: &Heap, name: &'static str, r: ObjRef) -> Result<InPort, SchError> {
    match heap.get(r) {
        Obj::InputPort(p) => Ok(p.clone()),
        other => Err(SchError::type_error(name, "an input port", other)),
    }
}

fn out_port_arg(heap: &Heap, name: &'static str, r: ObjRef) -> Result<OutPort, SchError> {
    match heap.get(r) {
        Obj::OutputPort(p) => Ok(p.clone()),
        other => Err(SchError::type_error(name, "an output port", other)),
    }
}

/// Zero or one argument; stdin when absent.
fn optional_in_port(heap: &Heap, name: &'static str, args: ObjRef) -> Result<InPort, SchError> {
    let a = collect_args(heap, name, args)?;
    match a.len() {
        0 => Ok(heap.stdin_port.clone()),
        1 => in_port_arg(heap, name, a[0]),
        n => Err(SchError::arity(name, "0-1", n)),
    }
}

/// One value plus an optional port; stdout when absent.
fn value_and_out_port(
    heap: &Heap,
    name: &'static str,
    args: ObjRef,
) -> Result<(ObjRef, OutPort), SchError> {
    let a = collect_args(heap, name, args)?;
    match a.len() {
        1 => Ok((a[0], heap.stdout_port.clone())),
        2 => Ok((a[0], out_port_arg(heap, name, a[1])?)),
        n => Err(SchError::arity(name, "1-2", n)),
    }
}

pub fn register(heap: &mut Heap, env: ObjRef) -> Result<(), SchError> {
    define_primitive(heap, env, "load", load)?;
    define_primitive(heap, env, "open-input-port", open_input_port)?;
    define_primitive(heap, env, "close-input-port", close_input_port)?;
    define_primitive(heap, env, "read", read)?;
    define_primitive(heap, env, "read-char", read_char)?;
    define_primitive(heap, env, "peek-char", peek_char)?;
    define_primitive(heap, env, "open-output-port", open_output_port)?;
    define_primitive(heap, env, "close-output-port", close_output_port)?;
    define_primitive(heap, env, "write", write)?;
    define_primitive(heap, env, "write-char", write_char)?;
    Ok(())
}

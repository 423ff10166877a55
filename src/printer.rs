// ABOUTME: Writer producing text the reader can read back

use crate::heap::Heap;
use crate::value::{Obj, ObjRef};
use std::io::{self, Write};

/// Write `r` in re-readable form. Procedures, ports and the eof object
/// print as `#<…>` descriptions; everything else round-trips through the
/// reader.
pub fn write_obj(heap: &Heap, out: &mut dyn Write, r: ObjRef) -> io::Result<()> {
    match heap.get(r) {
        Obj::Nil => write!(out, "()"),
        Obj::Boolean(b) => write!(out, "#{}", if *b { 't' } else { 'f' }),
        Obj::Symbol(name) => write!(out, "{}", name),
        Obj::Fixnum(n) => write!(out, "{}", n),
        Obj::Flonum(d) => write!(out, "{:.6}", d),
        Obj::Complex { re, im } => {
            if *im == 0.0 {
                write!(out, "{:.6}", re)
            } else {
                write!(out, "#C({:.6} {:.6})", re, im)
            }
        }
        Obj::Str(s) => {
            out.write_all(b"\"")?;
            for &b in s.as_bytes() {
                match b {
                    b'\n' => out.write_all(b"\\n")?,
                    b'\\' => out.write_all(b"\\\\")?,
                    b'"' => out.write_all(b"\\\"")?,
                    _ => out.write_all(&[b])?,
                }
            }
            out.write_all(b"\"")
        }
        Obj::Character(c) => match *c {
            b'\n' => write!(out, "#\\newl"),
            b' ' => write!(out, "#\\space"),
            c => write!(out, "#\\{}", c as char),
        },
        Obj::Pair { .. } => {
            write!(out, "(")?;
            write_pair(heap, out, r)?;
            write!(out, ")")
        }
        Obj::Primitive(_) => write!(out, "#<primitive-procedure: 0x{:x}>", r.index()),
        Obj::Compound { .. } => write!(out, "#<compound-procedure: 0x{:x}>", r.index()),
        Obj::InputPort(_) => write!(out, "#<input-port>"),
        Obj::OutputPort(_) => write!(out, "#<output-port>"),
        Obj::Eof => write!(out, "#<eof>"),
    }
}

/// Cars separated by spaces; a non-nil non-pair cdr prints as a dotted
/// tail.
fn write_pair(heap: &Heap, out: &mut dyn Write, r: ObjRef) -> io::Result<()> {
    let (car, cdr) = heap
        .pair(r)
        .expect("write_pair is only called on pair handles");
    write_obj(heap, out, car)?;
    match heap.get(cdr) {
        Obj::Pair { .. } => {
            write!(out, " ")?;
            write_pair(heap, out, cdr)
        }
        Obj::Nil => Ok(()),
        _ => {
            write!(out, " . ")?;
            write_obj(heap, out, cdr)
        }
    }
}

pub fn print_to_string(heap: &Heap, r: ObjRef) -> String {
    let mut buf = Vec::new();
    write_obj(heap, &mut buf, r).expect("writing to a byte buffer cannot fail");
    String::from_utf8_lossy(&buf).into_owned()
}

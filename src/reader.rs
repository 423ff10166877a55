// ABOUTME: Recursive-descent reader turning s-expression bytes into heap values

use crate::config::BUFFER_MAX;
use crate::error::SchError;
use crate::heap::Heap;
use crate::port::InPort;
use crate::value::{Obj, ObjRef};

/// Read one datum from the port. At end of input the eof object is
/// returned; end of input *inside* a datum is a read error.
pub fn read_datum(heap: &mut Heap, port: &InPort) -> Result<ObjRef, SchError> {
    read_dispatch(heap, port, true)
}

fn read_expr(heap: &mut Heap, port: &InPort) -> Result<ObjRef, SchError> {
    read_dispatch(heap, port, false)
}

/// Delimiters terminate number, symbol and character tokens; end of
/// input counts as one.
fn is_delimiter(b: Option<u8>) -> bool {
    match b {
        None => true,
        Some(c) => {
            c.is_ascii_whitespace() || c == b'(' || c == b')' || c == b'"' || c == b';'
        }
    }
}

fn is_initial(c: u8) -> bool {
    c.is_ascii_alphabetic() || matches!(c, b'*' | b'/' | b'>' | b'<' | b'=' | b'?' | b'!')
}

fn skip_whitespace(port: &InPort) -> Result<(), SchError> {
    while let Some(c) = port.next_byte()? {
        if c.is_ascii_whitespace() {
            continue;
        }
        if c == b';' {
            // comments are whitespace too
            while let Some(c) = port.next_byte()? {
                if c == b'\n' {
                    break;
                }
            }
            continue;
        }
        port.unread(c);
        break;
    }
    Ok(())
}

fn eat_expected(port: &InPort, expected: &str) -> Result<(), SchError> {
    for want in expected.bytes() {
        match port.next_byte()? {
            Some(c) if c == want => {}
            Some(c) => {
                return Err(SchError::read(format!(
                    "unexpected character '{}'",
                    c as char
                )));
            }
            None => return Err(SchError::read("unexpected end of input")),
        }
    }
    Ok(())
}

fn expect_delimiter(port: &InPort, what: &str) -> Result<(), SchError> {
    if !is_delimiter(port.peek_byte()?) {
        return Err(SchError::read(format!("{} not followed by delimiter", what)));
    }
    Ok(())
}

fn read_dispatch(heap: &mut Heap, port: &InPort, top_level: bool) -> Result<ObjRef, SchError> {
    skip_whitespace(port)?;
    let c = match port.next_byte()? {
        Some(c) => c,
        None if top_level => return Ok(heap.eof),
        None => return Err(SchError::read("unexpected end of input")),
    };

    if c == b'#' {
        return match port.next_byte()? {
            Some(b't') => Ok(heap.t),
            Some(b'f') => Ok(heap.f),
            Some(b'\\') => read_character(heap, port),
            // the printer spells complex numbers #C(...), so accept
            // both cases back
            Some(b'c') | Some(b'C') => read_complex(heap, port),
            _ => Err(SchError::read("unknown boolean or character literal")),
        };
    }

    if c.is_ascii_digit() {
        port.unread(c);
        return read_number(heap, port, false);
    }
    if c == b'-' && matches!(port.peek_byte()?, Some(d) if d.is_ascii_digit()) {
        return read_number(heap, port, true);
    }

    if is_initial(c) || ((c == b'+' || c == b'-') && is_delimiter(port.peek_byte()?)) {
        return read_symbol(heap, port, c);
    }

    if c == b'"' {
        return read_string(heap, port);
    }

    if c == b'(' {
        return read_pair(heap, port);
    }

    if c == b'\'' {
        let mark = heap.root_watermark();
        let quoted = read_expr(heap, port)?;
        let nil = heap.nil;
        let tail = heap.cons(quoted, nil)?;
        let quote = heap.syms.quote;
        let expr = heap.cons(quote, tail)?;
        heap.truncate_roots(mark);
        heap.push_root(expr)?;
        return Ok(expr);
    }

    Err(SchError::read(format!(
        "bad input. Unexpected '{}'",
        c as char
    )))
}

/// Read the elements after `(`. A `.` followed by a delimiter switches to
/// the dotted tail; `)` closes the (possibly empty) list.
fn read_pair(heap: &mut Heap, port: &InPort) -> Result<ObjRef, SchError> {
    skip_whitespace(port)?;
    match port.peek_byte()? {
        Some(b')') => {
            port.next_byte()?;
            return Ok(heap.nil);
        }
        None => return Err(SchError::read("unexpected end of input in list")),
        _ => {}
    }

    let mark = heap.root_watermark();
    let car_obj = read_expr(heap, port)?;
    skip_whitespace(port)?;
    let c = port
        .next_byte()?
        .ok_or_else(|| SchError::read("unexpected end of input in list"))?;

    let pair = if c == b'.' {
        if !is_delimiter(port.peek_byte()?) {
            return Err(SchError::read("dot not followed by delimiter"));
        }
        let cdr_obj = read_expr(heap, port)?;
        skip_whitespace(port)?;
        match port.next_byte()? {
            Some(b')') => {}
            _ => return Err(SchError::read("where was the trailing right paren?")),
        }
        heap.cons(car_obj, cdr_obj)?
    } else {
        port.unread(c);
        let cdr_obj = read_pair(heap, port)?;
        heap.cons(car_obj, cdr_obj)?
    };

    // collapse transient roots; the pair now keeps its parts alive
    heap.truncate_roots(mark);
    heap.push_root(pair)?;
    Ok(pair)
}

/// `#\space` and `#\newl` are the only named spellings, each recognized
/// from its first two characters; anything else is one literal byte. A
/// delimiter must follow.
fn read_character(heap: &mut Heap, port: &InPort) -> Result<ObjRef, SchError> {
    let c = port
        .next_byte()?
        .ok_or_else(|| SchError::read("incomplete character literal"))?;
    match c {
        b's' if port.peek_byte()? == Some(b'p') => {
            eat_expected(port, "pace")?;
            expect_delimiter(port, "character")?;
            heap.character(b' ')
        }
        b'n' if port.peek_byte()? == Some(b'e') => {
            eat_expected(port, "ewl")?;
            expect_delimiter(port, "character")?;
            heap.character(b'\n')
        }
        _ => {
            expect_delimiter(port, "character")?;
            heap.character(c)
        }
    }
}

/// Digits, then an optional `.` fraction: fixnum or flonum. The sign has
/// already been consumed by the caller. The token must end at a
/// delimiter, which is pushed back.
fn read_number(heap: &mut Heap, port: &InPort, negative: bool) -> Result<ObjRef, SchError> {
    let mut num: i64 = 0;
    let mut last = None;
    while let Some(c) = port.next_byte()? {
        if c.is_ascii_digit() {
            num = num.wrapping_mul(10).wrapping_add(i64::from(c - b'0'));
        } else {
            last = Some(c);
            break;
        }
    }

    if last == Some(b'.') {
        let mut mantissa = 0.0f64;
        let mut digits = 1;
        last = None;
        while let Some(c) = port.next_byte()? {
            if c.is_ascii_digit() {
                mantissa += f64::from(c - b'0') / 10f64.powi(digits);
                digits += 1;
            } else {
                last = Some(c);
                break;
            }
        }
        if !is_delimiter(last) {
            return Err(SchError::read("number not followed by delimiter"));
        }
        if let Some(c) = last {
            port.unread(c);
        }
        let sign = if negative { -1.0 } else { 1.0 };
        return heap.flonum(sign * (num as f64 + mantissa));
    }

    if !is_delimiter(last) {
        return Err(SchError::read("number not followed by delimiter"));
    }
    if let Some(c) = last {
        port.unread(c);
    }
    if negative {
        num = num.wrapping_neg();
    }
    heap.fixnum(num)
}

/// `#c(re im)`: both parts are unsigned numeric tokens separated by
/// whitespace.
fn read_complex(heap: &mut Heap, port: &InPort) -> Result<ObjRef, SchError> {
    match port.next_byte()? {
        Some(b'(') => {}
        _ => return Err(SchError::read("invalid complex number")),
    }
    skip_whitespace(port)?;
    let re = read_complex_part(heap, port, "real")?;
    skip_whitespace(port)?;
    let im = read_complex_part(heap, port, "imaginary")?;
    match port.next_byte()? {
        Some(b')') => heap.complex(re, im),
        _ => Err(SchError::read("missing parens closing the complex number")),
    }
}

fn read_complex_part(heap: &mut Heap, port: &InPort, which: &str) -> Result<f64, SchError> {
    if !matches!(port.peek_byte()?, Some(c) if c.is_ascii_digit()) {
        return Err(SchError::read(format!(
            "complex number is missing its {} part",
            which
        )));
    }
    let num = read_number(heap, port, false)?;
    match heap.get(num) {
        Obj::Fixnum(n) => Ok(*n as f64),
        Obj::Flonum(d) => Ok(*d),
        other => Err(SchError::type_error("#c", "a real number", other)),
    }
}

fn read_symbol(heap: &mut Heap, port: &InPort, first: u8) -> Result<ObjRef, SchError> {
    let mut name = Vec::new();
    let mut c = Some(first);
    loop {
        match c {
            Some(b) if is_initial(b) || b.is_ascii_digit() || b == b'+' || b == b'-' => {
                if name.len() >= BUFFER_MAX - 1 {
                    return Err(SchError::read(format!(
                        "symbol too long. Maximum length is {}",
                        BUFFER_MAX
                    )));
                }
                name.push(b);
            }
            _ => break,
        }
        c = port.next_byte()?;
    }
    if !is_delimiter(c) {
        return Err(SchError::read(format!(
            "symbol not followed by delimiter. Found '{}'",
            c.map(|b| b as char).unwrap_or(' ')
        )));
    }
    if let Some(b) = c {
        port.unread(b);
    }
    let text =
        String::from_utf8(name).map_err(|_| SchError::read("symbol is not valid UTF-8"))?;
    heap.intern(&text)
}

/// String literal: `\n` is newline, any other escaped byte stands for
/// itself. Capped at `BUFFER_MAX - 1` bytes like the other tokens.
fn read_string(heap: &mut Heap, port: &InPort) -> Result<ObjRef, SchError> {
    let mut buf = Vec::new();
    loop {
        let mut c = port
            .next_byte()?
            .ok_or_else(|| SchError::read("non-terminated string literal"))?;
        if c == b'"' {
            break;
        }
        if c == b'\\' {
            let escaped = port
                .next_byte()?
                .ok_or_else(|| SchError::read("non-terminated string literal"))?;
            c = if escaped == b'n' { b'\n' } else { escaped };
        }
        if buf.len() >= BUFFER_MAX - 1 {
            return Err(SchError::read(format!(
                "string too long. Maximum length is {}",
                BUFFER_MAX
            )));
        }
        buf.push(c);
    }
    let text =
        String::from_utf8(buf).map_err(|_| SchError::read("string is not valid UTF-8"))?;
    heap.string(text)
}

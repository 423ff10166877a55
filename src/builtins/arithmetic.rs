// ABOUTME: Numeric primitives: arithmetic, comparison, quotient and remainder

//! Arithmetic over the three numeric tags with the promotion lattice
//! fixnum < flonum < complex; the widest operand decides the result tag.
//!
//! - `+`/`*`: variadic from the identity (0 and 1)
//! - `-`: variadic; one argument negates
//! - `/`: variadic; an all-fixnum division runs in doubles and truncates
//!   the result back to a fixnum
//! - `quotient`/`remainder`: fixnum-only, truncating
//! - `=`: same-tag pairwise comparison, `#f` across tags
//! - `<`/`>`: monotone chains over fixnums and flonums

use super::{collect_args, define_primitive, expect_args};
use crate::error::SchError;
use crate::heap::Heap;
use crate::value::{Obj, ObjRef};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Widest {
    Fixnum,
    Flonum,
    Complex,
}

fn complex_mul(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 * b.0 - a.1 * b.1, a.0 * b.1 + a.1 * b.0)
}

fn complex_inv(z: (f64, f64)) -> (f64, f64) {
    let norm = z.0 * z.0 + z.1 * z.1;
    (z.0 / norm, -z.1 / norm)
}

fn add(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let args = collect_args(heap, "+", args)?;
    let mut result: i64 = 0;
    let mut dresult: f64 = 0.0;
    let mut re: f64 = 0.0;
    let mut im: f64 = 0.0;
    let mut widest = Widest::Fixnum;
    for &arg in &args {
        match heap.get(arg) {
            Obj::Fixnum(n) => result = result.wrapping_add(*n),
            Obj::Flonum(d) => {
                dresult += d;
                widest = widest.max(Widest::Flonum);
            }
            Obj::Complex { re: r, im: i } => {
                re += r;
                im += i;
                widest = Widest::Complex;
            }
            other => return Err(SchError::type_error("+", "a number", other)),
        }
    }
    match widest {
        Widest::Fixnum => heap.fixnum(result),
        Widest::Flonum => heap.flonum(dresult + result as f64),
        Widest::Complex => heap.complex(re + result as f64 + dresult, im),
    }
}

fn sub(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let args = collect_args(heap, "-", args)?;
    if args.is_empty() {
        return Err(SchError::arity("-", "at least 1", 0));
    }
    let mut result: i64 = 0;
    let mut dresult: f64 = 0.0;
    let mut re: f64 = 0.0;
    let mut im: f64 = 0.0;
    let mut widest = Widest::Fixnum;
    match heap.get(args[0]) {
        Obj::Fixnum(n) => result = *n,
        Obj::Flonum(d) => {
            dresult = *d;
            widest = Widest::Flonum;
        }
        Obj::Complex { re: r, im: i } => {
            re = *r;
            im = *i;
            widest = Widest::Complex;
        }
        other => return Err(SchError::type_error("-", "a number", other)),
    }
    if args.len() == 1 {
        return match widest {
            Widest::Fixnum => heap.fixnum(-result),
            Widest::Flonum => heap.flonum(-dresult),
            Widest::Complex => heap.complex(-re, -im),
        };
    }
    for &arg in &args[1..] {
        match heap.get(arg) {
            Obj::Fixnum(n) => result = result.wrapping_sub(*n),
            Obj::Flonum(d) => {
                dresult -= d;
                widest = widest.max(Widest::Flonum);
            }
            Obj::Complex { re: r, im: i } => {
                re -= r;
                im -= i;
                widest = Widest::Complex;
            }
            other => return Err(SchError::type_error("-", "a number", other)),
        }
    }
    match widest {
        Widest::Fixnum => heap.fixnum(result),
        Widest::Flonum => heap.flonum(dresult + result as f64),
        Widest::Complex => heap.complex(re + result as f64 + dresult, im),
    }
}

fn mul(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let args = collect_args(heap, "*", args)?;
    let mut result: i64 = 1;
    let mut dresult: f64 = 1.0;
    let mut c = (1.0f64, 0.0f64);
    let mut widest = Widest::Fixnum;
    for &arg in &args {
        match heap.get(arg) {
            Obj::Fixnum(n) => result = result.wrapping_mul(*n),
            Obj::Flonum(d) => {
                dresult *= d;
                widest = widest.max(Widest::Flonum);
            }
            Obj::Complex { re, im } => {
                c = complex_mul(c, (*re, *im));
                widest = Widest::Complex;
            }
            other => return Err(SchError::type_error("*", "a number", other)),
        }
    }
    match widest {
        Widest::Fixnum => heap.fixnum(result),
        Widest::Flonum => heap.flonum(dresult * result as f64),
        Widest::Complex => {
            let scale = result as f64 * dresult;
            heap.complex(c.0 * scale, c.1 * scale)
        }
    }
}

fn div(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let args = collect_args(heap, "/", args)?;
    if args.is_empty() {
        return Err(SchError::arity("/", "at least 1", 0));
    }
    // fixnum chains run in doubles; the final truncation back to a
    // fixnum is part of the observable behavior
    let mut result: f64 = 1.0;
    let mut dresult: f64 = 1.0;
    let mut c = (1.0f64, 0.0f64);
    let mut widest = Widest::Fixnum;
    match heap.get(args[0]) {
        Obj::Fixnum(n) => result = *n as f64,
        Obj::Flonum(d) => {
            dresult = *d;
            widest = Widest::Flonum;
        }
        Obj::Complex { re, im } => {
            c = (*re, *im);
            widest = Widest::Complex;
        }
        other => return Err(SchError::type_error("/", "a number", other)),
    }
    for &arg in &args[1..] {
        match heap.get(arg) {
            Obj::Fixnum(n) => result /= *n as f64,
            Obj::Flonum(d) => {
                dresult /= d;
                widest = widest.max(Widest::Flonum);
            }
            Obj::Complex { re, im } => {
                c = complex_mul(c, complex_inv((*re, *im)));
                widest = Widest::Complex;
            }
            other => return Err(SchError::type_error("/", "a number", other)),
        }
    }
    match widest {
        Widest::Fixnum => heap.fixnum(result as i64),
        Widest::Flonum => heap.flonum(dresult * result),
        Widest::Complex => {
            let scale = result * dresult;
            heap.complex(c.0 * scale, c.1 * scale)
        }
    }
}

fn quotient(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let (x, y) = fixnum_pair(heap, "quotient", args)?;
    heap.fixnum(x / y)
}

fn remainder(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let (x, y) = fixnum_pair(heap, "remainder", args)?;
    heap.fixnum(x % y)
}

fn fixnum_pair(heap: &Heap, name: &'static str, args: ObjRef) -> Result<(i64, i64), SchError> {
    let a = expect_args(heap, name, args, 2)?;
    let x = match heap.get(a[0]) {
        Obj::Fixnum(n) => *n,
        other => return Err(SchError::type_error(name, "an integer", other)),
    };
    let y = match heap.get(a[1]) {
        Obj::Fixnum(n) => *n,
        other => return Err(SchError::type_error(name, "an integer", other)),
    };
    if y == 0 {
        return Err(SchError::type_error(name, "a non-zero divisor", heap.get(a[1])));
    }
    Ok((x, y))
}

#[derive(Clone, Copy)]
enum FirstNum {
    Fix(i64),
    Flo(f64),
    Cpx(f64, f64),
}

fn num_eq(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let args = collect_args(heap, "=", args)?;
    if args.is_empty() {
        return Err(SchError::arity("=", "at least 1", 0));
    }
    let first = match heap.get(args[0]) {
        Obj::Fixnum(n) => FirstNum::Fix(*n),
        Obj::Flonum(d) => FirstNum::Flo(*d),
        Obj::Complex { re, im } => FirstNum::Cpx(*re, *im),
        other => return Err(SchError::type_error("=", "a number", other)),
    };
    for &arg in &args[1..] {
        let same = match (first, heap.get(arg)) {
            (FirstNum::Fix(v), Obj::Fixnum(n)) => v == *n,
            (FirstNum::Flo(v), Obj::Flonum(d)) => v == *d,
            // two complex numbers count as unequal only when both
            // components differ
            (FirstNum::Cpx(re, im), Obj::Complex { re: r, im: i }) => !(re != *r && im != *i),
            // numbers of different tags never compare equal
            _ => false,
        };
        if !same {
            return Ok(heap.f);
        }
    }
    Ok(heap.t)
}

fn less_than(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    monotone_chain(heap, "<", args, |previous, next| previous < next)
}

fn greater_than(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    monotone_chain(heap, ">", args, |previous, next| previous > next)
}

fn monotone_chain(
    heap: &mut Heap,
    name: &'static str,
    args: ObjRef,
    holds: fn(f64, f64) -> bool,
) -> Result<ObjRef, SchError> {
    let args = collect_args(heap, name, args)?;
    if args.is_empty() {
        return Err(SchError::arity(name, "at least 1", 0));
    }
    let mut previous = as_real(heap, name, args[0])?;
    for &arg in &args[1..] {
        let next = as_real(heap, name, arg)?;
        if !holds(previous, next) {
            return Ok(heap.f);
        }
        previous = next;
    }
    Ok(heap.t)
}

fn as_real(heap: &Heap, name: &'static str, r: ObjRef) -> Result<f64, SchError> {
    match heap.get(r) {
        Obj::Fixnum(n) => Ok(*n as f64),
        Obj::Flonum(d) => Ok(*d),
        other => Err(SchError::type_error(
            name,
            "an integer or real number",
            other,
        )),
    }
}

pub fn register(heap: &mut Heap, env: ObjRef) -> Result<(), SchError> {
    define_primitive(heap, env, "+", add)?;
    define_primitive(heap, env, "-", sub)?;
    define_primitive(heap, env, "*", mul)?;
    define_primitive(heap, env, "/", div)?;
    define_primitive(heap, env, "quotient", quotient)?;
    define_primitive(heap, env, "remainder", remainder)?;
    define_primitive(heap, env, "=", num_eq)?;
    define_primitive(heap, env, "<", less_than)?;
    define_primitive(heap, env, ">", greater_than)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::SchError;
    use crate::eval::eval;
    use crate::heap::Heap;
    use crate::port::InPort;
    use crate::printer::print_to_string;
    use crate::reader::read_datum;

    fn run(heap: &mut Heap, src: &str) -> Result<crate::value::ObjRef, SchError> {
        let port = InPort::from_bytes(src.as_bytes().to_vec());
        let expr = read_datum(heap, &port)?;
        let global = heap.global_env;
        eval(heap, expr, global)
    }

    fn check(heap: &mut Heap, src: &str, expected: &str) {
        let result = run(heap, src).unwrap();
        assert_eq!(print_to_string(heap, result), expected, "source: {}", src);
    }

    #[test]
    fn test_addition() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(+)", "0");
        check(&mut heap, "(+ 1 2 3)", "6");
        check(&mut heap, "(+ 1 2.5)", "3.500000");
        check(&mut heap, "(+ #c(1.0 2.0) #c(3.0 4.0))", "#C(4.000000 6.000000)");
        // complex wins over every narrower operand
        check(&mut heap, "(+ 1 0.5 #c(1.0 2.0))", "#C(2.500000 2.000000)");
    }

    #[test]
    fn test_subtraction() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(- 10 3 2)", "5");
        check(&mut heap, "(- 5)", "-5");
        check(&mut heap, "(- 2.5)", "-2.500000");
        check(&mut heap, "(- 1 0.5)", "0.500000");
        check(&mut heap, "(- #c(5.0 5.0) #c(1.0 2.0))", "#C(4.000000 3.000000)");
    }

    #[test]
    fn test_multiplication() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(*)", "1");
        check(&mut heap, "(* 2 3 4)", "24");
        check(&mut heap, "(* 2 1.5)", "3.000000");
        // (1+2i)(3+4i) = -5+10i
        check(&mut heap, "(* #c(1.0 2.0) #c(3.0 4.0))", "#C(-5.000000 10.000000)");
        check(&mut heap, "(* 2 #c(1.0 2.0))", "#C(2.000000 4.000000)");
    }

    #[test]
    fn test_division_truncates_fixnum_chains() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(/ 20 4)", "5");
        // 7/2 runs in doubles and truncates
        check(&mut heap, "(/ 7 2)", "3");
        check(&mut heap, "(/ 1.0 4)", "0.250000");
        check(&mut heap, "(/ #c(1.0 0.0) #c(0.0 1.0))", "#C(0.000000 -1.000000)");
    }

    #[test]
    fn test_quotient_and_remainder() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(quotient 17 5)", "3");
        check(&mut heap, "(remainder 17 5)", "2");
        check(&mut heap, "(quotient -17 5)", "-3");
        check(&mut heap, "(remainder -17 5)", "-2");
        assert!(run(&mut heap, "(quotient 1 0)").is_err());
        assert!(run(&mut heap, "(quotient 1.5 2)").is_err());
    }

    #[test]
    fn test_numeric_equality() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(= 3 3 3)", "#t");
        check(&mut heap, "(= 3 4)", "#f");
        check(&mut heap, "(= 1.5 1.5)", "#t");
        // different numeric tags never compare equal
        check(&mut heap, "(= 3 3.0)", "#f");
        check(&mut heap, "(= #c(1.0 2.0) #c(1.0 2.0))", "#t");
    }

    #[test]
    fn test_complex_equality_requires_both_parts_to_differ() {
        let mut heap = Heap::new().unwrap();
        // one matching component is enough to compare equal
        check(&mut heap, "(= #c(1.0 2.0) #c(1.0 9.0))", "#t");
        check(&mut heap, "(= #c(1.0 2.0) #c(9.0 2.0))", "#t");
        check(&mut heap, "(= #c(1.0 2.0) #c(9.0 9.0))", "#f");
    }

    #[test]
    fn test_comparison_chains() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(< 1 2 3)", "#t");
        check(&mut heap, "(< 1 3 2)", "#f");
        check(&mut heap, "(< 1 1)", "#f");
        check(&mut heap, "(> 3 2 1)", "#t");
        check(&mut heap, "(> 3 3)", "#f");
        check(&mut heap, "(< 1 1.5 2)", "#t");
        assert!(run(&mut heap, "(< 1 #c(1.0 2.0))").is_err());
    }

    #[test]
    fn test_arithmetic_type_errors() {
        let mut heap = Heap::new().unwrap();
        assert!(matches!(
            run(&mut heap, "(+ 1 'two)"),
            Err(SchError::Type { .. })
        ));
        assert!(matches!(
            run(&mut heap, "(* \"three\" 2)"),
            Err(SchError::Type { .. })
        ));
    }
}

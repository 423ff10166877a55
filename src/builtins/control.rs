// ABOUTME: Identity, environments, user errors and GC control primitives

use super::{collect_args, define_primitive, expect_args};
use crate::env;
use crate::error::SchError;
use crate::heap::Heap;
use crate::printer::print_to_string;
use crate::value::{Obj, ObjRef};
use std::mem::discriminant;

/// Tag equality plus value equality for numeric, character and string
/// atoms; everything else compares by handle identity.
fn eq(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let a = expect_args(heap, "eq?", args, 2)?;
    let (x, y) = (heap.get(a[0]), heap.get(a[1]));
    let same = if discriminant(x) != discriminant(y) {
        false
    } else {
        match (x, y) {
            (Obj::Fixnum(m), Obj::Fixnum(n)) => m == n,
            (Obj::Flonum(c), Obj::Flonum(d)) => c == d,
            (Obj::Complex { re: a1, im: b1 }, Obj::Complex { re: a2, im: b2 }) => {
                a1 == a2 && b1 == b2
            }
            (Obj::Character(c), Obj::Character(d)) => c == d,
            (Obj::Str(s), Obj::Str(t)) => s == t,
            _ => a[0] == a[1],
        }
    };
    Ok(heap.boolean(same))
}

// `apply` and `eval` are recognized by handle identity and rewritten by
// the evaluator; their bodies only run if something smuggles them past
// the interception point.

fn apply_placeholder(_heap: &mut Heap, _args: ObjRef) -> Result<ObjRef, SchError> {
    Err(SchError::runtime(
        "apply",
        "illegal state: the body of the apply primitive should not execute",
    ))
}

fn eval_placeholder(_heap: &mut Heap, _args: ObjRef) -> Result<ObjRef, SchError> {
    Err(SchError::runtime(
        "eval",
        "illegal state: the body of the eval primitive should not execute",
    ))
}

fn interaction_environment(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    expect_args(heap, "interaction-environment", args, 0)?;
    Ok(heap.global_env)
}

fn null_environment(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    expect_args(heap, "null-environment", args, 0)?;
    env::setup_environment(heap)
}

fn environment(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    expect_args(heap, "environment", args, 0)?;
    let fresh = env::setup_environment(heap)?;
    super::register_into(heap, fresh)?;
    Ok(fresh)
}

/// Write the arguments into the diagnostic and abort evaluation.
fn error(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let args = collect_args(heap, "error", args)?;
    let mut message = String::new();
    for (i, &arg) in args.iter().enumerate() {
        if i > 0 {
            message.push(' ');
        }
        message.push_str(&print_to_string(heap, arg));
    }
    Err(SchError::User(message))
}

fn gc(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    expect_args(heap, "gc", args, 0)?;
    heap.collect();
    Ok(heap.syms.ok)
}

/// `(live threshold collections)` as fixnums.
fn gc_stats(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    expect_args(heap, "gc-stats", args, 0)?;
    let stats = heap.stats();
    let live = heap.fixnum(stats.live as i64)?;
    let threshold = heap.fixnum(stats.threshold as i64)?;
    let collections = heap.fixnum(stats.collections as i64)?;
    heap.list(&[live, threshold, collections])
}

pub fn register(heap: &mut Heap, env: ObjRef) -> Result<(), SchError> {
    define_primitive(heap, env, "eq?", eq)?;
    define_primitive(heap, env, "interaction-environment", interaction_environment)?;
    define_primitive(heap, env, "null-environment", null_environment)?;
    define_primitive(heap, env, "environment", environment)?;
    define_primitive(heap, env, "error", error)?;
    define_primitive(heap, env, "gc", gc)?;
    define_primitive(heap, env, "gc-stats", gc_stats)?;

    // the intercepted pair is allocated once so identity survives
    // re-registration into fresh environments
    if heap.apply_proc == heap.nil {
        heap.apply_proc = heap.primitive("apply", apply_placeholder)?;
    }
    let apply_proc = heap.apply_proc;
    let apply_var = heap.intern("apply")?;
    env::define_var(heap, apply_var, apply_proc, env)?;

    if heap.eval_proc == heap.nil {
        heap.eval_proc = heap.primitive("eval", eval_placeholder)?;
    }
    let eval_proc = heap.eval_proc;
    let eval_var = heap.intern("eval")?;
    env::define_var(heap, eval_var, eval_proc, env)?;
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
    use crate::value::{Obj, ObjRef};

    fn run(heap: &mut Heap, src: &str) -> Result<ObjRef, SchError> {
        let port = InPort::from_bytes(src.as_bytes().to_vec());
        let mut result = heap.syms.ok;
        loop {
            let expr = read_datum(heap, &port)?;
            if expr == heap.eof {
                return Ok(result);
            }
            let global = heap.global_env;
            result = eval(heap, expr, global)?;
        }
    }

    fn check(heap: &mut Heap, src: &str, expected: &str) {
        let result = run(heap, src).unwrap();
        assert_eq!(print_to_string(heap, result), expected, "source: {}", src);
    }

    #[test]
    fn test_eq_on_atoms() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(eq? 3 3)", "#t");
        check(&mut heap, "(eq? 3 4)", "#f");
        check(&mut heap, "(eq? 3 3.0)", "#f");
        check(&mut heap, "(eq? #\\a #\\a)", "#t");
        check(&mut heap, "(eq? \"abc\" \"abc\")", "#t");
        check(&mut heap, "(eq? 'x 'x)", "#t");
        check(&mut heap, "(eq? 'x 'y)", "#f");
        check(&mut heap, "(eq? '() '())", "#t");
    }

    #[test]
    fn test_eq_on_pairs_is_identity() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(eq? (cons 1 2) (cons 1 2))", "#f");
        check(&mut heap, "(define x (cons 1 2)) (eq? x x)", "#t");
    }

    #[test]
    fn test_error_primitive_aborts_with_its_arguments() {
        let mut heap = Heap::new().unwrap();
        match run(&mut heap, "(error \"boom\" 42)") {
            Err(SchError::User(message)) => assert_eq!(message, "\"boom\" 42"),
            other => panic!("expected user error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_environment_primitives() {
        let mut heap = Heap::new().unwrap();
        // a fresh environment has the primitives, the null one does not
        check(&mut heap, "(eval '(+ 1 2) (environment))", "3");
        assert!(matches!(
            run(&mut heap, "(eval '(+ 1 2) (null-environment))"),
            Err(SchError::UnboundVariable(_))
        ));
        // definitions in the interaction environment are visible here
        check(
            &mut heap,
            "(define x 5) (eval 'x (interaction-environment))",
            "5",
        );
        // and eval interception still works for procedures from a fresh
        // environment
        check(&mut heap, "(eval '(eval '(+ 1 2) (environment)) (environment))", "3");
    }

    #[test]
    fn test_gc_primitives() {
        let mut heap = Heap::new().unwrap();
        check(&mut heap, "(gc)", "ok");
        let stats = run(&mut heap, "(gc-stats)").unwrap();
        let collected = {
            let (live, rest) = heap.pair(stats).unwrap();
            assert!(matches!(heap.get(live), Obj::Fixnum(n) if *n > 0));
            let (threshold, rest) = heap.pair(rest).unwrap();
            assert!(matches!(heap.get(threshold), Obj::Fixnum(n) if *n > 0));
            let (collections, tail) = heap.pair(rest).unwrap();
            assert!(heap.is_nil(tail));
            match heap.get(collections) {
                Obj::Fixnum(n) => *n,
                _ => panic!("expected fixnum collection count"),
            }
        };
        assert!(collected >= 1);
    }
}

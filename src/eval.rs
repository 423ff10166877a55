// ABOUTME: Trampolined evaluator: special forms, desugaring, tail-call loop

use crate::env;
use crate::error::SchError;
use crate::heap::Heap;
use crate::value::{Obj, ObjRef, PrimFn};

/// Evaluate `exp` against `env`. Tail positions rebind `exp`/`env` and
/// continue the loop instead of recursing, so self-recursive procedures
/// iterate in constant stack. On return the root stack is back at its
/// entry height with the result pinned on top.
pub fn eval(heap: &mut Heap, mut exp: ObjRef, mut env: ObjRef) -> Result<ObjRef, SchError> {
    let base = heap.root_watermark();
    loop {
        // Only the live expression and environment stay pinned across
        // iterations; everything an earlier iteration rooted is now
        // reachable from these two or dead.
        heap.truncate_roots(base);
        heap.push_root(exp)?;
        heap.push_root(env)?;

        let (head, rest) = match heap.get(exp) {
            Obj::Boolean(_)
            | Obj::Fixnum(_)
            | Obj::Flonum(_)
            | Obj::Complex { .. }
            | Obj::Character(_)
            | Obj::Str(_) => return finish(heap, base, exp),
            Obj::Symbol(_) => {
                let value = env::lookup(heap, exp, env)?;
                return finish(heap, base, value);
            }
            Obj::Pair { car, cdr } => (*car, *cdr),
            other => return Err(SchError::type_error("eval", "an expression", other)),
        };

        let syms = heap.syms;

        if head == syms.quote {
            let text = heap.car(rest)?;
            return finish(heap, base, text);
        }

        if head == syms.set_bang {
            let var = heap.car(rest)?;
            let value_exp = cadr(heap, rest)?;
            let value = eval(heap, value_exp, env)?;
            env::set_var(heap, var, value, env)?;
            return finish(heap, base, syms.ok);
        }

        if head == syms.define {
            let target = heap.car(rest)?;
            let (var, value) = match heap.get(target) {
                Obj::Symbol(_) => {
                    let value_exp = cadr(heap, rest)?;
                    (target, eval(heap, value_exp, env)?)
                }
                // (define (name . params) body...) is lambda sugar
                Obj::Pair { car, cdr } => {
                    let (name, params) = (*car, *cdr);
                    let body = heap.cdr(rest)?;
                    (name, heap.compound(params, body, env)?)
                }
                other => {
                    return Err(SchError::type_error(
                        "define",
                        "a symbol or a procedure signature",
                        other,
                    ));
                }
            };
            env::define_var(heap, var, value, env)?;
            return finish(heap, base, syms.ok);
        }

        if head == syms.if_ {
            let pred = heap.car(rest)?;
            let test = eval(heap, pred, env)?;
            exp = if heap.is_truthy(test) {
                cadr(heap, rest)?
            } else {
                let alternative = cddr(heap, rest)?;
                if heap.is_nil(alternative) {
                    heap.f
                } else {
                    heap.car(alternative)?
                }
            };
            continue;
        }

        if head == syms.lambda {
            let params = heap.car(rest)?;
            let body = heap.cdr(rest)?;
            let proc = heap.compound(params, body, env)?;
            return finish(heap, base, proc);
        }

        if head == syms.begin {
            if heap.is_nil(rest) {
                return finish(heap, base, syms.ok);
            }
            let mut seq = rest;
            loop {
                let Some((first, more)) = heap.pair(seq) else {
                    return Err(SchError::runtime("begin", "sequence is not a proper list"));
                };
                if heap.is_nil(more) {
                    exp = first;
                    break;
                }
                eval(heap, first, env)?;
                seq = more;
            }
            continue;
        }

        if head == syms.cond {
            exp = expand_cond(heap, rest)?;
            continue;
        }

        if head == syms.let_ {
            exp = expand_let(heap, rest)?;
            continue;
        }

        if head == syms.and {
            if heap.is_nil(rest) {
                let t = heap.t;
                return finish(heap, base, t);
            }
            let mut seq = rest;
            loop {
                let Some((first, more)) = heap.pair(seq) else {
                    return Err(SchError::runtime("and", "sequence is not a proper list"));
                };
                if heap.is_nil(more) {
                    // last expression stays in tail position
                    exp = first;
                    break;
                }
                let value = eval(heap, first, env)?;
                if !heap.is_truthy(value) {
                    return finish(heap, base, value);
                }
                seq = more;
            }
            continue;
        }

        if head == syms.or {
            if heap.is_nil(rest) {
                let f = heap.f;
                return finish(heap, base, f);
            }
            let mut seq = rest;
            loop {
                let Some((first, more)) = heap.pair(seq) else {
                    return Err(SchError::runtime("or", "sequence is not a proper list"));
                };
                if heap.is_nil(more) {
                    exp = first;
                    break;
                }
                let value = eval(heap, first, env)?;
                if heap.is_truthy(value) {
                    return finish(heap, base, value);
                }
                seq = more;
            }
            continue;
        }

        // Application: operator first, then operands left to right.
        let mut proc = eval(heap, head, env)?;
        let mut args = list_of_values(heap, rest, env)?;

        if proc == heap.apply_proc {
            proc = heap.car(args)?;
            let tail = heap.cdr(args)?;
            args = flatten_apply_args(heap, tail)?;
        }
        if proc == heap.eval_proc {
            let new_exp = heap.car(args)?;
            let new_env = cadr(heap, args)?;
            exp = new_exp;
            env = new_env;
            continue;
        }

        match callee(heap, proc)? {
            Callee::Primitive(func) => {
                let result = func(heap, args)?;
                return finish(heap, base, result);
            }
            Callee::Compound {
                params,
                body,
                env: closure_env,
            } => {
                env = env::extend(heap, params, args, closure_env)?;
                let begin = heap.syms.begin;
                exp = heap.cons(begin, body)?;
                continue;
            }
        }
    }
}

enum Callee {
    Primitive(PrimFn),
    Compound {
        params: ObjRef,
        body: ObjRef,
        env: ObjRef,
    },
}

fn callee(heap: &Heap, proc: ObjRef) -> Result<Callee, SchError> {
    match heap.get(proc) {
        Obj::Primitive(p) => Ok(Callee::Primitive(p.func)),
        Obj::Compound { params, body, env } => Ok(Callee::Compound {
            params: *params,
            body: *body,
            env: *env,
        }),
        other => Err(SchError::NotCallable(other.type_name().to_string())),
    }
}

/// Restore the entry watermark and pin the result for the caller.
fn finish(heap: &mut Heap, base: usize, result: ObjRef) -> Result<ObjRef, SchError> {
    heap.truncate_roots(base);
    heap.push_root(result)?;
    Ok(result)
}

fn cadr(heap: &Heap, r: ObjRef) -> Result<ObjRef, SchError> {
    heap.car(heap.cdr(r)?)
}

fn cddr(heap: &Heap, r: ObjRef) -> Result<ObjRef, SchError> {
    heap.cdr(heap.cdr(r)?)
}

/// Evaluate the operand list left to right into a fresh argument list.
fn list_of_values(heap: &mut Heap, exps: ObjRef, env: ObjRef) -> Result<ObjRef, SchError> {
    let mut values = Vec::new();
    let mut e = exps;
    while !heap.is_nil(e) {
        let Some((first, more)) = heap.pair(e) else {
            return Err(SchError::runtime("apply", "operand list is improper"));
        };
        values.push(eval(heap, first, env)?);
        e = more;
    }
    heap.list(&values)
}

/// `(apply f a b '(c d))` calls `f` with `(a b c d)`: leading arguments
/// are consed onto the final list argument.
fn flatten_apply_args(heap: &mut Heap, args: ObjRef) -> Result<ObjRef, SchError> {
    let mut leading = Vec::new();
    let mut a = args;
    loop {
        let Some((first, more)) = heap.pair(a) else {
            return Err(SchError::arity("apply", "at least 2", leading.len() + 1));
        };
        if heap.is_nil(more) {
            let mut result = first;
            for &item in leading.iter().rev() {
                result = heap.cons(item, result)?;
            }
            return Ok(result);
        }
        leading.push(first);
        a = more;
    }
}

/// Rewrite `(cond (t1 b1...) (t2 b2...) (else bn...))` into nested `if`s
/// so the clause bodies evaluate in tail position.
fn expand_cond(heap: &mut Heap, clauses: ObjRef) -> Result<ObjRef, SchError> {
    if heap.is_nil(clauses) {
        return Ok(heap.f);
    }
    let Some((clause, more)) = heap.pair(clauses) else {
        return Err(SchError::runtime("cond", "clause list is improper"));
    };
    let Some((test, body)) = heap.pair(clause) else {
        return Err(SchError::runtime("cond", "clause must be a list"));
    };
    if test == heap.syms.else_ {
        if !heap.is_nil(more) {
            return Err(SchError::runtime("cond", "else clause isn't last"));
        }
        return sequence_to_exp(heap, body);
    }
    let consequent = sequence_to_exp(heap, body)?;
    let alternative = expand_cond(heap, more)?;
    let if_sym = heap.syms.if_;
    heap.list(&[if_sym, test, consequent, alternative])
}

/// `(let ((v e)...) body...)` becomes `((lambda (v...) body...) e...)`.
fn expand_let(heap: &mut Heap, rest: ObjRef) -> Result<ObjRef, SchError> {
    let Some((bindings, body)) = heap.pair(rest) else {
        return Err(SchError::runtime("let", "expected bindings and a body"));
    };
    let mut names = Vec::new();
    let mut inits = Vec::new();
    let mut b = bindings;
    while !heap.is_nil(b) {
        let Some((binding, more)) = heap.pair(b) else {
            return Err(SchError::runtime("let", "bindings must form a list"));
        };
        let name = heap.car(binding)?;
        let init = cadr(heap, binding)?;
        names.push(name);
        inits.push(init);
        b = more;
    }
    let params = heap.list(&names)?;
    let lambda_tail = heap.cons(params, body)?;
    let lambda_sym = heap.syms.lambda;
    let operator = heap.cons(lambda_sym, lambda_tail)?;
    let operands = heap.list(&inits)?;
    heap.cons(operator, operands)
}

/// A body of one expression stays bare; anything else is wrapped in
/// `begin` so it evaluates in sequence.
fn sequence_to_exp(heap: &mut Heap, seq: ObjRef) -> Result<ObjRef, SchError> {
    match heap.pair(seq) {
        Some((first, more)) if heap.is_nil(more) => Ok(first),
        _ => {
            let begin = heap.syms.begin;
            heap.cons(begin, seq)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::InPort;
    use crate::printer::print_to_string;
    use crate::reader::read_datum;

    /// Evaluate every expression in `src` against the global environment
    /// and return the last result.
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

    fn run_to_string(heap: &mut Heap, src: &str) -> String {
        let r = run(heap, src).unwrap();
        print_to_string(heap, r)
    }

    #[test]
    fn test_self_evaluating() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(run_to_string(&mut heap, "42"), "42");
        assert_eq!(run_to_string(&mut heap, "#t"), "#t");
        assert_eq!(run_to_string(&mut heap, "\"hi\""), "\"hi\"");
        assert_eq!(run_to_string(&mut heap, "#\\a"), "#\\a");
        assert_eq!(run_to_string(&mut heap, "2.5"), "2.500000");
    }

    #[test]
    fn test_quote() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(run_to_string(&mut heap, "'x"), "x");
        assert_eq!(run_to_string(&mut heap, "'(1 2 3)"), "(1 2 3)");
    }

    #[test]
    fn test_define_and_lookup() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(run_to_string(&mut heap, "(define x 42)"), "ok");
        assert_eq!(run_to_string(&mut heap, "x"), "42");
    }

    #[test]
    fn test_unbound_variable() {
        let mut heap = Heap::new().unwrap();
        match run(&mut heap, "nowhere") {
            Err(SchError::UnboundVariable(name)) => assert_eq!(name, "nowhere"),
            other => panic!("expected unbound variable, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_set_bang() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(
            run_to_string(&mut heap, "(define x 1) (set! x 99) x"),
            "99"
        );
        assert!(matches!(
            run(&mut heap, "(set! never-defined 1)"),
            Err(SchError::UnboundVariable(_))
        ));
    }

    #[test]
    fn test_if_and_truthiness() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(run_to_string(&mut heap, "(if #t 'y 'n)"), "y");
        assert_eq!(run_to_string(&mut heap, "(if #f 'y 'n)"), "n");
        // only #f is false
        assert_eq!(run_to_string(&mut heap, "(if 0 'y 'n)"), "y");
        assert_eq!(run_to_string(&mut heap, "(if '() 'y 'n)"), "y");
        assert_eq!(run_to_string(&mut heap, "(if \"\" 'y 'n)"), "y");
        // missing alternative yields #f
        assert_eq!(run_to_string(&mut heap, "(if #f 'y)"), "#f");
    }

    #[test]
    fn test_lambda_application() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(run_to_string(&mut heap, "((lambda (x) x) 42)"), "42");
        assert_eq!(run_to_string(&mut heap, "((lambda (x y) (+ x y)) 3 4)"), "7");
    }

    #[test]
    fn test_define_function_sugar() {
        let mut heap = Heap::new().unwrap();
        let src = "(define (square x) (* x x)) (square 7)";
        assert_eq!(run_to_string(&mut heap, src), "49");
    }

    #[test]
    fn test_closures_capture_their_environment() {
        let mut heap = Heap::new().unwrap();
        let src = "(define (make-adder n) (lambda (x) (+ x n)))
                   (define add5 (make-adder 5))
                   (add5 10)";
        assert_eq!(run_to_string(&mut heap, src), "15");
    }

    #[test]
    fn test_variadic_rest_parameter() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(
            run_to_string(&mut heap, "((lambda (a . rest) rest) 1 2 3)"),
            "(2 3)"
        );
        assert_eq!(
            run_to_string(&mut heap, "((lambda args args) 1 2 3)"),
            "(1 2 3)"
        );
    }

    #[test]
    fn test_arity_mismatch() {
        let mut heap = Heap::new().unwrap();
        assert!(matches!(
            run(&mut heap, "((lambda (x) x) 1 2)"),
            Err(SchError::Arity { .. })
        ));
        assert!(matches!(
            run(&mut heap, "((lambda (x y) x) 1)"),
            Err(SchError::Arity { .. })
        ));
    }

    #[test]
    fn test_not_callable() {
        let mut heap = Heap::new().unwrap();
        assert!(matches!(
            run(&mut heap, "(42 1 2)"),
            Err(SchError::NotCallable(_))
        ));
    }

    #[test]
    fn test_begin_sequences_and_returns_last() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(
            run_to_string(&mut heap, "(begin (define x 1) (set! x 2) x)"),
            "2"
        );
        assert_eq!(run_to_string(&mut heap, "(begin)"), "ok");
    }

    #[test]
    fn test_cond() {
        let mut heap = Heap::new().unwrap();
        let src = "(cond ((= 1 2) 'a) ((= 1 1) 'b) (else 'c))";
        assert_eq!(run_to_string(&mut heap, src), "b");
        let src = "(cond ((= 1 2) 'a) (else 'c))";
        assert_eq!(run_to_string(&mut heap, src), "c");
        // no clause matches
        assert_eq!(run_to_string(&mut heap, "(cond ((= 1 2) 'a))"), "#f");
        // else must be last
        assert!(run(&mut heap, "(cond (else 'a) (#t 'b))").is_err());
    }

    #[test]
    fn test_let_desugars_to_application() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(
            run_to_string(&mut heap, "(let ((x 3) (y 4)) (+ x y))"),
            "7"
        );
        assert_eq!(
            run_to_string(&mut heap, "(let ((x 10) (y 20)) (+ x y))"),
            "30"
        );
    }

    #[test]
    fn test_and_or() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(run_to_string(&mut heap, "(and)"), "#t");
        assert_eq!(run_to_string(&mut heap, "(or)"), "#f");
        assert_eq!(run_to_string(&mut heap, "(and 1 2 3)"), "3");
        assert_eq!(run_to_string(&mut heap, "(and 1 #f 3)"), "#f");
        assert_eq!(run_to_string(&mut heap, "(or #f 2 3)"), "2");
        assert_eq!(run_to_string(&mut heap, "(or #f #f)"), "#f");
        // short-circuit: the unbound variable is never evaluated
        assert_eq!(run_to_string(&mut heap, "(or 1 never-defined)"), "1");
        assert_eq!(run_to_string(&mut heap, "(and #f never-defined)"), "#f");
    }

    #[test]
    fn test_left_to_right_evaluation_order() {
        let mut heap = Heap::new().unwrap();
        let src = "(define a 0)
                   (list (begin (set! a 1) a) (begin (set! a 2) a))";
        assert_eq!(run_to_string(&mut heap, src), "(1 2)");
    }

    #[test]
    fn test_eval_primitive_is_intercepted() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(
            run_to_string(&mut heap, "(eval '(+ 1 2) (interaction-environment))"),
            "3"
        );
    }

    #[test]
    fn test_apply_primitive_is_intercepted() {
        let mut heap = Heap::new().unwrap();
        assert_eq!(run_to_string(&mut heap, "(apply + '(1 2 3))"), "6");
        assert_eq!(run_to_string(&mut heap, "(apply + 1 2 '(3 4))"), "10");
        assert_eq!(
            run_to_string(&mut heap, "(apply cons '(1 2))"),
            "(1 . 2)"
        );
    }

    #[test]
    fn test_deep_tail_recursion_in_every_tail_form() {
        let mut heap = Heap::new().unwrap();
        let cases = [
            "(define (f n) (if (= n 0) 'done (f (- n 1))))",
            "(define (f n) (if (= n 0) 'done (begin (f (- n 1)))))",
            "(define (f n) (cond ((= n 0) 'done) (else (f (- n 1)))))",
            "(define (f n) (let ((m (- n 1))) (if (= n 0) 'done (f m))))",
            "(define (f n) (and #t (if (= n 0) 'done (f (- n 1)))))",
            "(define (f n) (or #f (if (= n 0) 'done (f (- n 1)))))",
        ];
        for def in cases {
            let src = format!("{} (f 100000)", def);
            assert_eq!(run_to_string(&mut heap, &src), "done", "case: {}", def);
        }
    }

    #[test]
    fn test_root_stack_stays_bounded_in_tail_loops() {
        let mut heap = Heap::new().unwrap();
        let before = heap.root_watermark();
        run(
            &mut heap,
            "(define (f n) (if (= n 0) 'done (f (- n 1)))) (f 50000)",
        )
        .unwrap();
        // one pinned result per top-level expression, nothing more
        assert!(heap.root_watermark() <= before + 4);
    }
}

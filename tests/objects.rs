use minnow_lang::{Error, Interpreter};

fn run(source: &str) -> String {
    let mut interpreter = Interpreter::new();
    if let Err(err) = interpreter.execute(source) {
        panic!(
            "execution failed: {err} (output so far: {:?})",
            interpreter.output()
        );
    }
    interpreter.output().to_string()
}

fn run_err(source: &str) -> Error {
    Interpreter::new()
        .execute(source)
        .expect_err("expected an error")
}

#[test]
fn initialization_and_member_access() {
    let output = run(concat!(
        "a={}; print(a); print(a.x);",
        "a={'x':2}; print(a); print(a.x);",
        "a={'x':2,'y':3}; print(a); print(a.y);",
        "a.z=5; a.w=a.z; a.z=4; print(a.z); print(a.w);"
    ));
    assert_eq!(
        output,
        "object\nnull\nobject\n2\nobject\n3\n4\n5\n"
    );
}

#[test]
fn identifier_keys_and_compound_string_keys() {
    assert_eq!(run("obj={a:1, b:2, c:3}; print(obj.a, obj.b, obj.c);"), "1\n2\n3\n");
    assert_eq!(run("a={ 'AAA' /*comment*/ \"BBB\": 5 }; print(a.AAABBB);"), "5\n");
}

#[test]
fn object_literal_versus_block() {
    assert_eq!(
        run("{ print(1); { print(2); } { } print(3); } { }; {'a':1, 'b':false}; { print(4); } print(5);"),
        "1\n2\n3\n4\n5\n"
    );
}

#[test]
fn nested_objects() {
    assert_eq!(run("o1 = { 'x': 1 }; o2 = { 'y': o1 }; print(o2.y.x);"), "1\n");
    assert_eq!(run("o1 = { 'x': { 'y': 5 } }; o1.x.y += 5; print(o1.x.y);"), "10\n");
}

#[test]
fn objects_pass_by_reference() {
    assert_eq!(
        run(concat!(
            "o1 = { 'x': 1 }; o2 = o1; o2.x += 1; ",
            "function f(arg) { arg.x += 2; return arg; } ",
            "print(f(o2).x); print(o1.x);"
        )),
        "4\n4\n"
    );
}

#[test]
fn method_chaining() {
    assert_eq!(
        run(concat!(
            "o1 = { 'f1': function() { return o2; }, 'val1': 1 }; ",
            "o2 = { 'f2': function() { return o1; }, 'val2': 2 }; ",
            "print(o1.f1().f2().val1);"
        )),
        "1\n"
    );
}

#[test]
fn object_indexing() {
    assert_eq!(
        run("o1 = { 'x': 1, 'y': 2, 'a b c': 3 }; index = 'y'; print(o1['x'], o1[index], o1['a b' + ' c']);"),
        "1\n2\n3\n"
    );
    assert_eq!(run("o1 = { 'x': { 'y': { 'z': 5 } } }; print(o1['x'].y['z']);"), "5\n");
    assert_eq!(run("o={}; o['A A'] = 1; o['A A'] += 5; print(o['A A']);"), "6\n");
    assert_eq!(
        run("o={}; o['A'] = {}; o['A']['B'] = {}; o['A']['B'].c = 10; print(o.A.B['c']);"),
        "10\n"
    );
    assert_eq!(run("o={x:1}; print(o['missing']);"), "null\n");
    assert!(matches!(run_err("o={}; print(o[1]);"), Error::Execution(_)));
}

#[test]
fn object_equality_is_identity() {
    assert_eq!(
        run("o1={'a':1, 'b':2}; o2=o1; o3={'a':1, 'b':2}; print(o1==o1, o1==o2, o1==o3, o1!=o1, o1!=o2, o1!=o3);"),
        "1\n1\n0\n0\n0\n1\n"
    );
}

#[test]
fn count_and_null_removal() {
    assert_eq!(
        run("obj={'a':1, 'b':2, 'd':null}; obj.c=3; obj.b=null; print(obj.count);"),
        "2\n"
    );
    assert_eq!(
        run("o={a:1,b:2}; o.a=null; print(o.count, o.a);"),
        "1\nnull\n"
    );
    assert_eq!(
        run("o={a:1}; n1=o.count; o.a=null; print(n1 - o.count);"),
        "1\n"
    );
}

#[test]
fn repeating_keys_are_a_parse_error() {
    assert!(matches!(
        run_err("obj={'a':1, 'b':2, 'a':3};"),
        Error::Parsing(_)
    ));
}

#[test]
fn range_for_over_objects() {
    let output = run(concat!(
        "obj={'a':1, 'bbbb':4, 'cc':10}; ",
        "sum = 0; for(val: obj) sum += val; print(sum);",
        "sumKeyLen = 0; sumVal = 0; for(key, val: obj) { sumKeyLen += key.count; sumVal += val; } print(sumKeyLen, sumVal); ",
        "print(key, val);"
    ));
    assert_eq!(output, "15\n7\n15\nnull\nnull\n");
}

#[test]
fn implicit_this() {
    assert_eq!(
        run(concat!(
            "obj={ 'x': 2, 'f1': function() { x += 1; print(x); } }; ",
            "obj.f1(); obj['f1'](); (101, '102', obj.f1)(); ",
            "obj2={'subObj':obj}; obj2.subObj.f1();"
        )),
        "3\n4\n5\n6\n"
    );
}

#[test]
fn explicit_this() {
    assert_eq!(
        run(concat!(
            "obj={ 'x': 2, 'f1': function() { this.y = 1; this.x += y; print(this.x); } }; ",
            "obj.f1(); obj['f1'](); (101, '102', obj.f1)(); ",
            "obj2={'subObj':obj}; obj2.subObj.f1();"
        )),
        "3\n4\n5\n6\n"
    );
}

#[test]
fn returning_this() {
    assert_eq!(
        run("obj={ 'x': 2, 'f': function() { this.x += 1; return this; } }; obj2 = obj.f(); print(obj2.x);"),
        "3\n"
    );
}

#[test]
fn this_is_lost_through_plain_parameters() {
    let err = run_err(concat!(
        "obj={ 'x': 2, 'f': function() { this.x += 1; print(this.x); } }; ",
        "function call(a) { a(); } ",
        "call(obj.f);"
    ));
    assert!(matches!(err, Error::Execution(_)));
}

#[test]
fn this_through_member_and_indexing() {
    assert_eq!(
        run("obj={ 'x': 2, function f() { print(++this.x); } }; obj.f(); obj['f']();"),
        "3\n4\n"
    );
}

#[test]
fn this_through_grouping_comma_and_ternary() {
    assert_eq!(
        run("obj={ 'x': 2, function f() { print(++this.x); } }; ((obj)).f(); (111, 'AAA', obj.f)();"),
        "3\n4\n"
    );
    assert_eq!(
        run(concat!(
            "obj1={ x: 2, f: function() { print(++this.x); } }; ",
            "obj2={ f: function() { print('obj2f'); } }; ",
            "function call_f(cond) { (cond ? obj1 : obj2).f(); } ",
            "call_f(true); call_f(false);"
        )),
        "3\nobj2f\n"
    );
}

#[test]
fn this_is_lost_on_assignment() {
    assert_eq!(
        run(concat!(
            "x=100; obj={ x: 2, f: function() { print(++x); } }; ",
            "fn = obj.f; fn(); obj.f(); fn(); obj.f();"
        )),
        "101\n3\n102\n4\n"
    );
}

#[test]
fn nested_this() {
    assert_eq!(
        run("objInner = { x: 2, f: function() { print(++x); } }; objOuter = { o: objInner }; objOuter.o.f();"),
        "3\n"
    );
}

#[test]
fn calling_a_method_from_another_method() {
    assert_eq!(
        run(concat!(
            "obj={ 'x': 2, 'f1': function() { f2(); this.f2(); }, ",
            "'f2': function() { print(x); print(this.x); } }; ",
            "obj.f1();"
        )),
        "2\n2\n2\n2\n"
    );
}

#[test]
fn this_outside_methods_fails() {
    assert!(matches!(run_err("print(this.x);"), Error::Execution(_)));
    assert!(matches!(
        run_err("function f() { print(this.x); } f();"),
        Error::Execution(_)
    ));
}

#[test]
fn function_sugar_inside_object_literal() {
    assert_eq!(
        run("obj={ v: 2, function fn() { print(v); } }; obj.fn();"),
        "2\n"
    );
}

#[test]
fn calling_object_default_function() {
    assert_eq!(
        run("obj={ v: 2, function fn() { print('fn'); }, '':function(a) { print('Default', a); } }; obj(3);"),
        "Default\n3\n"
    );
}

#[test]
fn class_sugar() {
    assert_eq!(
        run(concat!(
            "class C { v: 1, '': function(x) { v=x; }, function show() { global.print(this.v); } } ",
            "C(2); C.show();"
        )),
        "2\n"
    );
}

#[test]
fn class_sugar_with_constructor_and_method() {
    assert_eq!(
        run(concat!(
            "class C { x:1, '':function(v){ x=v; }, function show(){ global.print(this.x); } } ",
            "C(7); C.show();"
        )),
        "7\n"
    );
}

#[test]
fn class_inheritance() {
    assert_eq!(
        run(concat!(
            "class A { v: 1, '': function(x) { v=x; }, function show() { global.print(this.v); } } ",
            "class B : A { '': function(x) { v=x+1; } } ",
            "B(2); B.show(); A.show();"
        )),
        "3\n1\n"
    );
}

#[test]
fn null_members_in_derived_class_are_removed() {
    assert_eq!(
        run(concat!(
            "class Base { a: 121, b: 122, c: 123 } ",
            "class Derived : Base { b: 124, c: null } ",
            "print(Derived.a, Derived.b, Derived.c);"
        )),
        "121\n124\nnull\n"
    );
}

#[test]
fn base_must_be_an_object() {
    assert!(matches!(run_err("class C : 5 { a: 1 }"), Error::Execution(_)));
}

#[test]
fn shallow_copy_shares_nested_values() {
    assert_eq!(
        run(concat!(
            "class Base { inner: { n: 1 } } ",
            "class Derived : Base { } ",
            "Derived.inner.n = 2; print(Base.inner.n);"
        )),
        "2\n"
    );
}

#[test]
fn trailing_commas() {
    assert_eq!(
        run("o1={a:123, b:124,}; o2={'a':o1.a, 'b':o1.b,}; print(o1['a'], o1['b'], o2.a, o2.b);"),
        "123\n124\n123\n124\n"
    );
}

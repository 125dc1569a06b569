//! End-to-end script execution tests.

use proptest::prelude::*;
use quarry_core::{Database, ErrorKind};
use quarry_vm::{compile, CallContext, ForeignFunction, Value, Vm, VmConfig, VmError, VmResult};

fn output(source: &str) -> String {
    Vm::new().run(source).unwrap().text().into_owned()
}

fn runtime_error(vm: &mut Vm<'_>, source: &str) -> (String, u32, String) {
    match vm.run(source).unwrap_err() {
        VmError::Runtime {
            message,
            line,
            output,
        } => (message, line, String::from_utf8(output).unwrap()),
        other => panic!("expected a runtime error, got {other}"),
    }
}

#[test]
fn prints_arithmetic() {
    assert_eq!(output("$x = 6 * 7; print $x;"), "42");
    assert_eq!(output("print 7 / 2, ' ', 8 / 2, ' ', 7 % 3;"), "3.5 4 1");
    assert_eq!(output("echo 'a' .. 1 .. true .. null .. false;"), "a11");
}

#[test]
fn calls_script_functions() {
    let src = "function add($a, $b) { return $a + $b; } print add(3, 4);";
    assert_eq!(output(src), "7");

    let src = r"
        function greet($name, $greeting = 'hi') {
            return $greeting .. ' ' .. $name;
        }
        print greet('ann'), '|', greet('bob', 'yo');
    ";
    assert_eq!(output(src), "hi ann|yo bob");
}

#[test]
fn functions_may_be_called_before_definition() {
    let src = r"
        print fact(10);
        function fact($n) {
            if ($n <= 1) return 1;
            return $n * fact($n - 1);
        }
    ";
    assert_eq!(output(src), "3628800");
}

#[test]
fn loops_and_control_flow() {
    let src = r"
        for ($i = 0; $i < 6; $i++) {
            if ($i == 2) continue;
            if ($i == 5) break;
            print $i;
        }
        $n = 3;
        while ($n > 0) { print '-', $n; $n -= 1; }
        do { print '!'; } while (false);
    ";
    assert_eq!(output(src), "0134-3-2-1!");
}

#[test]
fn foreach_over_objects_and_lists() {
    let src = r#"
        $doc = {name: 'ann', age: 31};
        foreach ($doc as $k => $v) { print "$k=$v;"; }
        $sum = 0;
        foreach ([1, 2, 3] as $v) { $sum += $v; }
        print $sum;
        foreach (null as $v) { print 'never'; }
    "#;
    assert_eq!(output(src), "name=ann;age=31;6");
}

#[test]
fn arrays_grow_through_paths() {
    let src = r"
        $a = [];
        $a[] = 1;
        $a['k']['j'] = 2;
        $a.k.j += 5;
        print json_encode($a), ' ', count($a), ' ', $a.k.j;
    ";
    assert_eq!(output(src), r#"{"0":1,"k":{"j":7}} 2 7"#);
}

#[test]
fn top_level_return_is_the_result_value() {
    let result = Vm::new().run("print 'x'; return [1, 2];").unwrap();
    assert_eq!(result.output, b"x");
    assert_eq!(result.value, Value::list([Value::Int(1), Value::Int(2)]));
    assert_eq!(Vm::new().run("$a = 1;").unwrap().value, Value::Null);
}

#[test]
fn runtime_errors_keep_partial_output_and_line() {
    let (message, line, out) = runtime_error(&mut Vm::new(), "print 'a';\n$x = 1 / 0;");
    assert_eq!(message, "division by zero");
    assert_eq!(line, 2);
    assert_eq!(out, "a");

    let (message, _, _) = runtime_error(&mut Vm::new(), "nope(1);");
    assert_eq!(message, "call to undefined function nope()");
}

#[test]
fn compile_errors_report_the_line() {
    let err = Vm::new().run("$a = 1;\nprint (1;").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CompileError);
    assert!(matches!(err, VmError::Compile { line: 2, .. }), "{err}");

    let err = compile("break;").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CompileError);
}

#[test]
fn deeply_nested_scripts_fail_to_compile() {
    let source = format!("$x = {}1{};", "(".repeat(20_000), ")".repeat(20_000));
    let err = compile(&source).unwrap_err();
    assert!(matches!(err, VmError::Compile { line: 1, .. }), "{err}");
}

#[test]
fn oversized_results_are_runtime_errors() {
    let (message, line, _) = runtime_error(&mut Vm::new(), "$r = range(INT_MIN, INT_MAX);");
    assert_eq!(message, "range(): range is too large");
    assert_eq!(line, 1);
    let (message, _, _) = runtime_error(&mut Vm::new(), "print str_repeat('ab', INT_MAX);");
    assert_eq!(message, "str_repeat(): result is too large");
}

#[test]
fn call_depth_is_bounded() {
    let mut vm = Vm::with_config(VmConfig::new().max_call_depth(16));
    let (message, _, _) = runtime_error(&mut vm, "function f($n) { return f($n + 1); } f(0);");
    assert_eq!(message, "maximum call depth of 16 exceeded in f()");

    let src = "function down($n) { if ($n == 0) return 0; return down($n - 1); } print down(10);";
    assert_eq!(vm.run(src).unwrap().output, b"0");
}

#[test]
fn resolution_prefers_script_then_registered_then_builtin() {
    let mut vm = Vm::new();
    vm.register_function("strlen", |_ctx: &mut CallContext<'_>, _args: &[Value]| {
        Ok(Value::Int(-1))
    });
    assert_eq!(vm.run("print strlen('abc');").unwrap().output, b"-1");

    let src = "function strlen($s) { return 'mine'; } print strlen('abc');";
    assert_eq!(vm.run(src).unwrap().output, b"mine");

    assert!(vm.unregister_function("strlen"));
    assert_eq!(vm.run("print strlen('abc');").unwrap().output, b"3");
}

struct Shout;

impl ForeignFunction for Shout {
    fn call(&self, ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
        let Some(text) = args.first() else {
            return Err(ctx.error("needs a message"));
        };
        ctx.echo(b">> ");
        Ok(Value::from(text.to_bytes().to_ascii_uppercase()))
    }
}

#[test]
fn foreign_functions_write_output_and_fail_cleanly() {
    let mut vm = Vm::new();
    vm.register_foreign("shout", Box::new(Shout));
    assert_eq!(vm.run("print shout('hey');").unwrap().output, b">> HEY");

    let (message, line, _) = runtime_error(&mut vm, "\n\nshout();");
    assert_eq!(message, "shout(): needs a message");
    assert_eq!(line, 3);
}

#[test]
fn constants_expand() {
    let mut vm = Vm::new();
    vm.register_constant("ANSWER", || Value::Int(42));
    let out = vm.run("print ANSWER, EOL, UNKNOWN, ' ', INT_MAX > 0;").unwrap().output;
    assert_eq!(out, b"42\nUNKNOWN 1");
}

#[test]
fn compiled_programs_are_reusable() {
    let program = compile("function twice($x) { return $x * 2; } print twice(21);").unwrap();
    assert!(program.defines("twice"));
    assert_eq!(program.function_names().collect::<Vec<_>>(), vec!["twice"]);

    let several = compile("function b() {} function a() {} function c() {}").unwrap();
    let names: Vec<&str> = several.function_names().collect();
    assert_eq!(names, vec!["b", "a", "c"]);
    let mut vm = Vm::new();
    assert_eq!(vm.execute(&program).unwrap().output, b"42");
    assert_eq!(vm.execute(&program).unwrap().output, b"42");
}

#[test]
fn scripts_store_and_read_documents() {
    let db = Database::open_in_memory().unwrap();
    let mut vm = Vm::with_database(&db);
    let src = r"
        db_create('users');
        db_store('users', [{name: 'ann'}, {name: 'bob'}, {name: 'cy'}]);
        while (($u = db_fetch('users')) !== null) {
            print $u.name, ',';
        }
        print db_total_records('users'), ' ', db_last_record_id('users');
    ";
    assert_eq!(vm.run(src).unwrap().output, b"ann,bob,cy,3 2");

    // the record cursor survives between runs on the same VM
    assert_eq!(vm.run("print db_fetch('users') === null;").unwrap().output, b"1");
    vm.run("db_reset_record_cursor('users');").unwrap();
    assert_eq!(vm.run("print db_fetch('users').name;").unwrap().output, b"ann");

    let users = db.collection("users").unwrap();
    assert_eq!(users.total_records().unwrap(), 3);
}

#[test]
fn script_transactions_roll_back() {
    let db = Database::open_in_memory().unwrap();
    let mut vm = Vm::with_database(&db);
    let src = r"
        db_create('c');
        db_begin();
        db_store('c', {a: 1});
        kv_store('k', 'v');
        db_rollback();
        print db_total_records('c'), kv_exists('k') ? 'yes' : 'no';
    ";
    assert_eq!(vm.run(src).unwrap().output, b"0no");
    assert_eq!(db.fetch(b"k").unwrap(), None);
}

#[test]
fn binary_values_print_unchanged() {
    let db = Database::open_in_memory().unwrap();
    db.store(b"blob", &[0xff, 0x00, 0xfe]).unwrap();
    let mut vm = Vm::with_database(&db);
    let result = vm.run("print '<', kv_fetch('blob'), '>';").unwrap();
    assert_eq!(result.output, [b'<', 0xff, 0x00, 0xfe, b'>']);
    assert_eq!(result.text(), "<\u{fffd}\0\u{fffd}>");
}

#[test]
fn database_functions_need_a_database() {
    let (message, _, _) = runtime_error(&mut Vm::new(), "kv_store('k', 1);");
    assert_eq!(message, "kv_store(): no database is attached to this VM");
}

proptest! {
    #[test]
    fn integer_arithmetic_matches_rust(a in -1000i64..1000, b in -1000i64..1000) {
        let out = output(&format!("print ({a}) + ({b}) * 2, ' ', ({a}) - ({b});"));
        prop_assert_eq!(out, format!("{} {}", a + b * 2, a - b));
    }

    #[test]
    fn strings_round_trip_through_print(s in "[a-zA-Z0-9 ]{0,24}") {
        let out = output(&format!("$s = '{s}'; print strlen($s), ':', $s;"));
        prop_assert_eq!(out, format!("{}:{}", s.len(), s));
    }
}

use fcsv::bytecode::{Family, Op, Operator};
use fcsv::compiler::{compile, compile_with, CompileError, CompileOptions, OverflowKind};
use fcsv::interpreter::{execute, Interpreter, RuntimeError};
use fcsv::row::{parse_timestamp, DataType, Value, VariableTable};
use std::sync::Arc;
use std::thread;

fn eval(expression: &str, variables: &VariableTable) -> Result<Value<'static>, String> {
    let program = compile(expression, variables).map_err(|e| e.to_string())?;
    execute(&program, variables)
        .map(|value| value.into_owned())
        .map_err(|e| e.to_string())
}

fn row_table() -> VariableTable {
    let mut vars = VariableTable::new();
    vars.push("name", Value::from("Smith"));
    vars.push("price", Value::Number(12.5));
    vars.push("qty", Value::Number(3.0));
    vars.push(
        "shipped",
        Value::Timestamp(parse_timestamp("2024-03-01T08:15:00").unwrap()),
    );
    vars
}

#[test]
fn test_round_trip_literals() {
    let vars = VariableTable::new();
    assert_eq!(eval("1+2", &vars), Ok(Value::Number(3.0)));
    assert_eq!(eval("true & false", &vars), Ok(Value::Number(0.0)));
    assert!(!eval("true & false", &vars).unwrap().is_truthy());
    assert_eq!(eval("'ab' + 'cd'", &vars), Ok(Value::from("abcd")));
}

#[test]
fn test_precedence() {
    let vars = VariableTable::new();
    assert_eq!(eval("2+3*4", &vars), Ok(Value::Number(14.0)));
    assert_eq!(eval("(2+3)*4", &vars), Ok(Value::Number(20.0)));
    assert_eq!(eval("10-4-3", &vars), Ok(Value::Number(3.0)));
    assert_eq!(eval("1 < 2 & 3 > 4 | 1", &vars), Ok(Value::Number(1.0)));
    assert_eq!(eval("!0 & !1", &vars), Ok(Value::Number(0.0)));
}

#[test]
fn test_ternary_type_merge() {
    let mut vars = VariableTable::new();
    vars.push("x", Value::Number(5.0));

    assert_eq!(eval("x>1 ? 'yes' : 'no'", &vars), Ok(Value::from("yes")));
    assert!(matches!(
        compile("x>1 ? 1 : 'no'", &vars),
        Err(CompileError::TypeMismatch { .. })
    ));
    assert_eq!(
        eval("x > 10 ? 'big' : x > 3 ? 'medium' : 'small'", &vars),
        Ok(Value::from("medium"))
    );
}

#[test]
fn test_string_prefix_comparison() {
    let vars = VariableTable::new();
    assert_eq!(eval("'hello' = 'hel'", &vars), Ok(Value::Number(1.0)));
    assert_eq!(eval("'hello' != 'help'", &vars), Ok(Value::Number(1.0)));
    assert_eq!(eval("'abc' < 'b'", &vars), Ok(Value::Number(1.0)));
    assert_eq!(eval("'hel' = 'hello'", &vars), Ok(Value::Number(0.0)));
}

#[test]
fn test_membership_operand_order() {
    let vars = VariableTable::new();
    assert_eq!(eval("'ab' in 'xabz'", &vars), Ok(Value::Number(1.0)));
    assert_eq!(eval("'xabz' in 'ab'", &vars), Ok(Value::Number(0.0)));
    // left operand is the pattern, right operand the subject
    assert_eq!(eval("'ab' rin '^a.$'", &vars), Ok(Value::Number(0.0)));
    assert_eq!(eval("'^a.$' rin 'ab'", &vars), Ok(Value::Number(1.0)));
    assert_eq!(eval("'^S[a-z]+h$' rin 'Smith'", &vars), Ok(Value::Number(1.0)));

    let err = eval("'(' rin 'x'", &vars).unwrap_err();
    assert!(err.starts_with("Invalid pattern"));
}

#[test]
fn test_row_expressions() {
    let vars = row_table();
    assert_eq!(eval("price * qty > 30", &vars), Ok(Value::Number(1.0)));
    assert_eq!(eval("name = 'Sm' & #1 > 10", &vars), Ok(Value::Number(1.0)));
    // prefix name match
    assert_eq!(eval("pri", &vars), Ok(Value::Number(12.5)));
    assert_eq!(
        eval("shipped > '2024-02-28T00:00:00'", &vars),
        Ok(Value::Number(1.0))
    );
    assert_eq!(
        eval("shipped = '2024-03-01T08:15:00'", &vars),
        Ok(Value::Number(1.0))
    );
    assert!(matches!(
        compile("shipped + 1", &vars),
        Err(CompileError::TypeMismatch { .. })
    ));
}

#[test]
fn test_timestamp_comparisons() {
    let mut vars = row_table();
    vars.push(
        "delivered",
        Value::Timestamp(parse_timestamp("2024-03-04T12:00:00").unwrap()),
    );

    assert_eq!(eval("shipped < delivered", &vars), Ok(Value::Number(1.0)));
    assert_eq!(eval("delivered <= shipped", &vars), Ok(Value::Number(0.0)));
    assert_eq!(eval("shipped = shipped", &vars), Ok(Value::Number(1.0)));
    assert_eq!(
        eval("'2024-01-01T00:00:00' < shipped", &vars),
        Ok(Value::Number(1.0))
    );
    assert_eq!(
        eval("'2024-03-01T08:15:00' != shipped", &vars),
        Ok(Value::Number(0.0))
    );

    let program = compile("shipped > 'next tuesday'", &vars).unwrap();
    assert_eq!(
        execute(&program, &vars),
        Err(RuntimeError::InvalidTimestamp {
            text: "next tuesday".to_string()
        })
    );
    let program = compile("'2024-13-01T00:00:00' < delivered", &vars).unwrap();
    assert!(matches!(
        execute(&program, &vars),
        Err(RuntimeError::InvalidTimestamp { .. })
    ));
}

#[test]
fn test_repeat_empty_string_terminates() {
    let vars = VariableTable::new();
    assert_eq!(eval("'' * 1000000000000000000", &vars), Ok(Value::from("")));
    assert_eq!(eval("'ab' * 0", &vars), Ok(Value::from("")));
}

#[test]
fn test_division_by_zero_returns_no_value() {
    let mut vars = VariableTable::new();
    vars.push("zero", Value::Number(0.0));
    let program = compile("1 / zero", &vars).unwrap();
    assert_eq!(
        execute(&program, &vars),
        Err(RuntimeError::DivisionByZero { pc: 2 })
    );
}

#[test]
fn test_program_overflow() {
    let vars = VariableTable::new();
    let expression = vec!["1"; 600].join("+");
    let err = compile(&expression, &vars).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Overflow {
            kind: OverflowKind::Program,
            limit: 1024,
            ..
        }
    ));

    let options = CompileOptions {
        max_program_len: 2048,
        ..CompileOptions::default()
    };
    let program = compile_with(&expression, &vars, &options).unwrap();
    assert_eq!(execute(&program, &vars), Ok(Value::Number(600.0)));
}

#[test]
fn test_stack_balance_over_many_expressions() {
    let vars = row_table();
    let expressions = [
        "price",
        "!(price > 1)",
        "name + '-' + name",
        "(name * 2) / 'hS'",
        "qty = 3 ? name - 'i' : 'none'",
        "price > 1 & qty < 10 | name in 'Smithy'",
        "((((1))))",
    ];
    let mut interpreter = Interpreter::new();
    for expression in expressions {
        let program = compile(expression, &vars).unwrap();
        assert!(
            interpreter.execute(&program, &vars).is_ok(),
            "'{}' failed",
            expression
        );
    }
}

#[test]
fn test_owned_results_across_rows() {
    let mut vars = VariableTable::with_names(["first", "last"]);
    vars.bind_row(&["Ada", "Lovelace"]);
    let program = compile("first + ' ' + last", &vars).unwrap();
    let mut interpreter = Interpreter::new();

    for i in 0..1000 {
        let first = format!("n{}", i);
        assert!(!vars.bind_row(&[first.as_str(), "x"]));
        let result = interpreter.execute(&program, &vars).unwrap();
        assert!(result.is_owned());
        assert_eq!(result.as_str(), Some(format!("n{} x", i).as_str()));
    }

    // the table's own strings are untouched
    assert_eq!(
        vars.get(1).and_then(|v| v.value()).and_then(|v| v.as_str()),
        Some("x")
    );
}

#[test]
fn test_generic_opcodes_for_untyped_names() {
    let mut vars = VariableTable::with_names(["a"]);
    let program = compile("a + a", &vars).unwrap();
    assert_eq!(program.ops()[2], Op::Apply(Family::Generic, Operator::Add));

    vars.bind(0, Value::Number(2.0)).unwrap();
    assert_eq!(execute(&program, &vars), Ok(Value::Number(4.0)));

    let mut vars = VariableTable::with_names(["a"]);
    vars.bind(0, Value::from("ab")).unwrap();
    assert_eq!(execute(&program, &vars), Ok(Value::from("abab")));
}

#[test]
fn test_retyping_requires_recompile() {
    let mut vars = VariableTable::with_names(["code"]);
    assert!(vars.bind_row(&["42"]));
    assert_eq!(vars.get(0).map(|v| v.data_type()), Some(DataType::Number));

    let program = compile("code > 10", &vars).unwrap();
    assert_eq!(execute(&program, &vars), Ok(Value::Number(1.0)));

    assert!(vars.bind_row(&["X42"]));
    assert!(execute(&program, &vars).is_err());
    assert!(matches!(
        compile("code > 10", &vars),
        Err(CompileError::TypeMismatch { .. })
    ));
}

#[test]
fn test_concurrent_compilation() {
    let vars = Arc::new(row_table());
    let mut handles = Vec::new();

    for i in 0..4 {
        let vars = Arc::clone(&vars);
        handles.push(thread::spawn(move || {
            let expression = format!("price + {}", i);
            let mut interpreter = Interpreter::new();
            for _ in 0..100 {
                let program = compile(&expression, &vars).unwrap();
                let result = interpreter.execute(&program, &vars).unwrap();
                assert_eq!(result, Value::Number(12.5 + i as f64));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_disassembly_listing() {
    let vars = row_table();
    let program = compile("price > 10 ? name : 'cheap'", &vars).unwrap();
    let listing = program.disassemble(Some(&vars));
    assert_eq!(
        listing,
        "0x000\tPUSH price [1]\n\
         0x001\tPUSH 10\n\
         0x002\tGT.NUM\n\
         0x003\tJPZ  006\n\
         0x004\tPUSH name [0]\n\
         0x005\tJP   007\n\
         0x006\tPUSH 'cheap'\n\
         0x007\tHALT\n"
    );
}

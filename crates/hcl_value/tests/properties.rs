use proptest::prelude::*;

use hcl_value::ops::binary;
use hcl_value::{convert, unify, BinaryOperator, Mark, Type, Value};

fn operator() -> impl Strategy<Value = BinaryOperator> {
    prop_oneof![
        Just(BinaryOperator::Add),
        Just(BinaryOperator::Subtract),
        Just(BinaryOperator::Multiply),
        Just(BinaryOperator::Divide),
        Just(BinaryOperator::Modulo),
        Just(BinaryOperator::Equal),
        Just(BinaryOperator::NotEqual),
        Just(BinaryOperator::LessThan),
        Just(BinaryOperator::GreaterThanOrEqual),
    ]
}

fn primitive_type() -> impl Strategy<Value = Type> {
    prop_oneof![Just(Type::Bool), Just(Type::Number), Just(Type::String)]
}

proptest! {
    #[test]
    fn operations_keep_every_input_mark(
        op in operator(),
        a in -500i64..500,
        b in -500i64..500,
        mark_a in "[a-z]{1,4}",
        mark_b in "[a-z]{1,4}",
    ) {
        let lhs = Value::int(a).mark(Mark::new(&mark_a));
        let rhs = Value::int(b).mark(Mark::new(&mark_b));
        if let Ok(result) = binary(op, &lhs, &rhs) {
            prop_assert!(result.has_mark(&Mark::new(&mark_a)));
            prop_assert!(result.has_mark(&Mark::new(&mark_b)));
        }
    }

    #[test]
    fn unknown_operands_give_unknown_results(op in operator(), a in -500i64..500) {
        let result = binary(op, &Value::unknown(Type::Number), &Value::int(a));
        if let Ok(result) = result {
            prop_assert!(!result.is_known());
            prop_assert_eq!(result.ty(), &op.result_type());
        }
    }

    #[test]
    fn arithmetic_agrees_with_integers(a in -10_000i64..10_000, b in -10_000i64..10_000) {
        let sum = binary(BinaryOperator::Add, &Value::int(a), &Value::int(b));
        prop_assert_eq!(sum.ok(), Some(Value::int(a + b)));
        let product = binary(BinaryOperator::Multiply, &Value::int(a), &Value::int(b));
        prop_assert_eq!(product.ok(), Some(Value::int(a * b)));
        let less = binary(BinaryOperator::LessThan, &Value::int(a), &Value::int(b));
        prop_assert_eq!(less.ok(), Some(Value::bool(a < b)));
    }

    #[test]
    fn numbers_survive_string_round_trip(n in any::<i64>()) {
        let text = convert(&Value::int(n), &Type::String);
        prop_assert_eq!(text.clone().ok(), Some(Value::string(n.to_string())));
        let back = text.and_then(|text| convert(&text, &Type::Number));
        prop_assert_eq!(back.ok(), Some(Value::int(n)));
    }

    #[test]
    fn unify_of_one_type_is_itself(ty in primitive_type()) {
        prop_assert_eq!(unify(&[ty.clone(), ty.clone()]), Some(ty));
    }

    #[test]
    fn null_converts_to_null_of_target(from in primitive_type(), to in primitive_type()) {
        if let Ok(converted) = convert(&Value::null(from), &to) {
            prop_assert!(converted.is_null());
            prop_assert_eq!(converted.ty(), &to);
        }
    }
}

use tlua_compiler::{
    describe, difference, intersect, is_assignable, return_of, union, FunctionType, KeyValPair,
    NumberRep, Primitive, TupleType, Type, TypeTable,
};

fn number() -> Type {
    Type::Primitive(Primitive::Number)
}

fn string() -> Type {
    Type::Primitive(Primitive::String)
}

fn boolean() -> Type {
    Type::Primitive(Primitive::Boolean)
}

fn nil() -> Type {
    Type::Primitive(Primitive::Nil)
}

fn int(value: i64) -> Type {
    Type::literal_number(NumberRep::Integer(value))
}

fn function(params: Vec<Type>, ret: Type) -> Type {
    Type::Function(FunctionType {
        genparams: Vec::new(),
        nominals: Vec::new(),
        params,
        ret: Box::new(ret),
        variadic: false,
    })
}

#[test]
fn union_identity_laws() {
    let table = TypeTable::new();
    assert_eq!(union(&table, &number(), &Type::Void), number());
    assert_eq!(union(&table, &Type::Void, &number()), number());
    assert_eq!(union(&table, &number(), &Type::Any), Type::Any);
    assert_eq!(union(&table, &Type::Any, &number()), Type::Any);
    assert_eq!(union(&table, &number(), &number()), number());
}

#[test]
fn union_subsumes_smaller_member() {
    let table = TypeTable::new();
    assert_eq!(union(&table, &number(), &int(3)), number());
    assert_eq!(union(&table, &int(3), &number()), number());
}

#[test]
fn union_flattens_nested_sums() {
    let table = TypeTable::new();
    let left = union(&table, &number(), &string());
    let right = union(&table, &boolean(), &nil());
    let both = union(&table, &left, &right);
    let Type::Sum(sum) = &both else {
        panic!("expected a sum, got {}", describe(&table, &both));
    };
    assert_eq!(sum.types.len(), 4);
    assert!(sum
        .types
        .iter()
        .all(|member| !matches!(member, Type::Sum(_))));
}

#[test]
fn union_normalizes_literal_then_primitive() {
    let table = TypeTable::new();
    // 3 | nil | number collapses the literal into number.
    let first = union(&table, &int(3), &nil());
    let normalized = union(&table, &first, &number());
    let expected = union(&table, &number(), &nil());
    assert_eq!(normalized, expected);
}

#[test]
fn difference_of_equal_types_is_void() {
    let table = TypeTable::new();
    assert_eq!(difference(&table, &number(), &number()), Type::Void);
    assert_eq!(difference(&table, &int(3), &int(3)), Type::Void);
}

#[test]
fn difference_of_boolean_and_literal_flips() {
    let table = TypeTable::new();
    assert_eq!(
        difference(&table, &boolean(), &Type::literal_bool(true)),
        Type::literal_bool(false)
    );
    assert_eq!(
        difference(&table, &boolean(), &Type::literal_bool(false)),
        Type::literal_bool(true)
    );
}

#[test]
fn difference_drops_sum_members() {
    let table = TypeTable::new();
    let sum = union(&table, &number(), &string());
    assert_eq!(difference(&table, &sum, &string()), number());
}

#[test]
fn difference_of_primitive_and_number_literal_is_unchanged() {
    let table = TypeTable::new();
    assert_eq!(difference(&table, &number(), &int(3)), number());
}

#[test]
fn intersection_narrows_when_one_side_subsumes() {
    let table = TypeTable::new();
    assert_eq!(intersect(&table, &number(), &int(3)), int(3));
    assert_eq!(intersect(&table, &int(3), &number()), int(3));
}

#[test]
fn intersection_of_unrelated_functions_is_a_product() {
    let table = TypeTable::new();
    let first = function(vec![number()], number());
    let second = function(vec![string()], string());
    let combined = intersect(&table, &first, &second);
    let Type::Product(product) = &combined else {
        panic!("expected a product");
    };
    assert_eq!(product.types.len(), 2);
}

#[test]
fn assignability_is_reflexive_for_assorted_types() {
    let table = TypeTable::new();
    let samples = vec![
        Type::Void,
        Type::Any,
        number(),
        int(3),
        Type::literal_string("hi"),
        function(vec![number(), string()], boolean()),
        Type::tuple(vec![number(), string()], true),
        union(&table, &number(), &nil()),
        Type::table(
            vec![KeyValPair {
                key: number(),
                val: Type::Any,
            }],
            Vec::new(),
        ),
    ];
    for ty in &samples {
        assert!(
            is_assignable(&table, ty, ty).yes,
            "`{}` should accept itself",
            describe(&table, ty)
        );
    }
}

#[test]
fn literal_flows_into_primitive_but_not_back() {
    let table = TypeTable::new();
    assert!(is_assignable(&table, &number(), &int(3)).yes);
    assert!(!is_assignable(&table, &int(3), &number()).yes);
    assert!(is_assignable(&table, &int(3), &int(3)).yes);
}

#[test]
fn integer_and_float_literals_stay_distinct() {
    let table = TypeTable::new();
    let float = Type::literal_number(NumberRep::Float(3.0));
    assert!(!is_assignable(&table, &int(3), &float).yes);
    assert!(!is_assignable(&table, &float, &int(3)).yes);
    assert!(is_assignable(&table, &number(), &float).yes);
}

#[test]
fn tuple_splices_trailing_tuple_values() {
    let table = TypeTable::new();
    let flat = Type::tuple(vec![number(), string(), boolean()], false);
    let nested = Type::tuple(
        vec![number(), Type::tuple(vec![string(), boolean()], false)],
        false,
    );
    assert!(is_assignable(&table, &flat, &nested).yes);
}

#[test]
fn tuple_rejects_extra_values_without_variadic() {
    let table = TypeTable::new();
    let two = Type::tuple(vec![number(), number()], false);
    let three = Type::tuple(vec![number(), number(), number()], false);
    assert!(!is_assignable(&table, &two, &three).yes);
    let two_variadic = Type::tuple(vec![number(), number()], true);
    assert!(is_assignable(&table, &two_variadic, &three).yes);
}

#[test]
fn missing_tuple_values_must_accept_nil() {
    let table = TypeTable::new();
    let lhs = Type::tuple(vec![number(), union(&table, &number(), &nil())], false);
    let rhs = Type::tuple(vec![number()], false);
    assert!(is_assignable(&table, &lhs, &rhs).yes);

    let strict = Type::tuple(vec![number(), number()], false);
    assert!(!is_assignable(&table, &strict, &rhs).yes);
}

#[test]
fn function_parameters_and_returns_line_up() {
    let table = TypeTable::new();
    let lhs = function(vec![number()], nil());

    // A broader parameter on the left is fine, a narrower one is not.
    assert!(is_assignable(&table, &lhs, &function(vec![Type::Any], nil())).yes);
    let result = is_assignable(&table, &lhs, &function(vec![string()], nil()));
    assert!(!result.yes);
    let rendered = result.to_string();
    assert!(rendered.contains("At parameter 0"), "got: {rendered}");
    assert!(
        rendered.contains("Cannot assign `string` to `number`"),
        "got: {rendered}"
    );

    // Returns compare covariantly.
    let wider_return = function(vec![number()], number());
    assert!(is_assignable(&table, &wider_return, &function(vec![number()], int(3))).yes);
    let result = is_assignable(&table, &wider_return, &function(vec![number()], string()));
    assert!(!result.yes);
    assert!(result.to_string().contains("At return type"));
}

#[test]
fn excess_function_parameters_must_accept_nil() {
    let table = TypeTable::new();
    let lhs = function(vec![number()], nil());
    let optional_extra = function(vec![number(), union(&table, &string(), &nil())], nil());
    assert!(is_assignable(&table, &lhs, &optional_extra).yes);
    let required_extra = function(vec![number(), string()], nil());
    assert!(!is_assignable(&table, &lhs, &required_extra).yes);
}

#[test]
fn table_fields_check_by_name_and_absent_fields_need_nil() {
    let table = TypeTable::new();
    let lhs = Type::table(
        Vec::new(),
        vec![
            tlua_compiler::NameType {
                name: "x".to_string(),
                ty: number(),
            },
            tlua_compiler::NameType {
                name: "note".to_string(),
                ty: union(&table, &string(), &nil()),
            },
        ],
    );
    let rhs = Type::table(
        Vec::new(),
        vec![tlua_compiler::NameType {
            name: "x".to_string(),
            ty: int(1),
        }],
    );
    assert!(is_assignable(&table, &lhs, &rhs).yes);

    let wrong = Type::table(
        Vec::new(),
        vec![tlua_compiler::NameType {
            name: "x".to_string(),
            ty: string(),
        }],
    );
    let result = is_assignable(&table, &lhs, &wrong);
    assert!(!result.yes);
    assert!(result.to_string().contains("At field 'x'"));
}

#[test]
fn sum_on_the_right_needs_every_member_accepted() {
    let table = TypeTable::new();
    let lhs = union(&table, &number(), &string());
    let rhs = union(&table, &number(), &boolean());
    assert!(!is_assignable(&table, &lhs, &rhs).yes);
    assert!(is_assignable(&table, &lhs, &number()).yes);
}

#[test]
fn product_on_the_right_needs_one_component_accepted() {
    let table = TypeTable::new();
    let target = function(vec![number()], number());
    let overloaded = intersect(
        &table,
        &function(vec![number()], number()),
        &function(vec![string()], string()),
    );
    assert!(is_assignable(&table, &target, &overloaded).yes);

    let unrelated = function(vec![boolean()], boolean());
    assert!(!is_assignable(&table, &unrelated, &overloaded).yes);
}

#[test]
fn void_accepts_nothing_but_itself() {
    let table = TypeTable::new();
    assert!(is_assignable(&table, &Type::Void, &Type::Void).yes);
    assert!(is_assignable(&table, &Type::Any, &Type::Void).yes);
    assert!(!is_assignable(&table, &number(), &Type::Void).yes);
    assert!(!is_assignable(&table, &Type::Void, &number()).yes);
}

#[test]
fn deferred_types_compare_by_id_then_by_body() {
    let table = TypeTable::new();
    let id = table.reserve("point");
    table.set(
        id,
        Type::table(
            Vec::new(),
            vec![tlua_compiler::NameType {
                name: "x".to_string(),
                ty: number(),
            }],
        ),
    );

    let deferred = Type::deferred(id);
    assert!(is_assignable(&table, &deferred, &deferred).yes);

    let structural = Type::table(
        Vec::new(),
        vec![tlua_compiler::NameType {
            name: "x".to_string(),
            ty: int(1),
        }],
    );
    assert!(is_assignable(&table, &deferred, &structural).yes);
    assert!(!is_assignable(&table, &deferred, &string()).yes);
}

#[test]
fn return_of_sees_through_sums_and_deferred() {
    let table = TypeTable::new();
    let mut notes = Vec::new();
    let plain = function(vec![number()], string());
    assert_eq!(
        return_of(&table, &plain, &mut notes),
        Some(string())
    );

    let id = table.reserve("callback");
    table.set(id, function(vec![], number()));
    assert_eq!(
        return_of(&table, &Type::deferred(id), &mut notes),
        Some(number())
    );

    let mut notes = Vec::new();
    assert_eq!(return_of(&table, &number(), &mut notes), None);
    assert!(!notes.is_empty());
}

#[test]
fn describe_names_deferred_entries() {
    let table = TypeTable::new();
    let id = table.reserve("point");
    table.set(
        id,
        Type::table(
            Vec::new(),
            vec![tlua_compiler::NameType {
                name: "x".to_string(),
                ty: number(),
            }],
        ),
    );
    let rendered = describe(&table, &Type::deferred(id));
    assert_eq!(rendered, "point with point:{x:number}");
}

#[test]
fn describe_handles_recursive_interfaces() {
    let table = TypeTable::new();
    let id = table.reserve("node");
    table.set(
        id,
        Type::table(
            Vec::new(),
            vec![tlua_compiler::NameType {
                name: "next".to_string(),
                ty: Type::deferred(id),
            }],
        ),
    );
    let rendered = describe(&table, &Type::deferred(id));
    assert_eq!(rendered, "node with node:{next:node}");
}

#[test]
fn tuple_first_value_feeds_single_locations() {
    let table = TypeTable::new();
    let tuple = Type::Tuple(TupleType {
        types: vec![string(), number()],
        variadic: false,
    });
    assert!(is_assignable(&table, &string(), &tuple).yes);
    assert!(!is_assignable(&table, &number(), &tuple).yes);

    // Zero values produce nil for a single location and satisfy void.
    let empty = Type::tuple(Vec::new(), false);
    assert!(is_assignable(&table, &nil(), &empty).yes);
    assert!(is_assignable(&table, &Type::Void, &empty).yes);
}

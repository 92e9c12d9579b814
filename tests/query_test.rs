use biframe::{Array, DType, DataFrame, Error, QueryContext, Scalar};

fn sample() -> DataFrame {
    DataFrame::from_pairs(
        vec![
            ("age", Array::from(vec![25i64, 40, 31])),
            ("score", Array::from(vec![80.0, 95.5, 60.0])),
            ("city", Array::from(vec!["oslo", "rome", "oslo"])),
        ],
        true,
    )
    .unwrap()
}

#[test]
fn where_expr_returns_boolean_array() {
    let df = sample();
    let mask = df
        .where_expr("age > 30 && score < 90", &QueryContext::new())
        .unwrap();
    assert_eq!(mask.dtype(), DType::Bool);
    assert_eq!(
        mask.to_scalars(),
        vec![
            Scalar::Bool(false),
            Scalar::Bool(false),
            Scalar::Bool(true)
        ]
    );
}

#[test]
fn where_expr_computes_value_expressions() {
    let df = sample();
    let doubled = df.where_expr("score * 2", &QueryContext::new()).unwrap();
    assert_eq!(doubled.to_f64_vec(), vec![160.0, 191.0, 120.0]);
}

#[test]
fn query_filters_rows() {
    let df = sample();
    let out = df.query("city == 'oslo'", &QueryContext::new()).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out.cell("age", 0).unwrap(), Scalar::I64(25));
    assert_eq!(out.cell("age", 1).unwrap(), Scalar::I64(31));
}

#[test]
fn query_supports_keyword_operators() {
    let df = sample();
    let out = df
        .query("not (city == 'rome') and age >= 31", &QueryContext::new())
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.cell("city", 0).unwrap(), Scalar::Str("oslo".to_string()));
}

#[test]
fn query_reads_external_variables_from_context() {
    let df = sample();
    let mut ctx = QueryContext::new();
    ctx.set_variable("cutoff", 30i64);
    let out = df.query("age > @cutoff", &ctx).unwrap();
    assert_eq!(out.len(), 2);

    // Unknown variables are an error, not a silent lookup elsewhere.
    let err = df.query("age > @missing", &QueryContext::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn backtick_quoted_names_reach_spaced_columns() {
    let df = DataFrame::from_pairs(
        vec![
            ("full name", Array::from(vec!["ann", "bob"])),
            ("age", Array::from(vec![30i64, 20])),
        ],
        true,
    )
    .unwrap();
    let out = df
        .query("`full name` == 'ann'", &QueryContext::new())
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.cell("age", 0).unwrap(), Scalar::I64(30));
}

#[test]
fn query_requires_boolean_condition() {
    let df = sample();
    let err = df.query("age + 1", &QueryContext::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn query_unknown_column_fails() {
    let df = sample();
    let err = df.query("height > 2", &QueryContext::new()).unwrap_err();
    assert!(matches!(err, Error::ColumnNotFound(_)));
}

#[test]
fn where_expr_treats_missing_as_false() {
    let df = DataFrame::from_pairs(
        vec![(
            "v",
            Array::from_scalars(&[Scalar::F64(5.0), Scalar::Null, Scalar::F64(1.0)]).unwrap(),
        )],
        true,
    )
    .unwrap();
    let out = df.query("v > 0", &QueryContext::new()).unwrap();
    // The missing row never matches.
    assert_eq!(out.len(), 2);
}

#[test]
fn malformed_expressions_are_rejected() {
    let df = sample();
    for bad in ["age >", "age = 1", "(age > 1", "age & 1", "1 ** "] {
        assert!(df.query(bad, &QueryContext::new()).is_err(), "{}", bad);
    }
}

#[test]
fn arithmetic_precedence_in_filters() {
    let df = sample();
    // score - 60 * 1 is score - 60, not (score - 60) * 1 misparse.
    let out = df
        .query("score - 60 * 1 > 0", &QueryContext::new())
        .unwrap();
    assert_eq!(out.len(), 2);

    let powers = df.where_expr("2 ** 3 ** 1", &QueryContext::new()).unwrap();
    // Right associative: 2 ** (3 ** 1) = 8 for every row.
    assert_eq!(powers.to_f64_vec(), vec![8.0, 8.0, 8.0]);
}

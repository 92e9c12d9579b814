use std::sync::Arc;

use biframe::{AggFunc, Array, Buffer, DataFrame, Error, Scalar, Tensor};

fn sample() -> DataFrame {
    DataFrame::from_pairs(
        vec![
            ("g", Array::from(vec![1i64, 1, 2])),
            ("v", Array::from(vec![10.0, 20.0, 30.0])),
        ],
        true,
    )
    .unwrap()
}

#[test]
fn sum_and_count_per_group() {
    let df = sample();
    let gb = df.groupby(&["g"]).unwrap();
    let out = gb
        .agg(&[("total", "v", AggFunc::Sum), ("n", "v", AggFunc::Count)])
        .unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out.cell("g", 0).unwrap(), Scalar::I64(1));
    assert_eq!(out.cell("total", 0).unwrap(), Scalar::F64(30.0));
    assert_eq!(out.cell("n", 0).unwrap(), Scalar::I64(2));
    assert_eq!(out.cell("g", 1).unwrap(), Scalar::I64(2));
    assert_eq!(out.cell("total", 1).unwrap(), Scalar::F64(30.0));
    assert_eq!(out.cell("n", 1).unwrap(), Scalar::I64(1));
}

#[test]
fn mean_std_sem_chain() {
    let df = DataFrame::from_pairs(
        vec![
            ("g", Array::from(vec![0i64, 0, 1, 1])),
            ("v", Array::from(vec![2.0, 4.0, 10.0, 10.0])),
        ],
        true,
    )
    .unwrap();
    let gb = df.groupby(&["g"]).unwrap();
    let out = gb
        .agg(&[
            ("mean", "v", AggFunc::Mean),
            ("std", "v", AggFunc::Std),
            ("sem", "v", AggFunc::Sem),
        ])
        .unwrap();

    assert_eq!(out.cell("mean", 0).unwrap(), Scalar::F64(3.0));
    // var([2,4]) with Bessel correction = 2, std = sqrt(2)
    let std0 = out.cell("std", 0).unwrap().to_f64().unwrap();
    assert!((std0 - 2.0f64.sqrt()).abs() < 1e-12);
    let sem0 = out.cell("sem", 0).unwrap().to_f64().unwrap();
    assert!((sem0 - 2.0f64.sqrt() / 2.0f64.sqrt()).abs() < 1e-12);

    assert_eq!(out.cell("mean", 1).unwrap(), Scalar::F64(10.0));
    assert_eq!(out.cell("std", 1).unwrap(), Scalar::F64(0.0));
}

#[test]
fn var_uses_bessel_correction() {
    let df = DataFrame::from_pairs(
        vec![
            ("g", Array::from(vec![0i64, 0])),
            ("v", Array::from(vec![2.0, 4.0])),
        ],
        true,
    )
    .unwrap();
    let out = df
        .groupby(&["g"])
        .unwrap()
        .agg(&[("var", "v", AggFunc::Var)])
        .unwrap();
    // mean 3, squared deviations 1 + 1 = 2, divided by (2 - 1) = 1.
    assert_eq!(out.cell("var", 0).unwrap(), Scalar::F64(2.0));
}

#[test]
fn min_max_with_duplicate_group_indices() {
    let df = DataFrame::from_pairs(
        vec![
            ("g", Array::from(vec![0i64, 1, 0, 1, 0])),
            ("v", Array::from(vec![5.0, 7.0, 1.0, 9.0, 3.0])),
        ],
        true,
    )
    .unwrap();
    let out = df
        .groupby(&["g"])
        .unwrap()
        .agg(&[("lo", "v", AggFunc::Min), ("hi", "v", AggFunc::Max)])
        .unwrap();
    assert_eq!(out.cell("lo", 0).unwrap(), Scalar::F64(1.0));
    assert_eq!(out.cell("hi", 0).unwrap(), Scalar::F64(5.0));
    assert_eq!(out.cell("lo", 1).unwrap(), Scalar::F64(7.0));
    assert_eq!(out.cell("hi", 1).unwrap(), Scalar::F64(9.0));
}

#[test]
fn min_max_on_tensor_columns_restores_determinism_flag() {
    use biframe::backend::tensor::deterministic_scatter_enabled;

    let df = DataFrame::from_pairs(
        vec![
            ("g", Array::from(vec![0i64, 0, 1])),
            (
                "v",
                Array::from_tensor(Tensor::new(Buffer::F64(vec![4.0, 2.0, 8.0])).unwrap()),
            ),
        ],
        true,
    )
    .unwrap();

    assert!(!deterministic_scatter_enabled());
    let out = df
        .groupby(&["g"])
        .unwrap()
        .agg(&[("lo", "v", AggFunc::Min), ("hi", "v", AggFunc::Max)])
        .unwrap();
    // The flag was enabled for the scatter and restored afterwards.
    assert!(!deterministic_scatter_enabled());

    assert!(out.column("lo").unwrap().is_tensor());
    assert_eq!(out.column("lo").unwrap().to_f64_vec(), vec![2.0, 8.0]);
    assert_eq!(out.column("hi").unwrap().to_f64_vec(), vec![4.0, 8.0]);
}

#[test]
fn tensor_group_column_aggregates() {
    let df = DataFrame::from_pairs(
        vec![
            ("g", Array::from(vec![0i64, 1, 0])),
            (
                "v",
                Array::from_tensor(Tensor::new(Buffer::F64(vec![1.0, 2.0, 3.0])).unwrap()),
            ),
        ],
        true,
    )
    .unwrap();
    let out = df
        .groupby(&["g"])
        .unwrap()
        .agg(&[("total", "v", AggFunc::Sum), ("avg", "v", AggFunc::Mean)])
        .unwrap();
    assert_eq!(out.column("total").unwrap().to_f64_vec(), vec![4.0, 2.0]);
    assert_eq!(out.column("avg").unwrap().to_f64_vec(), vec![2.0, 2.0]);
}

#[test]
fn custom_aggregate_runs_per_group() {
    let df = sample();
    let spread = AggFunc::Custom(Arc::new(|values: &Array| {
        let v = values.to_f64_vec();
        let lo = v.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Ok(Scalar::F64(hi - lo))
    }));
    let out = df
        .groupby(&["g"])
        .unwrap()
        .agg(&[("spread", "v", spread)])
        .unwrap();
    assert_eq!(out.cell("spread", 0).unwrap(), Scalar::F64(10.0));
    assert_eq!(out.cell("spread", 1).unwrap(), Scalar::F64(0.0));
}

#[test]
fn groups_order_follows_sort_flag() {
    let df = DataFrame::from_pairs(
        vec![
            ("g", Array::from(vec![2i64, 1, 2, 0])),
            ("v", Array::from(vec![1.0, 2.0, 3.0, 4.0])),
        ],
        true,
    )
    .unwrap();

    let sorted = df.groupby_opts(&["g"], true, true).unwrap();
    assert_eq!(
        sorted.groups().unwrap().column("g").unwrap().to_f64_vec(),
        vec![0.0, 1.0, 2.0]
    );

    let first_seen = df.groupby_opts(&["g"], false, true).unwrap();
    assert_eq!(
        first_seen
            .groups()
            .unwrap()
            .column("g")
            .unwrap()
            .to_f64_vec(),
        vec![2.0, 1.0, 0.0]
    );
}

#[test]
fn dropna_hides_missing_key_groups() {
    let df = DataFrame::from_pairs(
        vec![
            (
                "g",
                Array::from_scalars(&[
                    Scalar::I64(1),
                    Scalar::Null,
                    Scalar::I64(1),
                    Scalar::Null,
                ])
                .unwrap(),
            ),
            ("v", Array::from(vec![1.0, 2.0, 3.0, 4.0])),
        ],
        true,
    )
    .unwrap();

    let gb = df.groupby_opts(&["g"], true, true).unwrap();
    // Two groups internally, one visible.
    assert_eq!(gb.group_count(), 2);
    assert_eq!(gb.groups().unwrap().len(), 1);

    let out = gb.agg(&[("total", "v", AggFunc::Sum)]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.cell("total", 0).unwrap(), Scalar::F64(4.0));

    let keep_na = df.groupby_opts(&["g"], true, false).unwrap();
    let out = keep_na.agg(&[("total", "v", AggFunc::Sum)]).unwrap();
    assert_eq!(out.len(), 2);
}

#[test]
fn iter_yields_key_and_non_key_subtable() {
    let df = DataFrame::from_pairs(
        vec![
            ("g", Array::from(vec![1i64, 2, 1])),
            ("v", Array::from(vec![10.0, 20.0, 30.0])),
        ],
        true,
    )
    .unwrap();
    let gb = df.groupby(&["g"]).unwrap();
    let items: Vec<(Vec<Scalar>, DataFrame)> = gb.iter().collect::<Result<_, _>>().unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].0, vec![Scalar::I64(1)]);
    assert_eq!(items[0].1.column_names(), &["v".to_string()]);
    assert_eq!(items[0].1.column("v").unwrap().to_f64_vec(), vec![10.0, 30.0]);
    assert_eq!(items[1].0, vec![Scalar::I64(2)]);
    assert_eq!(items[1].1.column("v").unwrap().to_f64_vec(), vec![20.0]);
}

#[test]
fn iter_skips_missing_key_groups_when_dropna() {
    let df = DataFrame::from_pairs(
        vec![
            (
                "g",
                Array::from_scalars(&[Scalar::I64(1), Scalar::Null, Scalar::I64(1)]).unwrap(),
            ),
            ("v", Array::from(vec![1.0, 2.0, 3.0])),
        ],
        true,
    )
    .unwrap();
    let gb = df.groupby_opts(&["g"], true, true).unwrap();
    let items: Vec<_> = gb.iter().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].0, vec![Scalar::I64(1)]);
}

#[test]
fn multi_key_grouping() {
    let df = DataFrame::from_pairs(
        vec![
            ("a", Array::from(vec![1i64, 1, 2, 1])),
            ("b", Array::from(vec!["x", "y", "x", "x"])),
            ("v", Array::from(vec![1.0, 2.0, 3.0, 4.0])),
        ],
        true,
    )
    .unwrap();
    let out = df
        .groupby(&["a", "b"])
        .unwrap()
        .agg(&[("total", "v", AggFunc::Sum)])
        .unwrap();
    assert_eq!(out.len(), 3);
    // Group (1, "x") sums rows 0 and 3.
    assert_eq!(out.cell("a", 0).unwrap(), Scalar::I64(1));
    assert_eq!(out.cell("b", 0).unwrap(), Scalar::Str("x".to_string()));
    assert_eq!(out.cell("total", 0).unwrap(), Scalar::F64(5.0));
}

#[test]
fn groupby_without_keys_is_rejected() {
    let df = sample();
    assert!(matches!(
        df.groupby(&[]),
        Err(Error::InvalidInput(_))
    ));
}

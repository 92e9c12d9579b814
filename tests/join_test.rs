use biframe::{Array, DataFrame, Error, JoinHow, MergeOptions, Scalar};

fn left() -> DataFrame {
    DataFrame::from_pairs(
        vec![
            ("key", Array::from(vec![1i64, 1, 2, 3])),
            ("lval", Array::from(vec![10.0, 11.0, 20.0, 30.0])),
        ],
        true,
    )
    .unwrap()
}

fn right() -> DataFrame {
    DataFrame::from_pairs(
        vec![
            ("key", Array::from(vec![1i64, 2, 2])),
            ("rval", Array::from(vec![100.0, 200.0, 201.0])),
        ],
        true,
    )
    .unwrap()
}

#[test]
fn inner_merge_expands_duplicate_keys() {
    // key=1: two left rows x one right row -> 2 rows
    // key=2: one left row x two right rows -> 2 rows
    // key=3: no match -> 0 rows
    let merged = left().merge(&right(), &MergeOptions::on(&["key"])).unwrap();
    assert_eq!(merged.len(), 4);
    assert_eq!(
        merged.column_names(),
        &["key".to_string(), "lval".to_string(), "rval".to_string()]
    );

    assert_eq!(merged.column("key").unwrap().to_f64_vec(), vec![1.0, 1.0, 2.0, 2.0]);
    assert_eq!(
        merged.column("lval").unwrap().to_f64_vec(),
        vec![10.0, 11.0, 20.0, 20.0]
    );
    // Right-side duplicates for one left row are contiguous.
    assert_eq!(
        merged.column("rval").unwrap().to_f64_vec(),
        vec![100.0, 100.0, 200.0, 201.0]
    );
}

#[test]
fn merge_defaults_to_shared_columns() {
    let merged = left().merge(&right(), &MergeOptions::default()).unwrap();
    assert_eq!(merged.len(), 4);
    assert!(merged.contains_column("key"));
}

#[test]
fn merge_with_distinct_key_names() {
    let l = left().rename(&[("key", "lkey")]).unwrap();
    let r = right().rename(&[("key", "rkey")]).unwrap();
    let merged = l
        .merge(
            &r,
            &MergeOptions {
                left_on: Some(vec!["lkey".to_string()]),
                right_on: Some(vec!["rkey".to_string()]),
                ..MergeOptions::default()
            },
        )
        .unwrap();
    assert_eq!(merged.len(), 4);
    // Differently named keys both survive.
    assert!(merged.contains_column("lkey"));
    assert!(merged.contains_column("rkey"));
}

#[test]
fn merge_multi_key() {
    let l = DataFrame::from_pairs(
        vec![
            ("k1", Array::from(vec![1i64, 1, 2])),
            ("k2", Array::from(vec!["a", "b", "a"])),
            ("v", Array::from(vec![1.0, 2.0, 3.0])),
        ],
        true,
    )
    .unwrap();
    let r = DataFrame::from_pairs(
        vec![
            ("k1", Array::from(vec![1i64, 2])),
            ("k2", Array::from(vec!["b", "a"])),
            ("w", Array::from(vec![10.0, 20.0])),
        ],
        true,
    )
    .unwrap();
    let merged = l.merge(&r, &MergeOptions::on(&["k1", "k2"])).unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.column("v").unwrap().to_f64_vec(), vec![2.0, 3.0]);
    assert_eq!(merged.column("w").unwrap().to_f64_vec(), vec![10.0, 20.0]);
}

#[test]
fn merge_suffixes_colliding_columns() {
    let l = DataFrame::from_pairs(
        vec![
            ("key", Array::from(vec![1i64, 2])),
            ("val", Array::from(vec![1.0, 2.0])),
        ],
        true,
    )
    .unwrap();
    let r = DataFrame::from_pairs(
        vec![
            ("key", Array::from(vec![1i64, 2])),
            ("val", Array::from(vec![10.0, 20.0])),
        ],
        true,
    )
    .unwrap();
    let merged = l.merge(&r, &MergeOptions::on(&["key"])).unwrap();
    assert_eq!(
        merged.column_names(),
        &["key".to_string(), "val_x".to_string(), "val_y".to_string()]
    );
    assert_eq!(merged.column("val_x").unwrap().to_f64_vec(), vec![1.0, 2.0]);
    assert_eq!(merged.column("val_y").unwrap().to_f64_vec(), vec![10.0, 20.0]);
}

#[test]
fn merge_on_string_keys() {
    let l = DataFrame::from_pairs(
        vec![
            ("name", Array::from(vec!["ann", "bob", "cid"])),
            ("age", Array::from(vec![30i64, 40, 50])),
        ],
        true,
    )
    .unwrap();
    let r = DataFrame::from_pairs(
        vec![
            ("name", Array::from(vec!["cid", "ann"])),
            ("city", Array::from(vec!["rome", "oslo"])),
        ],
        true,
    )
    .unwrap();
    let merged = l.merge(&r, &MergeOptions::on(&["name"])).unwrap();
    assert_eq!(merged.len(), 2);
    let names: Vec<Scalar> = merged.column("name").unwrap().to_scalars();
    assert!(names.contains(&Scalar::Str("ann".to_string())));
    assert!(names.contains(&Scalar::Str("cid".to_string())));
    assert!(!names.contains(&Scalar::Str("bob".to_string())));
}

#[test]
fn non_inner_joins_are_not_implemented() {
    for how in [JoinHow::Left, JoinHow::Right, JoinHow::Outer] {
        let err = left()
            .merge(
                &right(),
                &MergeOptions {
                    how,
                    ..MergeOptions::on(&["key"])
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }
}

#[test]
fn merge_key_option_conflicts_are_rejected() {
    let err = left()
        .merge(
            &right(),
            &MergeOptions {
                on: Some(vec!["key".to_string()]),
                left_on: Some(vec!["key".to_string()]),
                ..MergeOptions::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = left()
        .merge(
            &right(),
            &MergeOptions {
                left_on: Some(vec!["key".to_string()]),
                ..MergeOptions::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn merge_without_common_columns_fails() {
    let l = DataFrame::from_pairs(vec![("a", Array::from(vec![1.0]))], true).unwrap();
    let r = DataFrame::from_pairs(vec![("b", Array::from(vec![1.0]))], true).unwrap();
    let err = l.merge(&r, &MergeOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn merge_with_no_matches_is_empty() {
    let l = DataFrame::from_pairs(
        vec![
            ("key", Array::from(vec![1i64, 2])),
            ("v", Array::from(vec![1.0, 2.0])),
        ],
        true,
    )
    .unwrap();
    let r = DataFrame::from_pairs(
        vec![
            ("key", Array::from(vec![7i64, 8])),
            ("w", Array::from(vec![1.0, 2.0])),
        ],
        true,
    )
    .unwrap();
    let merged = l.merge(&r, &MergeOptions::on(&["key"])).unwrap();
    assert_eq!(merged.len(), 0);
    assert_eq!(merged.column_count(), 3);
}

use biframe::{
    concat_arrays, Array, Backend, Buffer, DType, DenseArray, Device, Error, Idx, Scalar, Tensor,
};

#[test]
fn array_from_vec_has_dense_backend() {
    let a = Array::from(vec![1.0, 2.0, 3.0]);
    assert_eq!(a.backend(), Backend::Dense);
    assert_eq!(a.dtype(), DType::Float64);
    assert_eq!(a.device(), Device::Cpu);
    assert_eq!(a.len(), 3);
    assert!(a.writeable());
}

#[test]
fn array_from_scalars_masks_nulls() {
    let a = Array::from_scalars(&[Scalar::F64(1.0), Scalar::Null, Scalar::F64(3.0)]).unwrap();
    assert!(a.has_mask());
    assert_eq!(a.get_scalar(1).unwrap(), Scalar::Null);
    assert_eq!(a.get_scalar(2).unwrap(), Scalar::F64(3.0));

    let na = a.isna();
    assert_eq!(na.to_scalars()[1], Scalar::Bool(true));
    assert_eq!(na.to_scalars()[0], Scalar::Bool(false));
}

#[test]
fn array_from_mixed_scalars_is_rejected() {
    let result = Array::from_scalars(&[Scalar::F64(1.0), Scalar::Str("x".to_string())]);
    assert!(result.is_err());
}

#[test]
fn arithmetic_promotes_int_to_float() {
    let a = Array::from(vec![1i64, 2, 3]);
    let b = Array::from(vec![0.5, 0.5, 0.5]);
    let c = a.add(&b).unwrap();
    assert_eq!(c.dtype(), DType::Float64);
    assert_eq!(c.to_f64_vec(), vec![1.5, 2.5, 3.5]);

    // True division is always float, even int / int.
    let d = a.div(&Array::from(vec![2i64, 2, 2])).unwrap();
    assert_eq!(d.dtype(), DType::Float64);
    assert_eq!(d.to_f64_vec(), vec![0.5, 1.0, 1.5]);
}

#[test]
fn arithmetic_broadcasts_length_one() {
    let a = Array::from(vec![1.0, 2.0, 3.0]);
    let one = Array::from(vec![10.0]);
    let c = a.add(&one).unwrap();
    assert_eq!(c.to_f64_vec(), vec![11.0, 12.0, 13.0]);

    // Reflected form: other - self.
    let d = a.rsub(&one).unwrap();
    assert_eq!(d.to_f64_vec(), vec![9.0, 8.0, 7.0]);
}

#[test]
fn arithmetic_propagates_masks() {
    let a = Array::from_scalars(&[Scalar::F64(1.0), Scalar::Null]).unwrap();
    let b = Array::from(vec![1.0, 1.0]);
    let c = a.add(&b).unwrap();
    assert_eq!(c.get_scalar(0).unwrap(), Scalar::F64(2.0));
    assert_eq!(c.get_scalar(1).unwrap(), Scalar::Null);
}

#[test]
fn scalar_ops_work_on_both_backends() {
    let dense = Array::from(vec![2.0, 3.0]);
    assert_eq!(dense.pow_scalar(2.0).unwrap().to_f64_vec(), vec![4.0, 9.0]);

    let tensor = Array::from_tensor(Tensor::new(Buffer::F64(vec![2.0, 3.0])).unwrap());
    let out = tensor.mul_scalar(2.0).unwrap();
    assert!(out.is_tensor());
    assert_eq!(out.to_f64_vec(), vec![4.0, 6.0]);
}

#[test]
fn broadcast_views_are_never_writeable() {
    let dense = Array::from(vec![5.0]);
    let b = dense.broadcast_to(4).unwrap();
    assert_eq!(b.len(), 4);
    assert!(!b.writeable());

    let tensor = Array::from_tensor(Tensor::new(Buffer::F64(vec![5.0])).unwrap());
    let bt = tensor.broadcast_to(4).unwrap();
    assert!(!bt.writeable());
    assert_eq!(bt.to_f64_vec(), vec![5.0; 4]);
}

#[test]
fn set_through_non_writeable_view_fails() {
    let a = Array::from(vec![1.0]);
    let mut b = a.broadcast_to(3).unwrap();
    let err = b.set_scalar(0, &Scalar::F64(9.0)).unwrap_err();
    assert!(matches!(err, Error::NotWriteable(_)));

    // A copy is writeable again and detached from the original.
    let mut c = b.copy();
    c.set_scalar(0, &Scalar::F64(9.0)).unwrap();
    assert_eq!(c.get_scalar(0).unwrap(), Scalar::F64(9.0));
    assert_eq!(a.get_scalar(0).unwrap(), Scalar::F64(1.0));
}

#[test]
fn range_views_share_storage_and_writes_are_visible() {
    let a = Array::from(vec![1.0, 2.0, 3.0, 4.0]);
    let mut view = a.get(&Idx::Range(1, 3)).unwrap();
    assert!(view.shares_storage(&a));
    assert!(view.writeable());

    view.set_scalar(0, &Scalar::F64(20.0)).unwrap();
    assert_eq!(a.get_scalar(1).unwrap(), Scalar::F64(20.0));
}

#[test]
fn mask_and_take_selections_copy() {
    let a = Array::from(vec![1.0, 2.0, 3.0]);
    let mask = Array::from(vec![true, false, true]);
    let picked = a.get(&Idx::Mask(&mask)).unwrap();
    assert_eq!(picked.to_f64_vec(), vec![1.0, 3.0]);
    assert!(!picked.shares_storage(&a));
    assert!(picked.writeable());

    let idx = Array::from(vec![2i64, 0, -1]);
    let taken = a.get(&Idx::Take(&idx)).unwrap();
    assert_eq!(taken.to_f64_vec(), vec![3.0, 1.0, 3.0]);
}

#[test]
fn astype_round_trips_through_like() {
    let a = Array::from(vec![1i64, 2, 3]);
    let as_float = a.astype(DType::Float64).unwrap();
    assert_eq!(as_float.dtype(), DType::Float64);

    let back = as_float.like(&a, true, true).unwrap();
    assert_eq!(back.dtype(), a.dtype());
    assert_eq!(back.backend(), a.backend());
}

#[test]
fn astype_same_dtype_is_zero_copy() {
    let a = Array::from(vec![1.0, 2.0]);
    let same = a.astype(DType::Float64).unwrap();
    assert!(same.shares_storage(&a));

    let converted = a.astype(DType::Int64).unwrap();
    assert!(!converted.shares_storage(&a));
}

#[test]
fn tensor_bridge_is_zero_copy_both_ways() {
    let dense = Array::from(vec![1.0, 2.0, 3.0]);
    let tensor = dense.as_tensor().unwrap();
    assert!(tensor.is_tensor());
    assert!(tensor.shares_storage(&dense));
    assert!(tensor.writeable());

    // Writes through the bridge are visible on the other side.
    let mut t = tensor.clone();
    t.set_scalar(0, &Scalar::F64(10.0)).unwrap();
    assert_eq!(dense.get_scalar(0).unwrap(), Scalar::F64(10.0));

    let back = tensor.as_dense().unwrap();
    assert!(!back.is_tensor());
    assert!(back.shares_storage(&dense));
}

#[test]
fn str_arrays_have_no_tensor_form() {
    let s = Array::from(vec!["a", "b"]);
    assert!(s.as_tensor().is_err());
}

#[test]
fn device_transfer_copies_and_same_device_shares() {
    let t = Array::from_tensor(Tensor::new(Buffer::F64(vec![1.0, 2.0])).unwrap());
    let same = t.to(Device::Cpu);
    assert!(same.shares_storage(&t));

    let moved = t.to(Device::Cuda(0));
    assert_eq!(moved.device(), Device::Cuda(0));
    assert!(!moved.shares_storage(&t));
    assert!(moved.writeable());
}

#[test]
fn like_tensor_to_dense_requires_device_move() {
    let gpu = Array::from_tensor(
        Tensor::on_device(Buffer::F64(vec![1.0, 2.0]), Device::Cuda(0)).unwrap(),
    );
    let dense_template = Array::from(vec![0.0, 0.0]);

    // Incoherent request: dense result without permission to change device.
    assert!(gpu.like(&dense_template, true, false).is_err());

    let ok = gpu.like(&dense_template, true, true).unwrap();
    assert_eq!(ok.backend(), Backend::Dense);
    assert_eq!(ok.device(), Device::Cpu);
}

#[test]
fn detach_is_noop_for_dense_and_clears_grad_for_tensor() {
    let dense = Array::from(vec![1.0]);
    assert!(!dense.detach().requires_grad());

    let t = Tensor::new(Buffer::F64(vec![1.0, 2.0]))
        .unwrap()
        .with_requires_grad(true)
        .unwrap();
    let arr = Array::from_tensor(t);
    assert!(arr.requires_grad());
    let detached = arr.detach();
    assert!(!detached.requires_grad());
    assert!(detached.shares_storage(&arr));
}

#[test]
fn empty_masked_tensor_is_not_implemented() {
    let err =
        Array::empty(3, true, Backend::Tensor, DType::Float64, Device::Cpu).unwrap_err();
    assert!(matches!(err, Error::NotImplemented(_)));
}

#[test]
fn empty_masked_dense_is_fully_missing() {
    let a = Array::empty(3, true, Backend::Dense, DType::Float64, Device::Cpu).unwrap();
    assert!(a.has_mask());
    for i in 0..3 {
        assert!(a.get_scalar(i).unwrap().is_null());
    }
}

#[test]
fn empty_dense_rejects_non_cpu_device() {
    let err =
        Array::empty(3, false, Backend::Dense, DType::Float64, Device::Cuda(0)).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn unique_returns_sorted_values_inverse_and_counts() {
    let a = Array::from(vec![3i64, 1, 3, 2, 1]);
    let (values, inverse, counts) = a.unique().unwrap();
    assert_eq!(values.to_f64_vec(), vec![1.0, 2.0, 3.0]);
    assert_eq!(inverse.to_f64_vec(), vec![2.0, 0.0, 2.0, 1.0, 0.0]);
    assert_eq!(counts.to_f64_vec(), vec![2.0, 1.0, 2.0]);
}

#[test]
fn bincount_counts_and_weighted_sums() {
    let ids = Array::from(vec![0i64, 1, 1, 2]);
    let counts = ids.bincount(None).unwrap();
    assert_eq!(counts.to_f64_vec(), vec![1.0, 2.0, 1.0]);

    let weights = Array::from(vec![10.0, 1.0, 2.0, 5.0]);
    let sums = ids.bincount(Some(&weights)).unwrap();
    assert_eq!(sums.to_f64_vec(), vec![10.0, 3.0, 5.0]);
}

#[test]
fn tensor_bincount_keeps_gradient_tracking() {
    let ids = Array::from_tensor(Tensor::new(Buffer::I64(vec![0, 0, 1])).unwrap());
    let weights = Array::from_tensor(
        Tensor::new(Buffer::F64(vec![1.0, 2.0, 3.0]))
            .unwrap()
            .with_requires_grad(true)
            .unwrap(),
    );
    let sums = ids.bincount(Some(&weights)).unwrap();
    assert!(sums.requires_grad());
    assert_eq!(sums.to_f64_vec(), vec![3.0, 3.0]);

    let counts = ids.bincount(None).unwrap();
    assert!(!counts.requires_grad());
}

#[test]
fn argsort_descending_reverses_ascending_on_dense() {
    let a = Array::from(vec![2.0, 1.0, 3.0]);
    assert_eq!(a.argsort(false).to_f64_vec(), vec![1.0, 0.0, 2.0]);
    assert_eq!(a.argsort(true).to_f64_vec(), vec![2.0, 0.0, 1.0]);
}

#[test]
fn concat_requires_matching_backends() {
    let dense = Array::from(vec![1.0, 2.0]);
    let tensor = Array::from_tensor(Tensor::new(Buffer::F64(vec![3.0])).unwrap());
    let err = concat_arrays(&[&dense, &tensor]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let other = Array::from(vec![3.0]);
    let joined = concat_arrays(&[&dense, &other]).unwrap();
    assert_eq!(joined.to_f64_vec(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn concat_preserves_masks() {
    let a = Array::from_scalars(&[Scalar::F64(1.0), Scalar::Null]).unwrap();
    let b = Array::from(vec![3.0]);
    let joined = concat_arrays(&[&a, &b]).unwrap();
    assert_eq!(joined.len(), 3);
    assert!(joined.get_scalar(1).unwrap().is_null());
    assert_eq!(joined.get_scalar(2).unwrap(), Scalar::F64(3.0));
}

#[test]
fn take_index_on_other_device_is_moved_first() {
    let t = Array::from_tensor(
        Tensor::on_device(Buffer::F64(vec![1.0, 2.0, 3.0]), Device::Cuda(0)).unwrap(),
    );
    let idx = Array::from_tensor(Tensor::new(Buffer::I64(vec![2, 0])).unwrap());
    assert_eq!(idx.device(), Device::Cpu);
    let picked = t.get(&Idx::Take(&idx)).unwrap();
    assert_eq!(picked.device(), Device::Cuda(0));
    assert_eq!(picked.to_f64_vec(), vec![3.0, 1.0]);
}

#[test]
fn masked_array_broadcast_carries_mask() {
    let a = DenseArray::with_mask(Buffer::F64(vec![1.0]), vec![true]).unwrap();
    let arr = Array::from_dense(a);
    let b = arr.broadcast_to(3).unwrap();
    for i in 0..3 {
        assert!(b.get_scalar(i).unwrap().is_null());
    }
}

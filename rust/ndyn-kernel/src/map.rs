//! `elwise_map`: apply a user callable elementwise over one or more arrays.

use std::sync::Arc;

use log::debug;
use ndyn_common::{Result, error::Error};
use ndyn_array::{Array, ArrayHandle};
use ndyn_types::DataType;
use ndyn_types::data_type::{make_strided_dim, make_var_dim};
use ndyn_types::shape::{VAR_DIM_SIZE, broadcast_shapes};

use crate::generator::{ExprKernelGenerator, UserCallableGenerator};
use crate::kernel::{KernelChain, KernelRequest};
use crate::user_call::UserCallable;

/// Wraps `dst_dt` in one dimension per entry of `shape`, outermost first:
/// variable-length where the broadcast size is variable, strided otherwise.
pub fn result_type(dst_dt: &DataType, shape: &[i64]) -> DataType {
    let mut tp = dst_dt.clone();
    for &dim_size in shape.iter().rev() {
        tp = if dim_size == VAR_DIM_SIZE {
            make_var_dim(tp)
        } else {
            make_strided_dim(tp)
        };
    }
    tp
}

/// Applies `callable` independently to each element of the broadcast of
/// `operands`, producing a new array of `dst_dt` elements.
///
/// The callable is invoked with `N + 1` array handles (destination first),
/// must return no value, and must not retain a reference to any argument;
/// violations surface as postcondition errors.
pub fn elwise_map(
    operands: &[ArrayHandle],
    callable: Arc<UserCallable>,
    name: Option<&str>,
    dst_dt: DataType,
) -> Result<ArrayHandle> {
    if operands.is_empty() {
        return Err(Error::invalid_arg(
            "operands",
            "elwise_map requires at least one operand",
        ));
    }

    let src_dts: Vec<DataType> = operands
        .iter()
        .map(|h| h.with(|a| a.dtype().dtype().clone()))
        .collect();
    let operand_dts: Vec<DataType> = operands.iter().map(|h| h.with(|a| a.dtype().clone())).collect();
    let shapes: Vec<Vec<i64>> = operands.iter().map(|h| h.with(|a| a.shape())).collect();
    let shape_refs: Vec<&[i64]> = shapes.iter().map(Vec::as_slice).collect();
    let shape = broadcast_shapes(&shape_refs)?;
    if shape.contains(&VAR_DIM_SIZE) {
        return Err(Error::not_implemented(
            "evaluating elwise_map over variable-length dimensions",
        ));
    }

    let result_tp = result_type(&dst_dt, &shape);
    let result = Array::empty_shaped(result_tp, &shape)?;

    let generator = UserCallableGenerator::new(
        callable,
        name.map(str::to_string),
        dst_dt,
        src_dts,
    );
    debug!(
        "elwise_map {} over result shape {:?}",
        generator.expression_name(),
        shape
    );

    let src_metas: Vec<Vec<u8>> = operands
        .iter()
        .map(|h| h.with(|a| a.arrmeta().to_vec()))
        .collect();
    let src_meta_refs: Vec<&[u8]> = src_metas.iter().map(Vec::as_slice).collect();

    let mut chain = KernelChain::new();
    generator.make_expr_kernel(
        &mut chain,
        result.dtype(),
        result.arrmeta(),
        &operand_dts,
        &src_meta_refs,
        KernelRequest::Single,
    )?;

    let src_ptrs: Vec<*const u8> = operands.iter().map(|h| h.with(|a| a.data_ptr())).collect();
    let dst_ptr = result.data_mut_ptr();
    if operands.len() == 1 {
        chain.call_single_unary(dst_ptr, src_ptrs[0])?;
    } else {
        chain.call_single(dst_ptr, &src_ptrs)?;
    }

    Ok(ArrayHandle::new(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndyn_types::TypeId;
    use ndyn_types::data_type::make_scalar;

    fn int32() -> DataType {
        make_scalar(TypeId::Int32).unwrap()
    }

    fn handle_from(values: &[i32]) -> ArrayHandle {
        let tp = make_strided_dim(int32());
        let arr = Array::empty_shaped(tp, &[values.len() as i64]).unwrap();
        for (i, &v) in values.iter().enumerate() {
            arr.set_pod(i as i64, v).unwrap();
        }
        ArrayHandle::new(arr)
    }

    fn rows_handle(rows: &[[i32; 3]]) -> ArrayHandle {
        let tp = make_strided_dim(make_strided_dim(int32()));
        let arr = Array::empty_shaped(tp, &[rows.len() as i64, 3]).unwrap();
        for (i, row) in rows.iter().enumerate() {
            arr.set_pod(i as i64, *row).unwrap();
        }
        ArrayHandle::new(arr)
    }

    fn scalar_handle(value: i32) -> ArrayHandle {
        let arr = Array::empty(int32()).unwrap();
        arr.set_pod(0, value).unwrap();
        ArrayHandle::new(arr)
    }

    fn doubling() -> Arc<UserCallable> {
        Arc::new(|args: &[ArrayHandle]| {
            let n = args[1].with(|a| a.shape()[0]);
            for i in 0..n {
                let v: i32 = args[1].with(|a| a.get_pod(i).unwrap());
                args[0].with(|a| a.set_pod(i, v * 2).unwrap());
            }
            None
        })
    }

    fn adding() -> Arc<UserCallable> {
        Arc::new(|args: &[ArrayHandle]| {
            let n = args[0].with(|a| a.shape()[0]);
            for i in 0..n {
                let x: i32 = args[1].with(|a| a.get_pod(i).unwrap());
                let y: i32 = args[2].with(|a| a.get_pod(i).unwrap());
                args[0].with(|a| a.set_pod(i, x + y).unwrap());
            }
            None
        })
    }

    #[test]
    fn unary_map_doubles() {
        let src = handle_from(&[1, 2, 3]);
        let out = elwise_map(&[src], doubling(), Some("double"), int32()).unwrap();
        assert_eq!(out.with(|a| a.shape()), vec![3]);
        for (i, expected) in [2, 4, 6].into_iter().enumerate() {
            assert_eq!(out.with(|a| a.get_pod::<i32>(i as i64).unwrap()), expected);
        }
    }

    #[test]
    fn binary_map_broadcasts_scalar() {
        let a = handle_from(&[1, 2, 3]);
        let b = scalar_handle(10);
        let out = elwise_map(&[a, b], adding(), Some("add"), int32()).unwrap();
        assert_eq!(out.with(|a| a.shape()), vec![3]);
        for (i, expected) in [11, 12, 13].into_iter().enumerate() {
            assert_eq!(out.with(|a| a.get_pod::<i32>(i as i64).unwrap()), expected);
        }
    }

    #[test]
    fn binary_map_broadcasts_size_one() {
        let a = handle_from(&[1, 2, 3]);
        let b = handle_from(&[100]);
        let out = elwise_map(&[a, b], adding(), None, int32()).unwrap();
        for (i, expected) in [101, 102, 103].into_iter().enumerate() {
            assert_eq!(out.with(|a| a.get_pod::<i32>(i as i64).unwrap()), expected);
        }
    }

    #[test]
    fn rank_two_map_broadcasts_single_row() {
        // A second leading dimension routes through the strided entries of
        // the dimension-peeling nodes; the (1,3) operand repeats per row.
        let a = rows_handle(&[[1, 2, 3], [10, 20, 30]]);
        let b = rows_handle(&[[100, 200, 300]]);
        let out = elwise_map(&[a, b], adding(), Some("add"), int32()).unwrap();
        assert_eq!(out.with(|x| x.shape()), vec![2, 3]);
        assert_eq!(
            out.with(|x| x.get_pod::<[i32; 3]>(0).unwrap()),
            [101, 202, 303]
        );
        assert_eq!(
            out.with(|x| x.get_pod::<[i32; 3]>(1).unwrap()),
            [110, 220, 330]
        );
    }

    #[test]
    fn rank_two_unary_map_doubles() {
        let src = rows_handle(&[[1, 2, 3], [4, 5, 6]]);
        let out = elwise_map(&[src], doubling(), None, int32()).unwrap();
        assert_eq!(out.with(|x| x.shape()), vec![2, 3]);
        assert_eq!(out.with(|x| x.get_pod::<[i32; 3]>(0).unwrap()), [2, 4, 6]);
        assert_eq!(out.with(|x| x.get_pod::<[i32; 3]>(1).unwrap()), [8, 10, 12]);
    }

    #[test]
    fn well_behaved_callable_runs_repeatedly() {
        let src = handle_from(&[5, 6]);
        let callable = doubling();
        for _ in 0..3 {
            let out = elwise_map(
                std::slice::from_ref(&src),
                callable.clone(),
                None,
                int32(),
            )
            .unwrap();
            assert_eq!(out.with(|a| a.get_pod::<i32>(0).unwrap()), 10);
            assert_eq!(out.use_count(), 1);
        }
        assert_eq!(src.use_count(), 1);
    }

    #[test]
    fn retained_handle_fails_postcondition() {
        use std::cell::RefCell;
        let stash: std::rc::Rc<RefCell<Vec<ArrayHandle>>> =
            std::rc::Rc::new(RefCell::new(Vec::new()));
        let stash_in = stash.clone();
        let callable: Arc<UserCallable> = Arc::new(move |args: &[ArrayHandle]| {
            stash_in.borrow_mut().push(args[0].clone());
            None
        });
        let src = handle_from(&[1, 2, 3]);
        let err = elwise_map(&[src], callable, None, int32()).unwrap_err();
        assert!(matches!(
            err.kind(),
            ndyn_common::error::ErrorKind::Postcondition { .. }
        ));
    }

    #[test]
    fn result_type_uses_var_dims() {
        let tp = result_type(&int32(), &[4]);
        assert_eq!(tp.id(), TypeId::StridedDim);

        let tp = result_type(&int32(), &[VAR_DIM_SIZE]);
        assert_eq!(tp.id(), TypeId::VarDim);

        let tp = result_type(&int32(), &[2, VAR_DIM_SIZE]);
        assert_eq!(tp.id(), TypeId::StridedDim);
        assert_eq!(tp.element_type().unwrap().id(), TypeId::VarDim);
    }

    #[test]
    fn var_length_broadcast_produces_var_result_dimension() {
        let shapes: Vec<&[i64]> = vec![&[4], &[VAR_DIM_SIZE]];
        let combined = broadcast_shapes(&shapes).unwrap();
        assert_eq!(combined, vec![VAR_DIM_SIZE]);
        assert_eq!(result_type(&int32(), &combined).id(), TypeId::VarDim);
    }
}

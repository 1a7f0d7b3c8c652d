//! The dimension-peeling kernel node.
//!
//! When the concrete call-site types carry more leading dimensions than a
//! generator's declared signature, one of these nodes is inserted per extra
//! dimension. It iterates over the destination dimension, broadcasting any
//! size-1 source dimension with a zero stride, and invokes its child (built
//! by recursing into the generator) through the strided entries.

use log::trace;
use ndyn_common::{Result, error::Error};
use ndyn_types::{DataType, TypeId};
use ndyn_types::arrmeta::{self, DIM_ARRMETA_SIZE};

use crate::generator::ExprKernelGenerator;
use crate::kernel::{self, KernelChain, KernelNode, KernelRequest};

pub struct ElwiseDimKernel {
    dim_size: i64,
    dst_stride: i64,
    src_strides: Vec<i64>,
}

impl ElwiseDimKernel {
    pub fn single(&self, dst: *mut u8, src: &[*const u8], rest: &mut [KernelNode]) -> Result<()> {
        kernel::call_strided_at(
            rest,
            dst,
            self.dst_stride,
            src,
            &self.src_strides,
            self.dim_size as usize,
        )
    }

    pub fn single_unary(
        &self,
        dst: *mut u8,
        src: *const u8,
        rest: &mut [KernelNode],
    ) -> Result<()> {
        kernel::call_strided_unary_at(
            rest,
            dst,
            self.dst_stride,
            src,
            self.src_strides[0],
            self.dim_size as usize,
        )
    }

    pub fn strided(
        &self,
        dst: *mut u8,
        dst_stride: i64,
        src: &[*const u8],
        src_stride: &[i64],
        count: usize,
        rest: &mut [KernelNode],
    ) -> Result<()> {
        let mut shifted: Vec<*const u8> = vec![std::ptr::null(); src.len()];
        for i in 0..count {
            let d = unsafe { dst.offset((i as i64 * dst_stride) as isize) };
            for (j, &p) in src.iter().enumerate() {
                shifted[j] = unsafe { p.offset((i as i64 * src_stride[j]) as isize) };
            }
            kernel::call_strided_at(
                rest,
                d,
                self.dst_stride,
                &shifted,
                &self.src_strides,
                self.dim_size as usize,
            )?;
        }
        Ok(())
    }

    pub fn strided_unary(
        &self,
        dst: *mut u8,
        dst_stride: i64,
        src: *const u8,
        src_stride: i64,
        count: usize,
        rest: &mut [KernelNode],
    ) -> Result<()> {
        for i in 0..count {
            let d = unsafe { dst.offset((i as i64 * dst_stride) as isize) };
            let s = unsafe { src.offset((i as i64 * src_stride) as isize) };
            kernel::call_strided_unary_at(
                rest,
                d,
                self.dst_stride,
                s,
                self.src_strides[0],
                self.dim_size as usize,
            )?;
        }
        Ok(())
    }
}

/// Peels one destination dimension and recurses into `generator` for the
/// element types. Sources whose rank is below the destination's are
/// broadcast whole (stride 0); sources at the same rank have their leading
/// dimension peeled, with a size-1 dimension broadcast via a zero stride.
pub fn make_elwise_dimension_kernel(
    chain: &mut KernelChain,
    dst_dt: &DataType,
    dst_arrmeta: &[u8],
    src_dts: &[DataType],
    src_arrmetas: &[&[u8]],
    _request: KernelRequest,
    generator: &dyn ExprKernelGenerator,
) -> Result<()> {
    match dst_dt.id() {
        TypeId::StridedDim | TypeId::FixedDim => {}
        TypeId::VarDim => {
            return Err(Error::not_implemented(
                "executing kernels over variable-length dimensions",
            ));
        }
        _ => {
            return Err(Error::type_error(format!(
                "destination type {dst_dt} does not match the elwise signature and has \
                 no leading dimension to broadcast over"
            )));
        }
    }

    let dst_rec = arrmeta::dim_arrmeta(dst_arrmeta);
    let dst_element = dst_dt.element_type().expect("dimension element").clone();
    let inner_dst_arrmeta = &dst_arrmeta[DIM_ARRMETA_SIZE..];

    let dst_ndim = dst_dt.ndim();
    let mut src_strides = Vec::with_capacity(src_dts.len());
    let mut inner_src_dts = Vec::with_capacity(src_dts.len());
    let mut inner_src_arrmetas: Vec<&[u8]> = Vec::with_capacity(src_dts.len());
    for (i, src_dt) in src_dts.iter().enumerate() {
        let ndim = src_dt.ndim();
        if ndim > dst_ndim {
            return Err(Error::type_error(format!(
                "source operand {i} of type {src_dt} has more dimensions than the \
                 destination {dst_dt}"
            )));
        }
        if ndim == dst_ndim && ndim > 0 {
            let rec = arrmeta::dim_arrmeta(src_arrmetas[i]);
            if rec.dim_size == dst_rec.dim_size {
                src_strides.push(rec.stride);
            } else if rec.dim_size == 1 {
                src_strides.push(0);
            } else {
                return Err(Error::type_error(format!(
                    "cannot broadcast dimension of size {} in source operand {i} against \
                     destination dimension of size {}",
                    rec.dim_size, dst_rec.dim_size
                )));
            }
            inner_src_dts.push(src_dt.element_type().expect("dimension element").clone());
            inner_src_arrmetas.push(&src_arrmetas[i][DIM_ARRMETA_SIZE..]);
        } else {
            // Lower rank: repeat the whole operand across this dimension.
            src_strides.push(0);
            inner_src_dts.push(src_dt.clone());
            inner_src_arrmetas.push(src_arrmetas[i]);
        }
    }

    trace!(
        "elwise dimension wrapper: size {} over {}",
        dst_rec.dim_size, dst_element
    );
    chain.push(KernelNode::ElwiseDim(ElwiseDimKernel {
        dim_size: dst_rec.dim_size,
        dst_stride: dst_rec.stride,
        src_strides,
    }));

    generator.make_expr_kernel(
        chain,
        &dst_element,
        inner_dst_arrmeta,
        &inner_src_dts,
        &inner_src_arrmetas,
        KernelRequest::Strided,
    )
}

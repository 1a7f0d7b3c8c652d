//! The leaf kernel node invoking a user-supplied callable.
//!
//! The node owns `N + 1` pre-built shell array handles (destination first).
//! Each call repoints the shells at the current element addresses instead of
//! constructing typed handles from scratch; the shells' type and arrmeta are
//! built once at kernel-generation time. The callable runs under the
//! interpreter lock, and after every return the node verifies that the
//! callable returned no value and kept no reference to a shell or its
//! backing block.

use std::any::Any;
use std::sync::Arc;

use ndyn_common::{Result, error::Error, lock};
use ndyn_array::{AccessFlags, Array, ArrayHandle, MemoryBlock};
use ndyn_types::DataType;
use ndyn_types::arrmeta::{self, DIM_ARRMETA_SIZE, DimArrmeta};
use ndyn_types::data_type::make_strided_dim;

use crate::kernel::KernelRequest;

/// The user callable contract: invoked with `N + 1` positional array handles
/// (destination first), must return no value, must not retain a reference to
/// any argument or its backing storage past return.
pub type UserCallable = dyn Fn(&[ArrayHandle]) -> Option<Box<dyn Any>>;

pub struct UserCallKernel {
    callable: Arc<UserCallable>,
    src_count: usize,
    /// Destination shell at index 0, source shells after it.
    shells: Vec<ArrayHandle>,
    request: KernelRequest,
}

impl UserCallKernel {
    pub fn new(
        callable: Arc<UserCallable>,
        dst_dt: &DataType,
        dst_arrmeta: &[u8],
        src_dts: &[DataType],
        src_arrmetas: &[&[u8]],
        request: KernelRequest,
    ) -> Result<UserCallKernel> {
        let mut shells = Vec::with_capacity(src_dts.len() + 1);
        shells.push(make_shell(dst_dt, dst_arrmeta, AccessFlags::read_write())?);
        for (dt, meta) in src_dts.iter().zip(src_arrmetas.iter()) {
            shells.push(make_shell(dt, meta, AccessFlags::read_only())?);
        }
        Ok(UserCallKernel {
            callable,
            src_count: src_dts.len(),
            shells,
            request,
        })
    }

    pub fn single(&mut self, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        self.check_entry(KernelRequest::Single, false)?;
        self.set_data_pointers(dst, src);
        self.invoke()
    }

    pub fn single_unary(&mut self, dst: *mut u8, src: *const u8) -> Result<()> {
        self.check_entry(KernelRequest::Single, true)?;
        self.set_data_pointers(dst, &[src]);
        self.invoke()
    }

    pub fn strided(
        &mut self,
        dst: *mut u8,
        dst_stride: i64,
        src: &[*const u8],
        src_stride: &[i64],
        count: usize,
    ) -> Result<()> {
        self.check_entry(KernelRequest::Strided, false)?;
        self.set_strided_pointers(dst, dst_stride, src, src_stride, count);
        self.invoke()
    }

    pub fn strided_unary(
        &mut self,
        dst: *mut u8,
        dst_stride: i64,
        src: *const u8,
        src_stride: i64,
        count: usize,
    ) -> Result<()> {
        self.check_entry(KernelRequest::Strided, true)?;
        self.set_strided_pointers(dst, dst_stride, &[src], &[src_stride], count);
        self.invoke()
    }

    fn check_entry(&self, request: KernelRequest, unary: bool) -> Result<()> {
        if self.request != request || unary != (self.src_count == 1) {
            return Err(Error::unsupported_request(format!(
                "elwise kernel built for {:?} with {} source operands invoked through \
                 a mismatched entry",
                self.request, self.src_count
            )));
        }
        debug_assert_eq!(self.shells.len(), self.src_count + 1);
        Ok(())
    }

    fn set_data_pointers(&mut self, dst: *mut u8, src: &[*const u8]) {
        // The shells were constructed as size-1 stride-0 arrays; a single
        // call only needs the data pointers moved.
        unsafe {
            self.shells[0].with_mut(|a| a.rebind_data(dst));
            for (shell, &p) in self.shells[1..].iter().zip(src.iter()) {
                shell.with_mut(|a| a.rebind_data(p as *mut u8));
            }
        }
    }

    fn set_strided_pointers(
        &mut self,
        dst: *mut u8,
        dst_stride: i64,
        src: &[*const u8],
        src_stride: &[i64],
        count: usize,
    ) {
        unsafe {
            self.shells[0].with_mut(|a| a.rebind_strided(dst, count as i64, dst_stride));
            for (i, shell) in self.shells[1..].iter().enumerate() {
                shell.with_mut(|a| {
                    a.rebind_strided(src[i] as *mut u8, count as i64, src_stride[i])
                });
            }
        }
    }

    fn invoke(&self) -> Result<()> {
        let _guard = lock::acquire();
        let res = (self.callable)(&self.shells);
        self.verify_postcall(res)
    }

    /// The ownership-safety contract: the callable returned no value, and
    /// every shell handle and its backing block are back at their pre-call
    /// baseline count of 1. A retained reference would alias memory that the
    /// next call repoints at different data.
    fn verify_postcall(&self, res: Option<Box<dyn Any>>) -> Result<()> {
        if res.is_some() {
            return Err(Error::postcondition(
                "the elwise_map callable must not return a value",
            ));
        }
        for (i, shell) in self.shells.iter().enumerate() {
            let label = if i == 0 {
                "dst".to_string()
            } else {
                format!("src_{}", i - 1)
            };
            if shell.use_count() != 1 {
                return Err(Error::postcondition(format!(
                    "the elwise_map callable held onto a reference to the {label} argument"
                )));
            }
            if shell.block_use_count() != 1 {
                return Err(Error::postcondition(format!(
                    "the elwise_map callable held onto a reference to the data underlying \
                     the {label} argument"
                )));
            }
        }
        Ok(())
    }
}

/// Builds one shell: a size-1, stride-0 strided array over `dt` whose inner
/// arrmeta is copy-constructed from the call site's. Its data pointer is a
/// placeholder until the first rebind.
fn make_shell(dt: &DataType, call_arrmeta: &[u8], flags: AccessFlags) -> Result<ArrayHandle> {
    let shell_tp = make_strided_dim(dt.clone());
    let mut shell_meta = vec![0u8; shell_tp.arrmeta_size()];
    arrmeta::set_dim_arrmeta(
        &mut shell_meta,
        DimArrmeta {
            dim_size: 1,
            stride: 0,
        },
    );
    if dt.arrmeta_size() > 0 {
        let inner = arrmeta::copy_construct(dt, call_arrmeta);
        shell_meta[DIM_ARRMETA_SIZE..].copy_from_slice(&inner);
    }
    let block = MemoryBlock::allocate(0, 1);
    let data = block.as_mut_ptr();
    let array = unsafe { Array::from_raw_parts(block, data, shell_tp, shell_meta, flags) }?;
    Ok(ArrayHandle::new(array))
}

//! The concrete array value: a memory block, a raw data pointer into it,
//! a type descriptor, the arrmeta bytes describing this value's layout, and
//! access flags.

use bitflags::bitflags;
use bytemuck::Pod;
use ndyn_common::{Result, error::Error};
use ndyn_types::DataType;
use ndyn_types::arrmeta::{self, DIM_ARRMETA_SIZE, DimArrmeta};

use crate::block::MemoryBlock;

bitflags! {
    /// Access rights of one array value over its data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        const READ = 0x01;
        const WRITE = 0x02;
        const IMMUTABLE = 0x04;
    }
}

impl AccessFlags {
    pub fn read_write() -> AccessFlags {
        AccessFlags::READ | AccessFlags::WRITE
    }

    pub fn read_only() -> AccessFlags {
        AccessFlags::READ
    }

    pub fn immutable() -> AccessFlags {
        AccessFlags::READ | AccessFlags::IMMUTABLE
    }

    /// Immutable data can never be writable.
    pub fn validate(self) -> Result<()> {
        if self.contains(AccessFlags::IMMUTABLE) && self.contains(AccessFlags::WRITE) {
            return Err(Error::invalid_arg(
                "access",
                "data cannot be both immutable and writable",
            ));
        }
        if !self.contains(AccessFlags::READ) {
            return Err(Error::invalid_arg("access", "data must at least be readable"));
        }
        Ok(())
    }
}

/// A single array value.
///
/// The value does not own its element storage directly; the block does, and
/// several values (views) may share one block. The arrmeta bytes are owned
/// per value since two views of the same block can have different strides
/// and offsets.
pub struct Array {
    block: MemoryBlock,
    data: *mut u8,
    dtype: DataType,
    arrmeta: Vec<u8>,
    flags: AccessFlags,
}

impl Array {
    /// Allocates a zeroed value of a type whose layout has a default
    /// (fixed dimensions, structs, scalars).
    pub fn empty(dtype: DataType) -> Result<Array> {
        let mut arrmeta = vec![0u8; dtype.arrmeta_size()];
        arrmeta::fill_default(&dtype, &mut arrmeta)?;
        let block = MemoryBlock::allocate(dtype.data_size(), dtype.data_alignment());
        let data = block.as_mut_ptr();
        Ok(Array {
            block,
            data,
            dtype,
            arrmeta,
            flags: AccessFlags::read_write(),
        })
    }

    /// Allocates a zeroed value with the given leading-dimension shape,
    /// packed in C order.
    pub fn empty_shaped(dtype: DataType, shape: &[i64]) -> Result<Array> {
        let mut arrmeta = vec![0u8; dtype.arrmeta_size()];
        let data_size = arrmeta::fill_strided(&dtype, shape, &mut arrmeta)?;
        let block = MemoryBlock::allocate(data_size, dtype.data_alignment());
        let data = block.as_mut_ptr();
        Ok(Array {
            block,
            data,
            dtype,
            arrmeta,
            flags: AccessFlags::read_write(),
        })
    }

    /// Assembles a value over existing storage.
    ///
    /// # Safety
    ///
    /// `data` must point into memory kept alive by `block`, and `arrmeta`
    /// must accurately describe a value of `dtype` within that memory.
    pub unsafe fn from_raw_parts(
        block: MemoryBlock,
        data: *mut u8,
        dtype: DataType,
        arrmeta: Vec<u8>,
        flags: AccessFlags,
    ) -> Result<Array> {
        flags.validate()?;
        debug_assert_eq!(arrmeta.len(), dtype.arrmeta_size());
        Ok(Array {
            block,
            data,
            dtype,
            arrmeta,
            flags,
        })
    }

    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }

    pub fn flags(&self) -> AccessFlags {
        self.flags
    }

    /// Replaces the access flags. Rights can only be narrowed: write access
    /// that was never granted (or was dropped) cannot be regained, which
    /// keeps read-only views of foreign buffers read-only for good.
    pub fn set_flags(&mut self, flags: AccessFlags) -> Result<()> {
        flags.validate()?;
        if flags.contains(AccessFlags::WRITE) && !self.flags.contains(AccessFlags::WRITE) {
            return Err(Error::permission(
                "cannot add write access to an array value that does not have it",
            ));
        }
        self.flags = flags;
        Ok(())
    }

    pub fn block(&self) -> &MemoryBlock {
        &self.block
    }

    pub fn arrmeta(&self) -> &[u8] {
        &self.arrmeta
    }

    pub fn arrmeta_mut(&mut self) -> &mut [u8] {
        &mut self.arrmeta
    }

    pub fn data_ptr(&self) -> *const u8 {
        self.data
    }

    pub fn data_mut_ptr(&self) -> *mut u8 {
        self.data
    }

    pub fn ndim(&self) -> usize {
        self.dtype.ndim()
    }

    /// Dimension sizes of the leading dimensions, read from arrmeta.
    pub fn shape(&self) -> Vec<i64> {
        self.dim_records().iter().map(|r| r.dim_size).collect()
    }

    /// Byte strides of the leading dimensions, read from arrmeta.
    pub fn strides(&self) -> Vec<i64> {
        self.dim_records().iter().map(|r| r.stride).collect()
    }

    fn dim_records(&self) -> Vec<DimArrmeta> {
        let mut records = Vec::with_capacity(self.dtype.ndim());
        let mut tp = self.dtype.clone();
        let mut offset = 0usize;
        while let Some(element) = tp.element_type().cloned() {
            records.push(arrmeta::dim_arrmeta(&self.arrmeta[offset..]));
            offset += DIM_ARRMETA_SIZE;
            tp = element;
        }
        records
    }

    fn element_ptr(&self, index: i64) -> Result<*mut u8> {
        if self.dtype.ndim() == 0 {
            if index != 0 {
                return Err(Error::invalid_arg(
                    "index",
                    "a scalar value has exactly one element",
                ));
            }
            return Ok(self.data);
        }
        let rec = arrmeta::dim_arrmeta(&self.arrmeta);
        if index < 0 || index >= rec.dim_size {
            return Err(Error::invalid_arg(
                "index",
                format!("index {index} out of bounds for dimension of size {}", rec.dim_size),
            ));
        }
        Ok(unsafe { self.data.offset((index as isize) * (rec.stride as isize)) })
    }

    /// Reads element `index` along the leading dimension as a plain value.
    pub fn get_pod<T: Pod>(&self, index: i64) -> Result<T> {
        if !self.flags.contains(AccessFlags::READ) {
            return Err(Error::permission("array data is not readable"));
        }
        let ptr = self.element_ptr(index)?;
        let bytes = unsafe { std::slice::from_raw_parts(ptr, std::mem::size_of::<T>()) };
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Writes element `index` along the leading dimension.
    pub fn set_pod<T: Pod>(&self, index: i64, value: T) -> Result<()> {
        if !self.flags.contains(AccessFlags::WRITE) {
            return Err(Error::permission("array data is not writable"));
        }
        let ptr = self.element_ptr(index)?;
        let src = bytemuck::bytes_of(&value);
        unsafe {
            std::slice::from_raw_parts_mut(ptr, src.len()).copy_from_slice(src);
        }
        Ok(())
    }

    /// Repoints this value at a new element address within its block.
    ///
    /// # Safety
    ///
    /// `data` must point into memory kept alive by this value's block and be
    /// laid out per the current arrmeta. Callers only rebind shell values
    /// they exclusively own for the duration of one kernel call.
    pub unsafe fn rebind_data(&mut self, data: *mut u8) {
        self.data = data;
    }

    /// Repoints this value and rewrites its leading dimension record.
    ///
    /// # Safety
    ///
    /// Same contract as [`Array::rebind_data`]; additionally the type must
    /// have at least one leading dimension.
    pub unsafe fn rebind_strided(&mut self, data: *mut u8, dim_size: i64, stride: i64) {
        self.data = data;
        arrmeta::set_dim_arrmeta(&mut self.arrmeta, DimArrmeta { dim_size, stride });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndyn_types::TypeId;
    use ndyn_types::data_type::{make_fixed_dim, make_scalar, make_strided_dim};

    fn int32() -> DataType {
        make_scalar(TypeId::Int32).unwrap()
    }

    #[test]
    fn flags_validation() {
        assert!(AccessFlags::read_write().validate().is_ok());
        assert!(AccessFlags::read_only().validate().is_ok());
        assert!(AccessFlags::immutable().validate().is_ok());
        assert!(
            (AccessFlags::IMMUTABLE | AccessFlags::WRITE | AccessFlags::READ)
                .validate()
                .is_err()
        );
        assert!(AccessFlags::WRITE.validate().is_err());
    }

    #[test]
    fn scalar_roundtrip() {
        let arr = Array::empty(int32()).unwrap();
        assert_eq!(arr.get_pod::<i32>(0).unwrap(), 0);
        arr.set_pod(0, 42i32).unwrap();
        assert_eq!(arr.get_pod::<i32>(0).unwrap(), 42);
        assert!(arr.get_pod::<i32>(1).is_err());
    }

    #[test]
    fn fixed_dim_elements() {
        let tp = make_fixed_dim(&[4], int32()).unwrap();
        let arr = Array::empty(tp).unwrap();
        assert_eq!(arr.shape(), vec![4]);
        assert_eq!(arr.strides(), vec![4]);
        for i in 0..4 {
            arr.set_pod(i, (10 * i) as i32).unwrap();
        }
        for i in 0..4 {
            assert_eq!(arr.get_pod::<i32>(i).unwrap(), (10 * i) as i32);
        }
        assert!(arr.get_pod::<i32>(4).is_err());
        assert!(arr.get_pod::<i32>(-1).is_err());
    }

    #[test]
    fn strided_allocation() {
        let tp = make_strided_dim(make_strided_dim(int32()));
        let arr = Array::empty_shaped(tp, &[3, 4]).unwrap();
        assert_eq!(arr.shape(), vec![3, 4]);
        assert_eq!(arr.strides(), vec![16, 4]);
        assert_eq!(arr.block().len(), 48);
    }

    #[test]
    fn write_access_cannot_be_regained() {
        let mut arr = Array::empty(int32()).unwrap();
        arr.set_flags(AccessFlags::read_only()).unwrap();
        assert!(arr.set_flags(AccessFlags::read_write()).is_err());
        // Narrowing further is still allowed.
        arr.set_flags(AccessFlags::immutable()).unwrap();
    }

    #[test]
    fn write_denied_without_flag() {
        let mut arr = Array::empty(int32()).unwrap();
        arr.flags = AccessFlags::read_only();
        assert!(arr.set_pod(0, 1i32).is_err());
        assert!(arr.get_pod::<i32>(0).is_ok());
    }
}

//! Shape broadcasting.
//!
//! Shapes are sequences of `i64` dimension sizes; `-1` marks a
//! variable-length dimension. Broadcasting right-aligns ragged ranks and
//! stretches size-1 dimensions.

use ndyn_common::{Result, error::Error};

/// Marks a variable-length dimension in a shape.
pub const VAR_DIM_SIZE: i64 = -1;

/// Folds `shape` into `result` (right-aligned). `result` must have rank at
/// least as large as `shape`; its dimensions start out as 1.
pub fn incremental_broadcast(result: &mut [i64], shape: &[i64]) -> Result<()> {
    if shape.len() > result.len() {
        return Err(Error::type_error(format!(
            "operand of rank {} exceeds the broadcast rank {}",
            shape.len(),
            result.len()
        )));
    }
    let offset = result.len() - shape.len();
    for (r, &s) in result[offset..].iter_mut().zip(shape) {
        if s == VAR_DIM_SIZE || *r == VAR_DIM_SIZE {
            *r = VAR_DIM_SIZE;
        } else if *r == 1 {
            *r = s;
        } else if s != 1 && s != *r {
            return Err(Error::type_error(format!(
                "cannot broadcast dimension of size {s} against size {r}",
                r = *r
            )));
        }
    }
    Ok(())
}

/// Broadcasts all operand shapes together into the result shape.
pub fn broadcast_shapes(shapes: &[&[i64]]) -> Result<Vec<i64>> {
    let rank = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut result = vec![1i64; rank];
    for shape in shapes {
        incremental_broadcast(&mut result, shape)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_and_vector() {
        let shape = broadcast_shapes(&[&[3], &[1], &[]]).unwrap();
        assert_eq!(shape, vec![3]);
    }

    #[test]
    fn ragged_ranks_right_align() {
        let shape = broadcast_shapes(&[&[4, 1], &[3], &[]]).unwrap();
        assert_eq!(shape, vec![4, 3]);
    }

    #[test]
    fn var_dim_wins() {
        let shape = broadcast_shapes(&[&[4], &[VAR_DIM_SIZE]]).unwrap();
        assert_eq!(shape, vec![VAR_DIM_SIZE]);

        let shape = broadcast_shapes(&[&[VAR_DIM_SIZE], &[1]]).unwrap();
        assert_eq!(shape, vec![VAR_DIM_SIZE]);
    }

    #[test]
    fn incompatible_sizes_fail() {
        assert!(broadcast_shapes(&[&[3], &[4]]).is_err());
        assert!(broadcast_shapes(&[&[2, 3], &[3, 3]]).is_err());
    }

    #[test]
    fn empty_operands() {
        assert_eq!(broadcast_shapes(&[]).unwrap(), Vec::<i64>::new());
        assert_eq!(broadcast_shapes(&[&[], &[]]).unwrap(), Vec::<i64>::new());
    }
}

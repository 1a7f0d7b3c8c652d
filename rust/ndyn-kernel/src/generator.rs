//! Kernel generators: given the concrete types at a call site, append the
//! node sequence that evaluates the operation there.

use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use ndyn_common::{Result, error::Error};
use ndyn_types::DataType;

use crate::elwise_dim::make_elwise_dimension_kernel;
use crate::kernel::{KernelChain, KernelNode, KernelRequest};
use crate::user_call::{UserCallKernel, UserCallable};

pub trait ExprKernelGenerator {
    /// Appends kernel nodes evaluating this generator's operation for the
    /// given destination/source types and arrmeta.
    fn make_expr_kernel(
        &self,
        chain: &mut KernelChain,
        dst_dt: &DataType,
        dst_arrmeta: &[u8],
        src_dts: &[DataType],
        src_arrmetas: &[&[u8]],
        request: KernelRequest,
    ) -> Result<()>;

    /// A human-readable rendering of the expression for diagnostics; never
    /// affects execution.
    fn expression_name(&self) -> String;
}

/// Generator wrapping a user-supplied elementwise callable with a fixed
/// destination type and fixed source types.
pub struct UserCallableGenerator {
    callable: Arc<UserCallable>,
    name: Option<String>,
    dst_dt: DataType,
    src_dts: Vec<DataType>,
}

impl UserCallableGenerator {
    pub fn new(
        callable: Arc<UserCallable>,
        name: Option<String>,
        dst_dt: DataType,
        src_dts: Vec<DataType>,
    ) -> UserCallableGenerator {
        UserCallableGenerator {
            callable,
            name,
            dst_dt,
            src_dts,
        }
    }
}

impl ExprKernelGenerator for UserCallableGenerator {
    fn make_expr_kernel(
        &self,
        chain: &mut KernelChain,
        dst_dt: &DataType,
        dst_arrmeta: &[u8],
        src_dts: &[DataType],
        src_arrmetas: &[&[u8]],
        request: KernelRequest,
    ) -> Result<()> {
        if src_dts.len() != self.src_dts.len() {
            return Err(Error::arity(self.src_dts.len(), src_dts.len()));
        }
        let mismatch = dst_dt != &self.dst_dt
            || src_dts
                .iter()
                .zip(self.src_dts.iter())
                .any(|(actual, declared)| actual != declared);
        if mismatch {
            // The call site carries extra dimensions (or differently wrapped
            // types); peel one dimension and come back to this generator for
            // what is underneath.
            return make_elwise_dimension_kernel(
                chain,
                dst_dt,
                dst_arrmeta,
                src_dts,
                src_arrmetas,
                request,
                self,
            );
        }

        debug!(
            "generating leaf elwise kernel for {} as {:?}",
            self.expression_name(),
            request
        );
        let node = UserCallKernel::new(
            self.callable.clone(),
            dst_dt,
            dst_arrmeta,
            src_dts,
            src_arrmetas,
            request,
        )?;
        chain.push(KernelNode::UserCall(node));
        Ok(())
    }

    fn expression_name(&self) -> String {
        let name = self.name.as_deref().unwrap_or("_unnamed");
        let ops = (0..self.src_dts.len()).map(|i| format!("op{i}")).join(", ");
        format!("{name}({ops})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndyn_types::TypeId;
    use ndyn_types::data_type::make_scalar;

    fn noop() -> Arc<UserCallable> {
        Arc::new(|_args| None)
    }

    fn int32() -> DataType {
        make_scalar(TypeId::Int32).unwrap()
    }

    #[test]
    fn expression_naming() {
        let g = UserCallableGenerator::new(
            noop(),
            Some("square".into()),
            int32(),
            vec![int32()],
        );
        assert_eq!(g.expression_name(), "square(op0)");

        let g = UserCallableGenerator::new(noop(), None, int32(), vec![int32(), int32()]);
        assert_eq!(g.expression_name(), "_unnamed(op0, op1)");
    }

    #[test]
    fn arity_mismatch_fails() {
        let g = UserCallableGenerator::new(noop(), None, int32(), vec![int32(), int32()]);
        let mut chain = KernelChain::new();
        let err = g
            .make_expr_kernel(
                &mut chain,
                &int32(),
                &[],
                &[int32()],
                &[&[]],
                KernelRequest::Single,
            )
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ndyn_common::error::ErrorKind::Arity {
                expected: 2,
                actual: 1
            }
        ));
        assert!(chain.is_empty());
    }

    #[test]
    fn exact_match_emits_single_leaf() {
        let g = UserCallableGenerator::new(noop(), None, int32(), vec![int32()]);
        let mut chain = KernelChain::new();
        g.make_expr_kernel(
            &mut chain,
            &int32(),
            &[],
            &[int32()],
            &[&[]],
            KernelRequest::Single,
        )
        .unwrap();
        assert_eq!(chain.len(), 1);
    }
}

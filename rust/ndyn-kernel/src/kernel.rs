//! The hierarchical kernel chain.
//!
//! Nodes are stored in construction order; the child of node `i` begins at
//! `i + 1`. Dropping the chain tears nodes down in construction order, which
//! is what a `Vec` does. Each node is built for one execution mode; invoking
//! an entry the node was not built for is an unsupported-request error.

use ndyn_common::{Result, error::Error};

use crate::elwise_dim::ElwiseDimKernel;
use crate::user_call::UserCallKernel;

/// The execution mode a kernel entry is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelRequest {
    /// One element per invocation.
    Single,
    /// A strided run of `count` elements per invocation.
    Strided,
}

pub enum KernelNode {
    UserCall(UserCallKernel),
    ElwiseDim(ElwiseDimKernel),
}

/// A growable chain of kernel nodes, executed from the front.
#[derive(Default)]
pub struct KernelChain {
    nodes: Vec<KernelNode>,
}

impl KernelChain {
    pub fn new() -> KernelChain {
        KernelChain { nodes: Vec::new() }
    }

    pub fn push(&mut self, node: KernelNode) {
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Executes the chain once for a single element.
    pub fn call_single(&mut self, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        call_single_at(&mut self.nodes, dst, src)
    }

    /// Executes the chain over a strided run of `count` elements.
    pub fn call_strided(
        &mut self,
        dst: *mut u8,
        dst_stride: i64,
        src: &[*const u8],
        src_stride: &[i64],
        count: usize,
    ) -> Result<()> {
        call_strided_at(&mut self.nodes, dst, dst_stride, src, src_stride, count)
    }

    /// Unary specialization of [`KernelChain::call_single`].
    pub fn call_single_unary(&mut self, dst: *mut u8, src: *const u8) -> Result<()> {
        call_single_unary_at(&mut self.nodes, dst, src)
    }

    /// Unary specialization of [`KernelChain::call_strided`].
    pub fn call_strided_unary(
        &mut self,
        dst: *mut u8,
        dst_stride: i64,
        src: *const u8,
        src_stride: i64,
        count: usize,
    ) -> Result<()> {
        call_strided_unary_at(&mut self.nodes, dst, dst_stride, src, src_stride, count)
    }
}

fn split_chain(nodes: &mut [KernelNode]) -> Result<(&mut KernelNode, &mut [KernelNode])> {
    nodes
        .split_first_mut()
        .ok_or_else(|| Error::unsupported_request("execution reached an empty kernel chain"))
}

pub(crate) fn call_single_at(
    nodes: &mut [KernelNode],
    dst: *mut u8,
    src: &[*const u8],
) -> Result<()> {
    let (first, rest) = split_chain(nodes)?;
    match first {
        KernelNode::UserCall(k) => k.single(dst, src),
        KernelNode::ElwiseDim(k) => k.single(dst, src, rest),
    }
}

pub(crate) fn call_strided_at(
    nodes: &mut [KernelNode],
    dst: *mut u8,
    dst_stride: i64,
    src: &[*const u8],
    src_stride: &[i64],
    count: usize,
) -> Result<()> {
    let (first, rest) = split_chain(nodes)?;
    match first {
        KernelNode::UserCall(k) => k.strided(dst, dst_stride, src, src_stride, count),
        KernelNode::ElwiseDim(k) => k.strided(dst, dst_stride, src, src_stride, count, rest),
    }
}

pub(crate) fn call_single_unary_at(
    nodes: &mut [KernelNode],
    dst: *mut u8,
    src: *const u8,
) -> Result<()> {
    let (first, rest) = split_chain(nodes)?;
    match first {
        KernelNode::UserCall(k) => k.single_unary(dst, src),
        KernelNode::ElwiseDim(k) => k.single_unary(dst, src, rest),
    }
}

pub(crate) fn call_strided_unary_at(
    nodes: &mut [KernelNode],
    dst: *mut u8,
    dst_stride: i64,
    src: *const u8,
    src_stride: i64,
    count: usize,
) -> Result<()> {
    let (first, rest) = split_chain(nodes)?;
    match first {
        KernelNode::UserCall(k) => k.strided_unary(dst, dst_stride, src, src_stride, count),
        KernelNode::ElwiseDim(k) => k.strided_unary(dst, dst_stride, src, src_stride, count, rest),
    }
}

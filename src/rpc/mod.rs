pub mod batch_block;
pub mod client;

pub use batch_block::{BatchBlock, NextHeadersResult};
pub use client::{ChainRpcClient, HttpChainRpcClient, UnsignedTxRequest};

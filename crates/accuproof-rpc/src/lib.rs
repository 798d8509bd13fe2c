//! accuproof-rpc
//!
//! The RPC Client contract (spec.md §4.9), the canonical query builder
//! (C4), and the JSON-RPC 2.0 wire types (spec.md §6).

pub mod client;
pub mod query;
pub mod wire;

pub use client::{CachedRpcClient, HttpRpcClient, RpcClient};
pub use query::QueryBuilder;
pub use wire::{JsonRpcRequest, JsonRpcResponse};

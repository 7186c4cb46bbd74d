//! Production implementations of the traits in [`crate::traits`].

mod rpc;
mod signer;

pub use {
    rpc::{RpcConnector, RpcProvider},
    signer::LocalSigner,
};

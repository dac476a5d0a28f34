//! Contract bindings for selling a token through a V2-style router.
//!
//! # Example
//!
//! ```rust,ignore
//! use unloader_chain::contracts::{encode_approve, encode_swap, SwapCall, SwapEntryPoint};
//!
//! let approve = encode_approve(router, U256::MAX);
//! let swap = encode_swap(SwapEntryPoint::Standard, &call);
//! ```

pub mod common;
pub mod router;

pub use common::{encode_approve, IERC20};
pub use router::{encode_swap, swap_amount_in, IUniswapV2Router02, SwapCall, SwapEntryPoint};

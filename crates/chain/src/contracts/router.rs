//! Uniswap-V2-style router bindings.
//!
//! Only the token-to-native entry points are bound. The path is always
//! `[token, wrapped_native]`; multi-hop routing is out of scope.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};

sol! {
    /// UniswapV2Router02 subset, encoding only
    interface IUniswapV2Router02 {
        function swapExactTokensForETH(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external returns (uint256[] memory amounts);

        function swapExactTokensForETHSupportingFeeOnTransferTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external;
    }
}

/// Router function used for the sell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapEntryPoint {
    /// `swapExactTokensForETH`
    #[default]
    Standard,
    /// `swapExactTokensForETHSupportingFeeOnTransferTokens`, for tokens that tax transfers.
    FeeOnTransfer,
}

impl SwapEntryPoint {
    pub fn name(&self) -> &'static str {
        match self {
            SwapEntryPoint::Standard => "swapExactTokensForETH",
            SwapEntryPoint::FeeOnTransfer => "swapExactTokensForETHSupportingFeeOnTransferTokens",
        }
    }
}

/// Arguments of a token-to-native swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCall {
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub token: Address,
    pub wrapped_native: Address,
    pub recipient: Address,
    /// Unix timestamp after which the router refuses the swap.
    pub deadline: U256,
}

/// ABI-encode a swap for the given entry point.
pub fn encode_swap(entry: SwapEntryPoint, call: &SwapCall) -> Bytes {
    let path = vec![call.token, call.wrapped_native];
    match entry {
        SwapEntryPoint::Standard => IUniswapV2Router02::swapExactTokensForETHCall {
            amountIn: call.amount_in,
            amountOutMin: call.amount_out_min,
            path,
            to: call.recipient,
            deadline: call.deadline,
        }
        .abi_encode()
        .into(),
        SwapEntryPoint::FeeOnTransfer => {
            IUniswapV2Router02::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
                amountIn: call.amount_in,
                amountOutMin: call.amount_out_min,
                path,
                to: call.recipient,
                deadline: call.deadline,
            }
            .abi_encode()
            .into()
        }
    }
}

/// Read `amountIn` back out of swap calldata. Both entry points put it first.
pub fn swap_amount_in(calldata: &[u8]) -> Option<U256> {
    if calldata.len() < 36 {
        return None;
    }
    let selector: [u8; 4] = calldata[..4].try_into().ok()?;
    let known = selector == IUniswapV2Router02::swapExactTokensForETHCall::SELECTOR
        || selector
            == IUniswapV2Router02::swapExactTokensForETHSupportingFeeOnTransferTokensCall::SELECTOR;
    known.then(|| U256::from_be_slice(&calldata[4..36]))
}

//! Solidity interfaces for the calls the oracle makes.

use alloy_sol_types::sol;

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }

    /// Curve stable-swap pools; the pool contract is also the LP token.
    interface IStableSwapPool {
        function balances(uint256 i) external view returns (uint256);
    }

    interface IClaimableFees {
        function claimable(address account, address token) external view returns (uint256);
    }
}

//! Per-user tool authorization boundary.

use async_trait::async_trait;
use serde_json::Value;

/// Decides whether a user may run a given tool call.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Returns true if `user_id` may run `tool_name` with these arguments.
    async fn authorize(&self, user_id: &str, tool_name: &str, arguments: &Value) -> bool;
}

/// Checker that authorizes everything. Suitable for single-tenant setups
/// and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAllPermissions;

#[async_trait]
impl PermissionChecker for AllowAllPermissions {
    async fn authorize(&self, _user_id: &str, _tool_name: &str, _arguments: &Value) -> bool {
        true
    }
}

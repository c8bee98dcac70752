/*!
 * # Request authorization
 *
 * Authentication and tenant resolution happen in the outer request layer,
 * which hands every call a [`RequestContext`]. This module only decides
 * whether the acting role may perform an operation.
 */

use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Membership role of the actor within its tenant
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

/// Operations guarded by role, written as `resource:action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Permission {
    #[strum(serialize = "rfqs:write")]
    ManageRfqs,
    #[strum(serialize = "purchaseorders:create")]
    CreatePurchaseOrders,
    #[strum(serialize = "purchaseorders:confirm")]
    ConfirmPurchaseOrders,
    #[strum(serialize = "purchaseorders:send")]
    SendPurchaseOrders,
    #[strum(serialize = "receipts:record")]
    ReceiveGoods,
    #[strum(serialize = "supplierinvoices:create")]
    CreateSupplierInvoices,
    #[strum(serialize = "supplierinvoices:post")]
    PostSupplierInvoices,
    #[strum(serialize = "supplierinvoices:cancel")]
    CancelSupplierInvoices,
    #[strum(serialize = "supplierpayments:record")]
    RecordSupplierPayments,
    #[strum(serialize = "procurement:read")]
    Read,
}

impl Permission {
    /// Financially binding actions are reserved to owners and admins.
    pub fn requires_elevated_role(self) -> bool {
        matches!(
            self,
            Permission::ConfirmPurchaseOrders
                | Permission::PostSupplierInvoices
                | Permission::CancelSupplierInvoices
                | Permission::RecordSupplierPayments
        )
    }
}

impl Role {
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    pub fn grants(self, permission: Permission) -> bool {
        self.is_elevated() || !permission.requires_elevated_role()
    }
}

/// Caller identity and retry token for one core operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub role: Role,
    /// Client-supplied token that makes a mutation safe to retry
    pub idempotency_key: Option<String>,
}

impl RequestContext {
    pub fn new(tenant_id: Uuid, actor_id: Uuid, role: Role) -> Self {
        Self {
            tenant_id,
            actor_id,
            role,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Fails with `Forbidden` unless the actor's role grants `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), ServiceError> {
        if self.role.grants(permission) {
            return Ok(());
        }

        warn!(
            tenant_id = %self.tenant_id,
            actor_id = %self.actor_id,
            role = %self.role,
            permission = %permission,
            "Permission denied"
        );
        Err(ServiceError::Forbidden(format!(
            "role '{}' may not perform '{}'",
            self.role, permission
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn ctx(role: Role) -> RequestContext {
        RequestContext::new(Uuid::new_v4(), Uuid::new_v4(), role)
    }

    #[test]
    fn owners_and_admins_hold_every_permission() {
        for permission in Permission::iter() {
            assert!(ctx(Role::Owner).require(permission).is_ok());
            assert!(ctx(Role::Admin).require(permission).is_ok());
        }
    }

    #[test]
    fn members_cannot_perform_binding_actions() {
        let member = ctx(Role::Member);
        assert!(member.require(Permission::ReceiveGoods).is_ok());
        assert!(member.require(Permission::ManageRfqs).is_ok());

        let err = member
            .require(Permission::RecordSupplierPayments)
            .unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::FORBIDDEN);
        assert!(member.require(Permission::ConfirmPurchaseOrders).is_err());
        assert!(member.require(Permission::PostSupplierInvoices).is_err());
        assert!(member.require(Permission::CancelSupplierInvoices).is_err());
    }

    #[test]
    fn roles_parse_from_outer_layer_strings() {
        assert_eq!(Role::from_str("owner").unwrap(), Role::Owner);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!(Role::from_str("superuser").is_err());
    }
}

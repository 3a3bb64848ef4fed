//! Value objects shared by the order and catalog domains.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Caller role as established by the authentication boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Optional structured shipping address. Each field is length-bounded; the
/// bounds match the persisted schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(max = 100, message = "Street must not exceed 100 characters"))]
    pub street: Option<String>,
    #[validate(length(max = 50, message = "City must not exceed 50 characters"))]
    pub city: Option<String>,
    #[validate(length(max = 50, message = "State must not exceed 50 characters"))]
    pub state: Option<String>,
    #[validate(length(max = 50, message = "Country must not exceed 50 characters"))]
    pub country: Option<String>,
    #[validate(length(max = 20, message = "Postal code must not exceed 20 characters"))]
    pub postal_code: Option<String>,
}

impl ShippingAddress {
    /// Field bounds checked in declaration order, so the first violation is
    /// the one reported.
    pub fn check_bounds(&self) -> std::result::Result<(), String> {
        if self.street.as_deref().map_or(false, |s| s.len() > 100) {
            return Err("Street must not exceed 100 characters".into());
        }
        if self.city.as_deref().map_or(false, |s| s.len() > 50) {
            return Err("City must not exceed 50 characters".into());
        }
        if self.state.as_deref().map_or(false, |s| s.len() > 50) {
            return Err("State must not exceed 50 characters".into());
        }
        if self.country.as_deref().map_or(false, |s| s.len() > 50) {
            return Err("Country must not exceed 50 characters".into());
        }
        if self.postal_code.as_deref().map_or(false, |s| s.len() > 20) {
            return Err("Postal code must not exceed 20 characters".into());
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.country.is_none()
            && self.postal_code.is_none()
    }
}

/// Pagination window. Pages are 1-based; callers validate bounds before
/// constructing one.
#[derive(Clone, Copy, Debug)]
pub struct Paging {
    pub page: u32,
    pub limit: u32,
}

impl Paging {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn offset(self) -> u32 {
        (self.page - 1) * self.limit
    }
}

/// Pagination metadata returned next to every page of records.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(total: u64, paging: Paging) -> Self {
        Self {
            total,
            page: paging.page,
            limit: paging.limit,
            total_pages: (total + paging.limit as u64 - 1) / paging.limit as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("superuser"), None);
        assert!(Role::Admin.is_admin());
        assert!(!Role::User.is_admin());
    }

    #[test]
    fn address_bounds_report_first_violation() {
        let addr = ShippingAddress {
            street: Some("s".repeat(101)),
            city: Some("c".repeat(51)),
            ..ShippingAddress::default()
        };
        assert_eq!(
            addr.check_bounds().unwrap_err(),
            "Street must not exceed 100 characters"
        );

        let addr = ShippingAddress {
            postal_code: Some("9".repeat(21)),
            ..ShippingAddress::default()
        };
        assert_eq!(
            addr.check_bounds().unwrap_err(),
            "Postal code must not exceed 20 characters"
        );

        let addr = ShippingAddress {
            street: Some("221B Baker Street".into()),
            city: Some("London".into()),
            ..ShippingAddress::default()
        };
        assert!(addr.check_bounds().is_ok());
    }

    #[test]
    fn page_meta_rounds_up() {
        let paging = Paging { page: 2, limit: 10 };
        assert_eq!(paging.offset(), 10);
        let meta = PageMeta::new(21, paging);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(PageMeta::new(0, paging).total_pages, 0);
        assert_eq!(PageMeta::new(20, paging).total_pages, 2);
    }
}

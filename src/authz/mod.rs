//! Authorization: the permission model and the authorizer that consults
//! realms.
//!
//! Permissions are colon-separated parts of comma-separated tokens, with `*`
//! matching anything at its position:
//!
//! - `printer:print:laserjet2000` grants exactly that action on that device
//! - `printer:print,query` grants two actions on every printer
//! - `printer:*` and `printer` both grant everything on printers
//!
//! A granted permission implies a requested one when every granted part
//! covers the requested part at the same position. Missing trailing parts on
//! the granted side are wildcards; on the requested side they are only
//! covered by wildcards.

mod authorizer;
mod error;
mod info;
mod permission;
mod resolver;

pub use authorizer::ModularRealmAuthorizer;
pub use error::{AuthzError, PermissionFormatError};
pub use info::AuthorizationInfo;
pub use permission::{
    PART_DIVIDER, Part, Permission, PermissionPredicate, SUBPART_DIVIDER, WILDCARD_TOKEN,
    WildcardPermission, any_implies, implies,
};
pub use resolver::{
    PermissionResolver, RolePermissionResolver, StaticRolePermissionResolver,
    WildcardPermissionResolver,
};

pub mod claims;
pub mod ip;
pub mod jwt;
pub mod middleware;
pub mod utils;

pub use claims::SessionClaims;
pub use jwt::SessionTokenService;
pub use middleware::{AuthenticatedUser, MaybeSession, SessionMiddleware};
pub use utils::{
    client_ip, is_https, is_kiosk_client, require_not_guest, require_staff, secrets_match,
};

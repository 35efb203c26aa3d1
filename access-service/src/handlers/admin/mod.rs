//! Admin surface. Authentication is the same API-key check as the data
//! plane; the gateway in front of this service is the admin boundary.

pub mod api_keys;
pub mod assignments;
pub mod permissions;
pub mod pg_users;
pub mod remove_user;
pub mod rls;
pub mod servers;
pub mod users;

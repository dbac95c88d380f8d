pub mod actor;
pub mod request_id;

pub use actor::{Actor, ACTOR_HEADER};
pub use request_id::request_id_middleware;

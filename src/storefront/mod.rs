//! Session-scoped storefront stores: cart, comparator and view mode.

pub mod cart;
pub mod comparator;
pub mod session;

pub use cart::{Cart, CartItem};
pub use comparator::{CompareOutcome, Comparator, MAX_COMPARED};
pub use session::{
    JsonFileSessionStore, MemorySessionStore, SessionLocks, SessionState, SessionStore,
    StorefrontSession, ViewMode,
};

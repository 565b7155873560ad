//! Wire types shared by the matchfeed service, its callers, and the
//! webhook receivers it delivers to.

pub mod objects;
pub mod signature;

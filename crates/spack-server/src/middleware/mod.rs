//! Request middleware.

pub(crate) mod upgrade;

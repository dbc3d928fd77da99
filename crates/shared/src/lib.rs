//! Wire and domain types shared between the access-control client and its front ends.

pub mod domain;
pub mod protocol;

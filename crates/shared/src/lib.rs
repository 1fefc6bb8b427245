//! Wire types shared between the LMS list client and its console.

pub mod domain;
pub mod error;
pub mod protocol;

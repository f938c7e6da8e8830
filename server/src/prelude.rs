pub use warden_types::prelude::*;

// vim: ts=4

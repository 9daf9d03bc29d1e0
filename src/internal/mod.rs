//! Internal building blocks (the object model) that power the public APIs.

pub mod object;

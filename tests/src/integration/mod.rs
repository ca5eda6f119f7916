//! Integration tests across bridge-types, bridge-transport, bridge-core and
//! bridge-runtime.

pub mod fixtures;

#[cfg(test)]
mod properties;
#[cfg(test)]
mod scenarios;

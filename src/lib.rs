#![deny(clippy::panic)]
// Following from https://corrode.dev/blog/pitfalls-of-safe-rust/#clippy-can-prevent-many-of-these-issues
// and https://corrode.dev/blog/defensive-programming/#clippy-lints-for-defensive-programming
// Arithmetic
#![deny(arithmetic_overflow)] // Prevent operations that would cause integer overflow
#![deny(clippy::checked_conversions)] // Suggest using checked conversions between numeric types

// Unwraps
#![deny(clippy::expect_used)] // Prevent using .expect() which can cause panics
#![deny(clippy::option_env_unwrap)] // Prevent unwrapping environment variables which might be absent
#![deny(clippy::panicking_unwrap)] // Prevent unwrap on values known to cause panics
#![deny(clippy::unwrap_used)] // Prevent using .unwrap() which can cause panics

// Unbounded input
#![deny(clippy::uninit_vec)] // Prevent creating uninitialized vectors which is unsafe

// Unsafe code detection
#![deny(clippy::transmute_ptr_to_ref)] // Prevent unsafe transmutation from pointers to references
#![deny(clippy::transmute_undefined_repr)] // Detect transmutes with potentially undefined representations
#![deny(unnecessary_transmutes)] // Prevent unsafe transmutation

// Defensive programming
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::unneeded_field_pattern)]

//! Typed kernel-argument materialization for a quantum JIT bridge, plus a
//! circuit renderer.
//!
//! At kernel invocation time the JIT pipeline replaces a compiled kernel's
//! formal parameters with constants rebuilt from the live host argument
//! buffers. [`convert::ArgumentConverter`] resolves the kernel's typed
//! signature, walks it over the raw host pointers, and emits one
//! substitution record per parameter into a dedicated LLVM module; a later
//! specialization pass splices those constants in place of the parameters.
//! Independently, [`draw::draw`] renders an execution-manager instruction
//! trace as a UTF-8 circuit diagram.

pub mod convert;
pub mod draw;
pub mod state;
pub mod trace;
pub mod types;
pub mod utils;

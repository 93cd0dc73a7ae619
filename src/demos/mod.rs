//! Bundled test modules
//!
//! Modules compiled into the binary, one per file under this directory, so
//! `proving-ground run src/demos` works out of the box.

mod async_test;

use proving_ground::discovery::ModuleRegistry;

/// Registry of every bundled module, keyed by file stem
pub fn registry() -> ModuleRegistry {
    ModuleRegistry::new()
        .register("arithmetic_test", || Ok(arithmetic_test::module()))
        .register("async_test", || Ok(async_test::module()))
        .register("lifecycle_test", || Ok(lifecycle_test::module()))
}

//! tests/integration/mod.rs

mod adversarial;

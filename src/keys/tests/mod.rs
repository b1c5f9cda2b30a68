// src/keys/tests/mod.rs

//! Cross-crate scenario tests for the reliquary save engine. See `tests/`.

//! Workspace integration tests: engine lifecycle, event bus, hook registry,
//! and the marketing plugin stack loaded end to end.

mod events_test;
mod helpers;
mod hooks_test;
mod lifecycle_test;
mod marketing_test;

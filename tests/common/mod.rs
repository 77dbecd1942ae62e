#![allow(dead_code)]

pub mod fake;
pub mod repositories;

pub use entities::{Order, User};
pub use fake::{FakeDatabase, Faults, PlainRunner, STALL};
pub use repositories::{create_tables, drop_tables, Dialect, OrderRepository, UserRepository};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

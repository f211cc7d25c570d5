pub mod debounce;
pub mod time;

pub use debounce::Debouncer;

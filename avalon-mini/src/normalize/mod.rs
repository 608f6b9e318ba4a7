//! Turn parsed status into entity-ready state.
//!
//! Power is the one signal that is debounced: during soft start and stop
//! the device passes through `In Init` and briefly reports states that
//! would make a switch flicker. Everything else passes through as parsed.

mod power;
mod values;

pub use power::{DebouncedPowerState, PowerDebouncer, PowerTransition, normalize_power};
pub use values::{EntityValues, normalize_other};

//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements            | Connects to                  |
//! |------------|-----------------------|------------------------------|
//! | `log_sink` | EventSink             | `log` facade                 |
//! | `sim`      | RangeDevice, pins     | simulated columns/reservoir  |
//! | `storage`  | StoragePort           | in-memory key/value store    |
//! | `time`     | WallClock             | simulated calendar clock     |

pub mod log_sink;
pub mod sim;
pub mod storage;
pub mod time;

//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements    | Connects to                          |
//! |---------------|---------------|--------------------------------------|
//! | `rig`         | RigPort       | servo controller, actuator, dispenser|
//! | `camera`      | CameraPort    | simulated camera pair                |
//! | `operator`    | OperatorPort  | console prompt / unattended          |
//! | `config_file` | ConfigPort    | JSON file on disk                    |
//! | `log_sink`    | EventSink     | `log` facade                         |
//! | `time`        | DelayNs       | `std::thread::sleep`                 |

pub mod camera;
pub mod config_file;
pub mod log_sink;
pub mod operator;
pub mod rig;
pub mod time;

//! Serial rig adapter: bridges the three peripheral drivers to [`RigPort`].
//!
//! Owns one driver per serial line.  Lines are opened by
//! [`RigPort::connect`] through a [`PortOpener`], so tests can swap the
//! real character devices for in-memory transports.  This is the only
//! module that knows which device a command goes to.

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::app::ports::RigPort;
use crate::config::{Calibration, FeedMode, Gate, GateState, PortPaths, RigConfig, Timing};
use crate::drivers::{ActuatorBoard, DispenseOutcome, Dispenser, Maestro};
use crate::error::{Device, Error, Result};
use crate::serial::framing::LinkTiming;
use crate::serial::{CommandChannel, SerialChannel, Transport};

// ── Port opening ──────────────────────────────────────────────

/// Produces an opened transport for a device path.
pub trait PortOpener {
    type Port: Transport;

    fn open(&mut self, device: Device, path: &str) -> Result<Self::Port>;
}

/// Opens real serial lines at 9600 8N1 raw.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    type Port = SerialChannel;

    fn open(&mut self, device: Device, path: &str) -> Result<SerialChannel> {
        SerialChannel::open(device, path)
    }
}

// ── SerialRig ─────────────────────────────────────────────────

/// Concrete adapter that combines the three serial peripherals.
pub struct SerialRig<O: PortOpener, D> {
    opener: O,
    delay: D,
    paths: PortPaths,
    calibration: Calibration,
    timing: Timing,
    feed: FeedMode,
    servo: Option<Maestro<O::Port, D>>,
    actuator: Option<ActuatorBoard<O::Port, D>>,
    dispenser: Option<Dispenser<O::Port, D>>,
}

impl<O: PortOpener, D: DelayNs + Clone> SerialRig<O, D> {
    pub fn new(opener: O, delay: D, config: &RigConfig) -> Self {
        Self {
            opener,
            delay,
            paths: config.ports.clone(),
            calibration: config.calibration,
            timing: config.timing,
            feed: config.feed,
            servo: None,
            actuator: None,
            dispenser: None,
        }
    }

    pub fn is_connected(&self, device: Device) -> bool {
        match device {
            Device::ServoController => self.servo.is_some(),
            Device::Actuator => self.actuator.is_some(),
            Device::Dispenser => self.dispenser.is_some(),
        }
    }

    pub fn servo(&self) -> Option<&Maestro<O::Port, D>> {
        self.servo.as_ref()
    }

    fn channel(&mut self, device: Device, path: &str) -> Result<CommandChannel<O::Port, D>> {
        let port = self.opener.open(device, path)?;
        Ok(CommandChannel::new(
            device,
            port,
            self.delay.clone(),
            LinkTiming::from(&self.timing),
        ))
    }

    fn servo_mut(&mut self) -> Result<&mut Maestro<O::Port, D>> {
        self.servo
            .as_mut()
            .ok_or(Error::NotConnected(Device::ServoController))
    }

    fn actuator_mut(&mut self) -> Result<&mut ActuatorBoard<O::Port, D>> {
        self.actuator
            .as_mut()
            .ok_or(Error::NotConnected(Device::Actuator))
    }

    fn dispenser_mut(&mut self) -> Result<&mut Dispenser<O::Port, D>> {
        self.dispenser
            .as_mut()
            .ok_or(Error::NotConnected(Device::Dispenser))
    }
}

// ── RigPort implementation ────────────────────────────────────

impl<O: PortOpener, D: DelayNs + Clone> RigPort for SerialRig<O, D> {
    fn connect(&mut self) -> Result<()> {
        if self.servo.is_none() {
            let path = self.paths.servo_controller.clone();
            let link = self.channel(Device::ServoController, &path)?;
            self.servo = Some(Maestro::new(link, self.timing.servo_query_settle_ms));
        }
        if self.actuator.is_none() {
            let path = self.paths.actuator.clone();
            let link = self.channel(Device::Actuator, &path)?;
            self.actuator = Some(ActuatorBoard::new(link, self.timing.command_settle_ms));
        }
        if self.feed == FeedMode::Dispenser && self.dispenser.is_none() {
            let path = self
                .paths
                .dispenser
                .clone()
                .ok_or(Error::NotConnected(Device::Dispenser))?;
            let link = self.channel(Device::Dispenser, &path)?;
            self.dispenser = Some(Dispenser::new(
                link,
                self.timing.command_settle_ms,
                self.timing.dispenser_init_settle_ms,
                self.timing.dispense_status_budget_polls,
            ));
        }
        info!("rig connected ({:?} feed)", self.feed);
        Ok(())
    }

    fn set_gate(&mut self, gate: Gate, state: GateState) -> Result<()> {
        let target = self.calibration.target(gate, state);
        debug!("{:?} gate -> {:?} ({})", gate, state, target);
        self.servo_mut()?
            .set_target(gate.channel(), target)
            .map_err(|e| Error::protocol(Device::ServoController, e))
    }

    fn gate_position(&mut self, gate: Gate) -> Result<u16> {
        self.servo_mut()?
            .get_position(gate.channel())
            .map_err(|e| Error::protocol(Device::ServoController, e))
    }

    fn set_lights(&mut self, on: bool) -> Result<()> {
        self.actuator_mut()?
            .set_lights(on)
            .map_err(|e| Error::protocol(Device::Actuator, e))
    }

    fn step_vane(&mut self) -> Result<()> {
        self.actuator_mut()?
            .step_vane()
            .map_err(|e| Error::protocol(Device::Actuator, e))
    }

    fn stepper_off(&mut self) -> Result<()> {
        self.actuator_mut()?
            .stepper_off()
            .map_err(|e| Error::protocol(Device::Actuator, e))
    }

    fn set_pump(&mut self, on: bool) -> Result<()> {
        self.actuator_mut()?
            .set_pump(on)
            .map_err(|e| Error::protocol(Device::Actuator, e))
    }

    fn init_dispenser(&mut self) -> Result<()> {
        self.dispenser_mut()?
            .initialize()
            .map_err(|e| Error::protocol(Device::Dispenser, e))
    }

    fn dispense(&mut self) -> Result<DispenseOutcome> {
        self.dispenser_mut()?
            .dispense()
            .map_err(|e| Error::protocol(Device::Dispenser, e))
    }

    fn dispenser_version(&mut self) -> Result<String> {
        self.dispenser_mut()?
            .version()
            .map_err(|e| Error::protocol(Device::Dispenser, e))
    }

    fn disconnect(&mut self) {
        let open = Device::ALL
            .iter()
            .filter(|d| self.is_connected(**d))
            .count();
        // Dropping a driver drops its channel, which closes the line.
        self.servo = None;
        self.actuator = None;
        self.dispenser = None;
        if open > 0 {
            info!("rig disconnected ({} line(s) closed)", open);
        }
    }
}

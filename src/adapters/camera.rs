//! Simulated camera pair.
//!
//! Stands in for the vendor imaging binding, which stays outside this
//! crate.  Each capture window yields the requested number of frames;
//! "saving" a frame records its file name (`Upper007.png`) and logs it.
//! Individual grabs can be scripted to fail to exercise the error path.

use std::collections::HashSet;

use log::info;

use crate::app::ports::{CameraPort, CameraRole, GrabResult};
use crate::error::{Error, Result};

/// Vendor-style error code reported for a scripted grab failure.
pub const SIMULATED_GRAB_ERROR: u32 = 0xE100_0014;

#[derive(Debug, Default)]
struct SimCamera {
    attached: Option<usize>,
    pending: u32,
    /// Retrieval number within the current window, from 0.
    served: u32,
}

/// Two cameras with fixed friendly names.
#[derive(Debug)]
pub struct SimulatedCameras {
    names: Vec<String>,
    upper: SimCamera,
    lower: SimCamera,
    failing: HashSet<(CameraRole, u32)>,
    saved: Vec<String>,
    open: bool,
}

impl Default for SimulatedCameras {
    fn default() -> Self {
        Self::new(vec!["upper (simulated)".into(), "lower (simulated)".into()])
    }
}

impl SimulatedCameras {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            upper: SimCamera::default(),
            lower: SimCamera::default(),
            failing: HashSet::new(),
            saved: Vec::new(),
            open: false,
        }
    }

    /// Make retrieval number `frame` of every `role` window fail.
    pub fn fail_grab(mut self, role: CameraRole, frame: u32) -> Self {
        self.failing.insert((role, frame));
        self
    }

    /// File names of every frame saved so far.
    pub fn saved(&self) -> &[String] {
        &self.saved
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn camera(&mut self, role: CameraRole) -> &mut SimCamera {
        match role {
            CameraRole::Upper => &mut self.upper,
            CameraRole::Lower => &mut self.lower,
        }
    }
}

impl CameraPort for SimulatedCameras {
    fn enumerate(&mut self) -> Result<Vec<String>> {
        Ok(self.names.clone())
    }

    fn attach(&mut self, role: CameraRole, index: usize) -> Result<()> {
        if index >= self.names.len() {
            return Err(Error::Camera(format!("no camera at index {index}")));
        }
        info!("{} camera attached to {:?}", role.label(), self.names[index]);
        self.camera(role).attached = Some(index);
        self.open = true;
        Ok(())
    }

    fn start_capture(&mut self, role: CameraRole, frames: u32) -> Result<()> {
        let cam = self.camera(role);
        if cam.attached.is_none() {
            return Err(Error::Camera(format!("{} camera not attached", role.label())));
        }
        cam.pending = frames;
        cam.served = 0;
        Ok(())
    }

    fn is_capturing(&mut self, role: CameraRole) -> bool {
        self.camera(role).pending > 0
    }

    fn retrieve(&mut self, role: CameraRole, image_index: u32) -> Result<GrabResult> {
        let cam = self.camera(role);
        if cam.pending == 0 {
            return Err(Error::Camera(format!("{} camera is not grabbing", role.label())));
        }
        cam.pending -= 1;
        let frame = cam.served;
        cam.served += 1;

        if self.failing.contains(&(role, frame)) {
            return Ok(GrabResult::failed(SIMULATED_GRAB_ERROR, "simulated frame loss"));
        }
        let name = format!("{}{:03}.png", role.label(), image_index);
        info!("writing image {}", name);
        self.saved.push(name);
        Ok(GrabResult::ok())
    }

    fn close(&mut self) {
        if self.open {
            info!("cameras closed");
        }
        self.open = false;
        self.upper = SimCamera::default();
        self.lower = SimCamera::default();
    }
}

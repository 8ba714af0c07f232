use crate::DisplayInfo;
use tracing::{debug, info, warn};

/// Frames between two output-topology polls.
pub const POLL_INTERVAL_FRAMES: u64 = 120;

/// Detects newly connected outputs by diffing the output set.
///
/// winit reports no hot-plug events, so the set is polled from the
/// render loop. Everything present at the first poll counts as new.
pub struct OutputWatcher {
    known: Vec<DisplayInfo>,
    frames_until_poll: u64,
}

impl OutputWatcher {
    pub fn new() -> Self {
        Self {
            known: Vec::new(),
            frames_until_poll: 0,
        }
    }

    /// Advance one frame. Returns true when the outputs should be polled.
    pub fn tick(&mut self) -> bool {
        if self.frames_until_poll == 0 {
            self.frames_until_poll = POLL_INTERVAL_FRAMES - 1;
            true
        } else {
            self.frames_until_poll -= 1;
            false
        }
    }

    /// Record the current output set and return the outputs that were not
    /// present at the previous poll.
    pub fn diff(&mut self, outputs: &[DisplayInfo]) -> Vec<DisplayInfo> {
        let added: Vec<DisplayInfo> = outputs
            .iter()
            .filter(|o| !self.known.contains(o))
            .cloned()
            .collect();
        let removed = self.known.iter().filter(|k| !outputs.contains(k)).count();

        if !added.is_empty() || removed > 0 {
            debug!(added = added.len(), removed, total = outputs.len(), "Output set changed");
        }
        self.known = outputs.to_vec();
        added
    }
}

impl Default for OutputWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// What [`DisplayPlacement::on_outputs_added`] decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementDecision {
    /// Move and resize the window onto this output.
    MoveTo(DisplayInfo),
    /// The window already sits on a matching output.
    AlreadyPlaced,
    /// No other output has the headset resolution.
    NoMatch,
    /// Several outputs match; leave the choice to the user.
    Ambiguous(usize),
    /// The headset resolution was never read.
    UnknownResolution,
    /// A move already happened.
    Disarmed,
}

/// Moves the window onto the output whose resolution matches the
/// headset panel. One-shot: disarms after the first move.
pub struct DisplayPlacement {
    native_resolution: Option<(u32, u32)>,
    armed: bool,
}

impl DisplayPlacement {
    pub fn new(native_resolution: Option<(u32, u32)>) -> Self {
        Self {
            native_resolution,
            armed: true,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Decide where the window goes after outputs appeared.
    pub fn on_outputs_added(
        &mut self,
        current: Option<&DisplayInfo>,
        outputs: &[DisplayInfo],
    ) -> PlacementDecision {
        if !self.armed {
            return PlacementDecision::Disarmed;
        }

        let Some(native) = self.native_resolution else {
            warn!("Headset resolution unknown, not placing window");
            return PlacementDecision::UnknownResolution;
        };

        if current.is_some_and(|c| c.size() == native) {
            debug!(?native, "Window already on headset output");
            return PlacementDecision::AlreadyPlaced;
        }

        let candidates: Vec<&DisplayInfo> = outputs
            .iter()
            .filter(|o| Some(*o) != current && o.size() == native)
            .collect();

        match candidates.as_slice() {
            [] => {
                debug!(?native, outputs = outputs.len(), "No output matches headset");
                PlacementDecision::NoMatch
            }
            [target] => {
                info!(
                    name = ?target.name,
                    x = target.position.0,
                    y = target.position.1,
                    width = target.width,
                    height = target.height,
                    "Moving window to headset output"
                );
                self.armed = false;
                PlacementDecision::MoveTo((*target).clone())
            }
            many => {
                info!(matches = many.len(), "Several outputs match headset, not moving");
                PlacementDecision::Ambiguous(many.len())
            }
        }
    }
}

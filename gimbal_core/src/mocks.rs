//! Test and helper doubles for gimbal_core.
//!
//! Clones share state, so a test keeps one handle for scripting and
//! inspection while the controller owns the other.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use gimbal_traits::{BoxError, OrientationSensor, PulseActuator, SensorOffsets};

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<(f32, f32)>,
    current: (f32, f32),
    refreshes: usize,
    disconnected: bool,
    /// A disconnected sensor comes back on the next reconnect.
    revivable: bool,
    offsets: Option<SensorOffsets>,
    installed: Vec<SensorOffsets>,
}

/// Orientation sensor replaying a queue of `(az, el)` readings.
///
/// Each refresh pops the next reading; once the queue is empty the last
/// reading repeats.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    inner: Rc<RefCell<Script>>,
    az: f32,
    el: f32,
}

impl ScriptedSensor {
    pub fn new(readings: impl IntoIterator<Item = (f32, f32)>) -> Self {
        let s = Self::default();
        s.push(readings);
        s
    }

    pub fn push(&self, readings: impl IntoIterator<Item = (f32, f32)>) {
        self.inner.borrow_mut().queue.extend(readings);
    }

    /// Replace the queue with one reading that repeats indefinitely.
    pub fn hold(&self, az: f32, el: f32) {
        let mut s = self.inner.borrow_mut();
        s.queue.clear();
        s.current = (az, el);
    }

    pub fn refreshes(&self) -> usize {
        self.inner.borrow().refreshes
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.borrow_mut().disconnected = !connected;
    }

    /// Let the next `reconnect` succeed.
    pub fn set_revivable(&self, revivable: bool) {
        self.inner.borrow_mut().revivable = revivable;
    }

    /// Offsets reported by `read_offsets`.
    pub fn set_offsets(&self, offsets: Option<SensorOffsets>) {
        self.inner.borrow_mut().offsets = offsets;
    }

    /// Every block passed to `write_offsets`, oldest first.
    pub fn installed_offsets(&self) -> Vec<SensorOffsets> {
        self.inner.borrow().installed.clone()
    }
}

impl OrientationSensor for ScriptedSensor {
    fn refresh(&mut self) -> Result<(), BoxError> {
        let mut s = self.inner.borrow_mut();
        s.refreshes += 1;
        if let Some(next) = s.queue.pop_front() {
            s.current = next;
        }
        (self.az, self.el) = s.current;
        Ok(())
    }

    fn azimuth(&self) -> f32 {
        self.az
    }

    fn elevation(&self) -> f32 {
        self.el
    }

    fn is_connected(&self) -> bool {
        !self.inner.borrow().disconnected
    }

    fn reconnect(&mut self) -> Result<bool, BoxError> {
        let mut s = self.inner.borrow_mut();
        if s.revivable {
            s.disconnected = false;
        }
        Ok(!s.disconnected)
    }

    fn read_offsets(&mut self) -> Result<Option<SensorOffsets>, BoxError> {
        Ok(self.inner.borrow().offsets)
    }

    fn write_offsets(&mut self, offsets: &SensorOffsets) -> Result<(), BoxError> {
        let mut s = self.inner.borrow_mut();
        s.installed.push(*offsets);
        s.offsets = Some(*offsets);
        Ok(())
    }
}

#[derive(Debug)]
struct Spy {
    writes: Vec<(u8, u16)>,
    present: bool,
    fault: bool,
    /// Writes fail after being recorded.
    failing: bool,
}

/// Pulse actuator recording every `(channel, ticks)` write.
#[derive(Debug, Clone)]
pub struct SpyActuator {
    inner: Rc<RefCell<Spy>>,
}

impl Default for SpyActuator {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Spy {
                writes: Vec::new(),
                present: true,
                fault: false,
                failing: false,
            })),
        }
    }
}

impl SpyActuator {
    pub fn absent() -> Self {
        let a = Self::default();
        a.set_present(false);
        a
    }

    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.inner.borrow().writes.clone()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().writes.clear();
    }

    pub fn set_present(&self, present: bool) {
        self.inner.borrow_mut().present = present;
    }

    pub fn set_fault(&self, fault: bool) {
        self.inner.borrow_mut().fault = fault;
    }

    /// Make every following write report a bus error.
    pub fn set_failing(&self, failing: bool) {
        self.inner.borrow_mut().failing = failing;
    }
}

impl PulseActuator for SpyActuator {
    fn is_present(&self) -> bool {
        self.inner.borrow().present
    }

    fn fault(&self) -> bool {
        self.inner.borrow().fault
    }

    fn write_ticks(&mut self, channel: u8, ticks: u16) -> Result<(), BoxError> {
        let mut spy = self.inner.borrow_mut();
        spy.writes.push((channel, ticks));
        if spy.failing {
            return Err("pulse controller write NAKed".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_reading_repeats() {
        let mut s = ScriptedSensor::new([(1.0, 2.0), (3.0, 4.0)]);
        let handle = s.clone();
        for _ in 0..3 {
            s.refresh().unwrap();
        }
        assert_eq!((s.azimuth(), s.elevation()), (3.0, 4.0));
        assert_eq!(handle.refreshes(), 3);
    }

    #[test]
    fn spy_shares_writes_across_clones() {
        let mut a = SpyActuator::default();
        let handle = a.clone();
        a.write_ticks(1, 300).unwrap();
        assert_eq!(handle.writes(), vec![(1, 300)]);
    }

    #[test]
    fn revivable_sensor_returns_on_reconnect() {
        let mut s = ScriptedSensor::default();
        s.set_connected(false);
        assert!(!s.reconnect().unwrap());
        s.set_revivable(true);
        assert!(s.reconnect().unwrap());
        assert!(s.is_connected());
    }
}

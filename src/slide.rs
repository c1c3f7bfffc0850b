//! Parameter sliding
//!
//! A slide moves one channel parameter (volume, pitch or pan) linearly from
//! its current value to a target over a fixed duration. Slides are advanced
//! by the owning player once per `update` tick; the engine itself never
//! touches the native channel, it only reports the values to apply.

use std::time::Duration;

use crate::backend::ChannelAttribute;

/// Parameter a slide operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlideParameter {
    /// Channel volume
    Volume,
    /// Channel pitch
    Pitch,
    /// Channel pan
    Pan,
}

impl SlideParameter {
    /// All parameters, in processing order.
    pub const ALL: [SlideParameter; 3] = [
        SlideParameter::Volume,
        SlideParameter::Pitch,
        SlideParameter::Pan,
    ];

    /// Native attribute this parameter maps to.
    pub fn attribute(self) -> ChannelAttribute {
        match self {
            SlideParameter::Volume => ChannelAttribute::Volume,
            SlideParameter::Pitch => ChannelAttribute::Pitch,
            SlideParameter::Pan => ChannelAttribute::Pan,
        }
    }

    /// Clamp a value into this parameter's valid range.
    pub fn clamp(self, value: f32) -> f32 {
        self.attribute().clamp(value)
    }

    fn index(self) -> usize {
        match self {
            SlideParameter::Volume => 0,
            SlideParameter::Pitch => 1,
            SlideParameter::Pan => 2,
        }
    }
}

/// One in-flight interpolation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlideOperation {
    active: bool,
    start: f32,
    end: f32,
    elapsed: Duration,
    duration: Duration,
}

impl SlideOperation {
    /// Start a slide from `start` to `end`.
    pub fn new(start: f32, end: f32, duration: Duration) -> Self {
        Self {
            active: true,
            start,
            end,
            elapsed: Duration::ZERO,
            duration,
        }
    }

    /// Check if the slide is still running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Value the slide started from.
    pub fn start_value(&self) -> f32 {
        self.start
    }

    /// Value the slide ends at.
    pub fn end_value(&self) -> f32 {
        self.end
    }

    /// Time accumulated so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Total slide duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Interpolation factor in 0.0..=1.0.
    ///
    /// A zero duration is always complete.
    pub fn factor(&self) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Stop the slide where it is.
    pub fn cancel(&mut self) {
        self.active = false;
    }

    /// Accumulate `elapsed` and compute the value to apply.
    ///
    /// Returns `None` for an inactive slide. The final step yields exactly
    /// the end value and deactivates the slide.
    pub fn advance(&mut self, elapsed: Duration) -> Option<(f32, bool)> {
        if !self.active {
            return None;
        }
        self.elapsed = self.elapsed.saturating_add(elapsed);

        let factor = self.factor();
        if factor >= 1.0 {
            self.active = false;
            return Some((self.end, true));
        }
        let value = self.start as f64 + (self.end as f64 - self.start as f64) * factor;
        Some((value as f32, false))
    }
}

/// Value produced by one slide during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideStep {
    /// Parameter being slid
    pub parameter: SlideParameter,
    /// Clamped value to apply
    pub value: f32,
    /// The slide completed on this step
    pub finished: bool,
}

/// Slides for volume, pitch and pan of one channel.
#[derive(Debug, Clone, Default)]
pub struct SlideEngine {
    operations: [SlideOperation; 3],
}

impl SlideEngine {
    /// Create an engine with no active slides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a slide, replacing any slide already running on `parameter`.
    pub fn begin(&mut self, parameter: SlideParameter, from: f32, to: f32, duration: Duration) {
        self.operations[parameter.index()] =
            SlideOperation::new(parameter.clamp(from), parameter.clamp(to), duration);
    }

    /// Cancel the slide on one parameter.
    pub fn cancel(&mut self, parameter: SlideParameter) {
        self.operations[parameter.index()].cancel();
    }

    /// Cancel every slide.
    pub fn reset(&mut self) {
        self.operations = Default::default();
    }

    /// Check if a parameter is currently sliding.
    pub fn is_sliding(&self, parameter: SlideParameter) -> bool {
        self.operations[parameter.index()].is_active()
    }

    /// Check if any parameter is sliding.
    pub fn any_active(&self) -> bool {
        self.operations.iter().any(SlideOperation::is_active)
    }

    /// The operation for one parameter.
    pub fn operation(&self, parameter: SlideParameter) -> &SlideOperation {
        &self.operations[parameter.index()]
    }

    /// Advance every active slide by `elapsed`.
    ///
    /// Steps come back in volume, pitch, pan order; inactive slides yield
    /// `None`.
    pub fn advance(&mut self, elapsed: Duration) -> [Option<SlideStep>; 3] {
        let mut steps = [None; 3];
        for parameter in SlideParameter::ALL {
            let operation = &mut self.operations[parameter.index()];
            let step = operation.advance(elapsed).map(|(value, finished)| SlideStep {
                parameter,
                value: parameter.clamp(value),
                finished,
            });
            steps[parameter.index()] = step;
        }
        steps
    }
}

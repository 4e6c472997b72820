use bevy::prelude::*;

/// Seconds over which the locomotion speed parameter catches up to its
/// target, smoothing blend-space transitions.
const SPEED_SMOOTH_TIME: f32 = 0.1;

/// Animation-facing parameters written by gameplay and read by the animation
/// layer. Gameplay never talks to clips or blend trees directly; it only
/// updates this sink.
#[derive(Component, Debug, Default)]
pub struct AnimationParams {
    locomotion_speed: f32,
    carrying: bool,
    aiming: bool,
    knocked_down: bool,
}

impl AnimationParams {
    /// 0 is idle, 1 is walking, 2 is running. Smoothed, so blends between
    /// locomotion clips stay continuous.
    pub fn locomotion_speed(&self) -> f32 {
        self.locomotion_speed
    }

    pub fn damp_locomotion_speed(&mut self, target: f32, delta: f32) {
        let t = (delta / SPEED_SMOOTH_TIME).min(1.0);
        self.locomotion_speed += (target - self.locomotion_speed) * t;
    }

    pub fn carrying(&self) -> bool {
        self.carrying
    }

    pub fn set_carrying(&mut self, carrying: bool) {
        self.carrying = carrying;
    }

    pub fn aiming(&self) -> bool {
        self.aiming
    }

    pub fn set_aiming(&mut self, aiming: bool) {
        self.aiming = aiming;
    }

    pub fn knocked_down(&self) -> bool {
        self.knocked_down
    }

    pub fn set_knocked_down(&mut self, knocked_down: bool) {
        self.knocked_down = knocked_down;
    }
}

/// Current animation state of the player. `Running` and `CarryRunning` carry
/// the blend speed; the variant, not the value, decides clip changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationState {
    Idle,
    Walking,
    Running(f32),
    CarryIdle,
    CarryWalking,
    CarryRunning(f32),
    Aiming,
    Knockdown,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self::Idle
    }
}

//! Frame-stepped spring and decay curves driving the zoom layer's animations.

use kurbo::Vec2;

/// Velocity threshold of a spring, relative to its value threshold.
const VELOCITY_THRESHOLD_MULTIPLIER: f64 = 62.5;

/// Damped harmonic oscillator with unit mass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spring {
    pub stiffness: f64,
    pub damping_ratio: f64,
}

impl Spring {
    pub fn new(stiffness: f64, damping_ratio: f64) -> Self {
        Self {
            stiffness,
            damping_ratio,
        }
    }

    /// Closed-form state after `dt` seconds, starting at `displacement` from rest
    /// with `velocity`. Returns the new `(displacement, velocity)`.
    pub fn step(&self, displacement: f64, velocity: f64, dt: f64) -> (f64, f64) {
        let omega = self.stiffness.max(0.0).sqrt();
        let zeta = self.damping_ratio.max(0.0);
        let x0 = displacement;
        let v0 = velocity;

        if omega == 0.0 {
            return (x0 + v0 * dt, v0);
        }

        if zeta < 1.0 {
            let omega_d = omega * (1.0 - zeta * zeta).sqrt();
            let decay = (-zeta * omega * dt).exp();
            let (sin, cos) = (omega_d * dt).sin_cos();
            let b = (v0 + zeta * omega * x0) / omega_d;
            let x = decay * (x0 * cos + b * sin);
            let v = decay
                * ((b * omega_d - zeta * omega * x0) * cos - (x0 * omega_d + zeta * omega * b) * sin);
            (x, v)
        } else if zeta == 1.0 {
            let decay = (-omega * dt).exp();
            let b = v0 + omega * x0;
            let x = (x0 + b * dt) * decay;
            let v = (v0 - omega * dt * b) * decay;
            (x, v)
        } else {
            let root = (zeta * zeta - 1.0).sqrt();
            let r1 = -omega * (zeta - root);
            let r2 = -omega * (zeta + root);
            let c1 = (v0 - r2 * x0) / (r1 - r2);
            let c2 = x0 - c1;
            let e1 = (r1 * dt).exp();
            let e2 = (r2 * dt).exp();
            (c1 * e1 + c2 * e2, c1 * r1 * e1 + c2 * r2 * e2)
        }
    }
}

/// One-dimensional spring animation toward a fixed target.
#[derive(Clone, Debug)]
pub struct SpringAnimation {
    spring: Spring,
    value: f64,
    velocity: f64,
    target: f64,
    threshold: f64,
}

impl SpringAnimation {
    pub fn new(spring: Spring, from: f64, target: f64, threshold: f64) -> Self {
        Self {
            spring,
            value: from,
            velocity: 0.0,
            target,
            threshold,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        (self.value - self.target).abs() < self.threshold
            && self.velocity.abs() < self.threshold * VELOCITY_THRESHOLD_MULTIPLIER
    }

    /// Advance by `dt` seconds. Snaps to the target and returns true once settled.
    pub fn advance(&mut self, dt: f64) -> bool {
        let (x, v) = self.spring.step(self.value - self.target, self.velocity, dt);
        self.value = self.target + x;
        self.velocity = v;
        if self.is_settled() {
            self.value = self.target;
            self.velocity = 0.0;
            true
        } else {
            false
        }
    }
}

/// Two independent springs sharing parameters, used for translation.
#[derive(Clone, Debug)]
pub struct SpringAnimation2D {
    x: SpringAnimation,
    y: SpringAnimation,
}

impl SpringAnimation2D {
    pub fn new(spring: Spring, from: Vec2, target: Vec2, threshold: f64) -> Self {
        Self {
            x: SpringAnimation::new(spring, from.x, target.x, threshold),
            y: SpringAnimation::new(spring, from.y, target.y, threshold),
        }
    }

    pub fn value(&self) -> Vec2 {
        Vec2::new(self.x.value(), self.y.value())
    }

    pub fn advance(&mut self, dt: f64) -> bool {
        let done_x = self.x.advance(dt);
        let done_y = self.y.advance(dt);
        done_x && done_y
    }
}

/// Exponential velocity decay: `v(t) = v0 * exp(-friction * t)`.
#[derive(Clone, Debug)]
pub struct DecayAnimation {
    velocity: Vec2,
    friction: f64,
    stop_velocity: f64,
}

impl DecayAnimation {
    pub fn new(velocity: Vec2, friction: f64, stop_velocity: f64) -> Self {
        Self {
            velocity,
            friction,
            stop_velocity,
        }
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn is_settled(&self) -> bool {
        self.velocity.x.abs() <= self.stop_velocity && self.velocity.y.abs() <= self.stop_velocity
    }

    /// Advance by `dt` seconds and return the displacement covered.
    pub fn advance(&mut self, dt: f64) -> Vec2 {
        if self.friction <= 0.0 {
            return self.velocity * dt;
        }
        let decay = (-self.friction * dt).exp();
        let delta = self.velocity * ((1.0 - decay) / self.friction);
        self.velocity = self.velocity * decay;
        delta
    }
}

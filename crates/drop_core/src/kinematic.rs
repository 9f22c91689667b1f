//! Analytic bounce integrator.
//!
//! Velocity is a per-frame displacement along the fall axis, positive while
//! falling. Each frame above the rest height adds `gravity * scale_factor * dt`
//! to it and moves the object down by it. Reaching the rest height while
//! falling puts the object back on the rest height and reflects the velocity
//! with a restitution factor, so it rises again and bounces with decaying
//! amplitude until it settles.
//!
//! A rebound never leaves faster than the previous rebound, scaled by the
//! restitution. Without that cap the extra gravity picked up on the crossing
//! frame feeds energy back in at large `gravity * dt`.
//!
//! No ECS here, just math. The controller owns the state between frames.

use serde::{Deserialize, Serialize};

/// When the bounce reflection is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BounceRule {
    /// Reflect once per downward crossing of the rest height.
    #[default]
    OncePerCrossing,
    /// Reflect on every frame spent at or below the rest height, including
    /// frames where the object is already moving back up.
    EveryFrameBelowRest,
}

/// Tunables for the bounce model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicParams {
    /// Height of the object's center when resting on the ground (half-height)
    pub rest_y: f32,
    /// Fraction of speed kept after a bounce
    pub restitution: f32,
    /// Converts gravity (m/s^2) into per-frame displacement gain
    pub scale_factor: f32,
    /// Rebound speed below which the object snaps to rest
    pub settle_speed: f32,
    pub bounce_rule: BounceRule,
}

impl Default for KinematicParams {
    fn default() -> Self {
        Self {
            rest_y: 0.5,
            restitution: 0.8,
            // 9.81 * scale * (1/60) == 0.01 per frame
            scale_factor: 0.6 / 9.81,
            settle_speed: 0.005,
            bounce_rule: BounceRule::OncePerCrossing,
        }
    }
}

/// Position and velocity along the fall axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicState {
    pub height: f32,
    /// Per-frame displacement, positive = falling
    pub velocity: f32,
    /// Set once a bounce rebounds slower than `settle_speed`
    pub settled: bool,
    /// Speed of the last rebound, zero before the first bounce
    pub rebound_speed: f32,
}

impl KinematicState {
    /// At rest at the given height.
    pub fn at_rest(height: f32) -> Self {
        Self {
            height,
            velocity: 0.0,
            settled: false,
            rebound_speed: 0.0,
        }
    }
}

/// Result of one [`advance`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicStep {
    pub state: KinematicState,
    /// True when this step reflected the velocity
    pub flipped: bool,
}

/// Advance the bounce model by one frame.
pub fn advance(
    state: KinematicState,
    gravity: f32,
    params: &KinematicParams,
    dt: f32,
) -> KinematicStep {
    if state.settled {
        return KinematicStep {
            state,
            flipped: false,
        };
    }

    let below_rest = state.height <= params.rest_y;
    let flip = match params.bounce_rule {
        BounceRule::OncePerCrossing => below_rest && state.velocity > 0.0,
        BounceRule::EveryFrameBelowRest => below_rest,
    };

    let mut next = state;
    if flip {
        next.velocity = match params.bounce_rule {
            BounceRule::OncePerCrossing => {
                next.height = params.rest_y;
                let mut impact = state.velocity;
                if state.rebound_speed > 0.0 {
                    impact = impact.min(state.rebound_speed);
                }
                -impact * params.restitution
            }
            BounceRule::EveryFrameBelowRest => -state.velocity * params.restitution,
        };
        if next.velocity.abs() < params.settle_speed {
            next.velocity = 0.0;
            next.height = params.rest_y;
            next.settled = true;
            return KinematicStep {
                state: next,
                flipped: true,
            };
        }
        next.rebound_speed = next.velocity.abs();
    } else {
        next.velocity += gravity * params.scale_factor * dt;
    }
    next.height -= next.velocity;

    KinematicStep {
        state: next,
        flipped: flip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const DT: f32 = 1.0 / 60.0;
    const G: f32 = 9.81;

    #[test]
    fn test_default_gain_is_one_hundredth_per_frame() {
        let params = KinematicParams::default();
        let step = advance(KinematicState::at_rest(3.0), G, &params, DT);
        assert!((step.state.velocity - 0.01).abs() < 1e-6);
        assert!((step.state.height - 2.99).abs() < 1e-6);
        assert!(!step.flipped);
    }

    #[test]
    fn test_velocity_increases_while_above_rest() {
        let params = KinematicParams::default();
        let mut state = KinematicState::at_rest(3.0);

        for _ in 0..500 {
            if state.settled {
                break;
            }
            let step = advance(state, G, &params, DT);
            if state.height > params.rest_y {
                assert!(
                    step.state.velocity > state.velocity,
                    "velocity should grow above rest: {} -> {}",
                    state.velocity,
                    step.state.velocity
                );
                assert!(!step.flipped);
            }
            state = step.state;
        }
    }

    #[test]
    fn test_one_flip_per_downward_crossing() {
        let run = run_drop(G, DT, 3.0);
        assert!(run.flips >= 2, "expected several bounces, got {}", run.flips);
        assert_eq!(run.flips, run.crossings);
    }

    #[test]
    fn test_no_flip_on_consecutive_frames_below_rest() {
        let params = KinematicParams::default();
        // Deep below rest, falling
        let state = KinematicState {
            height: 0.2,
            velocity: 0.1,
            ..Default::default()
        };

        let first = advance(state, G, &params, DT);
        assert!(first.flipped);
        assert!(first.state.velocity < 0.0);
        assert!(
            first.state.height > params.rest_y,
            "rebound starts from the rest height"
        );

        let second = advance(first.state, G, &params, DT);
        assert!(!second.flipped, "must not reflect again while rising");
        assert!(second.state.height > first.state.height);
    }

    #[test]
    fn test_every_frame_rule_reproduces_repeated_flips() {
        let params = KinematicParams {
            bounce_rule: BounceRule::EveryFrameBelowRest,
            ..Default::default()
        };
        let state = KinematicState {
            height: 0.2,
            velocity: 0.1,
            ..Default::default()
        };

        let first = advance(state, G, &params, DT);
        let second = advance(first.state, G, &params, DT);

        assert!(first.flipped);
        assert!(second.flipped);
        assert!(second.state.velocity > 0.0);
    }

    #[test]
    fn test_bounce_applies_restitution() {
        let params = KinematicParams::default();
        let state = KinematicState {
            height: 0.45,
            velocity: 0.2,
            ..Default::default()
        };

        let step = advance(state, G, &params, DT);

        assert!(step.flipped);
        assert!((step.state.velocity + 0.16).abs() < 1e-6);
        assert!((step.state.height - 0.66).abs() < 1e-6);
        assert!((step.state.rebound_speed - 0.16).abs() < 1e-6);
    }

    #[test]
    fn test_rebound_capped_by_previous_rebound() {
        let params = KinematicParams::default();
        let state = KinematicState {
            height: 0.45,
            velocity: 0.3,
            rebound_speed: 0.1,
            ..Default::default()
        };

        let step = advance(state, G, &params, DT);
        assert!((step.state.velocity + 0.08).abs() < 1e-6);
    }

    #[test]
    fn test_slow_rebound_settles_at_rest() {
        let params = KinematicParams::default();
        let state = KinematicState {
            height: 0.49,
            velocity: 0.004,
            ..Default::default()
        };

        let step = advance(state, G, &params, DT);
        assert!(step.state.settled);
        assert_eq!(step.state.height, params.rest_y);
        assert_eq!(step.state.velocity, 0.0);

        let idle = advance(step.state, G, &params, DT);
        assert_eq!(idle.state, step.state);
        assert!(!idle.flipped);
    }

    #[test]
    fn test_drop_eventually_settles() {
        let params = KinematicParams::default();
        let mut state = KinematicState::at_rest(3.0);
        for _ in 0..5_000 {
            state = advance(state, G, &params, DT).state;
        }
        assert!(state.settled);
        assert_eq!(state.height, params.rest_y);
    }

    struct DropRun {
        flips: usize,
        crossings: usize,
        settled: bool,
        lowest: f32,
        fastest: f32,
    }

    fn run_drop(gravity: f32, dt: f32, height: f32) -> DropRun {
        let params = KinematicParams::default();
        let mut state = KinematicState::at_rest(height);
        let mut run = DropRun {
            flips: 0,
            crossings: 0,
            settled: false,
            lowest: height,
            fastest: 0.0,
        };
        for _ in 0..200_000 {
            let step = advance(state, gravity, &params, dt);
            if state.height > params.rest_y && step.state.height <= params.rest_y {
                run.crossings += 1;
            }
            if step.flipped {
                run.flips += 1;
            }
            run.lowest = run.lowest.min(step.state.height);
            run.fastest = run.fastest.max(step.state.velocity.abs());
            state = step.state;
            if state.settled {
                run.settled = true;
                break;
            }
        }
        run
    }

    fn assert_well_behaved(run: &DropRun, label: &str) {
        let rest_y = KinematicParams::default().rest_y;
        assert!(run.settled, "{}: never settled", label);
        assert_eq!(run.flips, run.crossings, "{}: flips vs crossings", label);
        assert!(run.flips >= 1, "{}: expected at least one bounce", label);
        assert!(
            run.lowest >= rest_y - run.fastest - 1e-5,
            "{}: sank to {} (max speed {})",
            label,
            run.lowest,
            run.fastest
        );
    }

    #[test]
    fn test_presets_and_timesteps_settle_with_one_flip_per_crossing() {
        for gravity in [9.81, 5.76] {
            for dt in [1.0 / 144.0, 1.0 / 60.0, 1.0 / 30.0, 0.1, 0.5] {
                let run = run_drop(gravity, dt, 3.0);
                assert_well_behaved(&run, &format!("g={} dt={}", gravity, dt));
            }
        }
    }

    #[test]
    fn test_random_gravity_and_timestep_settle() {
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let gravity: f32 = rng.gen_range(1.0..30.0);
            let dt: f32 = rng.gen_range(0.002..0.5);
            let height: f32 = rng.gen_range(0.6..10.0);
            let run = run_drop(gravity, dt, height);
            assert_well_behaved(
                &run,
                &format!("seed={} g={} dt={} h={}", seed, gravity, dt, height),
            );
        }
    }
}

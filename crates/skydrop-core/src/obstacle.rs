//! Transient in-flight obstacle detection and the reroute policy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use crate::grid::{Cell, Grid};
use crate::planner::{find_path, Route};

/// How a traversal recovers after an obstacle is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReroutePolicy {
    /// Pause, then continue along the remaining route
    #[default]
    Hold,
    /// Pause, then re-plan from the current cell to the leg goal
    Replan,
}

impl FromStr for ReroutePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hold" => Ok(ReroutePolicy::Hold),
            "replan" => Ok(ReroutePolicy::Replan),
            other => Err(format!("unknown reroute policy '{}'", other)),
        }
    }
}

/// Stochastic obstacle sensor shared by every order task.
pub struct ObstacleMonitor {
    probability: f64,
    policy: ReroutePolicy,
    pause: Duration,
    rng: Mutex<StdRng>,
}

impl ObstacleMonitor {
    /// `probability` is clamped to [0, 1].
    pub fn new(probability: f64, policy: ReroutePolicy, pause: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            probability: probability.clamp(0.0, 1.0),
            policy,
            pause,
            rng: Mutex::new(rng),
        }
    }

    /// A monitor that never reports obstacles.
    pub fn disabled() -> Self {
        Self::new(0.0, ReroutePolicy::Hold, Duration::ZERO, Some(0))
    }

    pub fn policy(&self) -> ReroutePolicy {
        self.policy
    }

    /// Whether a transient obstacle blocks the next step.
    pub fn detected(&self) -> bool {
        if self.probability <= 0.0 {
            return false;
        }
        if self.probability >= 1.0 {
            return true;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.random_bool(self.probability),
            Err(poisoned) => poisoned.into_inner().random_bool(self.probability),
        }
    }

    /// Recover from a detected obstacle without losing progress.
    ///
    /// `remaining` holds the cells still to visit, `current` is where the
    /// vehicle is now and `goal` is the end of the leg. The returned route
    /// again holds only cells still to visit.
    pub async fn reroute(&self, current: Cell, goal: Cell, remaining: &[Cell], grid: &Grid) -> Route {
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }

        match self.policy {
            ReroutePolicy::Hold => remaining.to_vec(),
            ReroutePolicy::Replan => {
                let fresh = find_path(current, goal, grid);
                if fresh.is_empty() {
                    tracing::debug!("Replan from {} to {} found nothing, holding course", current, goal);
                    remaining.to_vec()
                } else {
                    fresh.into_iter().skip(1).collect()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_one_probabilities_are_absolute() {
        let never = ObstacleMonitor::new(0.0, ReroutePolicy::Hold, Duration::ZERO, Some(1));
        let always = ObstacleMonitor::new(1.0, ReroutePolicy::Hold, Duration::ZERO, Some(1));
        for _ in 0..100 {
            assert!(!never.detected());
            assert!(always.detected());
        }
    }

    #[test]
    fn detection_rate_tracks_probability() {
        let monitor = ObstacleMonitor::new(0.25, ReroutePolicy::Hold, Duration::ZERO, Some(7));
        let hits = (0..4000).filter(|_| monitor.detected()).count();
        assert!((800..1200).contains(&hits), "hits = {hits}");
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = ObstacleMonitor::new(0.5, ReroutePolicy::Hold, Duration::ZERO, Some(99));
        let b = ObstacleMonitor::new(0.5, ReroutePolicy::Hold, Duration::ZERO, Some(99));
        let seq_a: Vec<bool> = (0..64).map(|_| a.detected()).collect();
        let seq_b: Vec<bool> = (0..64).map(|_| b.detected()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn policy_parses_from_str() {
        assert_eq!("Replan".parse::<ReroutePolicy>(), Ok(ReroutePolicy::Replan));
        assert!("detour".parse::<ReroutePolicy>().is_err());
    }

    #[tokio::test]
    async fn hold_keeps_remaining_route() {
        let grid = Grid::new(5, 5).unwrap();
        let monitor = ObstacleMonitor::disabled();
        let remaining = vec![Cell::new(1, 0), Cell::new(2, 0)];
        let route = monitor
            .reroute(Cell::new(0, 0), Cell::new(2, 0), &remaining, &grid)
            .await;
        assert_eq!(route, remaining);
    }

    #[tokio::test]
    async fn replan_starts_from_current_cell() {
        let grid = Grid::new(5, 5).unwrap();
        let monitor = ObstacleMonitor::new(0.0, ReroutePolicy::Replan, Duration::ZERO, Some(3));
        let remaining = vec![Cell::new(3, 1), Cell::new(3, 2)];
        let route = monitor
            .reroute(Cell::new(3, 0), Cell::new(3, 2), &remaining, &grid)
            .await;
        assert_eq!(route, vec![Cell::new(3, 1), Cell::new(3, 2)]);
        assert!(!route.contains(&Cell::new(0, 0)));
    }
}

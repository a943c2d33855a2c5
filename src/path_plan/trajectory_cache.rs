//! Store of planned segments, keyed by the keyframes they connect.
//!
//! Every entry remembers a fingerprint of the inputs it was planned from. Invalidation is
//! pushed by the host: when the tool, the axis mask or a keyframe changes, the affected
//! entries are removed. Consumers that prefer to check may compare the fingerprint instead.
//!
//! Loop iterations of a segment are derived from its base entry: every base pose is shifted
//! by the loop delta interpolated between the start and end keyframe, scaled by the
//! iteration number, and IK is solved again seeded with the base joints of the same sample.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::axis_mask::IkAxisMask;
use crate::cartesian::{Trajectory, Waypoint};
use crate::ik_solver::IkSolver;
use crate::kinematic_traits::{CartesianPose, PoseDelta, ToolOffset};
use crate::utils::format_pose;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Identifies a segment between two keyframes. Iteration 0 is the base segment, higher
/// iterations are loop replays derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub start: String,
    pub end: String,
    pub iteration: u32,
}

impl SegmentKey {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        SegmentKey { start: start.into(), end: end.into(), iteration: 0 }
    }

    pub fn with_iteration(&self, iteration: u32) -> Self {
        SegmentKey { iteration, ..self.clone() }
    }

    /// Key of the base segment this key derives from.
    pub fn base(&self) -> Self {
        self.with_iteration(0)
    }

    /// True if either end of the segment is the given keyframe.
    pub fn references(&self, keyframe: &str) -> bool {
        self.start == keyframe || self.end == keyframe
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.iteration == 0 {
            write!(f, "{}->{}", self.start, self.end)
        } else {
            write!(f, "{}->{}#{}", self.start, self.end, self.iteration)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTrajectory {
    pub waypoints: Vec<Waypoint>,
    pub dependency_hash: String,
    pub computed_at: DateTime<Utc>,
}

impl CachedTrajectory {
    pub fn new(trajectory: Trajectory, dependency_hash: String) -> Self {
        CachedTrajectory {
            waypoints: trajectory.waypoints,
            dependency_hash,
            computed_at: Utc::now(),
        }
    }

    pub fn validity(&self) -> Vec<bool> {
        self.waypoints.iter().map(|w| w.valid).collect()
    }
}

#[derive(Serialize)]
struct DependencyInputs<'a> {
    tool: &'a ToolOffset,
    axis_mask: IkAxisMask,
    start: &'a CartesianPose,
    end: &'a CartesianPose,
    duration: f64,
}

#[derive(Serialize)]
struct LoopInputs<'a> {
    base: &'a str,
    start_delta: &'a PoseDelta,
    end_delta: &'a PoseDelta,
    iteration: u32,
    tool: &'a ToolOffset,
    axis_mask: IkAxisMask,
}

/// Stable serialization of the inputs, reduced to 16 hex digits.
fn fingerprint<T: Serialize + fmt::Debug>(inputs: &T) -> String {
    let serialized = serde_json::to_vec(inputs).unwrap_or_else(|_| format!("{:?}", inputs).into_bytes());
    let mut hasher = DefaultHasher::new();
    serialized.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl fmt::Debug for DependencyInputs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} {:?} {:?} {}", self.tool, self.axis_mask, self.start, self.end, self.duration)
    }
}

impl fmt::Debug for LoopInputs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f, "{} {:?} {:?} {} {:?} {:?}",
            self.base, self.start_delta, self.end_delta, self.iteration, self.tool, self.axis_mask
        )
    }
}

/// Fingerprint of everything that decides the planned trajectory of a segment.
pub fn compute_dependency_hash(
    tool: &ToolOffset,
    axis_mask: IkAxisMask,
    start: &CartesianPose,
    end: &CartesianPose,
    duration: f64,
) -> String {
    fingerprint(&DependencyInputs { tool, axis_mask, start, end, duration })
}

/// Fingerprint of a loop iteration: its base entry plus the loop deltas, and the tool and
/// mask the replay solves with.
pub fn loop_dependency_hash(
    base_hash: &str,
    start_delta: &PoseDelta,
    end_delta: &PoseDelta,
    iteration: u32,
    tool: &ToolOffset,
    axis_mask: IkAxisMask,
) -> String {
    fingerprint(&LoopInputs { base: base_hash, start_delta, end_delta, iteration, tool, axis_mask })
}

/// Pose of the sample at `t` in loop iteration `iteration`.
pub fn loop_pose(base: &CartesianPose, start_delta: &PoseDelta, end_delta: &PoseDelta, t: f64, iteration: u32) -> CartesianPose {
    base.shifted(&start_delta.lerp(end_delta, t), iteration as f64)
}

/// Recomputes one loop iteration from the base waypoints. Every sample is solved on its own,
/// seeded with the base solution of the same index. A sample that fails keeps the base joints
/// and is marked invalid.
pub fn replay_waypoints(
    solver: &IkSolver,
    base: &[Waypoint],
    start_delta: &PoseDelta,
    end_delta: &PoseDelta,
    iteration: u32,
    tool: &ToolOffset,
    mask: IkAxisMask,
) -> Trajectory {
    let n = base.len().saturating_sub(1).max(1);
    let waypoints = base
        .iter()
        .enumerate()
        .map(|(i, anchor)| {
            let t = i as f64 / n as f64;
            let pose = loop_pose(&anchor.pose, start_delta, end_delta, t, iteration);
            let result = solver.solve(&pose, &anchor.joint_angles, tool, mask);
            match (result.success, result.joint_angles) {
                (true, Some(joints)) => Waypoint { pose, joint_angles: joints, valid: true },
                _ => {
                    warn!(
                        "Loop {} sample {} unreachable ({:?}): {}",
                        iteration, i, result.failure, format_pose(&pose)
                    );
                    Waypoint { pose, joint_angles: anchor.joint_angles, valid: false }
                }
            }
        })
        .collect();
    Trajectory::from_waypoints(waypoints)
}

/// Planned trajectories of the segments. There is a single writer; entries are always
/// inserted complete.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryCache {
    entries: HashMap<SegmentKey, CachedTrajectory>,
}

impl TrajectoryCache {
    pub fn new() -> Self {
        TrajectoryCache { entries: HashMap::new() }
    }

    pub fn put(&mut self, key: SegmentKey, trajectory: CachedTrajectory) {
        self.entries.insert(key, trajectory);
    }

    pub fn get(&self, key: &SegmentKey) -> Option<&CachedTrajectory> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SegmentKey> {
        self.entries.keys()
    }

    /// True if there is no entry for `key` or it was planned from different inputs.
    pub fn is_stale(&self, key: &SegmentKey, dependency_hash: &str) -> bool {
        self.entries.get(key).is_none_or(|entry| entry.dependency_hash != dependency_hash)
    }

    /// Entry for `key` if its hash matches, otherwise the result of `plan`, stored first.
    pub fn get_or_plan<F: FnOnce() -> Trajectory>(
        &mut self,
        key: SegmentKey,
        dependency_hash: String,
        plan: F,
    ) -> &CachedTrajectory {
        match self.entries.entry(key) {
            Entry::Occupied(entry) if entry.get().dependency_hash == dependency_hash => {
                debug!("Cache hit for segment {}", entry.key());
                entry.into_mut()
            }
            Entry::Occupied(mut entry) => {
                debug!("Replanning stale segment {}", entry.key());
                entry.insert(CachedTrajectory::new(plan(), dependency_hash));
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(CachedTrajectory::new(plan(), dependency_hash)),
        }
    }

    /// Removes every entry whose key matches. Returns the number of removed entries.
    pub fn invalidate<P: FnMut(&SegmentKey) -> bool>(&mut self, mut predicate: P) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Invalidated {} cached segments", removed);
        }
        removed
    }

    pub fn invalidate_all(&mut self) {
        debug!("Invalidated all {} cached segments", self.entries.len());
        self.entries.clear();
    }

    /// A keyframe was edited (either pose) or deleted: drop every segment and loop iteration
    /// that starts or ends there.
    pub fn invalidate_keyframe(&mut self, keyframe: &str) -> usize {
        self.invalidate(|key| key.references(keyframe))
    }

    /// The tool offset applies to every segment.
    pub fn on_tool_changed(&mut self) {
        self.invalidate_all();
    }

    /// The axis mask applies to every segment.
    pub fn on_mask_changed(&mut self) {
        self.invalidate_all();
    }

    /// Computes loop iteration `iteration` of the segment `base_key` and stores it under
    /// `(base_key, iteration)`. Returns None if the base segment has not been planned.
    pub fn replay_loop(
        &mut self,
        solver: &IkSolver,
        base_key: &SegmentKey,
        iteration: u32,
        start_delta: &PoseDelta,
        end_delta: &PoseDelta,
        tool: &ToolOffset,
        mask: IkAxisMask,
    ) -> Option<&CachedTrajectory> {
        let base_key = base_key.base();
        if iteration == 0 {
            return self.entries.get(&base_key);
        }
        let base = self.entries.get(&base_key)?;
        let hash = loop_dependency_hash(&base.dependency_hash, start_delta, end_delta, iteration, tool, mask);
        let trajectory = replay_waypoints(solver, &base.waypoints, start_delta, end_delta, iteration, tool, mask);

        let key = base_key.with_iteration(iteration);
        debug!("Replayed {}: {} of {} samples valid", key, trajectory.valid_count(), trajectory.len());
        Some(self.entries.entry(key).insert_entry(CachedTrajectory::new(trajectory, hash)).into_mut())
    }

    /// Computes loop iterations 1 to `iterations` of `base_key`. Returns the number of stored
    /// iterations, 0 if the base segment has not been planned. With the `parallel` feature
    /// the iterations are computed concurrently; they only read the base entry.
    pub fn replay_loops(
        &mut self,
        solver: &IkSolver,
        base_key: &SegmentKey,
        iterations: u32,
        start_delta: &PoseDelta,
        end_delta: &PoseDelta,
        tool: &ToolOffset,
        mask: IkAxisMask,
    ) -> usize {
        let base_key = base_key.base();
        let Some(base) = self.entries.get(&base_key) else {
            return 0;
        };

        let replay = |iteration: u32| {
            let hash = loop_dependency_hash(&base.dependency_hash, start_delta, end_delta, iteration, tool, mask);
            let trajectory = replay_waypoints(solver, &base.waypoints, start_delta, end_delta, iteration, tool, mask);
            (iteration, CachedTrajectory::new(trajectory, hash))
        };

        #[cfg(feature = "parallel")]
        let replayed: Vec<_> = (1..=iterations).into_par_iter().map(replay).collect();
        #[cfg(not(feature = "parallel"))]
        let replayed: Vec<_> = (1..=iterations).map(replay).collect();

        let count = replayed.len();
        for (iteration, entry) in replayed {
            self.entries.insert(base_key.with_iteration(iteration), entry);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::JointLimits;
    use crate::synthetic_arms::GantryArm;
    use std::sync::Arc;

    fn solver() -> IkSolver {
        IkSolver::new(Arc::new(GantryArm::new(10.0)), JointLimits::symmetric(180.0))
    }

    fn entry(hash: &str) -> CachedTrajectory {
        CachedTrajectory::new(Trajectory::default(), hash.to_string())
    }

    #[test]
    fn test_segment_key() {
        let key = SegmentKey::new("k1", "k2");
        assert_eq!(key.to_string(), "k1->k2");
        let looped = key.with_iteration(3);
        assert_eq!(looped.to_string(), "k1->k2#3");
        assert_eq!(looped.base(), key);
        assert!(looped.references("k2"));
        assert!(!looped.references("k3"));
    }

    #[test]
    fn test_put_get_and_staleness() {
        let mut cache = TrajectoryCache::new();
        let key = SegmentKey::new("a", "b");
        assert!(cache.get(&key).is_none());
        assert!(cache.is_stale(&key, "0"));

        cache.put(key.clone(), entry("abc"));
        assert_eq!(cache.get(&key).unwrap().dependency_hash, "abc");
        assert!(!cache.is_stale(&key, "abc"));
        assert!(cache.is_stale(&key, "abd"));
    }

    #[test]
    fn test_invalidate_removes_only_matching() {
        let mut cache = TrajectoryCache::new();
        let keys = [
            SegmentKey::new("a", "b"),
            SegmentKey::new("b", "c"),
            SegmentKey::new("c", "d"),
            SegmentKey::new("a", "b").with_iteration(2),
        ];
        for key in &keys {
            cache.put(key.clone(), entry("h"));
        }

        assert_eq!(cache.invalidate_keyframe("a"), 2);
        let mut remaining: Vec<_> = cache.keys().cloned().collect();
        remaining.sort();
        assert_eq!(remaining, vec![keys[1].clone(), keys[2].clone()]);

        assert_eq!(cache.invalidate(|key| key.end == "d"), 1);
        assert!(cache.get(&keys[1]).is_some());
        assert_eq!(cache.invalidate(|_| false), 0);

        cache.on_tool_changed();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_dependency_hash_is_deterministic() {
        let tool = ToolOffset::new(0.0, 0.0, 45.0, 0.0, 0.0, 0.0);
        let start = CartesianPose::new(100.0, 0.0, 200.0, 180.0, 0.0, 0.0);
        let end = CartesianPose::new(150.0, 20.0, 200.0, 180.0, 0.0, 90.0);
        let a = compute_dependency_hash(&tool, IkAxisMask::ALL, &start, &end, 1.5);
        let b = compute_dependency_hash(&tool, IkAxisMask::ALL, &start, &end, 1.5);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_dependency_hash_sees_every_input() {
        let tool = ToolOffset::new(0.0, 0.0, 45.0, 0.0, 0.0, 0.0);
        let start = CartesianPose::new(100.0, 0.0, 200.0, 180.0, 0.0, 0.0);
        let end = CartesianPose::new(150.0, 20.0, 200.0, 180.0, 0.0, 90.0);
        let reference = compute_dependency_hash(&tool, IkAxisMask::ALL, &start, &end, 1.5);

        let other_tool = ToolOffset { rz: 0.5, ..tool };
        let other_start = CartesianPose { y: 0.001, ..start };
        let other_end = CartesianPose { rx: 179.0, ..end };
        let variants = [
            compute_dependency_hash(&other_tool, IkAxisMask::ALL, &start, &end, 1.5),
            compute_dependency_hash(&tool, IkAxisMask::POSITION, &start, &end, 1.5),
            compute_dependency_hash(&tool, IkAxisMask::ALL, &other_start, &end, 1.5),
            compute_dependency_hash(&tool, IkAxisMask::ALL, &start, &other_end, 1.5),
            compute_dependency_hash(&tool, IkAxisMask::ALL, &start, &end, 1.25),
        ];
        for variant in &variants {
            assert_ne!(variant, &reference);
        }
        // Start and end are not interchangeable
        assert_ne!(compute_dependency_hash(&tool, IkAxisMask::ALL, &end, &start, 1.5), reference);
    }

    #[test]
    fn test_loop_pose_is_exact() {
        let base = CartesianPose::new(10.0, -4.0, 0.5, 90.0, 0.0, -30.0);
        let start_delta = PoseDelta::new(1.0, 0.5, 0.0, 0.25, 0.0, 2.0);
        let end_delta = PoseDelta::new(3.0, -0.5, 0.125, 0.75, 0.0, -2.0);

        assert_eq!(loop_pose(&base, &start_delta, &end_delta, 0.0, 2),
                   CartesianPose::new(12.0, -3.0, 0.5, 90.5, 0.0, -26.0));
        assert_eq!(loop_pose(&base, &start_delta, &end_delta, 0.25, 2),
                   CartesianPose::new(13.0, -3.5, 0.5625, 90.75, 0.0, -28.0));
        assert_eq!(loop_pose(&base, &start_delta, &end_delta, 1.0, 4),
                   CartesianPose::new(22.0, -6.0, 1.0, 93.0, 0.0, -38.0));
    }

    #[test]
    fn test_get_or_plan_replans_stale_entry() {
        let mut cache = TrajectoryCache::new();
        let key = SegmentKey::new("a", "b");
        let mut calls = 0;
        cache.get_or_plan(key.clone(), "h1".into(), || { calls += 1; Trajectory::default() });
        cache.get_or_plan(key.clone(), "h1".into(), || { calls += 1; Trajectory::default() });
        assert_eq!(calls, 1);
        let replanned = cache.get_or_plan(key.clone(), "h2".into(), || { calls += 1; Trajectory::default() });
        assert_eq!(replanned.dependency_hash, "h2");
        assert_eq!(calls, 2);
    }

    fn base_segment(solver: &IkSolver) -> Trajectory {
        let start = CartesianPose::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let end = CartesianPose::new(40.0, 0.0, 0.0, 0.0, 0.0, 20.0);
        let waypoints = (0..=4)
            .map(|i| {
                let pose = start.lerp(&end, i as f64 / 4.0);
                let joints = solver.solve(&pose, &[0.0; 6], &ToolOffset::NONE, IkAxisMask::ALL)
                    .joint_angles.unwrap();
                Waypoint { pose, joint_angles: joints, valid: true }
            })
            .collect();
        Trajectory::from_waypoints(waypoints)
    }

    #[test]
    fn test_replay_loop_without_base() {
        let mut cache = TrajectoryCache::new();
        let delta = PoseDelta::default();
        let key = SegmentKey::new("a", "b");
        assert!(cache.replay_loop(&solver(), &key, 1, &delta, &delta, &ToolOffset::NONE, IkAxisMask::ALL).is_none());
        assert_eq!(cache.replay_loops(&solver(), &key, 3, &delta, &delta, &ToolOffset::NONE, IkAxisMask::ALL), 0);
    }

    #[test]
    fn test_replay_loop_shifts_and_solves() {
        let solver = solver();
        let mut cache = TrajectoryCache::new();
        let key = SegmentKey::new("a", "b");
        let base = base_segment(&solver);
        cache.put(key.clone(), CachedTrajectory::new(base.clone(), "base".into()));

        let start_delta = PoseDelta::new(0.0, 8.0, 0.0, 0.0, 0.0, 0.0);
        let end_delta = PoseDelta::new(0.0, 16.0, 0.0, 0.0, 0.0, 0.0);
        let replayed = cache
            .replay_loop(&solver, &key, 2, &start_delta, &end_delta, &ToolOffset::NONE, IkAxisMask::ALL)
            .unwrap()
            .clone();

        assert_eq!(replayed.waypoints.len(), base.len());
        let expected_y = [16.0, 20.0, 24.0, 28.0, 32.0];
        for (i, waypoint) in replayed.waypoints.iter().enumerate() {
            assert_eq!(waypoint.pose.y, expected_y[i]);
            assert_eq!(waypoint.pose.x, base.waypoints[i].pose.x);
            assert!(waypoint.valid);
            // Gantry joint 2 drives y at 10 mm per degree
            assert!((waypoint.joint_angles[1] * 10.0 - expected_y[i]).abs() < 1.0);
        }
        assert!(cache.get(&key.with_iteration(2)).is_some());
        assert_ne!(replayed.dependency_hash, "base");
    }

    #[test]
    fn test_loop_hash_follows_replay_inputs() {
        let solver = solver();
        let mut cache = TrajectoryCache::new();
        let key = SegmentKey::new("a", "b");
        cache.put(key.clone(), CachedTrajectory::new(base_segment(&solver), "base".into()));
        let delta = PoseDelta::new(0.0, 0.0, 2.0, 0.0, 0.0, 0.0);
        let tool = ToolOffset::new(0.0, 0.0, 10.0, 0.0, 0.0, 0.0);

        let mut replay = |tool: &ToolOffset, mask: IkAxisMask| {
            cache.replay_loop(&solver, &key, 1, &delta, &delta, tool, mask).unwrap().dependency_hash.clone()
        };
        let plain = replay(&ToolOffset::NONE, IkAxisMask::ALL);
        let with_tool = replay(&tool, IkAxisMask::ALL);
        let position_only = replay(&ToolOffset::NONE, IkAxisMask::POSITION);
        assert_eq!(plain, replay(&ToolOffset::NONE, IkAxisMask::ALL));
        assert_ne!(plain, with_tool);
        assert_ne!(plain, position_only);
        assert_ne!(with_tool, position_only);
        assert_eq!(plain, loop_dependency_hash("base", &delta, &delta, 1, &ToolOffset::NONE, IkAxisMask::ALL));
    }

    #[test]
    fn test_replay_loops_stores_every_iteration() {
        let solver = solver();
        let mut cache = TrajectoryCache::new();
        let key = SegmentKey::new("a", "b");
        cache.put(key.clone(), CachedTrajectory::new(base_segment(&solver), "base".into()));

        let delta = PoseDelta::new(0.0, 0.0, 2.0, 0.0, 0.0, 0.0);
        let stored = cache.replay_loops(&solver, &key, 3, &delta, &delta, &ToolOffset::NONE, IkAxisMask::ALL);
        assert_eq!(stored, 3);
        assert_eq!(cache.len(), 4);
        for k in 1..=3u32 {
            let entry = cache.get(&key.with_iteration(k)).unwrap();
            assert!(entry.waypoints.iter().all(|w| w.pose.z == 2.0 * k as f64));
        }

        // Editing the start keyframe drops the base and all its loop iterations
        assert_eq!(cache.invalidate_keyframe("a"), 4);
    }
}

//! Ancestor queries over the commit graph
//!
//! ## Merge Base
//!
//! Both tips are walked breadth first, recording for every reached commit its
//! distance from each tip. Commits reached from both sides are common
//! ancestors. A common ancestor that is itself an ancestor of another common
//! ancestor is redundant (marked `STALE`) and dropped. Among the remaining
//! best common ancestors the one with the smallest combined distance wins,
//! ties going to the newest commit.
//!
//! The graph is read through a loader closure, so the same code runs against
//! the object database and against in-memory graphs in tests.

use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct VisitState: u8 {
        const NONE = 0b000;
        const FROM_OURS = 0b001;
        const FROM_THEIRS = 0b010;
        const FROM_BOTH = Self::FROM_OURS.bits() | Self::FROM_THEIRS.bits();
        const STALE = 0b100;
    }
}

impl fmt::Debug for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(VisitState::FROM_OURS) {
            flags.push("OURS");
        }
        if self.contains(VisitState::FROM_THEIRS) {
            flags.push("THEIRS");
        }
        if self.contains(VisitState::STALE) {
            flags.push("STALE");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

impl fmt::Display for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Read-only view of the history graph
pub struct CommitGraph<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    commit_loader: CommitLoaderFn,
}

/// Breadth-first walk over a commit and everything reachable from it
///
/// Yields each commit once, with its distance (in edges) from the start.
/// Every call to `CommitGraph::ancestors` starts a fresh walk.
pub struct Ancestors<'g, CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    graph: &'g CommitGraph<CommitLoaderFn>,
    queue: VecDeque<(ObjectId, usize)>,
    seen: HashSet<ObjectId>,
}

impl<CommitLoaderFn> Iterator for Ancestors<'_, CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    type Item = anyhow::Result<(SlimCommit, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (commit_id, distance) = self.queue.pop_front()?;

        let commit = match (self.graph.commit_loader)(&commit_id) {
            Ok(commit) => commit,
            Err(err) => {
                self.queue.clear();
                return Some(Err(err));
            }
        };

        for parent in &commit.parents {
            if self.seen.insert(parent.clone()) {
                self.queue.push_back((parent.clone(), distance + 1));
            }
        }

        Some(Ok((commit, distance)))
    }
}

#[derive(Debug, Clone)]
struct Reach {
    state: VisitState,
    ours_distance: usize,
    theirs_distance: usize,
    timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl<CommitLoaderFn> CommitGraph<CommitLoaderFn>
where
    CommitLoaderFn: Fn(&ObjectId) -> anyhow::Result<SlimCommit>,
{
    pub fn new(commit_loader: CommitLoaderFn) -> Self {
        Self { commit_loader }
    }

    pub fn ancestors(&self, start: &ObjectId) -> Ancestors<'_, CommitLoaderFn> {
        Ancestors {
            graph: self,
            queue: VecDeque::from([(start.clone(), 0)]),
            seen: HashSet::from([start.clone()]),
        }
    }

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own
    /// ancestor)
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> anyhow::Result<bool> {
        for step in self.ancestors(descendant) {
            let (commit, _) = step?;
            if &commit.oid == ancestor {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// The best common ancestor of two commits, `None` for disjoint histories
    pub fn merge_base(&self, ours: &ObjectId, theirs: &ObjectId) -> anyhow::Result<Option<ObjectId>> {
        if ours == theirs {
            return Ok(Some(ours.clone()));
        }

        let mut reached = HashMap::<ObjectId, Reach>::new();

        for step in self.ancestors(ours) {
            let (commit, distance) = step?;
            reached.insert(
                commit.oid,
                Reach {
                    state: VisitState::FROM_OURS,
                    ours_distance: distance,
                    theirs_distance: usize::MAX,
                    timestamp: commit.timestamp,
                },
            );
        }

        for step in self.ancestors(theirs) {
            let (commit, distance) = step?;
            reached
                .entry(commit.oid)
                .and_modify(|reach| {
                    reach.state |= VisitState::FROM_THEIRS;
                    reach.theirs_distance = distance;
                })
                .or_insert(Reach {
                    state: VisitState::FROM_THEIRS,
                    ours_distance: usize::MAX,
                    theirs_distance: distance,
                    timestamp: commit.timestamp,
                });
        }

        let mut candidates = reached
            .into_iter()
            .filter(|(_, reach)| reach.state.contains(VisitState::FROM_BOTH))
            .collect::<HashMap<_, _>>();

        debug_log!(
            "Common ancestors of {} and {}: {}",
            ours,
            theirs,
            candidates
                .iter()
                .map(|(oid, reach)| format!(
                    "{}({}+{})",
                    oid.to_short_oid(),
                    reach.ours_distance,
                    reach.theirs_distance
                ))
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.mark_redundant(&mut candidates)?;

        let best = candidates
            .into_iter()
            .filter(|(_, reach)| !reach.state.contains(VisitState::STALE))
            .min_by_key(|(oid, reach)| {
                (
                    reach.ours_distance + reach.theirs_distance,
                    Reverse(reach.timestamp),
                    oid.clone(),
                )
            })
            .map(|(oid, _)| oid);

        debug_log!("Merge base of {} and {}: {:?}", ours, theirs, best);

        Ok(best)
    }

    /// Flag every candidate reachable from another candidate as `STALE`
    fn mark_redundant(&self, candidates: &mut HashMap<ObjectId, Reach>) -> anyhow::Result<()> {
        let mut order = candidates.keys().cloned().collect::<Vec<_>>();
        order.sort();

        for candidate in order {
            // everything below a stale candidate is covered by the walk that
            // found it stale
            if candidates
                .get(&candidate)
                .is_some_and(|reach| reach.state.contains(VisitState::STALE))
            {
                continue;
            }

            for step in self.ancestors(&candidate).skip(1) {
                let (commit, _) = step?;
                if let Some(reach) = candidates.get_mut(&commit.oid) {
                    debug_log!("{} is redundant below {}", commit.oid, candidate);
                    reach.state |= VisitState::STALE;
                }
            }
        }

        Ok(())
    }
}

use crate::areas::database::Database;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

type Timestamp = chrono::DateTime<chrono::FixedOffset>;

/// Ready commits ordered newest first; on equal timestamps the commit
/// discovered first (first parents before later ones) wins
type ReadyQueue = BinaryHeap<(Timestamp, Reverse<usize>, ObjectId)>;

#[derive(Debug)]
struct GraphNode {
    parents: Vec<ObjectId>,
    timestamp: Timestamp,
    discovery: usize,
    pending_children: usize,
}

/// History from a start commit, each commit exactly once
///
/// The graph shape is read up front from the slim commit headers; full
/// commits are loaded lazily as they are emitted.
pub struct RevList<'r> {
    database: &'r Database,
    nodes: HashMap<ObjectId, GraphNode>,
    ready: ReadyQueue,
}

impl<'r> RevList<'r> {
    pub fn new(database: &'r Database, start: &ObjectId) -> anyhow::Result<Self> {
        let mut nodes = HashMap::<ObjectId, GraphNode>::new();
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(commit_id) = queue.pop_front() {
            if nodes.contains_key(&commit_id) {
                continue;
            }

            let commit = database.load_slim_commit(&commit_id)?;
            for parent in &commit.parents {
                queue.push_back(parent.clone());
            }

            let discovery = nodes.len();
            nodes.insert(
                commit_id,
                GraphNode {
                    parents: commit.parents,
                    timestamp: commit.timestamp,
                    discovery,
                    pending_children: 0,
                },
            );
        }

        let edges = nodes
            .values()
            .flat_map(|node| node.parents.clone())
            .collect::<Vec<_>>();
        for parent in edges {
            if let Some(node) = nodes.get_mut(&parent) {
                node.pending_children += 1;
            }
        }

        let mut ready = ReadyQueue::new();
        if let Some(node) = nodes.get(start) {
            ready.push((node.timestamp, Reverse(node.discovery), start.clone()));
        }

        Ok(RevList {
            database,
            nodes,
            ready,
        })
    }

    fn release_parents(&mut self, commit_id: &ObjectId) {
        let parents = self
            .nodes
            .get(commit_id)
            .map(|node| node.parents.clone())
            .unwrap_or_default();

        for parent in parents {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.pending_children = node.pending_children.saturating_sub(1);
                if node.pending_children == 0 {
                    self.ready
                        .push((node.timestamp, Reverse(node.discovery), parent.clone()));
                }
            }
        }
    }
}

impl Iterator for RevList<'_> {
    type Item = anyhow::Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, _, commit_id) = self.ready.pop()?;
        self.release_parents(&commit_id);

        Some(
            self.database
                .load_commit(&commit_id)
                .map(|commit| (commit_id, commit)),
        )
    }
}

//! Pipeline Runner: resolves the stage chain at build time and drives it
use crate::context::{ContextSlot, PipelineContext};
use crate::error::PipelineError;
use crate::stage::{Node, Transition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Timing and routing of one visited stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub id: String,
    pub latency_ms: u64,
    pub transition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub pipeline_id: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn visited(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id.as_str()).collect()
    }
}

/// Collects stages and the edges between them.
///
/// ```ignore
/// let pipeline = PipelineBuilder::new()
///     .then(Batch(gatherer))
///     .then(Batch(generator))
///     .then(writer)
///     .build()?;
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    nodes: Vec<Box<dyn Node>>,
    edges: Vec<(String, Transition, String)>,
    seeded: BTreeSet<ContextSlot>,
    last: Option<&'static str>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node` and links the previously chained stage to it.
    pub fn then<N: Node + 'static>(mut self, node: N) -> Self {
        let id = node.stage_id();
        if let Some(previous) = self.last {
            self.edges
                .push((previous.to_string(), Transition::Default, id.to_string()));
        }
        self.nodes.push(Box::new(node));
        self.last = Some(id);
        self
    }

    /// Registers `node` without linking it.
    pub fn add<N: Node + 'static>(mut self, node: N) -> Self {
        self.nodes.push(Box::new(node));
        self
    }

    /// Default successor of `from`.
    pub fn link(self, from: &str, to: &str) -> Self {
        self.link_on(from, Transition::Default, to)
    }

    /// Successor of `from` when it finishes with `transition`.
    pub fn link_on(mut self, from: &str, transition: Transition, to: &str) -> Self {
        self.edges
            .push((from.to_string(), transition, to.to_string()));
        self
    }

    /// Declares a slot the caller populates before `run`.
    pub fn seed(mut self, slot: ContextSlot) -> Self {
        self.seeded.insert(slot);
        self
    }

    /// Builds with the first registered stage as entry.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let entry = self
            .nodes
            .first()
            .map(|n| n.stage_id())
            .ok_or(PipelineError::Empty)?;
        self.build_from(entry)
    }

    pub fn build_from(self, entry: &str) -> Result<Pipeline, PipelineError> {
        if self.nodes.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut index: HashMap<&'static str, usize> = HashMap::new();
        for (position, node) in self.nodes.iter().enumerate() {
            if index.insert(node.stage_id(), position).is_some() {
                return Err(PipelineError::DuplicateStage(node.stage_id().to_string()));
            }
        }
        let resolve = |id: &str| {
            index
                .get(id)
                .copied()
                .ok_or_else(|| PipelineError::UnknownStage(id.to_string()))
        };

        let entry = resolve(entry)?;
        let mut successors: Vec<BTreeMap<Transition, usize>> = vec![BTreeMap::new(); self.nodes.len()];
        for (from, transition, to) in &self.edges {
            if *transition == Transition::Stop {
                continue;
            }
            successors[resolve(from)?].insert(*transition, resolve(to)?);
        }

        let graph = Graph {
            nodes: &self.nodes,
            successors: &successors,
        };
        graph.check_acyclic(entry)?;
        graph.check_inputs(entry, &self.seeded)?;

        let reachable = graph.reachable(entry);
        for (position, node) in self.nodes.iter().enumerate() {
            if !reachable.contains(&position) {
                warn!(stage = node.stage_id(), "stage is not reachable from the entry stage");
            }
        }

        let pipeline_id = graph
            .default_chain(entry)
            .iter()
            .map(|&i| self.nodes[i].stage_id())
            .collect::<Vec<_>>()
            .join("→");

        Ok(Pipeline {
            nodes: self.nodes,
            successors,
            entry,
            reachable,
            pipeline_id,
        })
    }
}

struct Graph<'a> {
    nodes: &'a [Box<dyn Node>],
    successors: &'a [BTreeMap<Transition, usize>],
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

impl Graph<'_> {
    fn check_acyclic(&self, entry: usize) -> Result<(), PipelineError> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut path = Vec::new();
        self.visit_acyclic(entry, &mut marks, &mut path)
    }

    fn visit_acyclic(
        &self,
        node: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<(), PipelineError> {
        marks[node] = Mark::OnPath;
        path.push(node);
        for &next in self.successors[node].values() {
            match marks[next] {
                Mark::OnPath => {
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&n| self.nodes[n].stage_id().to_string())
                        .collect();
                    cycle.push(self.nodes[next].stage_id().to_string());
                    return Err(PipelineError::Cycle { path: cycle });
                }
                Mark::Unvisited => self.visit_acyclic(next, marks, path)?,
                Mark::Done => {}
            }
        }
        path.pop();
        marks[node] = Mark::Done;
        Ok(())
    }

    /// Every slot a stage reads must be written on every path leading to it.
    /// Only called once the graph is known to be acyclic.
    fn check_inputs(
        &self,
        node: usize,
        available: &BTreeSet<ContextSlot>,
    ) -> Result<(), PipelineError> {
        let stage = &self.nodes[node];
        if let Some(slot) = stage
            .input_slots()
            .iter()
            .find(|slot| !available.contains(slot))
        {
            return Err(PipelineError::UnsatisfiedInput {
                stage: stage.stage_id().to_string(),
                slot: *slot,
            });
        }

        let mut after = available.clone();
        after.extend(stage.output_slots().iter().copied());
        for &next in self.successors[node].values() {
            self.check_inputs(next, &after)?;
        }
        Ok(())
    }

    fn reachable(&self, entry: usize) -> Vec<usize> {
        let mut seen = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack = vec![entry];
        while let Some(node) = stack.pop() {
            if seen[node] {
                continue;
            }
            seen[node] = true;
            order.push(node);
            stack.extend(self.successors[node].values().rev());
        }
        order
    }

    fn default_chain(&self, entry: usize) -> Vec<usize> {
        let mut chain = vec![entry];
        let mut current = entry;
        while let Some(&next) = self.successors[current].get(&Transition::Default) {
            chain.push(next);
            current = next;
        }
        chain
    }
}

/// A resolved, acyclic chain of stages.
pub struct Pipeline {
    nodes: Vec<Box<dyn Node>>,
    successors: Vec<BTreeMap<Transition, usize>>,
    entry: usize,
    reachable: Vec<usize>,
    pipeline_id: String,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Ids of every stage reachable from the entry, depth first.
    pub fn stage_ids(&self) -> Vec<&'static str> {
        self.reachable
            .iter()
            .map(|&i| self.nodes[i].stage_id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub async fn run(&self, ctx: &mut PipelineContext) -> Result<RunReport, PipelineError> {
        self.run_until_cancelled(ctx, &CancellationToken::new()).await
    }

    /// Runs from the entry stage until a stage stops or has no successor for
    /// its transition. Cancelling `cancel` drops the in-flight stage.
    pub async fn run_until_cancelled(
        &self,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        let mut stages = Vec::new();
        let mut current = Some(self.entry);

        info!(pipeline = %self.pipeline_id, run_id = %ctx.run_id, "pipeline started");

        while let Some(index) = current {
            let node = &self.nodes[index];
            let id = node.stage_id();
            let start = Instant::now();
            info!(stage = id, "running stage");

            let transition = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(stage = id, "pipeline cancelled");
                    return Err(PipelineError::Cancelled { stage: id.to_string() });
                }
                result = node.run_cycle(ctx) => result.map_err(|source| PipelineError::Stage {
                    stage: id.to_string(),
                    source,
                })?,
            };

            let latency_ms = start.elapsed().as_millis() as u64;
            info!(stage = id, latency_ms, next = transition.label(), "stage finished");
            stages.push(StageReport {
                id: id.to_string(),
                latency_ms,
                transition: transition.label().to_string(),
            });

            current = match transition {
                Transition::Stop => None,
                other => self.successors[index].get(&other).copied(),
            };
        }

        info!(pipeline = %self.pipeline_id, stages = stages.len(), "pipeline finished");

        Ok(RunReport {
            pipeline_id: self.pipeline_id.clone(),
            run_id: ctx.run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            stages,
        })
    }
}

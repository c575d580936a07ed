use std::collections::HashMap;
use std::sync::Arc;

use ep_record::sequence::sequence;
use ep_record::{BlockRange, EntityType, Record, Value};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::jobs::{self, Inputs, JobContext};
use crate::join::{join_checked, Projection};
use crate::{DependencyGraph, ExportError, Producer, RpcExecutor};

const RECEIPT_FIELDS: [(&str, &str); 5] = [
    ("cumulative_gas_used", "receipt_cumulative_gas_used"),
    ("gas_used", "receipt_gas_used"),
    ("contract_address", "receipt_contract_address"),
    ("status", "receipt_status"),
    ("effective_gas_price", "receipt_effective_gas_price"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Drop transactions whose receipt could not be fetched instead of
    /// exporting them without receipt fields.
    pub skip_none_receipts: bool,
}

/// Resolves requested entity types into extraction jobs.
pub struct ExportPlanner {
    graph: DependencyGraph,
    executor: RpcExecutor,
    options: ExportOptions,
}

impl ExportPlanner {
    pub fn new(executor: RpcExecutor, options: ExportOptions) -> Self {
        Self { graph: DependencyGraph::standard(), executor, options }
    }

    pub fn with_graph(self, graph: DependencyGraph) -> Result<Self, ExportError> {
        graph.validate()?;
        Ok(Self { graph, ..self })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn session(&self, range: BlockRange) -> ExportSession<'_> {
        ExportSession { planner: self, range, memo: HashMap::new(), errors: Vec::new(), executed: Vec::new() }
    }

    /// Exports one block range. See [ExportSession::export_all].
    pub async fn export_all(&self, range: BlockRange, requested: &[EntityType]) -> Result<Vec<Record>, ExportError> {
        self.session(range).export_all(requested).await
    }

    /// Releases the executor's workers. Safe to call more than once.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }
}

/// Memo table of one export cycle. Every producer runs at most once per
/// session, whichever of its outputs was asked for first.
pub struct ExportSession<'a> {
    planner: &'a ExportPlanner,
    range: BlockRange,
    memo: HashMap<EntityType, Arc<Vec<Record>>>,
    errors: Vec<Record>,
    executed: Vec<Producer>,
}

impl ExportSession<'_> {
    pub fn range(&self) -> BlockRange {
        self.range
    }

    /// Producers run so far, in execution order.
    pub fn executed(&self) -> &[Producer] {
        &self.executed
    }

    /// The collection of `kind`, running its producer and, first, the
    /// producers of its inputs if they have not run yet.
    ///
    /// `error` never triggers extraction and yields the failures collected so
    /// far.
    pub fn export(&mut self, kind: EntityType) -> BoxFuture<'_, Result<Arc<Vec<Record>>, ExportError>> {
        async move {
            if kind == EntityType::Error {
                return Ok(Arc::new(self.errors.clone()));
            }
            if let Some(records) = self.memo.get(&kind) {
                return Ok(Arc::clone(records));
            }

            let producer = self.planner.graph.producer(kind).ok_or(ExportError::NoProducer(kind))?;
            let mut inputs = Inputs::default();
            for input in self.planner.graph.inputs(producer) {
                let records = self.export(input).await?;
                inputs.insert(input, records);
            }

            tracing::debug!(producer = producer.name(), range = %self.range, "Running extraction job");
            let cx = JobContext { executor: &self.planner.executor, range: self.range };
            let produced = jobs::run(producer, &cx, &inputs).await?;

            for (output, records) in produced.collections {
                self.memo.insert(output, Arc::new(records));
            }
            self.errors.extend(produced.errors);
            self.executed.push(producer);

            self.memo.get(&kind).cloned().ok_or(ExportError::NoProducer(kind))
        }
        .boxed()
    }

    /// Exports every requested type and returns them sorted, stamped with
    /// their identity and timestamp, and concatenated in export order.
    ///
    /// Fails with [ExportError::NoProducer] before any extraction when a type
    /// in the dependency closure has no producer.
    ///
    /// Transactions are enriched with their receipt fields, which pulls in
    /// receipts even when they were not requested.
    pub async fn export_all(mut self, requested: &[EntityType]) -> Result<Vec<Record>, ExportError> {
        // Receipts are needed to enrich transactions.
        let mut roots = requested.to_vec();
        if requested.contains(&EntityType::Transaction) {
            roots.push(EntityType::Receipt);
        }
        let closure = self.planner.graph.closure(&roots);
        if let Some(kind) = closure.iter().find(|kind| self.planner.graph.producer(**kind).is_none()) {
            return Err(ExportError::NoProducer(*kind));
        }
        tracing::debug!(range = %self.range, ?closure, "Resolved entity types");

        let mut collections: HashMap<EntityType, Vec<Record>> = HashMap::new();
        for kind in requested.iter().filter(|t| **t != EntityType::Error) {
            let records = self.export(*kind).await?;
            collections.insert(*kind, Arc::unwrap_or_clone(records));
        }

        if let Some(transactions) = collections.remove(&EntityType::Transaction) {
            let receipts = self.export(EntityType::Receipt).await?;
            let enriched = enrich_transactions(transactions, &receipts, self.planner.options.skip_none_receipts)?;
            collections.insert(EntityType::Transaction, enriched);
        }

        if requested.contains(&EntityType::Error) {
            collections.insert(EntityType::Error, std::mem::take(&mut self.errors));
        }

        Ok(sequence(collections, requested))
    }
}

/// Adds the `receipt_*` fields to every transaction whose receipt is known.
/// Transactions without a receipt are dropped or kept with null receipt
/// fields, depending on `skip_none_receipts`.
fn enrich_transactions(
    transactions: Vec<Record>,
    receipts: &[Record],
    skip_none_receipts: bool,
) -> Result<Vec<Record>, ExportError> {
    let with_receipt: std::collections::HashSet<&str> =
        receipts.iter().filter_map(|r| r.get_str("transaction_hash")).collect();
    let (covered, uncovered): (Vec<_>, Vec<_>) = transactions
        .into_iter()
        .partition(|tx| tx.get_str("hash").is_some_and(|hash| with_receipt.contains(hash)));

    let mut enriched = join_checked(
        "transaction_receipt",
        &covered,
        receipts,
        ("hash", "transaction_hash"),
        &Projection::All,
        &Projection::renamed(&RECEIPT_FIELDS),
    )?;

    if !skip_none_receipts {
        enriched.extend(uncovered.into_iter().map(|mut tx| {
            for (_, field) in RECEIPT_FIELDS {
                tx.insert(field, Value::Null);
            }
            tx
        }));
    } else if !uncovered.is_empty() {
        tracing::debug!(skipped = uncovered.len(), "Skipping transactions without receipt");
    }
    Ok(enriched)
}
